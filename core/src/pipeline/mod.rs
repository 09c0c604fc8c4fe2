// marketflow/src/pipeline/mod.rs

mod definition;
mod execution;
mod hooks;

pub use definition::Pipeline;
pub use hooks::Phase;
