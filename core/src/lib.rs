// marketflow/src/lib.rs

//! Marketflow: async, type-keyed step pipelines.
//!
//! A [`Pipeline`] is an ordered list of named steps. Each step can carry
//! `before`, `on` and `after` handlers that receive the shared context of the
//! run ([`Shared<T>`]) and decide whether the run continues or stops.
//!
//! Pipelines are registered in a [`Flows`] registry keyed by their context
//! type, so callers only need to build a context and hand it to
//! [`Flows::run`].

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::control::{Control, Outcome};
pub use crate::core::handler::Handler;
pub use crate::core::shared::Shared;
pub use crate::core::step::{SkipIf, StepDef};
pub use crate::error::{FlowError, FlowResult};
pub use crate::pipeline::Pipeline;
pub use crate::registry::Flows;
