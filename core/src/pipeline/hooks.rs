// marketflow/src/pipeline/hooks.rs

use crate::core::handler::{boxed, Handler};
use crate::core::{Control, Shared};
use crate::error::FlowError;
use crate::pipeline::Pipeline;
use std::future::Future;

/// The three handler slots of a step, run in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Before,
  On,
  After,
}

impl Phase {
  pub const ALL: [Phase; 3] = [Phase::Before, Phase::On, Phase::After];

  pub fn as_str(self) -> &'static str {
    match self {
      Phase::Before => "before",
      Phase::On => "on",
      Phase::After => "after",
    }
  }
}

impl<T, E> Pipeline<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) fn handlers(&self, phase: Phase, step: &str) -> &[Handler<T, E>] {
    let slot = match phase {
      Phase::Before => &self.before,
      Phase::On => &self.on,
      Phase::After => &self.after,
    };
    slot.get(step).map(Vec::as_slice).unwrap_or(&[])
  }

  fn push_handler(&mut self, phase: Phase, step: &str, handler: Handler<T, E>) {
    self.index_of(step);
    let slot = match phase {
      Phase::Before => &mut self.before,
      Phase::On => &mut self.on,
      Phase::After => &mut self.after,
    };
    slot.entry(step.to_string()).or_default().push(handler);
    tracing::trace!(step, phase = phase.as_str(), "handler registered");
  }

  /// Registers a handler that runs before the step's `on` handlers.
  pub fn before<F, Fut, UserErr>(&mut self, step: &str, handler_fn: F)
  where
    F: Fn(Shared<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Control, UserErr>> + Send + 'static,
    UserErr: Into<E> + 'static,
  {
    self.push_handler(Phase::Before, step, boxed(handler_fn));
  }

  /// Registers the main handler(s) of a step.
  pub fn on<F, Fut, UserErr>(&mut self, step: &str, handler_fn: F)
  where
    F: Fn(Shared<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Control, UserErr>> + Send + 'static,
    UserErr: Into<E> + 'static,
  {
    self.push_handler(Phase::On, step, boxed(handler_fn));
  }

  pub fn after<F, Fut, UserErr>(&mut self, step: &str, handler_fn: F)
  where
    F: Fn(Shared<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Control, UserErr>> + Send + 'static,
    UserErr: Into<E> + 'static,
  {
    self.push_handler(Phase::After, step, boxed(handler_fn));
  }
}
