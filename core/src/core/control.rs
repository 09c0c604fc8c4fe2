// marketflow/src/core/control.rs

/// What a handler tells the pipeline to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
  Continue,
  /// Halt the run. Remaining handlers and steps are not executed.
  Stop,
}

/// How a run ended when no handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Completed,
  Stopped,
}

impl Outcome {
  pub fn is_completed(self) -> bool {
    matches!(self, Outcome::Completed)
  }
}
