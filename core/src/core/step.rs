// marketflow/src/core/step.rs
use super::Shared;
use std::sync::Arc;

/// Predicate evaluated right before a step; `true` skips the step.
pub type SkipIf<T> = Arc<dyn Fn(&Shared<T>) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StepDef<T: Send + Sync + 'static> {
  pub name: String,
  /// An optional step without handlers is skipped instead of failing the run.
  pub optional: bool,
  pub skip_if: Option<SkipIf<T>>,
}

impl<T: Send + Sync + 'static> StepDef<T> {
  pub fn new(name: impl Into<String>, optional: bool, skip_if: Option<SkipIf<T>>) -> Self {
    Self {
      name: name.into(),
      optional,
      skip_if,
    }
  }

  pub(crate) fn should_skip(&self, ctx: &Shared<T>) -> bool {
    self.skip_if.as_ref().map_or(false, |predicate| predicate(ctx))
  }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("has_skip_if", &self.skip_if.is_some())
      .finish()
  }
}
