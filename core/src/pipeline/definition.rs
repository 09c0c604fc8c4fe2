// marketflow/src/pipeline/definition.rs

use crate::core::handler::Handler;
use crate::core::step::{SkipIf, StepDef};
use crate::error::FlowError;
use std::collections::HashMap;

/// Step definition tuple accepted by [`Pipeline::new`].
pub type StepSpec<'a, T> = (&'a str, bool, Option<SkipIf<T>>);

/// An ordered set of named steps over a context `T`, whose handlers fail
/// with `E`.
///
/// `E` must absorb [`FlowError`] so structural failures (a required step
/// without handlers) surface through the same error channel as handler
/// failures.
pub struct Pipeline<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<T>>,
  pub(crate) before: HashMap<String, Vec<Handler<T, E>>>,
  pub(crate) on: HashMap<String, Vec<Handler<T, E>>>,
  pub(crate) after: HashMap<String, Vec<Handler<T, E>>>,
}

impl<T, E> Pipeline<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new(steps: &[StepSpec<'_, T>]) -> Self {
    let mut pipeline = Self {
      steps: Vec::with_capacity(steps.len()),
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    };
    for (name, optional, skip_if) in steps {
      pipeline.assert_absent(name);
      pipeline.steps.push(StepDef::new(*name, *optional, skip_if.clone()));
    }
    pipeline
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn has_step(&self, name: &str) -> bool {
    self.position(name).is_some()
  }

  fn position(&self, name: &str) -> Option<usize> {
    self.steps.iter().position(|s| s.name == name)
  }

  /// Index of an existing step. Referencing an unknown step while wiring a
  /// pipeline is a programming error, so this panics.
  pub(crate) fn index_of(&self, name: &str) -> usize {
    match self.position(name) {
      Some(idx) => idx,
      None => panic!("marketflow: {}", FlowError::StepNotFound { step_name: name.to_string() }),
    }
  }

  fn assert_absent(&self, name: &str) {
    if self.has_step(name) {
      panic!("marketflow: {}", FlowError::DuplicateStep { step_name: name.to_string() });
    }
  }

  pub fn insert_before(&mut self, existing: &str, name: &str, optional: bool, skip_if: Option<SkipIf<T>>) {
    let idx = self.index_of(existing);
    self.assert_absent(name);
    self.steps.insert(idx, StepDef::new(name, optional, skip_if));
  }

  pub fn insert_after(&mut self, existing: &str, name: &str, optional: bool, skip_if: Option<SkipIf<T>>) {
    let idx = self.index_of(existing);
    self.assert_absent(name);
    self.steps.insert(idx + 1, StepDef::new(name, optional, skip_if));
  }

  /// Removes a step and its handlers. Unknown names are ignored.
  pub fn remove_step(&mut self, name: &str) {
    if let Some(idx) = self.position(name) {
      self.steps.remove(idx);
      self.before.remove(name);
      self.on.remove(name);
      self.after.remove(name);
    }
  }

  pub fn set_optional(&mut self, name: &str, optional: bool) {
    let idx = self.index_of(name);
    self.steps[idx].optional = optional;
  }

  pub fn set_skip_if(&mut self, name: &str, skip_if: Option<SkipIf<T>>) {
    let idx = self.index_of(name);
    self.steps[idx].skip_if = skip_if;
  }
}
