// marketflow/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Step already defined: {step_name}")]
  DuplicateStep { step_name: String },

  #[error("No handler registered for required step '{step_name}'")]
  HandlerMissing { step_name: String },

  #[error("No pipeline registered for context type {type_name}")]
  NotRegistered { type_name: String },

  #[error("Context type mismatch at '{site}' (expected {expected_type})")]
  TypeMismatch { site: String, expected_type: String },

  #[error("Handler failed: {source}")]
  Handler {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal flow error: {0}")]
  Internal(String),
}

impl From<AnyhowError> for FlowError {
  fn from(err: AnyhowError) -> Self {
    // Unwrap a FlowError that travelled through anyhow instead of nesting it.
    match err.downcast::<FlowError>() {
      Ok(flow_err) => flow_err,
      Err(source) => FlowError::Handler { source },
    }
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn anyhow_wrapping_a_flow_error_is_flattened() {
    let inner = FlowError::StepNotFound { step_name: "charge".into() };
    let flattened = FlowError::from(anyhow::Error::new(inner));
    assert!(matches!(flattened, FlowError::StepNotFound { ref step_name } if step_name == "charge"));
  }

  #[test]
  fn foreign_anyhow_error_becomes_handler_error() {
    let err = FlowError::from(anyhow::anyhow!("gateway timed out"));
    assert!(matches!(err, FlowError::Handler { .. }));
    assert!(err.to_string().contains("gateway timed out"));
  }
}
