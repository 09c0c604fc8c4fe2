// marketplace/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use marketflow::FlowError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  /// The payment itself was declined or is in the wrong state.
  #[error("Payment Processing Error: {0}")]
  Payment(String),

  /// The payment provider could not be reached or answered with an error.
  #[error("Payment Gateway Error: {0}")]
  Gateway(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),

  #[error("Pipeline execution was halted by a handler.")]
  PipelineHaltedByHandler,
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    let err = match err.downcast::<AppError>() {
      Ok(app_err) => return app_err,
      Err(err) => err,
    };
    match err.downcast::<sqlx::Error>() {
      Ok(db_err) => AppError::Sqlx(db_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    AppError::Gateway(err.to_string())
  }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
  matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Rows still referenced elsewhere, e.g. a seller with sold order items.
fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
  matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) | AppError::PipelineHaltedByHandler => StatusCode::CONFLICT,
      AppError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
      AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
      AppError::Sqlx(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
      AppError::Sqlx(e) if is_unique_violation(e) || is_foreign_key_violation(e) => StatusCode::CONFLICT,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, status = status.as_u16(), "Responding with client error");
    }
    let body = match self {
      AppError::Validation(m)
      | AppError::Auth(m)
      | AppError::Forbidden(m)
      | AppError::NotFound(m)
      | AppError::Conflict(m)
      | AppError::Payment(m) => json!({ "error": m }),
      AppError::Gateway(m) => json!({"error": "Payment provider error", "detail": m}),
      AppError::Config(m) => json!({"error": "Configuration issue", "detail": m}),
      AppError::Sqlx(sqlx::Error::RowNotFound) => json!({"error": "Resource not found"}),
      AppError::Sqlx(e) if is_unique_violation(e) => json!({"error": "Resource already exists"}),
      AppError::Sqlx(e) if is_foreign_key_violation(e) => json!({"error": "Resource is still referenced"}),
      AppError::Sqlx(_) => json!({"error": "Database operation failed"}),
      AppError::Workflow { source } => {
        tracing::error!(flow_error = ?source, "Workflow error details");
        json!({"error": "Workflow processing error", "detail": source.to_string()})
      }
      AppError::Internal(m) => json!({"error": "An internal error occurred", "detail": m}),
      AppError::PipelineHaltedByHandler => json!({"error": "Process halted as expected by business logic."}),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_errors_map_to_expected_status_codes() {
    assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::Auth("x".into()).status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::Sqlx(sqlx::Error::RowNotFound).status_code(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::Gateway("down".into()).status_code(), StatusCode::BAD_GATEWAY);
  }

  #[test]
  fn anyhow_round_trip_keeps_the_original_variant() {
    let wrapped = anyhow::Error::new(AppError::Forbidden("not yours".into()));
    assert!(matches!(AppError::from(wrapped), AppError::Forbidden(m) if m == "not yours"));

    let foreign = anyhow::anyhow!("boom");
    assert!(matches!(AppError::from(foreign), AppError::Internal(m) if m == "boom"));
  }

  #[test]
  fn flow_errors_surface_as_workflow_errors() {
    let err: AppError = FlowError::NotRegistered { type_name: "Ctx".into() }.into();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
