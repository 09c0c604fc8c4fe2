// marketplace/src/web/extractors.rs

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::auth_service;
use crate::state::AppState;

/// Caller identity taken from an `Authorization: Bearer <session token>` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
  req
    .headers()
    .get(actix_web::http::header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let Some(token) = bearer_token(req) else {
      return ready(Err(AppError::Auth("Authentication credentials were not provided.".to_string())));
    };
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
      return ready(Err(AppError::Internal("Application state is not configured.".to_string())));
    };

    let now = chrono::Utc::now().timestamp();
    ready(
      auth_service::validate_session_token(token, &state.config.session_secret, now)
        .map(|user_id| AuthenticatedUser { user_id })
        .map_err(|e| {
          warn!(error = %e, "Rejected session token.");
          e
        }),
    )
  }
}
