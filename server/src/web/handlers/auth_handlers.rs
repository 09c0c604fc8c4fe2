// marketplace/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use super::halted;
use crate::errors::AppError;
use crate::models::Role;
use crate::pipelines::contexts::{RegisterAccountCtx, SigninCtx};
use crate::state::AppState;
use marketflow::{Outcome, Shared};

/// User fields accepted on registration, alone or nested under `user`.
#[derive(Deserialize, Debug)]
pub struct UserPayload {
  pub username: String,
  pub password: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub phone_number: String,
  pub profile_picture: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SigninRequestPayload {
  pub username: String,
  pub password: String,
}

/// Prepares a registration context from the shared user fields.
pub(crate) fn registration_ctx(app_state: &AppState, role: Option<Role>, user: &UserPayload) -> RegisterAccountCtx {
  let mut ctx = RegisterAccountCtx::new(app_state.clone(), role, user.username.clone(), user.password.clone());
  ctx.name = user.name.clone();
  ctx.phone_number = user.phone_number.clone();
  ctx.profile_picture = user.profile_picture.clone().filter(|p| !p.is_empty());
  ctx
}

/// Runs the sign-up pipeline and returns its final context.
pub(crate) async fn register_account(
  app_state: &AppState,
  registration: RegisterAccountCtx,
) -> Result<RegisterAccountCtx, AppError> {
  let ctx = Shared::new(registration);
  match app_state.flows.run(ctx.clone()).await? {
    Outcome::Completed => Ok(ctx.read().clone()),
    Outcome::Stopped => Err(halted("register_account")),
  }
}

#[instrument(
    name = "handler::signin",
    skip(app_state, req_payload),
    fields(username = %req_payload.username)
)]
pub async fn signin_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<SigninRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let ctx = Shared::new(SigninCtx {
    app_state: app_state.get_ref().clone(),
    username: payload.username,
    password: payload.password,
    user: None,
    session_token: None,
  });

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) => {
      let guard = ctx.read();
      let (Some(user), Some(token)) = (guard.user.as_ref(), guard.session_token.as_ref()) else {
        warn!("Signin pipeline completed without a user or token.");
        return Err(AppError::Internal("Signin completed without issuing a token.".to_string()));
      };
      info!(user_id = %user.id, "Signin successful.");
      Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "token_type": "Bearer",
        "expires_in": app_state.config.session_ttl_secs,
        "user": user,
      })))
    }
    Ok(Outcome::Stopped) => Err(halted("signin")),
    Err(app_err) => {
      warn!(error = %app_err, "Signin pipeline failed.");
      Err(app_err)
    }
  }
}
