// marketplace/src/pipelines/signin_pipeline.rs

use crate::db;
use crate::errors::AppError;
use crate::pipelines::contexts::SigninCtx;
use crate::services::auth_service;
use crate::state::AppState;
use marketflow::{Control, Flows, Pipeline, Shared};
use std::sync::Arc;
use tracing::{event, info, warn, Level};

const INVALID_CREDENTIALS: &str = "Invalid username or password.";

/// Registers the user sign-in pipeline.
pub fn register_signin_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let mut signin_p = Pipeline::<SigninCtx, AppError>::new(&[
    ("validate_signin_input", false, None),
    ("fetch_user_by_username", false, None),
    ("verify_user_password", false, None),
    ("issue_session_token", false, None),
  ]);

  signin_p.on("validate_signin_input", |ctx: Shared<SigninCtx>| {
    Box::pin(async move {
      let (username_empty, password_empty) = {
        let guard = ctx.read();
        (guard.username.trim().is_empty(), guard.password.is_empty())
      };
      if username_empty {
        return Err(AppError::Validation("Username is required.".to_string()));
      }
      if password_empty {
        return Err(AppError::Validation("Password is required.".to_string()));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  signin_p.on("fetch_user_by_username", |ctx: Shared<SigninCtx>| {
    Box::pin(async move {
      let (username, pool) = {
        let guard = ctx.read();
        (guard.username.trim().to_string(), guard.app_state.db_pool.clone())
      };

      match db::users::fetch_by_username(&pool, &username).await? {
        Some(user) => {
          event!(Level::DEBUG, user_id = %user.id, "User found for signin.");
          ctx.write().user = Some(user);
          Ok(Control::Continue)
        }
        None => {
          warn!(%username, "Signin attempted for unknown username.");
          Err(AppError::Auth(INVALID_CREDENTIALS.to_string()))
        }
      }
    })
  });

  signin_p.on("verify_user_password", |ctx: Shared<SigninCtx>| {
    Box::pin(async move {
      let (stored_hash, password) = {
        let guard = ctx.read();
        let hash = guard.user.as_ref().map(|u| u.password_hash.clone());
        (hash, guard.password.clone())
      };
      let stored_hash =
        stored_hash.ok_or_else(|| AppError::Internal("User missing before password verification.".to_string()))?;

      let verified = auth_service::verify_password(&stored_hash, &password)?;
      ctx.write().password.clear();
      if !verified {
        warn!("Password mismatch during signin.");
        return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  signin_p.on("issue_session_token", |ctx: Shared<SigninCtx>| {
    Box::pin(async move {
      let (user_id, secret, ttl) = {
        let guard = ctx.read();
        let user_id = guard
          .user
          .as_ref()
          .map(|u| u.id)
          .ok_or_else(|| AppError::Internal("User missing before token issue.".to_string()))?;
        (user_id, guard.app_state.config.session_secret.clone(), guard.app_state.config.session_ttl_secs)
      };

      let token = auth_service::issue_session_token(user_id, &secret, ttl, chrono::Utc::now().timestamp())?;
      ctx.write().session_token = Some(token);
      event!(Level::INFO, %user_id, "Session token issued.");
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flows.register(signin_p);
  info!("Sign-in pipeline registered.");
}
