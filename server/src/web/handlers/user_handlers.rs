// marketplace/src/web/handlers/user_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};

use super::auth_handlers::{register_account, registration_ctx, UserPayload};
use super::current_user;
use crate::db::{self, users::UserChanges};
use crate::errors::AppError;
use crate::models::User;
use crate::services::auth_service;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

/// Partial user update. Omitted fields stay unchanged.
#[derive(Deserialize, Debug, Default)]
pub struct UserUpdatePayload {
  pub name: Option<String>,
  pub phone_number: Option<String>,
  pub profile_picture: Option<String>,
  pub password: Option<String>,
}

impl UserUpdatePayload {
  pub(crate) fn into_changes(self) -> Result<UserChanges, AppError> {
    let password_hash = match self.password {
      Some(password) => {
        auth_service::validate_new_password(&password)?;
        Some(auth_service::hash_password(&password)?)
      }
      None => None,
    };
    Ok(UserChanges {
      name: self.name,
      phone_number: self.phone_number,
      profile_picture: self.profile_picture,
      password_hash,
    })
  }
}

/// Users only ever see themselves; any other username is reported missing.
async fn own_user(app_state: &AppState, auth: AuthenticatedUser, username: &str) -> Result<User, AppError> {
  let user = current_user(app_state, auth.user_id).await?;
  if user.username != username {
    return Err(AppError::NotFound("No User matches the given query.".to_string()));
  }
  Ok(user)
}

#[instrument(name = "handler::create_user", skip(app_state, req_payload, _auth), fields(username = %req_payload.username))]
pub async fn create_user_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<UserPayload>,
  _auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let registration = registration_ctx(&app_state, None, &req_payload);
  let done = register_account(&app_state, registration).await?;
  let user = done
    .created_user
    .ok_or_else(|| AppError::Internal("Registration completed without a user.".to_string()))?;
  Ok(HttpResponse::Created().json(user))
}

#[instrument(name = "handler::list_users", skip(app_state))]
pub async fn list_users_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let user = current_user(&app_state, auth.user_id).await?;
  Ok(HttpResponse::Ok().json(vec![user]))
}

#[instrument(name = "handler::me", skip(app_state))]
pub async fn me_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(current_user(&app_state, auth.user_id).await?))
}

#[instrument(name = "handler::get_user", skip(app_state))]
pub async fn get_user_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(own_user(&app_state, auth, &path).await?))
}

#[instrument(name = "handler::update_user", skip(app_state, req_payload))]
pub async fn update_user_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  req_payload: web::Json<UserUpdatePayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let user = own_user(&app_state, auth, &path).await?;
  let changes = req_payload.into_inner().into_changes()?;
  let updated = db::users::update(&app_state.db_pool, user.id, &changes).await?;
  info!(user_id = %updated.id, "User updated.");
  Ok(HttpResponse::Ok().json(updated))
}

#[instrument(name = "handler::delete_user", skip(app_state))]
pub async fn delete_user_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let user = own_user(&app_state, auth, &path).await?;
  db::users::delete(&app_state.db_pool, user.id).await?;
  info!(user_id = %user.id, "User deleted.");
  Ok(HttpResponse::NoContent().finish())
}
