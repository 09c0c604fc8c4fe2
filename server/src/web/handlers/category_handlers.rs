// marketplace/src/web/handlers/category_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::current_user;
use crate::db;
use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct CategoryPayload {
  pub name: String,
}

impl CategoryPayload {
  fn name(&self) -> Result<&str, AppError> {
    let name = self.name.trim();
    if name.is_empty() {
      return Err(AppError::Validation("Category name cannot be blank.".to_string()));
    }
    Ok(name)
  }
}

async fn require_staff(app_state: &AppState, auth: AuthenticatedUser) -> Result<(), AppError> {
  if !current_user(app_state, auth.user_id).await?.is_staff {
    return Err(AppError::Forbidden("Only staff can manage categories.".to_string()));
  }
  Ok(())
}

fn category_not_found() -> AppError {
  AppError::NotFound("Category not found.".to_string())
}

#[instrument(name = "handler::list_categories", skip(app_state))]
pub async fn list_categories_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(db::catalog::list_categories(&app_state.db_pool).await?))
}

#[instrument(name = "handler::get_category", skip(app_state))]
pub async fn get_category_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
  let category = db::catalog::fetch_category(&app_state.db_pool, path.into_inner())
    .await?
    .ok_or_else(category_not_found)?;
  Ok(HttpResponse::Ok().json(category))
}

#[instrument(name = "handler::create_category", skip(app_state, req_payload))]
pub async fn create_category_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CategoryPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  require_staff(&app_state, auth).await?;
  let category = db::catalog::insert_category(&app_state.db_pool, req_payload.name()?).await?;
  info!(category_id = %category.id, name = %category.name, "Category created.");
  Ok(HttpResponse::Created().json(category))
}

#[instrument(name = "handler::update_category", skip(app_state, req_payload))]
pub async fn update_category_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<CategoryPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  require_staff(&app_state, auth).await?;
  let category = db::catalog::rename_category(&app_state.db_pool, path.into_inner(), req_payload.name()?)
    .await?
    .ok_or_else(category_not_found)?;
  Ok(HttpResponse::Ok().json(category))
}

#[instrument(name = "handler::delete_category", skip(app_state))]
pub async fn delete_category_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  require_staff(&app_state, auth).await?;
  if db::catalog::delete_category(&app_state.db_pool, path.into_inner()).await? == 0 {
    return Err(category_not_found());
  }
  Ok(HttpResponse::NoContent().finish())
}
