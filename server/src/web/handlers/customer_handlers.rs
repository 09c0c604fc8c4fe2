// marketplace/src/web/handlers/customer_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::auth_handlers::{register_account, registration_ctx, UserPayload};
use super::current_user;
use super::user_handlers::UserUpdatePayload;
use crate::db;
use crate::errors::AppError;
use crate::models::{Customer, Role, User};
use crate::pipelines::contexts::AccountProfile;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Serialize, Debug)]
pub struct CustomerView {
  pub user: User,
  pub date_of_birth: Option<NaiveDate>,
}

impl CustomerView {
  fn new(user: User, customer: Customer) -> Self {
    Self {
      user,
      date_of_birth: customer.date_of_birth,
    }
  }
}

#[derive(Deserialize, Debug)]
pub struct CreateCustomerPayload {
  pub user: UserPayload,
  pub date_of_birth: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateCustomerPayload {
  pub user: Option<UserUpdatePayload>,
  pub date_of_birth: Option<NaiveDate>,
}

fn profile_not_found() -> AppError {
  AppError::NotFound("Customer profile not found.".to_string())
}

async fn own_customer(app_state: &AppState, auth: AuthenticatedUser) -> Result<(User, Customer), AppError> {
  let user = current_user(app_state, auth.user_id).await?;
  let customer = db::users::fetch_customer_by_user(&app_state.db_pool, user.id)
    .await?
    .ok_or_else(profile_not_found)?;
  Ok((user, customer))
}

/// Only the caller's own profile is addressable by username.
async fn own_customer_named(
  app_state: &AppState,
  auth: AuthenticatedUser,
  username: &str,
) -> Result<(User, Customer), AppError> {
  let (user, customer) = own_customer(app_state, auth).await?;
  if user.username != username {
    return Err(AppError::NotFound("No Customer matches the given query.".to_string()));
  }
  Ok((user, customer))
}

#[instrument(name = "handler::create_customer", skip(app_state, req_payload), fields(username = %req_payload.user.username))]
pub async fn create_customer_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CreateCustomerPayload>,
) -> Result<HttpResponse, AppError> {
  let mut registration = registration_ctx(&app_state, Some(Role::Customer), &req_payload.user);
  registration.date_of_birth = req_payload.date_of_birth;

  let done = register_account(&app_state, registration).await?;
  match (done.created_user, done.profile) {
    (Some(user), Some(AccountProfile::Customer(customer))) => {
      info!(customer_id = %customer.id, "Customer registered.");
      Ok(HttpResponse::Created().json(CustomerView::new(user, customer)))
    }
    _ => Err(AppError::Internal("Customer registration did not produce a profile.".to_string())),
  }
}

#[instrument(name = "handler::list_customers", skip(app_state))]
pub async fn list_customers_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let user = current_user(&app_state, auth.user_id).await?;
  let views: Vec<CustomerView> = db::users::fetch_customer_by_user(&app_state.db_pool, user.id)
    .await?
    .map(|customer| CustomerView::new(user, customer))
    .into_iter()
    .collect();
  Ok(HttpResponse::Ok().json(views))
}

#[instrument(name = "handler::customer_me", skip(app_state))]
pub async fn customer_me_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (user, customer) = own_customer(&app_state, auth).await?;
  Ok(HttpResponse::Ok().json(CustomerView::new(user, customer)))
}

#[instrument(name = "handler::customer_orders", skip(app_state))]
pub async fn customer_orders_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (_, customer) = own_customer(&app_state, auth).await?;
  let orders = db::orders::list_for_customer(&app_state.db_pool, customer.id).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::get_customer", skip(app_state))]
pub async fn get_customer_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (user, customer) = own_customer_named(&app_state, auth, &path).await?;
  Ok(HttpResponse::Ok().json(CustomerView::new(user, customer)))
}

#[instrument(name = "handler::update_customer", skip(app_state, req_payload))]
pub async fn update_customer_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  req_payload: web::Json<UpdateCustomerPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (mut user, mut customer) = own_customer_named(&app_state, auth, &path).await?;
  let payload = req_payload.into_inner();

  let mut tx = app_state.db_pool.begin().await?;
  if let Some(user_changes) = payload.user {
    user = db::users::update(&mut *tx, user.id, &user_changes.into_changes()?).await?;
  }
  if let Some(date_of_birth) = payload.date_of_birth {
    customer = db::users::update_customer(&mut *tx, user.id, date_of_birth).await?;
  }
  tx.commit().await?;

  Ok(HttpResponse::Ok().json(CustomerView::new(user, customer)))
}

/// Deleting the profile deletes the user account with it.
#[instrument(name = "handler::delete_customer", skip(app_state))]
pub async fn delete_customer_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (user, _) = own_customer_named(&app_state, auth, &path).await?;
  db::users::delete(&app_state.db_pool, user.id).await?;
  info!(user_id = %user.id, "Customer and user deleted.");
  Ok(HttpResponse::NoContent().finish())
}
