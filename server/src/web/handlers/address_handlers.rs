// marketplace/src/web/handlers/address_handlers.rs

//! Addresses nested under `/customers/{username}` and `/sellers/{username}`.
//! Handlers are generic over the parent resource so both scopes share them.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::current_user;
use crate::db::{self, addresses::AddressFields};
use crate::errors::AppError;
use crate::models::Role;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

pub trait AddressParent {
  const ROLE: Role;
}

pub struct CustomerAddresses;
pub struct SellerAddresses;

impl AddressParent for CustomerAddresses {
  const ROLE: Role = Role::Customer;
}

impl AddressParent for SellerAddresses {
  const ROLE: Role = Role::Seller;
}

#[derive(Deserialize, Debug, Default)]
pub struct AddressPayload {
  pub street: Option<String>,
  pub city: Option<String>,
  pub state: Option<String>,
  pub country: Option<String>,
  pub postal_code: Option<String>,
}

impl AddressPayload {
  fn into_fields(self) -> AddressFields {
    AddressFields {
      street: self.street,
      city: self.city,
      state: self.state,
      country: self.country,
      postal_code: self.postal_code,
    }
  }

  fn missing_fields(&self) -> Vec<&'static str> {
    [
      ("street", &self.street),
      ("city", &self.city),
      ("state", &self.state),
      ("country", &self.country),
      ("postal_code", &self.postal_code),
    ]
    .into_iter()
    .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
    .map(|(name, _)| name)
    .collect()
  }
}

/// Resolves the owner of the nested collection: 404 when `username` has no
/// profile of the parent's kind, 403 when it is not the caller.
async fn authorize<P: AddressParent>(
  app_state: &AppState,
  auth: AuthenticatedUser,
  username: &str,
) -> Result<Uuid, AppError> {
  let pool = &app_state.db_pool;
  let exists = match P::ROLE {
    Role::Customer => db::users::fetch_customer_by_username(pool, username).await?.is_some(),
    Role::Seller => db::users::fetch_seller_by_username(pool, username).await?.is_some(),
  };
  if !exists {
    return Err(AppError::NotFound(format!("no such {} {}", P::ROLE.label(), username)));
  }

  let user = current_user(app_state, auth.user_id).await?;
  if user.username != username {
    return Err(AppError::Forbidden("You are not allowed to access other's addresses.".to_string()));
  }
  Ok(user.id)
}

fn address_not_found() -> AppError {
  AppError::NotFound("Address not found.".to_string())
}

#[instrument(name = "handler::list_addresses", skip(app_state))]
pub async fn list_addresses_handler<P: AddressParent>(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let user_id = authorize::<P>(&app_state, auth, &path).await?;
  let addresses = db::addresses::list_for_user(&app_state.db_pool, user_id).await?;
  Ok(HttpResponse::Ok().json(addresses))
}

#[instrument(name = "handler::create_address", skip(app_state, req_payload))]
pub async fn create_address_handler<P: AddressParent>(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  req_payload: web::Json<AddressPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let user_id = authorize::<P>(&app_state, auth, &path).await?;
  let payload = req_payload.into_inner();
  let missing = payload.missing_fields();
  if !missing.is_empty() {
    return Err(AppError::Validation(format!("Missing required fields: {}.", missing.join(", "))));
  }

  let address = db::addresses::insert(&app_state.db_pool, user_id, &payload.into_fields()).await?;
  info!(address_id = %address.id, "Address created.");
  Ok(HttpResponse::Created().json(address))
}

#[instrument(name = "handler::get_address", skip(app_state))]
pub async fn get_address_handler<P: AddressParent>(
  app_state: web::Data<AppState>,
  path: web::Path<(String, Uuid)>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (username, address_id) = path.into_inner();
  let user_id = authorize::<P>(&app_state, auth, &username).await?;
  let address = db::addresses::fetch_for_user(&app_state.db_pool, address_id, user_id)
    .await?
    .ok_or_else(address_not_found)?;
  Ok(HttpResponse::Ok().json(address))
}

#[instrument(name = "handler::update_address", skip(app_state, req_payload))]
pub async fn update_address_handler<P: AddressParent>(
  app_state: web::Data<AppState>,
  path: web::Path<(String, Uuid)>,
  req_payload: web::Json<AddressPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (username, address_id) = path.into_inner();
  let user_id = authorize::<P>(&app_state, auth, &username).await?;
  let address = db::addresses::update(&app_state.db_pool, address_id, user_id, &req_payload.into_inner().into_fields())
    .await?
    .ok_or_else(address_not_found)?;
  Ok(HttpResponse::Ok().json(address))
}

#[instrument(name = "handler::delete_address", skip(app_state))]
pub async fn delete_address_handler<P: AddressParent>(
  app_state: web::Data<AppState>,
  path: web::Path<(String, Uuid)>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (username, address_id) = path.into_inner();
  let user_id = authorize::<P>(&app_state, auth, &username).await?;
  if db::addresses::delete(&app_state.db_pool, address_id, user_id).await? == 0 {
    return Err(address_not_found());
  }
  Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_fields_lists_blank_and_absent_values() {
    let payload = AddressPayload {
      street: Some("1 Main St".into()),
      city: Some("  ".into()),
      state: None,
      country: Some("US".into()),
      postal_code: Some("12345".into()),
    };
    assert_eq!(payload.missing_fields(), vec!["city", "state"]);
  }
}
