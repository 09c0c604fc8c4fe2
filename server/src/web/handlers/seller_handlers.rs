// marketplace/src/web/handlers/seller_handlers.rs

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::auth_handlers::{register_account, registration_ctx, UserPayload};
use super::current_user;
use super::user_handlers::UserUpdatePayload;
use crate::db::{self, users::SellerChanges};
use crate::errors::AppError;
use crate::models::{Role, Seller, SellerStatus, User};
use crate::pipelines::contexts::AccountProfile;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Serialize, Debug)]
pub struct SellerView {
  pub user: User,
  pub shop_name: String,
  pub shop_description: String,
  pub stripe_account_id: Option<String>,
}

impl SellerView {
  fn new(user: User, seller: Seller) -> Self {
    Self {
      user,
      shop_name: seller.shop_name,
      shop_description: seller.shop_description,
      stripe_account_id: seller.stripe_account_id,
    }
  }
}

#[derive(Deserialize, Debug)]
pub struct CreateSellerPayload {
  pub user: UserPayload,
  pub shop_name: String,
  #[serde(default)]
  pub shop_description: String,
  pub stripe_account_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateSellerPayload {
  pub user: Option<UserUpdatePayload>,
  pub shop_name: Option<String>,
  pub shop_description: Option<String>,
  pub stripe_account_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ProductEarningsQuery {
  pub product_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct OrderItemQuery {
  pub order_item_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SellerStatusPayload {
  pub seller_status: Option<String>,
}

async fn own_seller(app_state: &AppState, auth: AuthenticatedUser) -> Result<(User, Seller), AppError> {
  let user = current_user(app_state, auth.user_id).await?;
  let seller = db::users::fetch_seller_by_user(&app_state.db_pool, user.id)
    .await?
    .ok_or_else(|| AppError::NotFound("Seller profile not found.".to_string()))?;
  Ok((user, seller))
}

async fn own_seller_named(
  app_state: &AppState,
  auth: AuthenticatedUser,
  username: &str,
) -> Result<(User, Seller), AppError> {
  let (user, seller) = own_seller(app_state, auth).await?;
  if user.username != username {
    return Err(AppError::NotFound("No Seller matches the given query.".to_string()));
  }
  Ok((user, seller))
}

#[instrument(name = "handler::create_seller", skip(app_state, req_payload), fields(username = %req_payload.user.username))]
pub async fn create_seller_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CreateSellerPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let mut registration = registration_ctx(&app_state, Some(Role::Seller), &payload.user);
  registration.shop_name = payload.shop_name;
  registration.shop_description = payload.shop_description;
  registration.stripe_account_id = payload.stripe_account_id;

  let done = register_account(&app_state, registration).await?;
  match (done.created_user, done.profile) {
    (Some(user), Some(AccountProfile::Seller(seller))) => {
      info!(seller_id = %seller.id, "Seller registered.");
      Ok(HttpResponse::Created().json(SellerView::new(user, seller)))
    }
    _ => Err(AppError::Internal("Seller registration did not produce a profile.".to_string())),
  }
}

#[instrument(name = "handler::list_sellers", skip(app_state))]
pub async fn list_sellers_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let user = current_user(&app_state, auth.user_id).await?;
  let views: Vec<SellerView> = db::users::fetch_seller_by_user(&app_state.db_pool, user.id)
    .await?
    .map(|seller| SellerView::new(user, seller))
    .into_iter()
    .collect();
  Ok(HttpResponse::Ok().json(views))
}

#[instrument(name = "handler::seller_me", skip(app_state))]
pub async fn seller_me_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let (user, seller) = own_seller(&app_state, auth).await?;
  Ok(HttpResponse::Ok().json(SellerView::new(user, seller)))
}

/// Order items containing the seller's products.
#[instrument(name = "handler::seller_orders", skip(app_state))]
pub async fn seller_orders_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (_, seller) = own_seller(&app_state, auth).await?;
  let items = db::orders::items_for_seller(&app_state.db_pool, seller.id).await?;
  Ok(HttpResponse::Ok().json(items))
}

#[instrument(name = "handler::total_earnings", skip(app_state))]
pub async fn total_earnings_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (_, seller) = own_seller(&app_state, auth).await?;
  let total = db::payments::total_earnings(&app_state.db_pool, seller.id).await?;
  Ok(HttpResponse::Ok().json(json!({ "total_earnings": total.to_string() })))
}

#[instrument(name = "handler::product_earnings", skip(app_state))]
pub async fn product_earnings_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ProductEarningsQuery>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (_, seller) = own_seller(&app_state, auth).await?;
  let raw = query
    .product_id
    .as_deref()
    .filter(|p| !p.is_empty())
    .ok_or_else(|| AppError::Validation("Missing product_id parameter.".to_string()))?;
  let product_id = Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid product_id '{}'.", raw)))?;

  let total = db::orders::product_earnings(&app_state.db_pool, seller.id, product_id).await?;
  Ok(HttpResponse::Ok().json(json!({
    "product_id": product_id,
    "total_earnings": total.to_string(),
  })))
}

#[instrument(name = "handler::update_order_item_status", skip(app_state, req_payload))]
pub async fn update_order_item_status_handler(
  app_state: web::Data<AppState>,
  query: web::Query<OrderItemQuery>,
  req_payload: web::Json<SellerStatusPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (_, seller) = own_seller(&app_state, auth).await?;
  let not_found = || AppError::NotFound("Order item not found or does not belong to you.".to_string());
  let item_id = query
    .order_item_id
    .as_deref()
    .and_then(|raw| Uuid::parse_str(raw).ok())
    .ok_or_else(not_found)?;

  let status: SellerStatus = req_payload
    .seller_status
    .as_deref()
    .filter(|s| !s.is_empty())
    .ok_or_else(|| AppError::Validation("Missing 'seller_status' in request data.".to_string()))?
    .parse()?;

  match db::orders::update_item_status_for_seller(&app_state.db_pool, item_id, seller.id, status).await? {
    Some(item) => {
      info!(order_item_id = %item.id, %status, "Order item status updated by seller.");
      Ok(HttpResponse::Ok().json(item))
    }
    None => {
      warn!(order_item_id = %item_id, seller_id = %seller.id, "Seller tried to update an item they do not own.");
      Err(not_found())
    }
  }
}

#[instrument(name = "handler::get_seller", skip(app_state))]
pub async fn get_seller_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (user, seller) = own_seller_named(&app_state, auth, &path).await?;
  Ok(HttpResponse::Ok().json(SellerView::new(user, seller)))
}

#[instrument(name = "handler::update_seller", skip(app_state, req_payload))]
pub async fn update_seller_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  req_payload: web::Json<UpdateSellerPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (mut user, mut seller) = own_seller_named(&app_state, auth, &path).await?;
  let payload = req_payload.into_inner();
  if let Some(name) = &payload.shop_name {
    if name.trim().is_empty() {
      return Err(AppError::Validation("Shop name cannot be blank.".to_string()));
    }
  }

  let mut tx = app_state.db_pool.begin().await?;
  if let Some(user_changes) = payload.user {
    user = db::users::update(&mut *tx, user.id, &user_changes.into_changes()?).await?;
  }
  let changes = SellerChanges {
    shop_name: payload.shop_name,
    shop_description: payload.shop_description,
    stripe_account_id: payload.stripe_account_id,
  };
  if changes.shop_name.is_some() || changes.shop_description.is_some() || changes.stripe_account_id.is_some() {
    seller = db::users::update_seller(&mut *tx, user.id, &changes).await?;
  }
  tx.commit().await?;

  Ok(HttpResponse::Ok().json(SellerView::new(user, seller)))
}

#[instrument(name = "handler::delete_seller", skip(app_state))]
pub async fn delete_seller_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (user, _) = own_seller_named(&app_state, auth, &path).await?;
  db::users::delete(&app_state.db_pool, user.id).await?;
  info!(user_id = %user.id, "Seller and user deleted.");
  Ok(HttpResponse::NoContent().finish())
}
