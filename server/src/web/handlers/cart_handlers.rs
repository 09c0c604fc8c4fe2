// marketplace/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{halted, require_customer};
use crate::db;
use crate::errors::AppError;
use crate::models::CartLine;
use crate::pipelines::contexts::AddToCartCtx;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use marketflow::{Outcome, Shared};

#[derive(Deserialize, Debug)]
pub struct AddToCartRequestPayload {
  pub product_id: Uuid,
  pub quantity: Option<i32>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateQuantityPayload {
  pub product_id: Uuid,
  pub quantity: i32,
}

#[derive(Deserialize, Debug)]
pub struct RemoveItemPayload {
  pub product_id: Uuid,
}

#[derive(Serialize, Debug)]
pub struct CartView {
  pub id: Uuid,
  pub items: Vec<CartLineView>,
  pub total: Decimal,
}

#[derive(Serialize, Debug)]
pub struct CartLineView {
  #[serde(flatten)]
  pub line: CartLine,
  pub subtotal: Decimal,
}

async fn cart_view(app_state: &AppState, cart_id: Uuid) -> Result<CartView, AppError> {
  let lines = db::carts::lines(&app_state.db_pool, cart_id).await?;
  let items: Vec<CartLineView> = lines
    .into_iter()
    .map(|line| CartLineView {
      subtotal: line.price * Decimal::from(line.quantity),
      line,
    })
    .collect();
  let total = items.iter().map(|i| i.subtotal).sum();
  Ok(CartView { id: cart_id, items, total })
}

#[instrument(name = "handler::view_cart", skip(app_state))]
pub async fn view_cart_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let customer = require_customer(&app_state, auth.user_id).await?;
  let cart = db::carts::get_or_create(&app_state.db_pool, customer.id).await?;
  Ok(HttpResponse::Ok().json(cart_view(&app_state, cart.id).await?))
}

#[instrument(
    name = "handler::add_to_cart",
    skip(app_state, req_payload, auth_user),
    fields(user_id = %auth_user.user_id, product_id = %req_payload.product_id)
)]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<AddToCartRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let ctx = Shared::new(AddToCartCtx {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    product_id: req_payload.product_id,
    quantity: req_payload.quantity.unwrap_or(1),
    customer: None,
    product: None,
    cart: None,
    cart_item: None,
  });

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) => {
      let cart_id = ctx
        .read()
        .cart
        .as_ref()
        .map(|c| c.id)
        .ok_or_else(|| AppError::Internal("Add-to-cart completed without a cart.".to_string()))?;
      info!(%cart_id, "Item added to cart.");
      Ok(HttpResponse::Ok().json(cart_view(&app_state, cart_id).await?))
    }
    Ok(Outcome::Stopped) => Err(halted("add_to_cart")),
    Err(app_err) => {
      warn!(error = %app_err, "Add-to-cart pipeline failed.");
      Err(app_err)
    }
  }
}

/// Sets an item's quantity; zero or less removes it.
#[instrument(name = "handler::update_cart_quantity", skip(app_state))]
pub async fn update_quantity_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<UpdateQuantityPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let customer = require_customer(&app_state, auth.user_id).await?;
  let pool = &app_state.db_pool;
  let cart = db::carts::fetch_by_customer(pool, customer.id)
    .await?
    .ok_or_else(|| AppError::NotFound("Cart not found.".to_string()))?;
  let item_missing = || AppError::NotFound("Product not in cart.".to_string());

  if req_payload.quantity <= 0 {
    if db::carts::remove_item(pool, cart.id, req_payload.product_id).await? == 0 {
      return Err(item_missing());
    }
  } else {
    let product = db::catalog::fetch_product(pool, req_payload.product_id)
      .await?
      .ok_or_else(item_missing)?;
    if req_payload.quantity > product.available_quantity {
      return Err(AppError::Validation(format!(
        "Only {} units available.",
        product.available_quantity
      )));
    }
    db::carts::set_item_quantity(pool, cart.id, product.id, req_payload.quantity)
      .await?
      .ok_or_else(item_missing)?;
  }
  Ok(HttpResponse::Ok().json(cart_view(&app_state, cart.id).await?))
}

#[instrument(name = "handler::remove_cart_item", skip(app_state))]
pub async fn remove_item_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<RemoveItemPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let customer = require_customer(&app_state, auth.user_id).await?;
  let cart = db::carts::fetch_by_customer(&app_state.db_pool, customer.id)
    .await?
    .ok_or_else(|| AppError::NotFound("Cart not found.".to_string()))?;
  if db::carts::remove_item(&app_state.db_pool, cart.id, req_payload.product_id).await? == 0 {
    return Err(AppError::NotFound("Product not in cart.".to_string()));
  }
  Ok(HttpResponse::Ok().json(cart_view(&app_state, cart.id).await?))
}
