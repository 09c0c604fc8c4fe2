// marketplace/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{halted, require_customer};
use crate::db;
use crate::errors::AppError;
use crate::models::{Order, OrderItem, PaymentStatus};
use crate::pipelines::contexts::{CreatePaymentIntentCtx, PlaceOrderCtx};
use crate::services::payments::PaymentIntent;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use marketflow::{Outcome, Shared};

#[derive(Deserialize, Debug)]
pub struct PlaceOrderRequestPayload {
  pub shipping_address: Option<Uuid>,
}

#[derive(Serialize, Debug)]
pub struct OrderView {
  #[serde(flatten)]
  pub order: Order,
  pub items: Vec<OrderItem>,
}

#[derive(Serialize, Debug)]
pub struct CheckoutResponse {
  pub order_id: Uuid,
  pub order_number: String,
  pub payment_intent_id: String,
  pub client_secret: Option<String>,
  pub amount: i64,
  pub currency: String,
}

impl CheckoutResponse {
  pub(crate) fn new(order: &Order, intent: PaymentIntent) -> Self {
    Self {
      order_id: order.id,
      order_number: order.order_number.clone(),
      payment_intent_id: intent.id,
      client_secret: intent.client_secret,
      amount: intent.amount,
      currency: intent.currency,
    }
  }
}

async fn owned_order(app_state: &AppState, user_id: Uuid, order_id: Uuid) -> Result<Order, AppError> {
  let customer = require_customer(app_state, user_id).await?;
  db::orders::fetch_for_customer(&app_state.db_pool, order_id, customer.id)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found.".to_string()))
}

#[instrument(name = "handler::list_orders", skip(app_state))]
pub async fn list_orders_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let customer = require_customer(&app_state, auth.user_id).await?;
  let orders = db::orders::list_for_customer(&app_state.db_pool, customer.id).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::get_order", skip(app_state))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order = owned_order(&app_state, auth.user_id, path.into_inner()).await?;
  let items = db::orders::items(&app_state.db_pool, order.id).await?;
  Ok(HttpResponse::Ok().json(OrderView { order, items }))
}

#[instrument(
    name = "handler::place_order",
    skip(app_state, req_payload, auth_user),
    fields(user_id = %auth_user.user_id)
)]
pub async fn place_order_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<PlaceOrderRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let ctx = Shared::new(PlaceOrderCtx {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    shipping_address_id: req_payload.shipping_address,
    customer: None,
    cart: None,
    lines: Vec::new(),
    quote: None,
    order: None,
    items: Vec::new(),
  });

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) => {
      let mut guard = ctx.write();
      let order = guard
        .order
        .take()
        .ok_or_else(|| AppError::Internal("Order placement completed without an order.".to_string()))?;
      let items = std::mem::take(&mut guard.items);
      info!(order_id = %order.id, order_number = %order.order_number, "Order placed.");
      Ok(HttpResponse::Created().json(OrderView { order, items }))
    }
    Ok(Outcome::Stopped) => Err(halted("place_order")),
    Err(app_err) => {
      warn!(error = %app_err, "Place-order pipeline failed.");
      Err(app_err)
    }
  }
}

#[instrument(name = "handler::delete_order", skip(app_state))]
pub async fn delete_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order = owned_order(&app_state, auth.user_id, path.into_inner()).await?;
  if order.payment_status != PaymentStatus::Pending {
    return Err(AppError::Validation(format!(
      "Order cannot be deleted once payment is {}.",
      order.payment_status
    )));
  }
  db::orders::delete(&app_state.db_pool, order.id).await?;
  info!(order_id = %order.id, "Order deleted.");
  Ok(HttpResponse::NoContent().finish())
}

/// Runs the payment-intent pipeline for `order_id` on behalf of `user_id`.
pub(crate) async fn create_payment_intent(
  app_state: &AppState,
  user_id: Uuid,
  order_id: Uuid,
) -> Result<CheckoutResponse, AppError> {
  let ctx = Shared::new(CreatePaymentIntentCtx {
    app_state: app_state.clone(),
    user_id,
    order_id,
    order: None,
    intent: None,
  });

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) => {
      let mut guard = ctx.write();
      match (guard.order.take(), guard.intent.take()) {
        (Some(order), Some(intent)) => Ok(CheckoutResponse::new(&order, intent)),
        _ => Err(AppError::Internal("Checkout completed without a payment intent.".to_string())),
      }
    }
    Ok(Outcome::Stopped) => Err(halted("create_payment_intent")),
    Err(app_err) => {
      warn!(%order_id, error = %app_err, "Create-payment-intent pipeline failed.");
      Err(app_err)
    }
  }
}

#[instrument(name = "handler::checkout_order", skip(app_state))]
pub async fn checkout_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let response = create_payment_intent(&app_state, auth.user_id, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(response))
}
