// marketplace/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::order_handlers::create_payment_intent;
use super::{current_user, halted, require_customer};
use crate::db;
use crate::errors::AppError;
use crate::pipelines::contexts::{ConfirmPaymentCtx, RefundPaymentCtx};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use marketflow::{Outcome, Shared};

#[derive(Deserialize, Debug)]
pub struct CreateIntentPayload {
  pub order_id: Uuid,
}

#[derive(Deserialize, Debug)]
pub struct ConfirmPaymentPayload {
  pub payment_intent_id: String,
}

#[derive(Deserialize, Debug)]
pub struct RefundPayload {
  pub order_id: Uuid,
  pub amount: Option<Decimal>,
}

#[instrument(name = "handler::create_payment_intent", skip(app_state))]
pub async fn create_payment_intent_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CreateIntentPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let response = create_payment_intent(&app_state, auth.user_id, req_payload.order_id).await?;
  Ok(HttpResponse::Ok().json(response))
}

#[instrument(
    name = "handler::confirm_payment",
    skip(app_state, req_payload, auth_user),
    fields(user_id = %auth_user.user_id, payment_intent_id = %req_payload.payment_intent_id)
)]
pub async fn confirm_payment_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<ConfirmPaymentPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let ctx = Shared::new(ConfirmPaymentCtx {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    payment_intent_id: req_payload.into_inner().payment_intent_id,
    intent: None,
    order: None,
    succeeded: false,
  });

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) => {
      let guard = ctx.read();
      let order = guard
        .order
        .as_ref()
        .ok_or_else(|| AppError::Internal("Payment confirmation completed without an order.".to_string()))?;
      if guard.succeeded {
        info!(order_id = %order.id, "Payment confirmed.");
        Ok(HttpResponse::Ok().json(json!({
          "success": true,
          "order_id": order.id,
          "order_number": order.order_number,
          "payment_status": order.payment_status,
        })))
      } else {
        let status = guard.intent.as_ref().map(|i| i.status.clone()).unwrap_or_default();
        Ok(HttpResponse::BadRequest().json(json!({
          "success": false,
          "error": format!("Payment not completed (status: {}).", status),
          "order_id": order.id,
          "payment_status": order.payment_status,
        })))
      }
    }
    Ok(Outcome::Stopped) => Err(halted("confirm_payment")),
    Err(app_err) => {
      warn!(error = %app_err, "Confirm-payment pipeline failed.");
      Err(app_err)
    }
  }
}

#[instrument(name = "handler::payment_status", skip(app_state))]
pub async fn payment_status_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let customer = require_customer(&app_state, auth.user_id).await?;
  let pool = &app_state.db_pool;
  let order = db::orders::fetch_for_customer(pool, path.into_inner(), customer.id)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found.".to_string()))?;
  let payment = db::payments::fetch_for_order(pool, order.id).await?;

  Ok(HttpResponse::Ok().json(json!({
    "order_id": order.id,
    "order_number": order.order_number,
    "order_status": order.status,
    "payment_status": order.payment_status,
    "total_amount": order.total_amount,
    "payment": payment,
  })))
}

#[instrument(name = "handler::process_refund", skip(app_state))]
pub async fn process_refund_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<RefundPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let user = current_user(&app_state, auth.user_id).await?;
  let payload = req_payload.into_inner();
  let ctx = Shared::new(RefundPaymentCtx {
    app_state: app_state.get_ref().clone(),
    user_id: user.id,
    is_staff: user.is_staff,
    order_id: payload.order_id,
    amount: payload.amount,
    order: None,
    refund: None,
  });

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) => {
      let guard = ctx.read();
      match (guard.order.as_ref(), guard.refund.as_ref()) {
        (Some(order), Some(refund)) => Ok(HttpResponse::Ok().json(json!({
          "success": true,
          "refund_id": refund.id,
          "amount": refund.amount,
          "status": refund.status,
          "order_id": order.id,
          "payment_status": order.payment_status,
        }))),
        _ => Err(AppError::Internal("Refund completed without a refund record.".to_string())),
      }
    }
    Ok(Outcome::Stopped) => Err(halted("refund_payment")),
    Err(app_err) => {
      warn!(order_id = %payload.order_id, error = %app_err, "Refund pipeline failed.");
      Err(app_err)
    }
  }
}
