// marketplace/src/pipelines/common_steps.rs

//! Steps shared by more than one pipeline.

use crate::db::{self, payments::NewPayment};
use crate::errors::Result;
use crate::models::{Order, OrderStatus, PaymentStatus, SellerStatus};
use sqlx::PgPool;
use tracing::{info, instrument};

/// Gateway-side facts about a captured payment.
pub struct CapturedPayment<'a> {
  pub intent_id: &'a str,
  pub amount_minor: i64,
  pub currency: &'a str,
  pub status: &'a str,
  pub metadata: &'a serde_json::Value,
}

/// Marks the order paid, records its payment row and moves every item to
/// `processing`, all in one transaction. Returns `false` when the payment
/// row already existed (a repeated confirmation or redelivered webhook).
#[instrument(name = "common_step::record_successful_payment", skip(pool, order, captured), fields(order_id = %order.id), err(Display))]
pub async fn record_successful_payment(pool: &PgPool, order: &Order, captured: CapturedPayment<'_>) -> Result<bool> {
  let mut tx = pool.begin().await?;
  db::orders::set_statuses(&mut *tx, order.id, PaymentStatus::Succeeded, Some(OrderStatus::Processing)).await?;
  let (payment, created) = db::payments::get_or_create(
    &mut *tx,
    NewPayment {
      order_id: order.id,
      intent_id: captured.intent_id,
      amount: crate::services::pricing::from_minor_units(captured.amount_minor),
      currency: captured.currency,
      status: captured.status,
      metadata: captured.metadata,
    },
  )
  .await?;
  db::orders::set_items_seller_status(&mut *tx, order.id, SellerStatus::Processing).await?;
  tx.commit().await?;

  info!(payment_id = %payment.id, created, order_number = %order.order_number, "Order payment recorded as succeeded.");
  Ok(created)
}

/// The caller's customer id, if the user is a customer.
pub async fn customer_id_for(pool: &PgPool, user_id: uuid::Uuid) -> Result<Option<uuid::Uuid>> {
  Ok(db::users::fetch_customer_by_user(pool, user_id).await?.map(|c| c.id))
}
