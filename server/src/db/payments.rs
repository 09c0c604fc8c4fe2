// marketplace/src/db/payments.rs

use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Payment, PayoutStatus, SellerPayout};

const PAYMENT_COLUMNS: &str =
  "id, order_id, stripe_payment_intent_id, amount, currency, status, stripe_metadata, created_at, updated_at";

pub struct NewPayment<'a> {
  pub order_id: Uuid,
  pub intent_id: &'a str,
  pub amount: Decimal,
  pub currency: &'a str,
  pub status: &'a str,
  pub metadata: &'a serde_json::Value,
}

/// Inserts the order's payment record unless one already exists.
/// Returns the stored record and whether this call created it.
pub async fn get_or_create(conn: &mut sqlx::PgConnection, payment: NewPayment<'_>) -> Result<(Payment, bool)> {
  let inserted = sqlx::query_as::<_, Payment>(&format!(
    "INSERT INTO payments (id, order_id, stripe_payment_intent_id, amount, currency, status, stripe_metadata) \
     VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (order_id) DO NOTHING RETURNING {PAYMENT_COLUMNS}"
  ))
  .bind(Uuid::new_v4())
  .bind(payment.order_id)
  .bind(payment.intent_id)
  .bind(payment.amount)
  .bind(payment.currency)
  .bind(payment.status)
  .bind(payment.metadata)
  .fetch_optional(&mut *conn)
  .await?;

  match inserted {
    Some(row) => Ok((row, true)),
    None => {
      let existing = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"))
        .bind(payment.order_id)
        .fetch_one(&mut *conn)
        .await?;
      Ok((existing, false))
    }
  }
}

pub async fn fetch_for_order(db: impl PgExecutor<'_>, order_id: Uuid) -> Result<Option<Payment>> {
  let row = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"))
    .bind(order_id)
    .fetch_optional(db)
    .await?;
  Ok(row)
}

pub async fn set_status(db: impl PgExecutor<'_>, order_id: Uuid, status: &str) -> Result<()> {
  sqlx::query("UPDATE payments SET status = $2, updated_at = NOW() WHERE order_id = $1")
    .bind(order_id)
    .bind(status)
    .execute(db)
    .await?;
  Ok(())
}

pub async fn insert_payout(
  db: impl PgExecutor<'_>,
  seller_id: Uuid,
  order_item_id: Uuid,
  amount: Decimal,
  transfer_id: &str,
  status: PayoutStatus,
) -> Result<SellerPayout> {
  let row = sqlx::query_as::<_, SellerPayout>(
    "INSERT INTO seller_payouts (id, seller_id, order_item_id, amount, stripe_transfer_id, status) \
     VALUES ($1, $2, $3, $4, $5, $6) \
     RETURNING id, seller_id, order_item_id, amount, stripe_transfer_id, status, created_at",
  )
  .bind(Uuid::new_v4())
  .bind(seller_id)
  .bind(order_item_id)
  .bind(amount)
  .bind(transfer_id)
  .bind(status)
  .fetch_one(db)
  .await?;
  Ok(row)
}

/// Sum of successful payouts to the seller.
pub async fn total_earnings(db: impl PgExecutor<'_>, seller_id: Uuid) -> Result<Decimal> {
  let total: Option<Decimal> =
    sqlx::query_scalar("SELECT SUM(amount) FROM seller_payouts WHERE seller_id = $1 AND status = 'succeeded'")
      .bind(seller_id)
      .fetch_one(db)
      .await?;
  Ok(total.unwrap_or_default())
}
