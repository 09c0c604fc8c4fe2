// marketplace/src/models/payment.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pg_status!(
  PayoutStatus, "payout_status" {
    Succeeded => "succeeded",
    Failed => "failed",
  }
);

/// Record of a provider charge for an order. At most one per order.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
  pub id: Uuid,
  pub order_id: Uuid,
  pub stripe_payment_intent_id: String,
  pub amount: Decimal,
  pub currency: String,
  pub status: String,
  pub stripe_metadata: serde_json::Value,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SellerPayout {
  pub id: Uuid,
  pub seller_id: Uuid,
  pub order_item_id: Uuid,
  pub amount: Decimal,
  pub stripe_transfer_id: String,
  pub status: PayoutStatus,
  pub created_at: DateTime<Utc>,
}
