// marketplace/src/models/order_item.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pg_status!(
  /// Per-seller fulfilment status of one order line.
  SellerStatus, "seller_status" {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Canceled => "canceled",
  }
);

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub seller_id: Uuid,
  pub quantity: i32,
  /// Unit price captured when the order was placed.
  pub price_at_time: Decimal,
  pub seller_status: SellerStatus,
  /// Empty until a transfer to the seller succeeded.
  pub stripe_transfer_id: String,
  pub seller_payout_amount: Decimal,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl OrderItem {
  pub fn is_paid_out(&self) -> bool {
    !self.stripe_transfer_id.is_empty()
  }
}
