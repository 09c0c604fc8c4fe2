// marketplace/src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pg_status!(
  /// Fulfilment status of the whole order.
  OrderStatus, "order_status" {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Canceled => "canceled",
    Refunded => "refunded",
  }
);

pg_status!(
  /// Where the order's payment stands with the provider.
  PaymentStatus, "payment_status" {
    Pending => "pending",
    Succeeded => "succeeded",
    Failed => "failed",
    Cancelled => "cancelled",
    Refunded => "refunded",
  }
);

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub customer_id: Uuid,
  pub shipping_address_id: Option<Uuid>,
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub total_amount: Decimal,
  pub platform_commission: Decimal,
  pub shipping_cost: Decimal,
  pub currency: String,
  pub stripe_payment_intent_id: Option<String>,
  #[serde(skip_serializing)]
  pub stripe_client_secret: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Human-facing order reference, e.g. `ORD-3F2A9C1B7D4E`.
pub fn new_order_number() -> String {
  let raw = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
  format!("ORD-{}", &raw[..12])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn order_numbers_are_prefixed_and_distinct() {
    let a = new_order_number();
    let b = new_order_number();
    assert!(a.starts_with("ORD-"));
    assert_eq!(a.len(), 16);
    assert_ne!(a, b);
  }
}
