// marketplace/src/models/cart.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Cart {
  pub id: Uuid,
  pub customer_id: Uuid,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartItem {
  pub id: Uuid,
  pub cart_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
}

/// A cart item joined with the product data needed to price and snapshot it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartLine {
  pub cart_item_id: Uuid,
  pub product_id: Uuid,
  pub product_name: String,
  pub seller_id: Uuid,
  pub price: Decimal,
  pub quantity: i32,
}
