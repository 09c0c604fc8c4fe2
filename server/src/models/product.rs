// marketplace/src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::Category;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
  pub id: Uuid,
  pub seller_id: Uuid,
  pub name: String,
  pub description: String,
  pub price: Decimal,
  pub available_quantity: i32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductImage {
  pub id: Uuid,
  pub product_id: Uuid,
  /// Stored path or URL of the image.
  pub image: String,
}

/// A product together with its categories and images, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
  #[serde(flatten)]
  pub product: Product,
  pub categories: Vec<Category>,
  pub images: Vec<ProductImage>,
}
