// marketplace/src/models/address.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Address {
  pub id: Uuid,
  pub user_id: Uuid,
  pub street: String,
  pub city: String,
  pub state: String,
  pub country: String,
  pub postal_code: String,
}
