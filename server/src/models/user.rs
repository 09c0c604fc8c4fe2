// marketplace/src/models/user.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_PROFILE_PICTURE: &str = "profile_pictures/default.jpg";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
  pub id: Uuid,
  pub username: String,
  #[serde(skip_serializing)] // Never send password hash to client
  pub password_hash: String,
  pub name: String,
  pub phone_number: String,
  pub profile_picture: String,
  pub is_staff: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
  pub id: Uuid,
  pub user_id: Uuid,
  pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Seller {
  pub id: Uuid,
  pub user_id: Uuid,
  pub shop_name: String,
  pub shop_description: String,
  pub stripe_account_id: Option<String>,
}

/// Which profile a user account carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Customer,
  Seller,
}

impl Role {
  pub fn label(self) -> &'static str {
    match self {
      Role::Customer => "customer",
      Role::Seller => "seller",
    }
  }
}
