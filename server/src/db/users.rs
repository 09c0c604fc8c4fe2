// marketplace/src/db/users.rs

use chrono::NaiveDate;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Customer, Seller, User};

const USER_COLUMNS: &str =
  "id, username, password_hash, name, phone_number, profile_picture, is_staff, created_at, updated_at";

pub struct NewUser<'a> {
  pub username: &'a str,
  pub password_hash: &'a str,
  pub name: &'a str,
  pub phone_number: &'a str,
  pub profile_picture: &'a str,
}

/// Partial update. `None` leaves the column unchanged.
#[derive(Debug, Default)]
pub struct UserChanges {
  pub name: Option<String>,
  pub phone_number: Option<String>,
  pub profile_picture: Option<String>,
  pub password_hash: Option<String>,
}

pub async fn fetch_by_username(db: impl PgExecutor<'_>, username: &str) -> Result<Option<User>> {
  let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
    .bind(username)
    .fetch_optional(db)
    .await?;
  Ok(user)
}

pub async fn fetch_by_id(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<Option<User>> {
  let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
    .bind(user_id)
    .fetch_optional(db)
    .await?;
  Ok(user)
}

pub async fn username_taken(db: impl PgExecutor<'_>, username: &str) -> Result<bool> {
  let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
    .bind(username)
    .fetch_one(db)
    .await?;
  Ok(taken)
}

pub async fn insert(db: impl PgExecutor<'_>, new_user: NewUser<'_>) -> Result<User> {
  let user = sqlx::query_as::<_, User>(&format!(
    "INSERT INTO users (id, username, password_hash, name, phone_number, profile_picture) \
     VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
  ))
  .bind(Uuid::new_v4())
  .bind(new_user.username)
  .bind(new_user.password_hash)
  .bind(new_user.name)
  .bind(new_user.phone_number)
  .bind(new_user.profile_picture)
  .fetch_one(db)
  .await?;
  Ok(user)
}

pub async fn update(db: impl PgExecutor<'_>, user_id: Uuid, changes: &UserChanges) -> Result<User> {
  let user = sqlx::query_as::<_, User>(&format!(
    "UPDATE users SET \
       name = COALESCE($2, name), \
       phone_number = COALESCE($3, phone_number), \
       profile_picture = COALESCE($4, profile_picture), \
       password_hash = COALESCE($5, password_hash), \
       updated_at = NOW() \
     WHERE id = $1 RETURNING {USER_COLUMNS}"
  ))
  .bind(user_id)
  .bind(changes.name.as_deref())
  .bind(changes.phone_number.as_deref())
  .bind(changes.profile_picture.as_deref())
  .bind(changes.password_hash.as_deref())
  .fetch_one(db)
  .await?;
  Ok(user)
}

/// Deleting the user cascades to its profile, addresses and cart.
pub async fn delete(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<u64> {
  let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(user_id).execute(db).await?;
  Ok(result.rows_affected())
}

// --- Customer profile ---

pub async fn fetch_customer_by_user(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<Option<Customer>> {
  let customer = sqlx::query_as::<_, Customer>("SELECT id, user_id, date_of_birth FROM customers WHERE user_id = $1")
    .bind(user_id)
    .fetch_optional(db)
    .await?;
  Ok(customer)
}

pub async fn fetch_customer_by_username(db: impl PgExecutor<'_>, username: &str) -> Result<Option<Customer>> {
  let customer = sqlx::query_as::<_, Customer>(
    "SELECT c.id, c.user_id, c.date_of_birth FROM customers c JOIN users u ON u.id = c.user_id WHERE u.username = $1",
  )
  .bind(username)
  .fetch_optional(db)
  .await?;
  Ok(customer)
}

pub async fn insert_customer(db: impl PgExecutor<'_>, user_id: Uuid, date_of_birth: Option<NaiveDate>) -> Result<Customer> {
  let customer = sqlx::query_as::<_, Customer>(
    "INSERT INTO customers (id, user_id, date_of_birth) VALUES ($1, $2, $3) RETURNING id, user_id, date_of_birth",
  )
  .bind(Uuid::new_v4())
  .bind(user_id)
  .bind(date_of_birth)
  .fetch_one(db)
  .await?;
  Ok(customer)
}

pub async fn update_customer(db: impl PgExecutor<'_>, user_id: Uuid, date_of_birth: NaiveDate) -> Result<Customer> {
  let customer = sqlx::query_as::<_, Customer>(
    "UPDATE customers SET date_of_birth = $2 WHERE user_id = $1 RETURNING id, user_id, date_of_birth",
  )
  .bind(user_id)
  .bind(date_of_birth)
  .fetch_one(db)
  .await?;
  Ok(customer)
}

// --- Seller profile ---

const SELLER_COLUMNS: &str = "id, user_id, shop_name, shop_description, stripe_account_id";

#[derive(Debug, Default)]
pub struct SellerChanges {
  pub shop_name: Option<String>,
  pub shop_description: Option<String>,
  pub stripe_account_id: Option<String>,
}

pub async fn fetch_seller_by_user(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<Option<Seller>> {
  let seller = sqlx::query_as::<_, Seller>(&format!("SELECT {SELLER_COLUMNS} FROM sellers WHERE user_id = $1"))
    .bind(user_id)
    .fetch_optional(db)
    .await?;
  Ok(seller)
}

pub async fn fetch_seller_by_username(db: impl PgExecutor<'_>, username: &str) -> Result<Option<Seller>> {
  let seller = sqlx::query_as::<_, Seller>(
    "SELECT s.id, s.user_id, s.shop_name, s.shop_description, s.stripe_account_id \
     FROM sellers s JOIN users u ON u.id = s.user_id WHERE u.username = $1",
  )
  .bind(username)
  .fetch_optional(db)
  .await?;
  Ok(seller)
}

pub async fn fetch_sellers(db: impl PgExecutor<'_>, seller_ids: &[Uuid]) -> Result<Vec<Seller>> {
  let sellers = sqlx::query_as::<_, Seller>(&format!("SELECT {SELLER_COLUMNS} FROM sellers WHERE id = ANY($1)"))
    .bind(seller_ids)
    .fetch_all(db)
    .await?;
  Ok(sellers)
}

pub async fn insert_seller(
  db: impl PgExecutor<'_>,
  user_id: Uuid,
  shop_name: &str,
  shop_description: &str,
  stripe_account_id: Option<&str>,
) -> Result<Seller> {
  let seller = sqlx::query_as::<_, Seller>(&format!(
    "INSERT INTO sellers (id, user_id, shop_name, shop_description, stripe_account_id) \
     VALUES ($1, $2, $3, $4, $5) RETURNING {SELLER_COLUMNS}"
  ))
  .bind(Uuid::new_v4())
  .bind(user_id)
  .bind(shop_name)
  .bind(shop_description)
  .bind(stripe_account_id)
  .fetch_one(db)
  .await?;
  Ok(seller)
}

pub async fn update_seller(db: impl PgExecutor<'_>, user_id: Uuid, changes: &SellerChanges) -> Result<Seller> {
  let seller = sqlx::query_as::<_, Seller>(&format!(
    "UPDATE sellers SET \
       shop_name = COALESCE($2, shop_name), \
       shop_description = COALESCE($3, shop_description), \
       stripe_account_id = COALESCE($4, stripe_account_id) \
     WHERE user_id = $1 RETURNING {SELLER_COLUMNS}"
  ))
  .bind(user_id)
  .bind(changes.shop_name.as_deref())
  .bind(changes.shop_description.as_deref())
  .bind(changes.stripe_account_id.as_deref())
  .fetch_one(db)
  .await?;
  Ok(seller)
}
