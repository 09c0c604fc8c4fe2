// marketplace/src/db/addresses.rs

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::Address;

const ADDRESS_COLUMNS: &str = "id, user_id, street, city, state, country, postal_code";

#[derive(Debug, Default)]
pub struct AddressFields {
  pub street: Option<String>,
  pub city: Option<String>,
  pub state: Option<String>,
  pub country: Option<String>,
  pub postal_code: Option<String>,
}

pub async fn list_for_user(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<Vec<Address>> {
  let rows = sqlx::query_as::<_, Address>(&format!(
    "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY city, street"
  ))
  .bind(user_id)
  .fetch_all(db)
  .await?;
  Ok(rows)
}

pub async fn fetch_for_user(db: impl PgExecutor<'_>, address_id: Uuid, user_id: Uuid) -> Result<Option<Address>> {
  let row = sqlx::query_as::<_, Address>(&format!(
    "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2"
  ))
  .bind(address_id)
  .bind(user_id)
  .fetch_optional(db)
  .await?;
  Ok(row)
}

/// All fields are required on insert; callers validate before calling.
pub async fn insert(db: impl PgExecutor<'_>, user_id: Uuid, fields: &AddressFields) -> Result<Address> {
  let row = sqlx::query_as::<_, Address>(&format!(
    "INSERT INTO addresses (id, user_id, street, city, state, country, postal_code) \
     VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ADDRESS_COLUMNS}"
  ))
  .bind(Uuid::new_v4())
  .bind(user_id)
  .bind(fields.street.as_deref().unwrap_or_default())
  .bind(fields.city.as_deref().unwrap_or_default())
  .bind(fields.state.as_deref().unwrap_or_default())
  .bind(fields.country.as_deref().unwrap_or_default())
  .bind(fields.postal_code.as_deref().unwrap_or_default())
  .fetch_one(db)
  .await?;
  Ok(row)
}

pub async fn update(
  db: impl PgExecutor<'_>,
  address_id: Uuid,
  user_id: Uuid,
  fields: &AddressFields,
) -> Result<Option<Address>> {
  let row = sqlx::query_as::<_, Address>(&format!(
    "UPDATE addresses SET \
       street = COALESCE($3, street), city = COALESCE($4, city), state = COALESCE($5, state), \
       country = COALESCE($6, country), postal_code = COALESCE($7, postal_code) \
     WHERE id = $1 AND user_id = $2 RETURNING {ADDRESS_COLUMNS}"
  ))
  .bind(address_id)
  .bind(user_id)
  .bind(fields.street.as_deref())
  .bind(fields.city.as_deref())
  .bind(fields.state.as_deref())
  .bind(fields.country.as_deref())
  .bind(fields.postal_code.as_deref())
  .fetch_optional(db)
  .await?;
  Ok(row)
}

pub async fn delete(db: impl PgExecutor<'_>, address_id: Uuid, user_id: Uuid) -> Result<u64> {
  let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
    .bind(address_id)
    .bind(user_id)
    .execute(db)
    .await?;
  Ok(result.rows_affected())
}
