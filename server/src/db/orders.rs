// marketplace/src/db/orders.rs

use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Order, OrderItem, OrderStatus, PaymentStatus, SellerStatus};

const ORDER_COLUMNS: &str = "id, order_number, customer_id, shipping_address_id, status, payment_status, \
  total_amount, platform_commission, shipping_cost, currency, stripe_payment_intent_id, stripe_client_secret, \
  created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, seller_id, quantity, price_at_time, seller_status, \
  stripe_transfer_id, seller_payout_amount, created_at, updated_at";

pub struct NewOrder<'a> {
  pub order_number: &'a str,
  pub customer_id: Uuid,
  pub shipping_address_id: Uuid,
  pub total_amount: Decimal,
  pub platform_commission: Decimal,
  pub currency: &'a str,
}

pub struct NewOrderItem {
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub seller_id: Uuid,
  pub quantity: i32,
  pub price_at_time: Decimal,
  pub seller_payout_amount: Decimal,
}

pub async fn insert(db: impl PgExecutor<'_>, order: NewOrder<'_>) -> Result<Order> {
  let row = sqlx::query_as::<_, Order>(&format!(
    "INSERT INTO orders (id, order_number, customer_id, shipping_address_id, total_amount, platform_commission, currency) \
     VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ORDER_COLUMNS}"
  ))
  .bind(Uuid::new_v4())
  .bind(order.order_number)
  .bind(order.customer_id)
  .bind(order.shipping_address_id)
  .bind(order.total_amount)
  .bind(order.platform_commission)
  .bind(order.currency)
  .fetch_one(db)
  .await?;
  Ok(row)
}

pub async fn insert_item(db: impl PgExecutor<'_>, item: NewOrderItem) -> Result<OrderItem> {
  let row = sqlx::query_as::<_, OrderItem>(&format!(
    "INSERT INTO order_items (id, order_id, product_id, seller_id, quantity, price_at_time, seller_payout_amount) \
     VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ITEM_COLUMNS}"
  ))
  .bind(Uuid::new_v4())
  .bind(item.order_id)
  .bind(item.product_id)
  .bind(item.seller_id)
  .bind(item.quantity)
  .bind(item.price_at_time)
  .bind(item.seller_payout_amount)
  .fetch_one(db)
  .await?;
  Ok(row)
}

pub async fn fetch(db: impl PgExecutor<'_>, order_id: Uuid) -> Result<Option<Order>> {
  let row = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
    .bind(order_id)
    .fetch_optional(db)
    .await?;
  Ok(row)
}

pub async fn fetch_for_customer(db: impl PgExecutor<'_>, order_id: Uuid, customer_id: Uuid) -> Result<Option<Order>> {
  let row = sqlx::query_as::<_, Order>(&format!(
    "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND customer_id = $2"
  ))
  .bind(order_id)
  .bind(customer_id)
  .fetch_optional(db)
  .await?;
  Ok(row)
}

pub async fn fetch_by_intent(db: impl PgExecutor<'_>, intent_id: &str) -> Result<Option<Order>> {
  let row = sqlx::query_as::<_, Order>(&format!(
    "SELECT {ORDER_COLUMNS} FROM orders WHERE stripe_payment_intent_id = $1"
  ))
  .bind(intent_id)
  .fetch_optional(db)
  .await?;
  Ok(row)
}

pub async fn list_for_customer(db: impl PgExecutor<'_>, customer_id: Uuid) -> Result<Vec<Order>> {
  let rows = sqlx::query_as::<_, Order>(&format!(
    "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY created_at DESC"
  ))
  .bind(customer_id)
  .fetch_all(db)
  .await?;
  Ok(rows)
}

pub async fn delete(db: impl PgExecutor<'_>, order_id: Uuid) -> Result<u64> {
  let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(order_id).execute(db).await?;
  Ok(result.rows_affected())
}

pub async fn attach_payment_intent(
  db: impl PgExecutor<'_>,
  order_id: Uuid,
  intent_id: &str,
  client_secret: &str,
) -> Result<Order> {
  let row = sqlx::query_as::<_, Order>(&format!(
    "UPDATE orders SET stripe_payment_intent_id = $2, stripe_client_secret = $3, updated_at = NOW() \
     WHERE id = $1 RETURNING {ORDER_COLUMNS}"
  ))
  .bind(order_id)
  .bind(intent_id)
  .bind(client_secret)
  .fetch_one(db)
  .await?;
  Ok(row)
}

/// Sets the payment status, and the order status when given.
pub async fn set_statuses(
  db: impl PgExecutor<'_>,
  order_id: Uuid,
  payment_status: PaymentStatus,
  status: Option<OrderStatus>,
) -> Result<()> {
  sqlx::query(
    "UPDATE orders SET payment_status = $2, status = COALESCE($3, status), updated_at = NOW() WHERE id = $1",
  )
  .bind(order_id)
  .bind(payment_status)
  .bind(status)
  .execute(db)
  .await?;
  Ok(())
}

// --- Order items ---

pub async fn items(db: impl PgExecutor<'_>, order_id: Uuid) -> Result<Vec<OrderItem>> {
  let rows = sqlx::query_as::<_, OrderItem>(&format!(
    "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY created_at, id"
  ))
  .bind(order_id)
  .fetch_all(db)
  .await?;
  Ok(rows)
}

pub async fn set_items_seller_status(db: impl PgExecutor<'_>, order_id: Uuid, status: SellerStatus) -> Result<u64> {
  let result = sqlx::query("UPDATE order_items SET seller_status = $2, updated_at = NOW() WHERE order_id = $1")
    .bind(order_id)
    .bind(status)
    .execute(db)
    .await?;
  Ok(result.rows_affected())
}

pub async fn items_for_seller(db: impl PgExecutor<'_>, seller_id: Uuid) -> Result<Vec<OrderItem>> {
  let rows = sqlx::query_as::<_, OrderItem>(&format!(
    "SELECT {ITEM_COLUMNS} FROM order_items WHERE seller_id = $1 ORDER BY created_at DESC"
  ))
  .bind(seller_id)
  .fetch_all(db)
  .await?;
  Ok(rows)
}

pub async fn update_item_status_for_seller(
  db: impl PgExecutor<'_>,
  item_id: Uuid,
  seller_id: Uuid,
  status: SellerStatus,
) -> Result<Option<OrderItem>> {
  let row = sqlx::query_as::<_, OrderItem>(&format!(
    "UPDATE order_items SET seller_status = $3, updated_at = NOW() \
     WHERE id = $1 AND seller_id = $2 RETURNING {ITEM_COLUMNS}"
  ))
  .bind(item_id)
  .bind(seller_id)
  .bind(status)
  .fetch_optional(db)
  .await?;
  Ok(row)
}

/// Stores the transfer id only if none is recorded yet; returns whether it did.
pub async fn record_item_transfer(db: impl PgExecutor<'_>, item_id: Uuid, transfer_id: &str) -> Result<bool> {
  let result = sqlx::query(
    "UPDATE order_items SET stripe_transfer_id = $2, updated_at = NOW() WHERE id = $1 AND stripe_transfer_id = ''",
  )
  .bind(item_id)
  .bind(transfer_id)
  .execute(db)
  .await?;
  Ok(result.rows_affected() == 1)
}

pub async fn product_earnings(db: impl PgExecutor<'_>, seller_id: Uuid, product_id: Uuid) -> Result<Decimal> {
  let total: Option<Decimal> = sqlx::query_scalar(
    "SELECT SUM(seller_payout_amount) FROM order_items WHERE seller_id = $1 AND product_id = $2",
  )
  .bind(seller_id)
  .bind(product_id)
  .fetch_one(db)
  .await?;
  Ok(total.unwrap_or_default())
}
