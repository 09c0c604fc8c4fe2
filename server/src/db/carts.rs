// marketplace/src/db/carts.rs

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Cart, CartItem, CartLine};

pub async fn fetch_by_customer(db: impl PgExecutor<'_>, customer_id: Uuid) -> Result<Option<Cart>> {
  let cart = sqlx::query_as::<_, Cart>("SELECT id, customer_id, created_at FROM carts WHERE customer_id = $1")
    .bind(customer_id)
    .fetch_optional(db)
    .await?;
  Ok(cart)
}

/// Returns the customer's cart, creating it on first use.
pub async fn get_or_create(db: impl PgExecutor<'_>, customer_id: Uuid) -> Result<Cart> {
  // The no-op update makes RETURNING yield the existing row on conflict.
  let cart = sqlx::query_as::<_, Cart>(
    "INSERT INTO carts (id, customer_id) VALUES ($1, $2) \
     ON CONFLICT (customer_id) DO UPDATE SET customer_id = EXCLUDED.customer_id \
     RETURNING id, customer_id, created_at",
  )
  .bind(Uuid::new_v4())
  .bind(customer_id)
  .fetch_one(db)
  .await?;
  Ok(cart)
}

pub async fn item_quantity(db: impl PgExecutor<'_>, cart_id: Uuid, product_id: Uuid) -> Result<Option<i32>> {
  let quantity = sqlx::query_scalar("SELECT quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2")
    .bind(cart_id)
    .bind(product_id)
    .fetch_optional(db)
    .await?;
  Ok(quantity)
}

/// Adds `quantity` to the line for `product_id`, inserting it if absent.
pub async fn add_item(db: impl PgExecutor<'_>, cart_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartItem> {
  let item = sqlx::query_as::<_, CartItem>(
    "INSERT INTO cart_items (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4) \
     ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
     RETURNING id, cart_id, product_id, quantity",
  )
  .bind(Uuid::new_v4())
  .bind(cart_id)
  .bind(product_id)
  .bind(quantity)
  .fetch_one(db)
  .await?;
  Ok(item)
}

pub async fn set_item_quantity(
  db: impl PgExecutor<'_>,
  cart_id: Uuid,
  product_id: Uuid,
  quantity: i32,
) -> Result<Option<CartItem>> {
  let item = sqlx::query_as::<_, CartItem>(
    "UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND product_id = $2 \
     RETURNING id, cart_id, product_id, quantity",
  )
  .bind(cart_id)
  .bind(product_id)
  .bind(quantity)
  .fetch_optional(db)
  .await?;
  Ok(item)
}

pub async fn remove_item(db: impl PgExecutor<'_>, cart_id: Uuid, product_id: Uuid) -> Result<u64> {
  let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
    .bind(cart_id)
    .bind(product_id)
    .execute(db)
    .await?;
  Ok(result.rows_affected())
}

/// Takes the ordered units out of the cart. Lines are matched by cart item id
/// and reduced by the ordered quantity, so anything added after pricing stays.
pub async fn remove_ordered(conn: &mut sqlx::PgConnection, cart_id: Uuid, lines: &[CartLine]) -> Result<u64> {
  let (item_ids, quantities) = ordered_quantities(lines);
  let removed = sqlx::query(
    "DELETE FROM cart_items ci USING UNNEST($2::uuid[], $3::int4[]) AS o(id, qty) \
     WHERE ci.cart_id = $1 AND ci.id = o.id AND ci.quantity <= o.qty",
  )
  .bind(cart_id)
  .bind(&item_ids)
  .bind(&quantities)
  .execute(&mut *conn)
  .await?;
  let reduced = sqlx::query(
    "UPDATE cart_items ci SET quantity = ci.quantity - o.qty FROM UNNEST($2::uuid[], $3::int4[]) AS o(id, qty) \
     WHERE ci.cart_id = $1 AND ci.id = o.id",
  )
  .bind(cart_id)
  .bind(&item_ids)
  .bind(&quantities)
  .execute(&mut *conn)
  .await?;
  Ok(removed.rows_affected() + reduced.rows_affected())
}

fn ordered_quantities(lines: &[CartLine]) -> (Vec<Uuid>, Vec<i32>) {
  lines.iter().map(|l| (l.cart_item_id, l.quantity)).unzip()
}

/// Cart contents joined with current product name, seller and price.
pub async fn lines(db: impl PgExecutor<'_>, cart_id: Uuid) -> Result<Vec<CartLine>> {
  let rows = sqlx::query_as::<_, CartLine>(
    "SELECT ci.id AS cart_item_id, p.id AS product_id, p.name AS product_name, p.seller_id, p.price, ci.quantity \
     FROM cart_items ci JOIN products p ON p.id = ci.product_id \
     WHERE ci.cart_id = $1 ORDER BY p.name",
  )
  .bind(cart_id)
  .fetch_all(db)
  .await?;
  Ok(rows)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal::Decimal;

  #[test]
  fn ordered_quantities_pair_item_ids_with_their_priced_quantity() {
    let line = |quantity| CartLine {
      cart_item_id: Uuid::new_v4(),
      product_id: Uuid::new_v4(),
      product_name: "Mug".into(),
      seller_id: Uuid::new_v4(),
      price: Decimal::ONE,
      quantity,
    };
    let lines = vec![line(2), line(5)];
    let (ids, quantities) = ordered_quantities(&lines);
    assert_eq!(ids, vec![lines[0].cart_item_id, lines[1].cart_item_id]);
    assert_eq!(quantities, vec![2, 5]);
  }
}
