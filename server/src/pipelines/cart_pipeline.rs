// marketplace/src/pipelines/cart_pipeline.rs

use crate::db;
use crate::errors::AppError;
use crate::pipelines::contexts::AddToCartCtx;
use crate::state::AppState;
use marketflow::{Control, Flows, Pipeline, Shared};
use std::sync::Arc;
use tracing::{info, warn};

/// Quantity the cart line ends up with, if stock covers it.
pub(crate) fn check_stock(in_cart: i32, requested: i32, available: i32) -> Result<i32, AppError> {
  match in_cart.checked_add(requested) {
    Some(total) if total <= available => Ok(total),
    _ => Err(AppError::Validation(format!(
      "Only {} units available; {} already in cart.",
      available, in_cart
    ))),
  }
}

pub fn register_add_to_cart_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let mut p = Pipeline::<AddToCartCtx, AppError>::new(&[
    ("validate_cart_input", false, None),
    ("resolve_customer", false, None),
    ("fetch_product_for_cart", false, None),
    ("check_product_stock_for_cart", false, None),
    ("add_or_update_cart_item", false, None),
  ]);

  p.on("validate_cart_input", |ctx: Shared<AddToCartCtx>| {
    Box::pin(async move {
      let quantity = ctx.read().quantity;
      if quantity <= 0 {
        warn!(quantity, "Add to cart rejected: non-positive quantity.");
        return Err(AppError::Validation("Quantity must be a positive number.".to_string()));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("resolve_customer", |ctx: Shared<AddToCartCtx>| {
    Box::pin(async move {
      let (user_id, pool) = {
        let guard = ctx.read();
        (guard.user_id, guard.app_state.db_pool.clone())
      };
      let customer = db::users::fetch_customer_by_user(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Only customers have a cart.".to_string()))?;
      ctx.write().customer = Some(customer);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("fetch_product_for_cart", |ctx: Shared<AddToCartCtx>| {
    Box::pin(async move {
      let (product_id, pool) = {
        let guard = ctx.read();
        (guard.product_id, guard.app_state.db_pool.clone())
      };
      let product = db::catalog::fetch_product(&pool, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product with ID {} not found.", product_id)))?;
      ctx.write().product = Some(product);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  // Counts what is already in the cart so repeated adds cannot exceed stock.
  p.on("check_product_stock_for_cart", |ctx: Shared<AddToCartCtx>| {
    Box::pin(async move {
      let (customer_id, available, requested, product_id, pool) = {
        let guard = ctx.read();
        let customer_id = guard.customer.as_ref().map(|c| c.id);
        let available = guard.product.as_ref().map(|p| p.available_quantity);
        (customer_id, available, guard.quantity, guard.product_id, guard.app_state.db_pool.clone())
      };
      let (Some(customer_id), Some(available)) = (customer_id, available) else {
        return Err(AppError::Internal("Cart context incomplete before stock check.".to_string()));
      };

      let cart = db::carts::get_or_create(&pool, customer_id).await?;
      let in_cart = db::carts::item_quantity(&pool, cart.id, product_id).await?.unwrap_or(0);
      if let Err(e) = check_stock(in_cart, requested, available) {
        warn!(%product_id, in_cart, requested, available, "Add to cart rejected: insufficient stock.");
        return Err(e);
      }
      ctx.write().cart = Some(cart);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("add_or_update_cart_item", |ctx: Shared<AddToCartCtx>| {
    Box::pin(async move {
      let (cart_id, product_id, quantity, pool) = {
        let guard = ctx.read();
        (guard.cart.as_ref().map(|c| c.id), guard.product_id, guard.quantity, guard.app_state.db_pool.clone())
      };
      let cart_id = cart_id.ok_or_else(|| AppError::Internal("Cart missing before item upsert.".to_string()))?;

      let item = db::carts::add_item(&pool, cart_id, product_id, quantity).await?;
      info!(%cart_id, %product_id, quantity = item.quantity, "Cart item added or updated.");
      ctx.write().cart_item = Some(item);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flows.register(p);
  info!("Add-to-cart pipeline registered.");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stock_covers_existing_plus_requested() {
    assert_eq!(check_stock(0, 3, 3).unwrap(), 3);
    assert_eq!(check_stock(2, 1, 5).unwrap(), 3);
    assert!(matches!(check_stock(2, 4, 5), Err(AppError::Validation(_))));
  }

  #[test]
  fn huge_quantity_is_rejected_instead_of_wrapping() {
    assert!(matches!(check_stock(1, i32::MAX, i32::MAX), Err(AppError::Validation(_))));
    assert!(matches!(check_stock(0, i32::MAX, 10), Err(AppError::Validation(_))));
  }
}
