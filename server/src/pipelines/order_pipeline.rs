// marketplace/src/pipelines/order_pipeline.rs

use crate::db::{self, orders::NewOrder, orders::NewOrderItem};
use crate::errors::AppError;
use crate::models::order::new_order_number;
use crate::pipelines::contexts::PlaceOrderCtx;
use crate::services::pricing;
use crate::state::AppState;
use marketflow::{Control, Flows, Pipeline, Shared};
use std::sync::Arc;
use tracing::{event, info, warn, Level};

/// Registers the pipeline that turns a customer's cart into an order.
pub fn register_place_order_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let mut p = Pipeline::<PlaceOrderCtx, AppError>::new(&[
    ("resolve_customer", false, None),
    ("validate_shipping_address", false, None),
    ("load_cart_lines", false, None),
    ("price_order", false, None),
    ("persist_order", false, None),
  ]);

  p.on("resolve_customer", |ctx: Shared<PlaceOrderCtx>| {
    Box::pin(async move {
      let (user_id, pool) = {
        let guard = ctx.read();
        (guard.user_id, guard.app_state.db_pool.clone())
      };
      let customer = db::users::fetch_customer_by_user(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Only customers can place orders.".to_string()))?;
      ctx.write().customer = Some(customer);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("validate_shipping_address", |ctx: Shared<PlaceOrderCtx>| {
    Box::pin(async move {
      let (address_id, user_id, pool) = {
        let guard = ctx.read();
        (guard.shipping_address_id, guard.user_id, guard.app_state.db_pool.clone())
      };
      let address_id =
        address_id.ok_or_else(|| AppError::Validation("shipping_address is required.".to_string()))?;
      if db::addresses::fetch_for_user(&pool, address_id, user_id).await?.is_none() {
        warn!(%address_id, %user_id, "Order references an address the user does not own.");
        return Err(AppError::NotFound("Shipping address not found.".to_string()));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("load_cart_lines", |ctx: Shared<PlaceOrderCtx>| {
    Box::pin(async move {
      let (customer_id, pool) = {
        let guard = ctx.read();
        (guard.customer.as_ref().map(|c| c.id), guard.app_state.db_pool.clone())
      };
      let customer_id =
        customer_id.ok_or_else(|| AppError::Internal("Customer missing before cart load.".to_string()))?;

      let cart = db::carts::fetch_by_customer(&pool, customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found.".to_string()))?;
      let lines = db::carts::lines(&pool, cart.id).await?;
      if lines.is_empty() {
        return Err(AppError::Validation("Cart is empty.".to_string()));
      }
      event!(Level::DEBUG, cart_id = %cart.id, lines = lines.len(), "Cart lines loaded for order.");

      let mut guard = ctx.write();
      guard.cart = Some(cart);
      guard.lines = lines;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("price_order", |ctx: Shared<PlaceOrderCtx>| {
    Box::pin(async move {
      let quote = {
        let guard = ctx.read();
        pricing::price_cart(&guard.lines, guard.app_state.config.platform_commission_rate)?
      };
      event!(Level::DEBUG, total = %quote.total_amount, commission = %quote.platform_commission, "Order priced.");
      ctx.write().quote = Some(quote);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  // Order, item snapshots and removal of the ordered cart units commit together.
  p.on("persist_order", |ctx: Shared<PlaceOrderCtx>| {
    Box::pin(async move {
      let (customer_id, address_id, cart_id, quote, lines, pool, currency) = {
        let guard = ctx.read();
        (
          guard.customer.as_ref().map(|c| c.id),
          guard.shipping_address_id,
          guard.cart.as_ref().map(|c| c.id),
          guard.quote.clone(),
          guard.lines.clone(),
          guard.app_state.db_pool.clone(),
          guard.app_state.config.currency.clone(),
        )
      };
      let (Some(customer_id), Some(address_id), Some(cart_id), Some(quote)) = (customer_id, address_id, cart_id, quote)
      else {
        return Err(AppError::Internal("Order context incomplete before persisting.".to_string()));
      };

      let order_number = new_order_number();
      let mut tx = pool.begin().await?;
      let order = db::orders::insert(
        &mut *tx,
        NewOrder {
          order_number: &order_number,
          customer_id,
          shipping_address_id: address_id,
          total_amount: quote.total_amount,
          platform_commission: quote.platform_commission,
          currency: &currency,
        },
      )
      .await?;

      let mut items = Vec::with_capacity(quote.lines.len());
      for line in &quote.lines {
        let item = db::orders::insert_item(
          &mut *tx,
          NewOrderItem {
            order_id: order.id,
            product_id: line.product_id,
            seller_id: line.seller_id,
            quantity: line.quantity,
            price_at_time: line.unit_price,
            seller_payout_amount: line.seller_payout,
          },
        )
        .await?;
        items.push(item);
      }
      db::carts::remove_ordered(&mut *tx, cart_id, &lines).await?;
      tx.commit().await?;

      info!(order_id = %order.id, order_number = %order.order_number, items = items.len(), total = %order.total_amount, "Order placed.");
      let mut guard = ctx.write();
      guard.order = Some(order);
      guard.items = items;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flows.register(p);
  info!("Place-order pipeline registered.");
}
