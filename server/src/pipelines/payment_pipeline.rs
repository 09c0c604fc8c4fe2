// marketplace/src/pipelines/payment_pipeline.rs

//! Payment intent creation, client-side confirmation and refunds.

use crate::db;
use crate::errors::AppError;
use crate::models::{OrderStatus, PaymentStatus};
use crate::pipelines::common_steps::{self, CapturedPayment};
use crate::pipelines::contexts::{ConfirmPaymentCtx, CreatePaymentIntentCtx, RefundPaymentCtx};
use crate::services::payments::IntentRequest;
use crate::services::pricing::to_minor_units;
use crate::state::AppState;
use marketflow::{Control, Flows, Pipeline, Shared, SkipIf};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{event, info, warn, Level};

pub fn register_create_payment_intent_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  // An order that already carries an intent reuses it instead of creating another.
  let has_intent: SkipIf<CreatePaymentIntentCtx> = Arc::new(|ctx| ctx.read().intent.is_some());

  let mut p = Pipeline::<CreatePaymentIntentCtx, AppError>::new(&[
    ("load_payable_order", false, None),
    ("reuse_existing_intent", true, None),
    ("create_gateway_intent", false, Some(has_intent)),
  ]);

  p.on("load_payable_order", |ctx: Shared<CreatePaymentIntentCtx>| {
    Box::pin(async move {
      let (user_id, order_id, pool) = {
        let guard = ctx.read();
        (guard.user_id, guard.order_id, guard.app_state.db_pool.clone())
      };

      let not_found = || AppError::NotFound("Order not found.".to_string());
      let customer_id = common_steps::customer_id_for(&pool, user_id).await?.ok_or_else(not_found)?;
      let order = db::orders::fetch_for_customer(&pool, order_id, customer_id)
        .await?
        .ok_or_else(not_found)?;
      if order.payment_status != PaymentStatus::Pending {
        warn!(%order_id, payment_status = %order.payment_status, "Payment intent requested for a settled order.");
        return Err(AppError::Validation(format!(
          "Order payment is already {}.",
          order.payment_status
        )));
      }
      ctx.write().order = Some(order);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("reuse_existing_intent", |ctx: Shared<CreatePaymentIntentCtx>| {
    Box::pin(async move {
      let (intent_id, gateway) = {
        let guard = ctx.read();
        let intent_id = guard.order.as_ref().and_then(|o| o.stripe_payment_intent_id.clone());
        (intent_id, guard.app_state.gateway.clone())
      };
      let Some(intent_id) = intent_id else {
        return Ok(Control::Continue);
      };

      match gateway.retrieve_payment_intent(&intent_id).await {
        Ok(intent) => {
          event!(Level::DEBUG, %intent_id, "Reusing existing payment intent.");
          ctx.write().intent = Some(intent);
        }
        Err(e) => warn!(%intent_id, error = %e, "Existing payment intent could not be retrieved; creating a new one."),
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("create_gateway_intent", |ctx: Shared<CreatePaymentIntentCtx>| {
    Box::pin(async move {
      let (order, gateway) = {
        let guard = ctx.read();
        (guard.order.clone(), guard.app_state.gateway.clone())
      };
      let order = order.ok_or_else(|| AppError::Internal("Order missing before intent creation.".to_string()))?;

      let request = IntentRequest {
        amount_minor: to_minor_units(order.total_amount)?,
        currency: order.currency.clone(),
        metadata: BTreeMap::from([
          ("order_id".to_string(), order.id.to_string()),
          ("order_number".to_string(), order.order_number.clone()),
          ("customer_id".to_string(), order.customer_id.to_string()),
        ]),
        idempotency_key: None,
      };
      let intent = gateway.create_payment_intent(&request).await?;
      info!(order_id = %order.id, intent_id = %intent.id, gateway = gateway.name(), "Payment intent created.");
      ctx.write().intent = Some(intent);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  // Stores the new intent id and client secret on the order.
  p.after("create_gateway_intent", |ctx: Shared<CreatePaymentIntentCtx>| {
    Box::pin(async move {
      let (order_id, intent, pool) = {
        let guard = ctx.read();
        (guard.order_id, guard.intent.clone(), guard.app_state.db_pool.clone())
      };
      let intent = intent.ok_or_else(|| AppError::Internal("Intent missing after creation.".to_string()))?;
      let client_secret = intent.client_secret.clone().unwrap_or_default();
      let order = db::orders::attach_payment_intent(&pool, order_id, &intent.id, &client_secret).await?;
      ctx.write().order = Some(order);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flows.register(p);
  info!("Create-payment-intent pipeline registered.");
}

pub fn register_confirm_payment_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let mut p = Pipeline::<ConfirmPaymentCtx, AppError>::new(&[
    ("retrieve_intent", false, None),
    ("load_owned_order", false, None),
    ("apply_intent_status", false, None),
  ]);

  p.on("retrieve_intent", |ctx: Shared<ConfirmPaymentCtx>| {
    Box::pin(async move {
      let (intent_id, gateway) = {
        let guard = ctx.read();
        (guard.payment_intent_id.trim().to_string(), guard.app_state.gateway.clone())
      };
      if intent_id.is_empty() {
        return Err(AppError::Validation("payment_intent_id is required.".to_string()));
      }
      let intent = gateway.retrieve_payment_intent(&intent_id).await?;
      event!(Level::DEBUG, %intent_id, status = %intent.status, "Payment intent retrieved for confirmation.");
      ctx.write().intent = Some(intent);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("load_owned_order", |ctx: Shared<ConfirmPaymentCtx>| {
    Box::pin(async move {
      let (intent_id, user_id, pool) = {
        let guard = ctx.read();
        (guard.payment_intent_id.trim().to_string(), guard.user_id, guard.app_state.db_pool.clone())
      };
      let order = db::orders::fetch_by_intent(&pool, &intent_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found for this payment.".to_string()))?;
      let customer_id = common_steps::customer_id_for(&pool, user_id).await?;
      if customer_id != Some(order.customer_id) {
        warn!(order_id = %order.id, %user_id, "Payment confirmation attempted by a non-owner.");
        return Err(AppError::Forbidden("You do not own this order.".to_string()));
      }
      ctx.write().order = Some(order);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("apply_intent_status", |ctx: Shared<ConfirmPaymentCtx>| {
    Box::pin(async move {
      let (intent, order, pool) = {
        let guard = ctx.read();
        (guard.intent.clone(), guard.order.clone(), guard.app_state.db_pool.clone())
      };
      let (Some(intent), Some(order)) = (intent, order) else {
        return Err(AppError::Internal("Confirmation context incomplete.".to_string()));
      };

      if intent.is_succeeded() {
        let metadata = serde_json::to_value(&intent.metadata).map_err(|e| AppError::Internal(e.to_string()))?;
        common_steps::record_successful_payment(
          &pool,
          &order,
          CapturedPayment {
            intent_id: &intent.id,
            amount_minor: intent.amount,
            currency: &intent.currency,
            status: &intent.status,
            metadata: &metadata,
          },
        )
        .await?;
        ctx.write().succeeded = true;
      } else {
        db::orders::set_statuses(&pool, order.id, PaymentStatus::Failed, None).await?;
        warn!(order_id = %order.id, intent_status = %intent.status, "Payment confirmation reported an unsuccessful intent.");
        ctx.write().succeeded = false;
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flows.register(p);
  info!("Confirm-payment pipeline registered.");
}

pub fn register_refund_payment_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let mut p = Pipeline::<RefundPaymentCtx, AppError>::new(&[
    ("load_refundable_order", false, None),
    ("validate_refund", false, None),
    ("issue_gateway_refund", false, None),
    ("record_refund", false, None),
  ]);

  p.on("load_refundable_order", |ctx: Shared<RefundPaymentCtx>| {
    Box::pin(async move {
      let (order_id, user_id, is_staff, pool) = {
        let guard = ctx.read();
        (guard.order_id, guard.user_id, guard.is_staff, guard.app_state.db_pool.clone())
      };
      let order = db::orders::fetch(&pool, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found.".to_string()))?;
      if !is_staff && common_steps::customer_id_for(&pool, user_id).await? != Some(order.customer_id) {
        return Err(AppError::Forbidden("You are not allowed to refund this order.".to_string()));
      }
      ctx.write().order = Some(order);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("validate_refund", |ctx: Shared<RefundPaymentCtx>| {
    Box::pin(async move {
      let guard = ctx.read();
      let order = guard
        .order
        .as_ref()
        .ok_or_else(|| AppError::Internal("Order missing before refund validation.".to_string()))?;
      if order.payment_status != PaymentStatus::Succeeded {
        return Err(AppError::Validation(format!(
          "Only succeeded payments can be refunded; this one is {}.",
          order.payment_status
        )));
      }
      if order.stripe_payment_intent_id.is_none() {
        return Err(AppError::Validation("Order has no payment to refund.".to_string()));
      }
      if let Some(amount) = guard.amount {
        if amount <= rust_decimal::Decimal::ZERO || amount > order.total_amount {
          return Err(AppError::Validation(format!(
            "Refund amount must be positive and at most {}.",
            order.total_amount
          )));
        }
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("issue_gateway_refund", |ctx: Shared<RefundPaymentCtx>| {
    Box::pin(async move {
      let (intent_id, amount, gateway) = {
        let guard = ctx.read();
        let intent_id = guard.order.as_ref().and_then(|o| o.stripe_payment_intent_id.clone());
        (intent_id, guard.amount, guard.app_state.gateway.clone())
      };
      let intent_id = intent_id.ok_or_else(|| AppError::Internal("Intent missing before refund.".to_string()))?;
      let amount_minor = amount.map(to_minor_units).transpose()?;

      let refund = gateway.create_refund(&intent_id, amount_minor).await?;
      info!(%intent_id, refund_id = %refund.id, amount = refund.amount, "Refund issued.");
      ctx.write().refund = Some(refund);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("record_refund", |ctx: Shared<RefundPaymentCtx>| {
    Box::pin(async move {
      let (order_id, pool) = {
        let guard = ctx.read();
        (guard.order_id, guard.app_state.db_pool.clone())
      };
      let mut tx = pool.begin().await?;
      db::orders::set_statuses(&mut *tx, order_id, PaymentStatus::Refunded, Some(OrderStatus::Refunded)).await?;
      db::payments::set_status(&mut *tx, order_id, PaymentStatus::Refunded.as_str()).await?;
      tx.commit().await?;

      let order = db::orders::fetch(&pool, order_id).await?;
      ctx.write().order = order;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flows.register(p);
  info!("Refund-payment pipeline registered.");
}
