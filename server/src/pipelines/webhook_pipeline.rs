// marketplace/src/pipelines/webhook_pipeline.rs

//! Reconciles payment provider events with orders and pays sellers out.

use crate::config::GatewayKind;
use crate::db;
use crate::errors::AppError;
use crate::models::{Order, PaymentStatus, PayoutStatus, SellerPayout};
use crate::pipelines::common_steps::{self, CapturedPayment};
use crate::pipelines::contexts::PaymentWebhookCtx;
use crate::services::payouts::{self, PayoutDecision};
use crate::services::webhook::{self, EventKind, GatewayEvent};
use crate::state::AppState;
use marketflow::{Control, Flows, Pipeline, Shared, SkipIf};
use std::sync::Arc;
use tracing::{error, event, info, instrument, warn, Level};

pub fn register_webhook_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let not_captured: SkipIf<PaymentWebhookCtx> = Arc::new(|ctx| !ctx.read().payment_captured);

  let mut p = Pipeline::<PaymentWebhookCtx, AppError>::new(&[
    ("verify_webhook_signature", false, None),
    ("parse_gateway_event", false, None),
    ("load_event_order", false, None),
    ("apply_event", false, None),
    ("process_seller_payouts", false, Some(not_captured)),
  ]);

  p.on("verify_webhook_signature", |ctx: Shared<PaymentWebhookCtx>| {
    Box::pin(async move {
      let (payload, header, secret, tolerance, gateway_kind) = {
        let guard = ctx.read();
        let config = &guard.app_state.config;
        (
          guard.raw_payload.clone(),
          guard.signature_header.clone().unwrap_or_default(),
          config.stripe_webhook_secret.clone(),
          config.webhook_tolerance_secs,
          config.payment_gateway,
        )
      };

      let Some(secret) = secret else {
        if gateway_kind == GatewayKind::Mock {
          warn!("No webhook secret configured; accepting unsigned event for the mock gateway.");
          return Ok(Control::Continue);
        }
        return Err(AppError::Config("STRIPE_WEBHOOK_SECRET is not configured.".to_string()));
      };

      webhook::verify_signature(&payload, &header, &secret, tolerance, chrono::Utc::now().timestamp())?;
      event!(Level::DEBUG, bytes = payload.len(), "Webhook signature verified.");
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("parse_gateway_event", |ctx: Shared<PaymentWebhookCtx>| {
    Box::pin(async move {
      let payload = ctx.read().raw_payload.clone();
      let gateway_event = GatewayEvent::from_payload(&payload)?;
      info!(event_id = %gateway_event.id, kind = gateway_event.kind.name(), "Webhook event received.");
      ctx.write().event = Some(gateway_event);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  // Unknown orders and uninteresting events stop the run; the delivery is
  // still acknowledged.
  p.on("load_event_order", |ctx: Shared<PaymentWebhookCtx>| {
    Box::pin(async move {
      let (intent_id, event_id, pool) = {
        let guard = ctx.read();
        let event = guard.event.as_ref();
        (
          event.and_then(|e| e.intent_id().map(str::to_string)),
          event.map(|e| e.id.clone()).unwrap_or_default(),
          guard.app_state.db_pool.clone(),
        )
      };

      let Some(intent_id) = intent_id else {
        info!(%event_id, "Webhook event has no payment intent; ignoring.");
        return Ok(Control::Stop);
      };
      match db::orders::fetch_by_intent(&pool, &intent_id).await? {
        Some(order) => {
          ctx.write().order = Some(order);
          Ok(Control::Continue)
        }
        None => {
          warn!(%event_id, %intent_id, "No order matches the webhook's payment intent.");
          Ok::<_, AppError>(Control::Stop)
        }
      }
    })
  });

  p.on("apply_event", |ctx: Shared<PaymentWebhookCtx>| {
    Box::pin(async move {
      let (gateway_event, order, pool) = {
        let guard = ctx.read();
        (guard.event.clone(), guard.order.clone(), guard.app_state.db_pool.clone())
      };
      let (Some(gateway_event), Some(order)) = (gateway_event, order) else {
        return Err(AppError::Internal("Webhook context incomplete before applying event.".to_string()));
      };

      match &gateway_event.kind {
        EventKind::PaymentSucceeded(intent) => {
          let metadata = gateway_event.object.get("metadata").cloned().unwrap_or_default();
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
          ctx.write().payment_captured = true;
        }
        EventKind::PaymentFailed(intent) => {
          mark_payment(&pool, &order, PaymentStatus::Failed).await?;
          warn!(order_number = %order.order_number, intent_id = %intent.id, "Payment failed.");
        }
        EventKind::PaymentCanceled(intent) => {
          mark_payment(&pool, &order, PaymentStatus::Cancelled).await?;
          info!(order_number = %order.order_number, intent_id = %intent.id, "Payment canceled.");
        }
        EventKind::DisputeCreated { charge_id, amount, reason, .. } => {
          error!(
            order_number = %order.order_number,
            %charge_id,
            amount,
            %reason,
            "Chargeback opened against order."
          );
        }
        EventKind::Other(kind) => {
          event!(Level::DEBUG, %kind, "Unhandled webhook event type.");
        }
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("process_seller_payouts", |ctx: Shared<PaymentWebhookCtx>| {
    Box::pin(async move {
      let (order, state) = {
        let guard = ctx.read();
        (guard.order.clone(), guard.app_state.clone())
      };
      let order = order.ok_or_else(|| AppError::Internal("Order missing before payouts.".to_string()))?;
      let recorded = process_seller_payouts(&state, &order).await?;
      ctx.write().payouts = recorded;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flows.register(p);
  info!("Payment webhook pipeline registered.");
}

async fn mark_payment(pool: &sqlx::PgPool, order: &Order, status: PaymentStatus) -> Result<(), AppError> {
  let mut tx = pool.begin().await?;
  db::orders::set_statuses(&mut *tx, order.id, status, None).await?;
  db::payments::set_status(&mut *tx, order.id, status.as_str()).await?;
  tx.commit().await?;
  Ok(())
}

/// Transfers each seller's share of a paid order. Transfer failures are
/// logged and recorded as failed payouts; they never fail the webhook.
#[instrument(name = "webhook::process_seller_payouts", skip(state, order), fields(order_number = %order.order_number))]
async fn process_seller_payouts(state: &AppState, order: &Order) -> Result<Vec<SellerPayout>, AppError> {
  let pool = &state.db_pool;
  let items = db::orders::items(pool, order.id).await?;
  let mut seller_ids: Vec<_> = items.iter().map(|i| i.seller_id).collect();
  seller_ids.sort();
  seller_ids.dedup();
  let sellers = db::users::fetch_sellers(pool, &seller_ids).await?;

  let mut recorded = Vec::new();
  for decision in payouts::plan_payouts(&items, &sellers) {
    let plan = match decision {
      PayoutDecision::Transfer(plan) => plan,
      PayoutDecision::Skip { order_item_id, reason } => {
        warn!(%order_item_id, ?reason, "Order item skipped for payout.");
        continue;
      }
    };

    let request = plan.transfer_request(&order.currency, &order.order_number);
    match state.gateway.create_transfer(&request).await {
      Ok(transfer) => {
        if db::orders::record_item_transfer(pool, plan.order_item_id, &transfer.id).await? {
          let payout = db::payments::insert_payout(
            pool,
            plan.seller_id,
            plan.order_item_id,
            plan.amount,
            &transfer.id,
            PayoutStatus::Succeeded,
          )
          .await?;
          info!(order_item_id = %plan.order_item_id, transfer_id = %transfer.id, amount = %plan.amount, "Seller paid out.");
          recorded.push(payout);
        } else {
          warn!(order_item_id = %plan.order_item_id, "Transfer already recorded for order item by a concurrent delivery.");
        }
      }
      Err(e) => {
        error!(order_item_id = %plan.order_item_id, seller_id = %plan.seller_id, error = %e, "Seller transfer failed.");
        let payout =
          db::payments::insert_payout(pool, plan.seller_id, plan.order_item_id, plan.amount, "", PayoutStatus::Failed)
            .await?;
        recorded.push(payout);
      }
    }
  }
  Ok(recorded)
}
