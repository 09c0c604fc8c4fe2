// marketplace/src/pipelines/mod.rs

//! Business operations, each a `marketflow` pipeline keyed by its context type.

use crate::errors::AppError;
use crate::state::AppState;
use marketflow::Flows;
use std::sync::Arc;

pub mod common_steps;
pub mod contexts;

pub mod cart_pipeline;
pub mod order_pipeline;
pub mod payment_pipeline;
pub mod signin_pipeline;
pub mod signup_pipeline;
pub mod webhook_pipeline;

/// Registers every pipeline with `flows`. Called once at startup.
pub fn register_all_pipelines(flows: &Arc<Flows<AppError>>, app_state: &AppState) {
  tracing::info!("Registering pipelines...");

  signup_pipeline::register_signup_pipeline(flows, app_state);
  signin_pipeline::register_signin_pipeline(flows, app_state);
  cart_pipeline::register_add_to_cart_pipeline(flows, app_state);
  order_pipeline::register_place_order_pipeline(flows, app_state);
  payment_pipeline::register_create_payment_intent_pipeline(flows, app_state);
  payment_pipeline::register_confirm_payment_pipeline(flows, app_state);
  payment_pipeline::register_refund_payment_pipeline(flows, app_state);
  webhook_pipeline::register_webhook_pipeline(flows, app_state);

  tracing::info!(count = flows.len(), "All application pipelines registered.");
}
