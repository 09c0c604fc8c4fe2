// marketplace/src/web/handlers/mod.rs

pub mod address_handlers;
pub mod auth_handlers;
pub mod cart_handlers;
pub mod category_handlers;
pub mod customer_handlers;
pub mod order_handlers;
pub mod payment_handlers;
pub mod product_handlers;
pub mod seller_handlers;
pub mod user_handlers;
pub mod webhook_handlers;

use crate::db;
use crate::errors::{AppError, Result};
use crate::models::{Customer, Seller, User};
use crate::state::AppState;
use uuid::Uuid;

/// Loads the caller. A valid token for a deleted user is treated as unauthenticated.
pub(crate) async fn current_user(state: &AppState, user_id: Uuid) -> Result<User> {
  db::users::fetch_by_id(&state.db_pool, user_id)
    .await?
    .ok_or_else(|| AppError::Auth("User no longer exists.".to_string()))
}

pub(crate) async fn require_customer(state: &AppState, user_id: Uuid) -> Result<Customer> {
  db::users::fetch_customer_by_user(&state.db_pool, user_id)
    .await?
    .ok_or_else(|| AppError::Forbidden("Only customers can perform this action.".to_string()))
}

pub(crate) async fn require_seller(state: &AppState, user_id: Uuid) -> Result<Seller> {
  db::users::fetch_seller_by_user(&state.db_pool, user_id)
    .await?
    .ok_or_else(|| AppError::Forbidden("Only sellers can perform this action.".to_string()))
}

/// Error for a pipeline that stopped where completion was expected.
pub(crate) fn halted(operation: &str) -> AppError {
  tracing::warn!(operation, "Pipeline stopped before completion.");
  AppError::PipelineHaltedByHandler
}
