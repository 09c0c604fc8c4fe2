// marketplace/src/state.rs
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::payments::PaymentGateway;
use marketflow::Flows;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub db_pool: PgPool,
  pub flows: Arc<Flows<AppError>>,
  pub config: Arc<AppConfig>,
  pub gateway: Arc<dyn PaymentGateway>,
}
