// marketplace/src/services/payments/mod.rs

//! Payment provider seam. The HTTP layer and pipelines only see
//! [`PaymentGateway`]; the concrete provider is chosen at startup.

pub mod mock;
pub mod stripe;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, GatewayKind};
use crate::errors::{AppError, Result};

pub use mock::MockGateway;
pub use stripe::StripeGateway;

pub const STATUS_SUCCEEDED: &str = "succeeded";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
  pub id: String,
  /// Minor units.
  pub amount: i64,
  pub currency: String,
  pub status: String,
  #[serde(default)]
  pub client_secret: Option<String>,
  #[serde(default)]
  pub metadata: BTreeMap<String, String>,
}

impl PaymentIntent {
  pub fn is_succeeded(&self) -> bool {
    self.status == STATUS_SUCCEEDED
  }
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
  pub amount_minor: i64,
  pub currency: String,
  pub metadata: BTreeMap<String, String>,
  pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
  pub amount_minor: i64,
  pub currency: String,
  /// Connected account receiving the funds.
  pub destination: String,
  pub transfer_group: String,
  pub metadata: BTreeMap<String, String>,
  pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
  pub id: String,
  pub amount: i64,
  pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
  pub id: String,
  pub amount: i64,
  pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  fn name(&self) -> &'static str;

  async fn create_payment_intent(&self, request: &IntentRequest) -> Result<PaymentIntent>;

  async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent>;

  async fn create_transfer(&self, request: &TransferRequest) -> Result<Transfer>;

  /// Refunds the intent's charge; `None` refunds the full amount.
  async fn create_refund(&self, intent_id: &str, amount_minor: Option<i64>) -> Result<Refund>;
}

pub fn gateway_from_config(config: &AppConfig) -> Result<Arc<dyn PaymentGateway>> {
  match config.payment_gateway {
    GatewayKind::Stripe => {
      let key = config
        .stripe_secret_key
        .clone()
        .ok_or_else(|| AppError::Config("STRIPE_SECRET_KEY is required for the stripe gateway".to_string()))?;
      Ok(Arc::new(StripeGateway::new(key, config.stripe_api_base.clone())?))
    }
    GatewayKind::Mock => {
      tracing::warn!("Using the in-memory mock payment gateway. No real charges will be made.");
      Ok(Arc::new(MockGateway::new()))
    }
  }
}
