// marketplace/src/services/payments/mock.rs

//! Deterministic in-memory gateway for local runs and tests.
//!
//! Intents are created already `succeeded`, except amounts whose minor units
//! end in `123` (modulo 1000), which come back `requires_payment_method`.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{IntentRequest, PaymentGateway, PaymentIntent, Refund, Transfer, TransferRequest, STATUS_SUCCEEDED};
use crate::errors::{AppError, Result};

pub const DECLINE_SUFFIX: i64 = 123;

#[derive(Default)]
struct Ledger {
  intents: HashMap<String, PaymentIntent>,
  refunded: HashMap<String, i64>,
  transfers: HashMap<String, Transfer>,
}

#[derive(Default)]
pub struct MockGateway {
  ledger: Mutex<Ledger>,
  failing_destinations: HashSet<String>,
}

impl MockGateway {
  pub fn new() -> Self {
    Self::default()
  }

  /// Transfers to these connected accounts fail.
  #[cfg(test)]
  pub fn with_failing_destinations<I, S>(destinations: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      failing_destinations: destinations.into_iter().map(Into::into).collect(),
      ..Self::default()
    }
  }

  #[cfg(test)]
  pub fn transfer_count(&self) -> usize {
    self.ledger.lock().transfers.len()
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  fn name(&self) -> &'static str {
    "mock"
  }

  #[instrument(name = "mock_gateway::create_payment_intent", skip(self, request), fields(amount = request.amount_minor))]
  async fn create_payment_intent(&self, request: &IntentRequest) -> Result<PaymentIntent> {
    if request.amount_minor <= 0 {
      return Err(AppError::Payment("Amount must be greater than zero".to_string()));
    }
    let id = format!("pi_mock_{}", Uuid::new_v4().simple());
    let status = if request.amount_minor % 1000 == DECLINE_SUFFIX {
      "requires_payment_method"
    } else {
      STATUS_SUCCEEDED
    };
    let intent = PaymentIntent {
      client_secret: Some(format!("{}_secret_{}", id, Uuid::new_v4().simple())),
      id: id.clone(),
      amount: request.amount_minor,
      currency: request.currency.clone(),
      status: status.to_string(),
      metadata: request.metadata.clone(),
    };
    self.ledger.lock().intents.insert(id, intent.clone());
    info!(intent_id = %intent.id, status, "Mock payment intent created.");
    Ok(intent)
  }

  async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
    self
      .ledger
      .lock()
      .intents
      .get(intent_id)
      .cloned()
      .ok_or_else(|| AppError::NotFound(format!("No such payment_intent: '{}'", intent_id)))
  }

  #[instrument(name = "mock_gateway::create_transfer", skip(self, request), fields(destination = %request.destination))]
  async fn create_transfer(&self, request: &TransferRequest) -> Result<Transfer> {
    if self.failing_destinations.contains(&request.destination) {
      return Err(AppError::Gateway(format!(
        "Transfers to '{}' are not enabled",
        request.destination
      )));
    }
    if request.amount_minor <= 0 {
      return Err(AppError::Validation("Transfer amount must be positive".to_string()));
    }
    let mut ledger = self.ledger.lock();
    let transfer = ledger
      .transfers
      .entry(request.idempotency_key.clone())
      .or_insert_with(|| Transfer {
        id: format!("tr_mock_{}", Uuid::new_v4().simple()),
        amount: request.amount_minor,
        destination: request.destination.clone(),
      })
      .clone();
    Ok(transfer)
  }

  async fn create_refund(&self, intent_id: &str, amount_minor: Option<i64>) -> Result<Refund> {
    let mut ledger = self.ledger.lock();
    let intent = ledger
      .intents
      .get(intent_id)
      .cloned()
      .ok_or_else(|| AppError::NotFound(format!("No such payment_intent: '{}'", intent_id)))?;
    if !intent.is_succeeded() {
      return Err(AppError::Payment("Payment intent has no successful charge to refund".to_string()));
    }
    let already = ledger.refunded.get(intent_id).copied().unwrap_or(0);
    let amount = amount_minor.unwrap_or(intent.amount - already);
    if amount <= 0 || already + amount > intent.amount {
      return Err(AppError::Validation("Refund amount exceeds the remaining charge".to_string()));
    }
    ledger.refunded.insert(intent_id.to_string(), already + amount);
    Ok(Refund {
      id: format!("re_mock_{}", Uuid::new_v4().simple()),
      amount,
      status: STATUS_SUCCEEDED.to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn intent_request(amount_minor: i64) -> IntentRequest {
    IntentRequest {
      amount_minor,
      currency: "usd".into(),
      metadata: BTreeMap::from([("order_id".to_string(), "o-1".to_string())]),
      idempotency_key: None,
    }
  }

  fn transfer_request(destination: &str, key: &str) -> TransferRequest {
    TransferRequest {
      amount_minor: 900,
      currency: "usd".into(),
      destination: destination.into(),
      transfer_group: "ORD-1".into(),
      metadata: BTreeMap::new(),
      idempotency_key: key.into(),
    }
  }

  #[tokio::test]
  async fn intents_succeed_unless_amount_ends_in_decline_suffix() {
    let gateway = MockGateway::new();
    let ok = gateway.create_payment_intent(&intent_request(4498)).await.unwrap();
    assert!(ok.is_succeeded());
    assert!(ok.client_secret.is_some());

    let declined = gateway.create_payment_intent(&intent_request(2123)).await.unwrap();
    assert_eq!(declined.status, "requires_payment_method");

    let fetched = gateway.retrieve_payment_intent(&ok.id).await.unwrap();
    assert_eq!(fetched, ok);
  }

  #[tokio::test]
  async fn zero_amount_and_unknown_intent_are_errors() {
    let gateway = MockGateway::new();
    assert!(matches!(gateway.create_payment_intent(&intent_request(0)).await, Err(AppError::Payment(_))));
    assert!(matches!(gateway.retrieve_payment_intent("pi_nope").await, Err(AppError::NotFound(_))));
  }

  #[tokio::test]
  async fn transfers_are_idempotent_per_key() {
    let gateway = MockGateway::new();
    let first = gateway.create_transfer(&transfer_request("acct_1", "payout-1")).await.unwrap();
    let again = gateway.create_transfer(&transfer_request("acct_1", "payout-1")).await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(gateway.transfer_count(), 1);
  }

  #[tokio::test]
  async fn failing_destination_rejects_transfer() {
    let gateway = MockGateway::with_failing_destinations(["acct_broken"]);
    let err = gateway.create_transfer(&transfer_request("acct_broken", "k")).await.unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)));
  }

  #[tokio::test]
  async fn refunds_cannot_exceed_the_charge() {
    let gateway = MockGateway::new();
    let intent = gateway.create_payment_intent(&intent_request(1000)).await.unwrap();
    let partial = gateway.create_refund(&intent.id, Some(400)).await.unwrap();
    assert_eq!(partial.amount, 400);
    assert!(gateway.create_refund(&intent.id, Some(700)).await.is_err());
    let rest = gateway.create_refund(&intent.id, None).await.unwrap();
    assert_eq!(rest.amount, 600);
  }
}
