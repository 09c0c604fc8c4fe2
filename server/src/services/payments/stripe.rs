// marketplace/src/services/payments/stripe.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{IntentRequest, PaymentGateway, PaymentIntent, Refund, Transfer, TransferRequest};
use crate::errors::{AppError, Result};

/// Stripe REST client (form-encoded requests, JSON responses).
pub struct StripeGateway {
  client: Client,
  secret_key: String,
  api_base: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
  error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
  #[serde(default)]
  message: Option<String>,
  #[serde(rename = "type", default)]
  kind: Option<String>,
}

fn metadata_params(prefix: &str, metadata: &std::collections::BTreeMap<String, String>) -> Vec<(String, String)> {
  metadata
    .iter()
    .map(|(k, v)| (format!("{}[{}]", prefix, k), v.clone()))
    .collect()
}

impl StripeGateway {
  pub fn new(secret_key: String, api_base: String) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| AppError::Config(format!("Could not build HTTP client: {}", e)))?;
    Ok(Self {
      client,
      secret_key,
      api_base,
    })
  }

  fn post(&self, path: &str) -> RequestBuilder {
    self
      .client
      .post(format!("{}/v1/{}", self.api_base, path))
      .basic_auth(&self.secret_key, Some(""))
  }

  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
      return response
        .json::<T>()
        .await
        .map_err(|e| AppError::Gateway(format!("Unexpected Stripe response: {}", e)));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StripeErrorBody>(&body)
      .ok()
      .map(|b| {
        let kind = b.error.kind.unwrap_or_else(|| "api_error".to_string());
        format!("{}: {}", kind, b.error.message.unwrap_or_default())
      })
      .unwrap_or(body);
    warn!(status = status.as_u16(), %message, "Stripe request failed.");
    Err(match status {
      StatusCode::PAYMENT_REQUIRED => AppError::Payment(message),
      StatusCode::NOT_FOUND => AppError::NotFound(message),
      StatusCode::BAD_REQUEST => AppError::Validation(message),
      _ => AppError::Gateway(message),
    })
  }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
  fn name(&self) -> &'static str {
    "stripe"
  }

  #[instrument(name = "stripe::create_payment_intent", skip(self, request), fields(amount = request.amount_minor, currency = %request.currency), err(Display))]
  async fn create_payment_intent(&self, request: &IntentRequest) -> Result<PaymentIntent> {
    let mut params = vec![
      ("amount".to_string(), request.amount_minor.to_string()),
      ("currency".to_string(), request.currency.clone()),
      ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
    ];
    params.extend(metadata_params("metadata", &request.metadata));

    let mut builder = self.post("payment_intents").form(&params);
    if let Some(key) = &request.idempotency_key {
      builder = builder.header("Idempotency-Key", key);
    }
    let intent: PaymentIntent = self.send(builder).await?;
    info!(intent_id = %intent.id, "Stripe payment intent created.");
    Ok(intent)
  }

  #[instrument(name = "stripe::retrieve_payment_intent", skip(self), err(Display))]
  async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
    let intent_id = checked_intent_id(intent_id)?;
    let builder = self
      .client
      .get(format!("{}/v1/payment_intents/{}", self.api_base, intent_id))
      .basic_auth(&self.secret_key, Some(""));
    self.send(builder).await
  }

  #[instrument(name = "stripe::create_transfer", skip(self, request), fields(destination = %request.destination, amount = request.amount_minor), err(Display))]
  async fn create_transfer(&self, request: &TransferRequest) -> Result<Transfer> {
    let mut params = vec![
      ("amount".to_string(), request.amount_minor.to_string()),
      ("currency".to_string(), request.currency.clone()),
      ("destination".to_string(), request.destination.clone()),
      ("transfer_group".to_string(), request.transfer_group.clone()),
    ];
    params.extend(metadata_params("metadata", &request.metadata));

    let builder = self
      .post("transfers")
      .header("Idempotency-Key", &request.idempotency_key)
      .form(&params);
    self.send(builder).await
  }

  #[instrument(name = "stripe::create_refund", skip(self), err(Display))]
  async fn create_refund(&self, intent_id: &str, amount_minor: Option<i64>) -> Result<Refund> {
    let mut params = vec![("payment_intent".to_string(), intent_id.to_string())];
    if let Some(amount) = amount_minor {
      params.push(("amount".to_string(), amount.to_string()));
    }
    self.send(self.post("refunds").form(&params)).await
  }
}

/// Intent ids go into the URL path, so only `pi_` ids of `[A-Za-z0-9_]` pass.
fn checked_intent_id(intent_id: &str) -> Result<&str> {
  let well_formed = intent_id
    .strip_prefix("pi_")
    .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
  if !well_formed {
    return Err(AppError::Validation(format!("Invalid payment intent id '{}'.", intent_id)));
  }
  Ok(intent_id)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  #[test]
  fn metadata_is_flattened_into_bracketed_form_keys() {
    let mut metadata = BTreeMap::new();
    metadata.insert("order_id".to_string(), "42".to_string());
    metadata.insert("order_number".to_string(), "ORD-1".to_string());
    let params = metadata_params("metadata", &metadata);
    assert_eq!(
      params,
      vec![
        ("metadata[order_id]".to_string(), "42".to_string()),
        ("metadata[order_number]".to_string(), "ORD-1".to_string()),
      ]
    );
  }

  #[test]
  fn payment_intent_parses_from_stripe_json() {
    let body = r#"{"id":"pi_1","object":"payment_intent","amount":4498,"currency":"usd",
      "status":"succeeded","client_secret":"pi_1_secret_x","metadata":{"order_id":"abc"}}"#;
    let intent: PaymentIntent = serde_json::from_str(body).unwrap();
    assert!(intent.is_succeeded());
    assert_eq!(intent.metadata.get("order_id").map(String::as_str), Some("abc"));
  }

  #[test]
  fn intent_ids_that_could_escape_the_path_are_rejected() {
    assert_eq!(checked_intent_id("pi_3Nx9abcDEF_secret").unwrap(), "pi_3Nx9abcDEF_secret");
    for bad in ["../customers", "pi_", "pi_1/../../v1/customers", "pi_1?expand=x", "ch_123", ""] {
      assert!(matches!(checked_intent_id(bad), Err(AppError::Validation(_))), "{bad}");
    }
  }
}
