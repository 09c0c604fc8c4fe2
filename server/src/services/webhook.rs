// marketplace/src/services/webhook.rs

//! Verification and decoding of payment provider webhook deliveries.
//!
//! The `Stripe-Signature` header carries `t=<unix ts>` and one or more
//! `v1=<hex hmac>` entries; the MAC is HMAC-SHA256 over `"{t}.{raw body}"`.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
  #[error("missing signature header")]
  MissingHeader,
  #[error("malformed signature header")]
  Malformed,
  #[error("signature timestamp outside tolerance")]
  Stale,
  #[error("no signature matches the payload")]
  Mismatch,
}

impl From<SignatureError> for AppError {
  fn from(err: SignatureError) -> Self {
    AppError::Validation(format!("Invalid webhook signature: {}", err))
  }
}

/// Checks `header` against `payload`. `tolerance_secs <= 0` disables the
/// timestamp window.
pub fn verify_signature(
  payload: &[u8],
  header: &str,
  secret: &str,
  tolerance_secs: i64,
  now: i64,
) -> Result<(), SignatureError> {
  if header.trim().is_empty() {
    return Err(SignatureError::MissingHeader);
  }

  let mut timestamp: Option<i64> = None;
  let mut candidates: Vec<Vec<u8>> = Vec::new();
  for part in header.split(',') {
    let Some((key, value)) = part.trim().split_once('=') else {
      continue;
    };
    match key {
      "t" => timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?),
      "v1" => {
        if let Ok(bytes) = hex::decode(value) {
          candidates.push(bytes);
        }
      }
      _ => {}
    }
  }

  let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
  if candidates.is_empty() {
    return Err(SignatureError::Malformed);
  }
  if tolerance_secs > 0 && now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
    return Err(SignatureError::Stale);
  }

  for expected in &candidates {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    // verify_slice compares in constant time
    if mac.verify_slice(expected).is_ok() {
      return Ok(());
    }
  }
  Err(SignatureError::Mismatch)
}

/// Intent fields the reconciliation step needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IntentPayload {
  pub id: String,
  #[serde(default)]
  pub amount: i64,
  #[serde(default)]
  pub currency: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
  PaymentSucceeded(IntentPayload),
  PaymentFailed(IntentPayload),
  PaymentCanceled(IntentPayload),
  DisputeCreated {
    charge_id: String,
    payment_intent: Option<String>,
    amount: i64,
    reason: String,
  },
  Other(String),
}

impl EventKind {
  pub fn name(&self) -> &str {
    match self {
      EventKind::PaymentSucceeded(_) => "payment_intent.succeeded",
      EventKind::PaymentFailed(_) => "payment_intent.payment_failed",
      EventKind::PaymentCanceled(_) => "payment_intent.canceled",
      EventKind::DisputeCreated { .. } => "charge.dispute.created",
      EventKind::Other(kind) => kind,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
  pub id: String,
  pub kind: EventKind,
  /// Raw `data.object`, kept for storing alongside the payment.
  pub object: Value,
}

#[derive(Deserialize)]
struct Envelope {
  id: String,
  #[serde(rename = "type")]
  event_type: String,
  data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
  object: Value,
}

#[derive(Deserialize)]
struct DisputePayload {
  #[serde(default)]
  charge: String,
  #[serde(default)]
  payment_intent: Option<String>,
  #[serde(default)]
  amount: i64,
  #[serde(default)]
  reason: String,
}

impl GatewayEvent {
  pub fn from_payload(payload: &[u8]) -> Result<Self, AppError> {
    let envelope: Envelope = serde_json::from_slice(payload)
      .map_err(|e| AppError::Validation(format!("Invalid webhook payload: {}", e)))?;

    let intent = |object: &Value| -> Result<IntentPayload, AppError> {
      serde_json::from_value(object.clone())
        .map_err(|e| AppError::Validation(format!("Invalid payment intent in webhook: {}", e)))
    };

    let kind = match envelope.event_type.as_str() {
      "payment_intent.succeeded" => EventKind::PaymentSucceeded(intent(&envelope.data.object)?),
      "payment_intent.payment_failed" => EventKind::PaymentFailed(intent(&envelope.data.object)?),
      "payment_intent.canceled" => EventKind::PaymentCanceled(intent(&envelope.data.object)?),
      "charge.dispute.created" => {
        let dispute: DisputePayload = serde_json::from_value(envelope.data.object.clone())
          .map_err(|e| AppError::Validation(format!("Invalid dispute in webhook: {}", e)))?;
        EventKind::DisputeCreated {
          charge_id: dispute.charge,
          payment_intent: dispute.payment_intent,
          amount: dispute.amount,
          reason: dispute.reason,
        }
      }
      other => EventKind::Other(other.to_string()),
    };

    Ok(Self {
      id: envelope.id,
      kind,
      object: envelope.data.object,
    })
  }

  pub fn intent_id(&self) -> Option<&str> {
    match &self.kind {
      EventKind::PaymentSucceeded(p) | EventKind::PaymentFailed(p) | EventKind::PaymentCanceled(p) => Some(&p.id),
      EventKind::DisputeCreated { payment_intent, .. } => payment_intent.as_deref(),
      EventKind::Other(_) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SECRET: &str = "whsec_test";

  fn sign(payload: &[u8], ts: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(format!("{}.", ts).as_bytes());
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
  }

  #[test]
  fn accepts_a_valid_signature() {
    let body = br#"{"id":"evt_1"}"#;
    let header = format!("t=1700000000,v1={}", sign(body, 1_700_000_000));
    assert_eq!(verify_signature(body, &header, SECRET, 300, 1_700_000_100), Ok(()));
  }

  #[test]
  fn any_matching_v1_entry_is_enough() {
    let body = b"{}";
    let header = format!("t=10,v1={},v1={}", "00".repeat(32), sign(body, 10));
    assert_eq!(verify_signature(body, &header, SECRET, 0, 999_999), Ok(()));
  }

  #[test]
  fn rejects_tampered_body_and_stale_timestamps() {
    let body = br#"{"amount":100}"#;
    let header = format!("t=1000,v1={}", sign(body, 1000));
    assert_eq!(
      verify_signature(br#"{"amount":999}"#, &header, SECRET, 300, 1000),
      Err(SignatureError::Mismatch)
    );
    assert_eq!(verify_signature(body, &header, SECRET, 300, 2000), Err(SignatureError::Stale));
    assert_eq!(verify_signature(body, &header, "other", 300, 1000), Err(SignatureError::Mismatch));
  }

  #[test]
  fn extreme_timestamps_are_stale_not_a_panic() {
    let header = format!("t={},v1=00", i64::MIN);
    assert_eq!(verify_signature(b"{}", &header, SECRET, 300, 1_700_000_000), Err(SignatureError::Stale));
    let header = format!("t={},v1=00", i64::MAX);
    assert_eq!(verify_signature(b"{}", &header, SECRET, 300, -1), Err(SignatureError::Stale));
  }

  #[test]
  fn rejects_missing_or_malformed_headers() {
    assert_eq!(verify_signature(b"{}", "", SECRET, 300, 0), Err(SignatureError::MissingHeader));
    assert_eq!(verify_signature(b"{}", "v1=abcd", SECRET, 300, 0), Err(SignatureError::Malformed));
    assert_eq!(verify_signature(b"{}", "t=abc,v1=00", SECRET, 300, 0), Err(SignatureError::Malformed));
    assert_eq!(verify_signature(b"{}", "t=5", SECRET, 300, 5), Err(SignatureError::Malformed));
  }

  #[test]
  fn decodes_payment_intent_events() {
    let body = br#"{"id":"evt_9","type":"payment_intent.succeeded","data":{"object":
      {"id":"pi_9","amount":2500,"currency":"usd","status":"succeeded","metadata":{"order_id":"x"}}}}"#;
    let event = GatewayEvent::from_payload(body).unwrap();
    assert_eq!(event.id, "evt_9");
    assert_eq!(event.intent_id(), Some("pi_9"));
    match event.kind {
      EventKind::PaymentSucceeded(p) => assert_eq!(p.amount, 2500),
      other => panic!("unexpected kind {:?}", other),
    }
  }

  #[test]
  fn decodes_disputes_and_passes_through_unknown_types() {
    let dispute = br#"{"id":"evt_d","type":"charge.dispute.created","data":{"object":
      {"id":"dp_1","charge":"ch_1","payment_intent":"pi_1","amount":700,"reason":"fraudulent"}}}"#;
    let event = GatewayEvent::from_payload(dispute).unwrap();
    assert_eq!(event.intent_id(), Some("pi_1"));
    assert!(matches!(event.kind, EventKind::DisputeCreated { amount: 700, .. }));

    let other = br#"{"id":"evt_o","type":"customer.created","data":{"object":{}}}"#;
    let event = GatewayEvent::from_payload(other).unwrap();
    assert_eq!(event.kind, EventKind::Other("customer.created".into()));
  }

  #[test]
  fn garbage_payload_is_a_validation_error() {
    assert!(matches!(GatewayEvent::from_payload(b"nope"), Err(AppError::Validation(_))));
  }
}
