// marketplace/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::PaymentWebhookCtx;
use crate::services::webhook::SIGNATURE_HEADER;
use crate::state::AppState;
use marketflow::{Outcome, Shared};

/// Receives provider events. Anything the pipeline rejects is answered with
/// 400 so the provider retries; unknown orders are acknowledged.
#[instrument(name = "handler::payment_webhook", skip_all, fields(payload_len = body.len()))]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::to_string);

  let ctx = Shared::new(PaymentWebhookCtx::new(app_state.get_ref().clone(), body, signature));

  match app_state.flows.run(ctx.clone()).await {
    Ok(outcome) => {
      let guard = ctx.read();
      let event_id = guard.event.as_ref().map(|e| e.id.clone()).unwrap_or_default();
      match outcome {
        Outcome::Completed => info!(%event_id, payouts = guard.payouts.len(), "Webhook processed."),
        Outcome::Stopped => info!(%event_id, "Webhook acknowledged without changes."),
      }
      Ok(HttpResponse::Ok().json(json!({ "received": true })))
    }
    Err(app_err) => {
      warn!(error = %app_err, "Webhook rejected.");
      Ok(HttpResponse::BadRequest().json(json!({ "error": app_err.to_string() })))
    }
  }
}
