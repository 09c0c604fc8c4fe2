// tests/registry_tests.rs
mod common;

use common::*;
use marketflow::{Control, FlowError, Flows, Outcome, Pipeline, Shared};
use serial_test::serial;
use std::sync::atomic::Ordering;

#[derive(Debug, Default)]
struct RefundCtx {
  amount_cents: i64,
  refunded: bool,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
  #[error(transparent)]
  Flow(#[from] FlowError),
  #[error("test: {0}")]
  Test(#[from] TestError),
}

fn checkout_pipeline() -> Pipeline<CheckoutCtx, TestError> {
  let mut pipeline = Pipeline::new(&[("price", false, None)]);
  pipeline.on("price", |ctx: Shared<CheckoutCtx>| async move {
    RUNS.fetch_add(1, Ordering::SeqCst);
    ctx.write().total_cents += 1999;
    Ok::<_, TestError>(Control::Continue)
  });
  pipeline
}

fn refund_pipeline() -> Pipeline<RefundCtx, FlowError> {
  let mut pipeline = Pipeline::new(&[("refund", false, None)]);
  pipeline.on("refund", |ctx: Shared<RefundCtx>| async move {
    let mut guard = ctx.write();
    if guard.amount_cents <= 0 {
      return Err(FlowError::Internal("nothing to refund".into()));
    }
    guard.refunded = true;
    Ok(Control::Continue)
  });
  pipeline
}

#[tokio::test]
#[serial]
async fn dispatches_by_context_type() {
  setup_tracing();
  reset_runs();
  let flows = Flows::<AppError>::new();
  flows.register(checkout_pipeline());
  flows.register(refund_pipeline());
  assert_eq!(flows.len(), 2);
  assert!(flows.contains::<RefundCtx>());

  let checkout = Shared::new(CheckoutCtx::default());
  assert_eq!(flows.run(checkout.clone()).await.unwrap(), Outcome::Completed);
  assert_eq!(checkout.read().total_cents, 1999);

  let refund = Shared::new(RefundCtx {
    amount_cents: 500,
    refunded: false,
  });
  flows.run(refund.clone()).await.unwrap();
  assert!(refund.read().refunded);
  assert_eq!(RUNS.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[serial]
async fn unregistered_context_is_reported() {
  setup_tracing();
  let flows = Flows::<AppError>::new();
  flows.register(checkout_pipeline());

  let err = flows.run(Shared::new(RefundCtx::default())).await.unwrap_err();
  assert!(matches!(err, AppError::Flow(FlowError::NotRegistered { ref type_name }) if type_name.contains("RefundCtx")));
}

#[tokio::test]
#[serial]
async fn handler_errors_convert_into_registry_error() {
  setup_tracing();
  let flows = Flows::<AppError>::new();
  flows.register(refund_pipeline());

  let err = flows.run(Shared::new(RefundCtx::default())).await.unwrap_err();
  assert!(matches!(err, AppError::Flow(FlowError::Internal(_))));
}

#[tokio::test]
#[serial]
async fn registering_again_replaces_the_pipeline() {
  setup_tracing();
  reset_runs();
  let flows = Flows::<AppError>::new();
  flows.register(checkout_pipeline());

  let mut replacement = Pipeline::<CheckoutCtx, TestError>::new(&[("price", false, None)]);
  replacement.on("price", add_line("price", 1));
  flows.register(replacement);

  let ctx = Shared::new(CheckoutCtx::default());
  flows.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().total_cents, 1);
  assert_eq!(RUNS.load(Ordering::SeqCst), 0);
  assert_eq!(flows.len(), 1);
}
