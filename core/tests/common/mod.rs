// tests/common/mod.rs
#![allow(dead_code)]

use marketflow::{Control, FlowError, Handler, Shared};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::Level;

/// A checkout-shaped context: each handler records the step it ran and
/// adds to a running total.
#[derive(Clone, Debug, Default)]
pub struct CheckoutCtx {
  pub total_cents: i64,
  pub trail: Vec<String>,
  pub stop_after: Option<String>,
  pub needs_shipping: bool,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("flow error: {0}")]
  Flow(String),

  #[error("handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(err: FlowError) -> Self {
    TestError::Flow(format!("{:?}", err))
  }
}

pub fn add_line(step: &'static str, cents: i64) -> Handler<CheckoutCtx, TestError> {
  Box::new(move |ctx: Shared<CheckoutCtx>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.total_cents += cents;
      guard.trail.push(step.to_string());
      tracing::debug!(target: "flow_tests", step, total = guard.total_cents, "line added");
      if guard.stop_after.as_deref() == Some(step) {
        return Ok(Control::Stop);
      }
      Ok(Control::Continue)
    })
  })
}

pub fn record(step: &'static str) -> Handler<CheckoutCtx, TestError> {
  Box::new(move |ctx: Shared<CheckoutCtx>| {
    Box::pin(async move {
      ctx.write().trail.push(step.to_string());
      Ok(Control::Continue)
    })
  })
}

pub fn failing(step: &'static str, message: &'static str) -> Handler<CheckoutCtx, TestError> {
  Box::new(move |ctx: Shared<CheckoutCtx>| {
    Box::pin(async move {
      ctx.write().trail.push(step.to_string());
      Err(TestError::Handler(message.to_string()))
    })
  })
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub static RUNS: AtomicUsize = AtomicUsize::new(0);

pub fn reset_runs() {
  RUNS.store(0, Ordering::SeqCst);
}
