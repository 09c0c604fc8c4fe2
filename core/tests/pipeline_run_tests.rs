// tests/pipeline_run_tests.rs
mod common;

use common::*;
use marketflow::{Control, FlowError, Outcome, Pipeline, Shared, SkipIf};
use serial_test::serial;
use std::sync::Arc;

fn three_step() -> Pipeline<CheckoutCtx, TestError> {
  Pipeline::new(&[("load_cart", false, None), ("price", false, None), ("persist", false, None)])
}

#[tokio::test]
#[serial]
async fn steps_run_in_declared_order() {
  setup_tracing();
  let mut pipeline = three_step();
  pipeline.on("load_cart", add_line("load_cart", 100));
  pipeline.on("price", add_line("price", 250));
  pipeline.on("persist", add_line("persist", 0));

  let ctx = Shared::new(CheckoutCtx::default());
  let outcome = pipeline.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, Outcome::Completed);
  let guard = ctx.read();
  assert_eq!(guard.total_cents, 350);
  assert_eq!(guard.trail, vec!["load_cart", "price", "persist"]);
}

#[tokio::test]
#[serial]
async fn before_on_after_run_in_phase_order() {
  setup_tracing();
  let mut pipeline = Pipeline::<CheckoutCtx, TestError>::new(&[("charge", false, None)]);
  pipeline.after("charge", record("after"));
  pipeline.on("charge", record("on"));
  pipeline.before("charge", record("before"));
  pipeline.on("charge", record("on_second"));

  let ctx = Shared::new(CheckoutCtx::default());
  pipeline.run(ctx.clone()).await.unwrap();

  assert_eq!(ctx.read().trail, vec!["before", "on", "on_second", "after"]);
}

#[tokio::test]
#[serial]
async fn stop_halts_remaining_handlers_and_steps() {
  setup_tracing();
  let mut pipeline = three_step();
  pipeline.on("load_cart", add_line("load_cart", 100));
  pipeline.on("price", add_line("price", 250));
  pipeline.after("price", record("price_after"));
  pipeline.on("persist", add_line("persist", 1));

  let ctx = Shared::new(CheckoutCtx {
    stop_after: Some("price".into()),
    ..Default::default()
  });
  let outcome = pipeline.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, Outcome::Stopped);
  let guard = ctx.read();
  assert_eq!(guard.trail, vec!["load_cart", "price"]);
  assert_eq!(guard.total_cents, 350);
}

#[tokio::test]
#[serial]
async fn handler_error_is_returned_and_later_steps_do_not_run() {
  setup_tracing();
  let mut pipeline = three_step();
  pipeline.on("load_cart", add_line("load_cart", 100));
  pipeline.on("price", failing("price", "price lookup failed"));
  pipeline.on("persist", add_line("persist", 1));

  let ctx = Shared::new(CheckoutCtx::default());
  let err = pipeline.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("price lookup failed".into()));
  assert_eq!(ctx.read().trail, vec!["load_cart", "price"]);
}

#[tokio::test]
#[serial]
async fn skip_if_is_evaluated_against_current_context() {
  setup_tracing();
  let no_shipping: SkipIf<CheckoutCtx> = Arc::new(|ctx: &Shared<CheckoutCtx>| !ctx.read().needs_shipping);
  let mut pipeline = Pipeline::<CheckoutCtx, TestError>::new(&[
    ("load_cart", false, None),
    ("shipping", false, Some(no_shipping)),
    ("persist", false, None),
  ]);
  pipeline.on("load_cart", add_line("load_cart", 100));
  pipeline.on("shipping", add_line("shipping", 500));
  pipeline.on("persist", record("persist"));

  let ctx = Shared::new(CheckoutCtx::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().trail, vec!["load_cart", "persist"]);

  let shipped = Shared::new(CheckoutCtx {
    needs_shipping: true,
    ..Default::default()
  });
  pipeline.run(shipped.clone()).await.unwrap();
  assert_eq!(shipped.read().total_cents, 600);
}

#[tokio::test]
#[serial]
async fn required_step_without_handlers_fails() {
  setup_tracing();
  let pipeline = Pipeline::<CheckoutCtx, TestError>::new(&[("charge", false, None)]);

  let err = pipeline.run(Shared::new(CheckoutCtx::default())).await.unwrap_err();
  match err {
    TestError::Flow(msg) => {
      assert!(msg.contains("HandlerMissing"));
      assert!(msg.contains("charge"));
    }
    other => panic!("expected flow error, got {other:?}"),
  }
}

#[tokio::test]
#[serial]
async fn optional_step_without_handlers_is_skipped() {
  setup_tracing();
  let mut pipeline = Pipeline::<CheckoutCtx, TestError>::new(&[("notify", true, None), ("persist", false, None)]);
  pipeline.on("persist", record("persist"));

  let ctx = Shared::new(CheckoutCtx::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), Outcome::Completed);
  assert_eq!(ctx.read().trail, vec!["persist"]);
}

#[tokio::test]
#[serial]
async fn steps_can_be_inserted_and_removed() {
  setup_tracing();
  let mut pipeline = three_step();
  pipeline.insert_after("price", "apply_commission", false, None);
  pipeline.insert_before("load_cart", "authorize", true, None);
  pipeline.remove_step("persist");
  assert_eq!(pipeline.step_names(), vec!["authorize", "load_cart", "price", "apply_commission"]);

  pipeline.on("load_cart", record("load_cart"));
  pipeline.on("price", record("price"));
  pipeline.on("apply_commission", |ctx: Shared<CheckoutCtx>| async move {
    ctx.write().trail.push("apply_commission".into());
    Ok::<_, FlowError>(Control::Continue)
  });

  let ctx = Shared::new(CheckoutCtx::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().trail, vec!["load_cart", "price", "apply_commission"]);
}

#[tokio::test]
#[serial]
async fn set_optional_turns_missing_handler_into_skip() {
  setup_tracing();
  let mut pipeline = Pipeline::<CheckoutCtx, TestError>::new(&[("audit", false, None)]);
  pipeline.set_optional("audit", true);
  assert_eq!(pipeline.run(Shared::new(CheckoutCtx::default())).await.unwrap(), Outcome::Completed);
}

#[test]
#[should_panic(expected = "Step not found")]
fn registering_on_unknown_step_panics() {
  let mut pipeline = three_step();
  pipeline.on("refund", record("refund"));
}

#[test]
#[should_panic(expected = "Step already defined")]
fn duplicate_step_names_panic() {
  let mut pipeline = three_step();
  pipeline.insert_after("price", "persist", false, None);
}
