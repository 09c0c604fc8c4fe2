// tests/shared_context_tests.rs
mod common;

use common::*;
use marketflow::{Control, Pipeline, Shared};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn handlers_see_each_others_writes_across_awaits() {
  setup_tracing();
  let mut pipeline = Pipeline::<CheckoutCtx, TestError>::new(&[("reserve", false, None), ("confirm", false, None)]);
  pipeline.on("reserve", |ctx: Shared<CheckoutCtx>| async move {
    {
      ctx.write().total_cents = 4200;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
    ctx.write().trail.push("reserve".into());
    Ok::<_, TestError>(Control::Continue)
  });
  pipeline.on("confirm", |ctx: Shared<CheckoutCtx>| async move {
    let total = ctx.read().total_cents;
    tokio::time::sleep(Duration::from_millis(1)).await;
    let mut guard = ctx.write();
    guard.trail.push(format!("confirm:{total}"));
    Ok::<_, TestError>(Control::Continue)
  });

  let ctx = Shared::new(CheckoutCtx::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().trail, vec!["reserve", "confirm:4200"]);
}

#[test]
fn try_write_fails_while_read_guard_is_alive() {
  let ctx = Shared::new(CheckoutCtx::default());
  let reader = ctx.read();
  assert!(ctx.try_write().is_none());
  assert!(ctx.try_read().is_some());
  drop(reader);
  assert!(ctx.try_write().is_some());
}

#[test]
fn read_part_narrows_the_guard() {
  let ctx = Shared::new(CheckoutCtx {
    total_cents: 12,
    ..Default::default()
  });
  let total = ctx.read_part(|c| &c.total_cents);
  assert_eq!(*total, 12);
}

#[test]
fn into_inner_only_succeeds_for_last_handle() {
  let ctx = Shared::new(CheckoutCtx::default());
  let other = ctx.clone();
  let ctx = ctx.into_inner().unwrap_err();
  drop(other);
  assert_eq!(ctx.into_inner().unwrap().total_cents, 0);
}
