use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use marketflow::{Control, FlowError, Flows, Handler, Pipeline, Shared};
use tokio::runtime::Runtime;

#[derive(Debug, Default)]
struct CartCtx {
  lines: Vec<(u64, u32)>,
  total: u64,
}

fn price_lines() -> Handler<CartCtx, FlowError> {
  Box::new(|ctx: Shared<CartCtx>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.total = guard.lines.iter().map(|(price, qty)| price * u64::from(*qty)).sum();
      Ok(Control::Continue)
    })
  })
}

fn noop() -> Handler<CartCtx, FlowError> {
  Box::new(|_ctx: Shared<CartCtx>| Box::pin(async { Ok(Control::Continue) }))
}

fn build(steps: usize) -> Pipeline<CartCtx, FlowError> {
  let names: Vec<String> = (0..steps).map(|i| format!("step_{i}")).collect();
  let specs: Vec<(&str, bool, Option<marketflow::SkipIf<CartCtx>>)> =
    names.iter().map(|n| (n.as_str(), false, None)).collect();
  let mut pipeline = Pipeline::new(&specs);
  for (i, name) in names.iter().enumerate() {
    if i + 1 == steps {
      pipeline.on(name, price_lines());
    } else {
      pipeline.on(name, noop());
    }
  }
  pipeline
}

fn bench_pipeline_steps(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let mut group = c.benchmark_group("pipeline_steps");
  for steps in [1usize, 5, 10] {
    let pipeline = build(steps);
    group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, _| {
      b.to_async(&rt).iter(|| async {
        let ctx = Shared::new(CartCtx {
          lines: vec![(1999, 2), (450, 1)],
          total: 0,
        });
        pipeline.run(ctx).await.unwrap()
      });
    });
  }
  group.finish();
}

fn bench_registry_dispatch(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let flows = Flows::<FlowError>::new();
  flows.register(build(3));
  c.bench_function("registry_dispatch", |b| {
    b.to_async(&rt).iter(|| async {
      flows.run(Shared::new(CartCtx::default())).await.unwrap()
    });
  });
}

criterion_group!(benches, bench_pipeline_steps, bench_registry_dispatch);
criterion_main!(benches);
