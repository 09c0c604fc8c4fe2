// marketflow/src/registry.rs

//! [`Flows`]: pipelines keyed by the `TypeId` of their context type.

use crate::core::{Outcome, Shared};
use crate::error::FlowError;
use crate::pipeline::Pipeline;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[async_trait]
trait ErasedRunner<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<Outcome, AppErr>;
}

struct TypedRunner<T, E, AppErr>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pipeline: Arc<Pipeline<T, E>>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<T, E, AppErr> ErasedRunner<AppErr> for TypedRunner<T, E, AppErr>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<E> + From<FlowError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<Outcome, AppErr> {
    let ctx = match ctx.downcast::<Shared<T>>() {
      Ok(ctx) => *ctx,
      Err(_) => {
        return Err(AppErr::from(FlowError::TypeMismatch {
          site: "Flows::run".to_string(),
          expected_type: std::any::type_name::<Shared<T>>().to_string(),
        }))
      }
    };
    self.pipeline.run(ctx).await.map_err(AppErr::from)
  }
}

/// Registry of pipelines. `AppErr` is what [`Flows::run`] returns; it must
/// absorb both the pipelines' handler errors and registry failures.
pub struct Flows<AppErr = FlowError>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  runners: RwLock<HashMap<TypeId, Arc<dyn ErasedRunner<AppErr>>>>,
}

impl<AppErr> Default for Flows<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<AppErr> Flows<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      runners: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `pipeline` for context type `T`, replacing any previous one.
  pub fn register<T, E>(&self, pipeline: Pipeline<T, E>)
  where
    T: Send + Sync + 'static,
    E: std::error::Error + From<FlowError> + Send + Sync + 'static,
    AppErr: From<E>,
  {
    event!(Level::DEBUG, context = %std::any::type_name::<T>(), steps = ?pipeline.step_names(), "registering pipeline");
    let runner = TypedRunner::<T, E, AppErr> {
      pipeline: Arc::new(pipeline),
      _app_err: PhantomData,
    };
    self.runners.write().insert(TypeId::of::<T>(), Arc::new(runner));
  }

  pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
    self.runners.read().contains_key(&TypeId::of::<T>())
  }

  pub fn len(&self) -> usize {
    self.runners.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.runners.read().is_empty()
  }

  /// Runs the pipeline registered for `T`.
  #[instrument(name = "Flows::run", skip_all, fields(context = %std::any::type_name::<T>()))]
  pub async fn run<T>(&self, ctx: Shared<T>) -> Result<Outcome, AppErr>
  where
    T: Send + Sync + 'static,
  {
    // Clone the Arc out so the registry lock is released before awaiting.
    let runner = self.runners.read().get(&TypeId::of::<T>()).cloned();
    let Some(runner) = runner else {
      let type_name = std::any::type_name::<T>().to_string();
      event!(Level::ERROR, %type_name, "no pipeline registered");
      return Err(AppErr::from(FlowError::NotRegistered { type_name }));
    };
    runner.run_erased(Box::new(ctx)).await
  }
}
