// marketflow/src/pipeline/execution.rs

use crate::core::{Control, Outcome, Shared};
use crate::error::FlowError;
use crate::pipeline::hooks::Phase;
use crate::pipeline::Pipeline;
use tracing::{event, info_span, instrument, Instrument, Level};

impl<T, E> Pipeline<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in declared order against `ctx`.
  ///
  /// Returns `Outcome::Stopped` as soon as a handler returns
  /// [`Control::Stop`], and the handler's error as soon as one fails.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(context = %std::any::type_name::<T>(), steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx: Shared<T>) -> Result<Outcome, E> {
    for (index, step) in self.steps.iter().enumerate() {
      let name = step.name.as_str();
      let span = info_span!("step", step = name, index, optional = step.optional);

      if step.should_skip(&ctx) {
        event!(parent: &span, Level::DEBUG, "skip_if matched, step skipped");
        continue;
      }

      let has_handlers = Phase::ALL.iter().any(|phase| !self.handlers(*phase, name).is_empty());
      if !has_handlers {
        if step.optional {
          event!(parent: &span, Level::DEBUG, "optional step has no handlers");
          continue;
        }
        event!(parent: &span, Level::ERROR, "required step has no handlers");
        return Err(E::from(FlowError::HandlerMissing {
          step_name: step.name.clone(),
        }));
      }

      let control = self.run_step(name, &ctx).instrument(span).await?;
      if control == Control::Stop {
        return Ok(Outcome::Stopped);
      }
    }

    event!(Level::DEBUG, "pipeline completed");
    Ok(Outcome::Completed)
  }

  async fn run_step(&self, name: &str, ctx: &Shared<T>) -> Result<Control, E> {
    for phase in Phase::ALL {
      for (handler_index, handler) in self.handlers(phase, name).iter().enumerate() {
        match handler(ctx.clone()).await {
          Ok(Control::Continue) => {}
          Ok(Control::Stop) => {
            event!(Level::INFO, phase = phase.as_str(), handler_index, "pipeline stopped by handler");
            return Ok(Control::Stop);
          }
          Err(e) => {
            event!(Level::ERROR, phase = phase.as_str(), handler_index, error = %e, "handler failed");
            return Err(e);
          }
        }
      }
    }
    Ok(Control::Continue)
  }
}
