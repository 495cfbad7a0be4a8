// orderflow/src/pipeline/execution.rs

//! `Pipeline::run()`: executes steps in order against the shared context.

use crate::error::PipelineError;
use crate::pipeline::context_data::ContextData;
use crate::pipeline::control::{PipelineControl, PipelineResult};
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, Instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  /// Runs every step in declaration order.
  ///
  /// - `skip_if` returning true skips the step.
  /// - `PipelineControl::Stop` ends the run with `PipelineResult::Stopped`.
  /// - An error from a non-optional step is returned as-is.
  /// - An error from an optional step is logged and swallowed.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      pipeline_context_data_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      if let Some(skip_if) = &step_def.skip_if {
        let skip = ctx_data.with(|data| skip_if(data));
        if skip {
          event!(Level::DEBUG, step_name, "Step skipped due to 'skip_if' condition.");
          continue;
        }
      }

      let handlers = match self.on.get(step_name) {
        Some(handlers) if !handlers.is_empty() => handlers,
        _ if step_def.optional => {
          event!(Level::DEBUG, step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        _ => {
          event!(Level::ERROR, step_name, "Non-optional step has no handlers.");
          return Err(Err::from(PipelineError::HandlerMissing {
            step_name: step_def.name.clone(),
          }));
        }
      };

      let step_span = tracing::span!(
        Level::INFO,
        "pipeline_step_execution",
        step_name,
        step_index = step_idx,
        optional = step_def.optional
      );

      for handler_fn in handlers {
        match handler_fn(ctx_data.clone()).instrument(step_span.clone()).await {
          Ok(PipelineControl::Continue) => {}
          Ok(PipelineControl::Stop) => {
            event!(Level::DEBUG, step_name, "Pipeline stopped by handler.");
            return Ok(PipelineResult::Stopped);
          }
          Err(e) if step_def.optional => {
            event!(Level::WARN, step_name, error = %e, "Optional step failed; continuing.");
          }
          Err(e) => {
            event!(Level::ERROR, step_name, error = %e, "Step failed.");
            return Err(e);
          }
        }
      }
    }

    Ok(PipelineResult::Completed)
  }
}
