// orderflow/src/error.rs
use thiserror::Error;
use uuid::Uuid;

use crate::model::StatusAxis;

/// Framework-level failures raised by the step pipeline itself.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Step '{step_name}' finished without producing '{missing}'")]
  MissingOutput { step_name: String, missing: String },
}

/// Persistence failures. Always surfaced to the caller as a 500-equivalent; never retried here.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Order store unavailable: {0}")]
  Unavailable(String),

  #[error("Stored value could not be decoded: {0}")]
  Corrupt(String),
}

#[derive(Debug, Error)]
pub enum OrderflowError {
  #[error("Order not found: {0}")]
  NotFound(Uuid),

  #[error("Order {order_id}: {axis} status '{from}' is terminal, cannot move to '{to}'")]
  TerminalStateViolation {
    order_id: Uuid,
    axis: StatusAxis,
    from: String,
    to: String,
  },

  #[error("Order {order_id}: {axis} status cannot move from '{from}' to '{to}'")]
  InvalidTransition {
    order_id: Uuid,
    axis: StatusAxis,
    from: String,
    to: String,
  },

  #[error("Validation error: {0}")]
  Validation(String),

  #[error("Order {order_id} kept changing underneath the transition after {attempts} attempts")]
  ConcurrentModification { order_id: Uuid, attempts: u32 },

  /// Raised only inside optional side-effect steps, where the pipeline logs and absorbs it.
  #[error("Notification delivery failed: {0}")]
  NotificationDelivery(String),

  #[error("Persistence failure: {0}")]
  Persistence(#[from] StoreError),

  #[error("Workflow error: {source}")]
  Workflow {
    #[from]
    source: PipelineError,
  },
}

impl OrderflowError {
  /// Rejections of the requested transition itself, as opposed to infrastructure trouble.
  pub fn is_rejected_transition(&self) -> bool {
    matches!(
      self,
      OrderflowError::TerminalStateViolation { .. } | OrderflowError::InvalidTransition { .. }
    )
  }
}

impl From<sqlx::Error> for OrderflowError {
  fn from(err: sqlx::Error) -> Self {
    OrderflowError::Persistence(StoreError::Database(err))
  }
}

pub type OrderflowResult<T, E = OrderflowError> = std::result::Result<T, E>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
