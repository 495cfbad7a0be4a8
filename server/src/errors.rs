// storefront_app/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use orderflow::OrderflowError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error(transparent)]
  Orderflow(#[from] OrderflowError),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<OrderflowError>() {
      Ok(domain) => AppError::Orderflow(domain),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Orderflow(source) => match source {
        OrderflowError::Validation(_) => StatusCode::BAD_REQUEST,
        OrderflowError::NotFound(_) => StatusCode::NOT_FOUND,
        OrderflowError::TerminalStateViolation { .. } => StatusCode::CONFLICT,
        OrderflowError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OrderflowError::ConcurrentModification { .. } => StatusCode::CONFLICT,
        OrderflowError::NotificationDelivery(_) => StatusCode::BAD_GATEWAY,
        OrderflowError::Persistence(_) | OrderflowError::Workflow { .. } => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }
    let body = match self {
      AppError::Validation(m) | AppError::Auth(m) | AppError::NotFound(m) => json!({ "error": m }),
      AppError::Config(m) => json!({ "error": "Configuration issue", "detail": m }),
      AppError::Internal(m) => json!({ "error": "An internal error occurred", "detail": m }),
      // Store details stay in the log.
      AppError::Orderflow(OrderflowError::Persistence(_)) => json!({ "error": "Database operation failed" }),
      AppError::Orderflow(source) => json!({ "error": source.to_string() }),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
