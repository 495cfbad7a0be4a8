// orderflow/src/transition/rules.rs

//! The two status state machines, as pure functions.
//!
//! - payment: `pending -> {paid, failed}`, `paid -> refunded`
//! - order: `pending -> processing -> shipped -> delivered`, `pending|processing -> cancelled`
//!
//! Terminal: `refunded`, `delivered`, `cancelled`. `failed` is not terminal but has no
//! outgoing edge; only an override moves it.

use uuid::Uuid;

use crate::error::OrderflowError;
use crate::model::{AxisStatus, OrderStatus, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionMode {
  #[default]
  Normal,
  /// Administrative override: any edge is accepted, including moves out of terminal statuses
  /// and back to `pending`.
  Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  /// Current status already equals the target: succeed without writing.
  Unchanged,
  Proceed,
}

pub fn is_terminal(status: AxisStatus) -> bool {
  matches!(
    status,
    AxisStatus::Payment(PaymentStatus::Refunded)
      | AxisStatus::Order(OrderStatus::Delivered)
      | AxisStatus::Order(OrderStatus::Cancelled)
  )
}

/// Whether `from -> to` is an edge of the state machine. Cross-axis pairs never are.
pub fn is_allowed(from: AxisStatus, to: AxisStatus) -> bool {
  use OrderStatus as O;
  use PaymentStatus as P;

  match (from, to) {
    (AxisStatus::Payment(from), AxisStatus::Payment(to)) => matches!(
      (from, to),
      (P::Pending, P::Paid) | (P::Pending, P::Failed) | (P::Paid, P::Refunded)
    ),
    (AxisStatus::Order(from), AxisStatus::Order(to)) => matches!(
      (from, to),
      (O::Pending, O::Processing)
        | (O::Processing, O::Shipped)
        | (O::Shipped, O::Delivered)
        | (O::Pending, O::Cancelled)
        | (O::Processing, O::Cancelled)
    ),
    _ => false,
  }
}

/// Decides whether `current -> target` may be written.
///
/// The idempotence check runs first, so re-applying a terminal status is still `Unchanged`.
pub fn check_transition(
  order_id: Uuid,
  current: AxisStatus,
  target: AxisStatus,
  mode: TransitionMode,
) -> Result<Verdict, OrderflowError> {
  if current.axis() != target.axis() {
    return Err(OrderflowError::Validation(format!(
      "status '{}' does not belong to the {} axis",
      target.as_str(),
      current.axis()
    )));
  }
  if current == target {
    return Ok(Verdict::Unchanged);
  }
  if mode == TransitionMode::Override {
    return Ok(Verdict::Proceed);
  }
  if is_terminal(current) {
    return Err(OrderflowError::TerminalStateViolation {
      order_id,
      axis: current.axis(),
      from: current.as_str().to_string(),
      to: target.as_str().to_string(),
    });
  }
  if !is_allowed(current, target) {
    return Err(OrderflowError::InvalidTransition {
      order_id,
      axis: current.axis(),
      from: current.as_str().to_string(),
      to: target.as_str().to_string(),
    });
  }
  Ok(Verdict::Proceed)
}
