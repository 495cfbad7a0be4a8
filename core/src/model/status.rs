// orderflow/src/model/status.rs

use serde::{Deserialize, Serialize};
use sqlx::Type as SqlxType;
use std::fmt;

use crate::error::OrderflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_method_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  Transfer,
  Oxxo,
  KioskDeposit,
  Card,
}

impl PaymentMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentMethod::Transfer => "transfer",
      PaymentMethod::Oxxo => "oxxo",
      PaymentMethod::KioskDeposit => "kiosk_deposit",
      PaymentMethod::Card => "card",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      PaymentMethod::Transfer => "Bank transfer",
      PaymentMethod::Oxxo => "OXXO cash payment",
      PaymentMethod::KioskDeposit => "Kiosk deposit",
      PaymentMethod::Card => "Card",
    }
  }

  /// Offline methods are confirmed by an operator against a payment reference.
  pub fn needs_reference(self) -> bool {
    !matches!(self, PaymentMethod::Card)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Failed,
  Refunded,
}

impl PaymentStatus {
  pub const ALL: [PaymentStatus; 4] = [
    PaymentStatus::Pending,
    PaymentStatus::Paid,
    PaymentStatus::Failed,
    PaymentStatus::Refunded,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Paid => "paid",
      PaymentStatus::Failed => "failed",
      PaymentStatus::Refunded => "refunded",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Processing => "processing",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
  }
}

/// One of the two independent status dimensions of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusAxis {
  Payment,
  Order,
}

impl StatusAxis {
  pub fn as_str(self) -> &'static str {
    match self {
      StatusAxis::Payment => "payment",
      StatusAxis::Order => "order",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    match value.trim().to_ascii_lowercase().as_str() {
      "payment" | "payment_status" => Some(StatusAxis::Payment),
      "order" | "order_status" => Some(StatusAxis::Order),
      _ => None,
    }
  }

  pub fn status_type(self) -> StatusType {
    match self {
      StatusAxis::Payment => StatusType::Payment,
      StatusAxis::Order => StatusType::Order,
    }
  }
}

impl fmt::Display for StatusAxis {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A status value bound to its axis. Used both for the current value and for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "axis", content = "status", rename_all = "lowercase")]
pub enum AxisStatus {
  Payment(PaymentStatus),
  Order(OrderStatus),
}

impl AxisStatus {
  pub fn axis(self) -> StatusAxis {
    match self {
      AxisStatus::Payment(_) => StatusAxis::Payment,
      AxisStatus::Order(_) => StatusAxis::Order,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      AxisStatus::Payment(s) => s.as_str(),
      AxisStatus::Order(s) => s.as_str(),
    }
  }

  /// Parses `value` as a member of `axis`'s enum.
  pub fn parse(axis: StatusAxis, value: &str) -> Result<Self, OrderflowError> {
    let parsed = match axis {
      StatusAxis::Payment => PaymentStatus::parse(value).map(AxisStatus::Payment),
      StatusAxis::Order => OrderStatus::parse(value).map(AxisStatus::Order),
    };
    parsed.ok_or_else(|| OrderflowError::Validation(format!("'{}' is not a valid {} status", value, axis)))
  }
}

impl fmt::Display for AxisStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.axis(), self.as_str())
  }
}

/// Ledger row discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "status_type_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StatusType {
  Payment,
  Order,
  Reminder,
}

/// Reminder escalation levels. Also the ledger dedupe key for the reminder job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderLevel {
  FirstReminder,
  UrgentReminder,
}

impl ReminderLevel {
  pub fn as_str(self) -> &'static str {
    match self {
      ReminderLevel::FirstReminder => "first_reminder",
      ReminderLevel::UrgentReminder => "urgent_reminder",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    match value {
      "first_reminder" => Some(ReminderLevel::FirstReminder),
      "urgent_reminder" => Some(ReminderLevel::UrgentReminder),
      _ => None,
    }
  }
}

impl fmt::Display for ReminderLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
