// orderflow/src/model/history.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use super::status::StatusType;

/// One append-only ledger row. Never updated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct StatusHistoryEntry {
  pub id: Uuid,
  pub order_id: Uuid,
  pub status_type: StatusType,
  pub old_status: Option<String>,
  pub new_status: String,
  pub actor: String,
  pub note: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
  pub order_id: Uuid,
  pub status_type: StatusType,
  pub old_status: Option<String>,
  pub new_status: String,
  pub actor: Actor,
  pub note: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl NewHistoryEntry {
  pub fn into_entry(self) -> StatusHistoryEntry {
    StatusHistoryEntry {
      id: Uuid::new_v4(),
      order_id: self.order_id,
      status_type: self.status_type,
      old_status: self.old_status,
      new_status: self.new_status,
      actor: self.actor.to_string(),
      note: self.note,
      created_at: self.created_at,
    }
  }
}

/// Who caused a ledger row: `operator:<name>`, `system:<job>` or `remote_link`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
  Operator(String),
  System(String),
  RemoteLink,
}

impl Actor {
  pub fn operator(name: impl Into<String>) -> Self {
    Actor::Operator(name.into())
  }

  pub fn system(job: impl Into<String>) -> Self {
    Actor::System(job.into())
  }
}

impl fmt::Display for Actor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Actor::Operator(name) => write!(f, "operator:{}", name),
      Actor::System(job) => write!(f, "system:{}", job),
      Actor::RemoteLink => f.write_str("remote_link"),
    }
  }
}

/// `new_status` of the most recent row of `status_type`, if any.
pub fn latest_status(history: &[StatusHistoryEntry], status_type: StatusType) -> Option<&str> {
  history
    .iter()
    .filter(|e| e.status_type == status_type)
    .max_by_key(|e| e.created_at)
    .map(|e| e.new_status.as_str())
}
