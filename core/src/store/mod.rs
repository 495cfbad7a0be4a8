// orderflow/src/store/mod.rs

//! The Order Store: single source of truth for orders, their items and the status ledger.
//!
//! Components never cache order state across requests; they re-query the store. All
//! cross-request coordination goes through the store's atomic operations, in particular
//! `compare_and_set_status`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::model::{Actor, AxisStatus, NewOrder, Order, OrderItem, ReminderLevel, StatusHistoryEntry};

pub use memory::InMemoryOrderStore;
pub use postgres::PgOrderStore;

/// A conditional status write: only applies if the axis still holds `expected`.
#[derive(Debug, Clone)]
pub struct StatusChange {
  pub order_id: Uuid,
  pub expected: AxisStatus,
  pub target: AxisStatus,
  pub actor: Actor,
  pub note: Option<String>,
  pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum CasOutcome {
  /// Status written, `updated_at` bumped and one ledger row appended, atomically.
  Applied { order: Order, entry: StatusHistoryEntry },
  /// The axis no longer held the expected value. Carries the order as currently stored.
  Conflict { order: Order },
  Missing,
}

#[derive(Debug, Clone)]
pub enum ReminderRecord {
  Recorded(StatusHistoryEntry),
  /// A ledger row for this (order, level) already exists; nothing was written.
  AlreadyRecorded,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Persists the order and all of its items, or nothing at all.
  async fn create_order(&self, new_order: NewOrder) -> StoreResult<(Order, Vec<OrderItem>)>;

  async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;

  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>>;

  /// Ledger rows of one order, oldest first.
  async fn status_history(&self, order_id: Uuid) -> StoreResult<Vec<StatusHistoryEntry>>;

  async fn compare_and_set_status(&self, change: StatusChange) -> StoreResult<CasOutcome>;

  /// Appends a `reminder` ledger row, at most once per (order, level).
  async fn record_reminder(
    &self,
    order_id: Uuid,
    level: ReminderLevel,
    actor: Actor,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> StoreResult<ReminderRecord>;

  /// Orders with `payment_status = pending`, an email address, not cancelled, and
  /// `created_at <= cutoff`. Oldest first.
  async fn unpaid_orders_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Order>>;

  /// Case-insensitive substring search over customer name, phone, order id and payment
  /// reference. Newest first.
  async fn search_orders(&self, query: &str, limit: i64) -> StoreResult<Vec<Order>>;

  /// Newest order whose payment reference or id contains `reference` (case-insensitive).
  async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Order>>;

  async fn set_tracking_number(&self, order_id: Uuid, tracking_number: &str, at: DateTime<Utc>)
    -> StoreResult<Option<Order>>;

  async fn attach_receipt(&self, order_id: Uuid, receipt_url: &str, at: DateTime<Utc>) -> StoreResult<Option<Order>>;
}
