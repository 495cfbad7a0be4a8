// orderflow/src/store/memory.rs

//! In-process `OrderStore` used for local development and tests.
//!
//! Every operation takes the single write (or read) lock for its whole duration, which makes
//! order creation and compare-and-set trivially atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

use super::{CasOutcome, OrderStore, ReminderRecord, StatusChange};
use crate::error::{StoreError, StoreResult};
use crate::model::{
  Actor, NewHistoryEntry, NewOrder, Order, OrderItem, ReminderLevel, StatusHistoryEntry, StatusType,
};

#[derive(Default)]
struct MemoryState {
  orders: HashMap<Uuid, Order>,
  items: HashMap<Uuid, Vec<OrderItem>>,
  history: Vec<StatusHistoryEntry>,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
  state: RwLock<MemoryState>,
  unavailable: AtomicBool,
}

impl InMemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes every subsequent call fail with `StoreError::Unavailable` until switched back.
  pub fn set_unavailable(&self, unavailable: bool) {
    self.unavailable.store(unavailable, Ordering::SeqCst);
  }

  fn check_available(&self) -> StoreResult<()> {
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
    }
    Ok(())
  }
}

fn matches_query(order: &Order, needle: &str) -> bool {
  order.customer_name.to_lowercase().contains(needle)
    || order.customer_phone.to_lowercase().contains(needle)
    || order.id.to_string().contains(needle)
    || order
      .payment_reference
      .as_deref()
      .map_or(false, |r| r.to_lowercase().contains(needle))
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
  async fn create_order(&self, new_order: NewOrder) -> StoreResult<(Order, Vec<OrderItem>)> {
    self.check_available()?;
    let order = new_order.to_order();
    let items: Vec<OrderItem> = new_order
      .items
      .into_iter()
      .map(|item| item.into_item(order.id))
      .collect();

    let mut state = self.state.write();
    if state.orders.contains_key(&order.id) {
      return Err(StoreError::Corrupt(format!("order {} already exists", order.id)));
    }
    state.orders.insert(order.id, order.clone());
    state.items.insert(order.id, items.clone());
    debug!(order_id = %order.id, items = items.len(), "In-memory order created.");
    Ok((order, items))
  }

  async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    self.check_available()?;
    Ok(self.state.read().orders.get(&order_id).cloned())
  }

  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
    self.check_available()?;
    Ok(self.state.read().items.get(&order_id).cloned().unwrap_or_default())
  }

  async fn status_history(&self, order_id: Uuid) -> StoreResult<Vec<StatusHistoryEntry>> {
    self.check_available()?;
    let state = self.state.read();
    Ok(state.history.iter().filter(|e| e.order_id == order_id).cloned().collect())
  }

  async fn compare_and_set_status(&self, change: StatusChange) -> StoreResult<CasOutcome> {
    self.check_available()?;
    let mut state = self.state.write();
    let Some(order) = state.orders.get_mut(&change.order_id) else {
      return Ok(CasOutcome::Missing);
    };

    let axis = change.target.axis();
    if order.status_on(axis) != change.expected {
      return Ok(CasOutcome::Conflict { order: order.clone() });
    }

    order.set_status(change.target);
    order.touch(change.at);
    let order = order.clone();

    let entry = NewHistoryEntry {
      order_id: change.order_id,
      status_type: axis.status_type(),
      old_status: Some(change.expected.as_str().to_string()),
      new_status: change.target.as_str().to_string(),
      actor: change.actor,
      note: change.note,
      created_at: change.at,
    }
    .into_entry();
    state.history.push(entry.clone());

    Ok(CasOutcome::Applied { order, entry })
  }

  async fn record_reminder(
    &self,
    order_id: Uuid,
    level: ReminderLevel,
    actor: Actor,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> StoreResult<ReminderRecord> {
    self.check_available()?;
    let mut state = self.state.write();
    let previous: Vec<&StatusHistoryEntry> = state
      .history
      .iter()
      .filter(|e| e.order_id == order_id && e.status_type == StatusType::Reminder)
      .collect();
    if previous.iter().any(|e| e.new_status == level.as_str()) {
      return Ok(ReminderRecord::AlreadyRecorded);
    }
    let old_status = previous.last().map(|e| e.new_status.clone());

    let entry = NewHistoryEntry {
      order_id,
      status_type: StatusType::Reminder,
      old_status,
      new_status: level.as_str().to_string(),
      actor,
      note,
      created_at: at,
    }
    .into_entry();
    state.history.push(entry.clone());
    Ok(ReminderRecord::Recorded(entry))
  }

  async fn unpaid_orders_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Order>> {
    self.check_available()?;
    let state = self.state.read();
    let mut orders: Vec<Order> = state
      .orders
      .values()
      .filter(|o| {
        o.payment_status == crate::model::PaymentStatus::Pending
          && o.order_status != crate::model::OrderStatus::Cancelled
          && o.email().is_some()
          && o.created_at <= cutoff
      })
      .cloned()
      .collect();
    orders.sort_by_key(|o| o.created_at);
    Ok(orders)
  }

  async fn search_orders(&self, query: &str, limit: i64) -> StoreResult<Vec<Order>> {
    self.check_available()?;
    let needle = query.trim().to_lowercase();
    let state = self.state.read();
    let mut orders: Vec<Order> = state
      .orders
      .values()
      .filter(|o| needle.is_empty() || matches_query(o, &needle))
      .cloned()
      .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
    Ok(orders)
  }

  async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
    self.check_available()?;
    let needle = reference.trim().to_lowercase();
    let state = self.state.read();
    Ok(
      state
        .orders
        .values()
        .filter(|o| {
          o.id.to_string().contains(&needle)
            || o
              .payment_reference
              .as_deref()
              .map_or(false, |r| r.to_lowercase().contains(&needle))
        })
        .max_by_key(|o| o.created_at)
        .cloned(),
    )
  }

  async fn set_tracking_number(
    &self,
    order_id: Uuid,
    tracking_number: &str,
    at: DateTime<Utc>,
  ) -> StoreResult<Option<Order>> {
    self.check_available()?;
    let mut state = self.state.write();
    Ok(state.orders.get_mut(&order_id).map(|order| {
      order.tracking_number = Some(tracking_number.to_string());
      order.touch(at);
      order.clone()
    }))
  }

  async fn attach_receipt(&self, order_id: Uuid, receipt_url: &str, at: DateTime<Utc>) -> StoreResult<Option<Order>> {
    self.check_available()?;
    let mut state = self.state.write();
    Ok(state.orders.get_mut(&order_id).map(|order| {
      order.receipt_url = Some(receipt_url.to_string());
      order.touch(at);
      order.clone()
    }))
  }
}
