// tests/transition_tests.rs
mod common;

use common::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderflow::model::{
  latest_status, Actor, AxisStatus, NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
  ReminderLevel, StatusHistoryEntry, StatusType,
};
use orderflow::store::{CasOutcome, OrderStore, ReminderRecord, StatusChange};
use orderflow::transition::TransitionConfig;
use orderflow::{
  InMemoryOrderStore, OrderflowError, OrderflowSettings, StoreResult, TransitionEngine, TransitionOutcome,
  TransitionRequest,
};
use parking_lot::Mutex;
use serial_test::serial;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

fn paid() -> AxisStatus {
  AxisStatus::Payment(PaymentStatus::Paid)
}

fn order_status(s: OrderStatus) -> AxisStatus {
  AxisStatus::Order(s)
}

#[tokio::test]
async fn free_shipping_order_confirmed_twice_writes_one_entry() {
  let h = harness_with(OrderflowSettings {
    free_shipping_threshold_cents: 900,
    ..inline_settings()
  });
  let receipt = h
    .flow
    .submit_checkout(checkout_request(PaymentMethod::Transfer, vec![item("Sticker pack", 900, 1)]))
    .await
    .unwrap();
  let order = receipt.order;
  assert_eq!(order.subtotal_cents, 900);
  assert_eq!(order.shipping_cost_cents, 0);
  assert_eq!(order.total_cents, 900);

  let first = h
    .flow
    .apply_transition(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap();
  assert!(first.is_applied());
  let history = h.store.status_history(order.id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].status_type, StatusType::Payment);
  assert_eq!(history[0].old_status.as_deref(), Some("pending"));
  assert_eq!(history[0].new_status, "paid");
  assert_eq!(history[0].actor, "operator:tests");

  let second = h
    .flow
    .apply_transition(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap();
  assert!(matches!(second, TransitionOutcome::Unchanged { .. }));
  assert_eq!(h.store.status_history(order.id).await.unwrap().len(), 1);
  assert_eq!(second.order().total_cents, 900);
}

#[tokio::test]
async fn terminal_statuses_reject_and_leave_everything_untouched() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), chrono::Utc::now(), Some("ana@example.com")).await;

  h.flow
    .apply_transition(TransitionRequest::new(order.id, order_status(OrderStatus::Cancelled), operator()))
    .await
    .unwrap();
  let before = h.store.get_order(order.id).await.unwrap().unwrap();

  let err = h
    .flow
    .apply_transition(TransitionRequest::new(order.id, order_status(OrderStatus::Processing), operator()))
    .await
    .unwrap_err();
  assert!(matches!(err, OrderflowError::TerminalStateViolation { .. }));

  let after = h.store.get_order(order.id).await.unwrap().unwrap();
  assert_eq!(before, after);
  assert_eq!(h.store.status_history(order.id).await.unwrap().len(), 1);

  // Re-applying the terminal status itself is an idempotent no-op.
  let again = h
    .flow
    .apply_transition(TransitionRequest::new(order.id, order_status(OrderStatus::Cancelled), operator()))
    .await
    .unwrap();
  assert!(!again.is_applied());
}

#[tokio::test]
async fn refunded_is_terminal_for_payment() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), chrono::Utc::now(), None).await;
  for target in [PaymentStatus::Paid, PaymentStatus::Refunded] {
    h.flow
      .apply_transition(TransitionRequest::new(order.id, AxisStatus::Payment(target), operator()))
      .await
      .unwrap();
  }
  let err = h
    .flow
    .apply_transition(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap_err();
  assert!(err.is_rejected_transition());
}

#[tokio::test]
async fn skipped_edges_are_invalid() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), chrono::Utc::now(), None).await;
  let err = h
    .flow
    .apply_transition(TransitionRequest::new(order.id, order_status(OrderStatus::Shipped), operator()))
    .await
    .unwrap_err();
  assert!(matches!(err, OrderflowError::InvalidTransition { .. }));
  assert!(h.store.status_history(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_order_is_not_found() {
  let h = harness();
  let id = Uuid::new_v4();
  let err = h
    .flow
    .apply_transition(TransitionRequest::new(id, paid(), operator()))
    .await
    .unwrap_err();
  assert!(matches!(err, OrderflowError::NotFound(missing) if missing == id));
}

#[tokio::test]
async fn read_model_matches_latest_ledger_entry_per_axis() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), chrono::Utc::now(), None).await;

  let steps = [
    paid(),
    order_status(OrderStatus::Processing),
    order_status(OrderStatus::Shipped),
    order_status(OrderStatus::Delivered),
    AxisStatus::Payment(PaymentStatus::Refunded),
  ];
  for target in steps {
    h.flow
      .apply_transition(TransitionRequest::new(order.id, target, operator()).with_note("step"))
      .await
      .unwrap();

    let current = h.store.get_order(order.id).await.unwrap().unwrap();
    let history = h.store.status_history(order.id).await.unwrap();
    assert_eq!(
      latest_status(&history, StatusType::Payment).unwrap_or("pending"),
      current.payment_status.as_str()
    );
    assert_eq!(
      latest_status(&history, StatusType::Order).unwrap_or("pending"),
      current.order_status.as_str()
    );
    assert_eq!(current.total_cents, current.subtotal_cents + current.shipping_cost_cents);
    assert!(current.updated_at >= current.created_at);
  }
  assert_eq!(h.store.status_history(order.id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn override_is_the_only_way_back_to_pending() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), chrono::Utc::now(), None).await;
  h.flow
    .apply_transition(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap();

  let pending = AxisStatus::Payment(PaymentStatus::Pending);
  assert!(h
    .flow
    .apply_transition(TransitionRequest::new(order.id, pending, operator()))
    .await
    .is_err());

  let outcome = h
    .flow
    .apply_transition(
      TransitionRequest::new(order.id, pending, operator())
        .with_note("transfer bounced")
        .as_override(),
    )
    .await
    .unwrap();
  let TransitionOutcome::Applied { order, entry } = outcome else {
    panic!("override should write");
  };
  assert_eq!(order.payment_status, PaymentStatus::Pending);
  assert_eq!(entry.old_status.as_deref(), Some("paid"));
  assert_eq!(entry.note.as_deref(), Some("transfer bounced"));
}

#[tokio::test]
async fn concurrent_identical_transitions_write_exactly_one_entry() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), chrono::Utc::now(), None).await;
  let flow = Arc::new(h.flow);

  let mut tasks = Vec::new();
  for _ in 0..8 {
    let flow = flow.clone();
    tasks.push(tokio::spawn(async move {
      flow
        .apply_transition(TransitionRequest::new(order.id, paid(), operator()))
        .await
    }));
  }

  let mut applied = 0;
  for task in tasks {
    let outcome = task.await.unwrap().unwrap();
    if outcome.is_applied() {
      applied += 1;
    }
  }
  assert_eq!(applied, 1);
  assert_eq!(h.store.status_history(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn persistence_failure_surfaces_to_the_caller() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), chrono::Utc::now(), None).await;
  h.store.set_unavailable(true);
  let err = h
    .flow
    .apply_transition(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap_err();
  assert!(matches!(err, OrderflowError::Persistence(_)));
}

#[tokio::test]
async fn payment_confirmation_notifies_the_customer() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), chrono::Utc::now(), Some("ana@example.com")).await;

  h.flow
    .apply_transition(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap();
  let messages = h.email.messages();
  assert_eq!(messages.len(), 1);
  assert_eq!(messages[0].to, "ana@example.com");
  assert!(messages[0].subject.contains("payment confirmed"));
  assert!(messages[0].subject.contains(&order.short_id()));

  // Moving to processing has no template.
  h.flow
    .apply_transition(TransitionRequest::new(order.id, order_status(OrderStatus::Processing), operator()))
    .await
    .unwrap();
  assert_eq!(h.email.count(), 1);
}

#[tokio::test]
async fn failing_notification_never_rolls_back_the_transition() {
  setup_tracing();
  let store = Arc::new(orderflow::InMemoryOrderStore::new());
  let flow = orderflow::Orderflow::builder(store.clone())
    .settings(inline_settings())
    .email_sender(Arc::new(FailingEmailSender))
    .hook(Arc::new(ExplodingHook))
    .build();
  let order = seed_order(store.as_ref(), chrono::Utc::now(), Some("ana@example.com")).await;

  let outcome = flow
    .apply_transition(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap();
  assert!(outcome.is_applied());
  let stored = store.get_order(order.id).await.unwrap().unwrap();
  assert_eq!(stored.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn slow_notification_is_time_boxed() {
  setup_tracing();
  let store = Arc::new(orderflow::InMemoryOrderStore::new());
  let flow = orderflow::Orderflow::builder(store.clone())
    .settings(inline_settings())
    .email_sender(Arc::new(SlowEmailSender(std::time::Duration::from_secs(30))))
    .build();
  let order = seed_order(store.as_ref(), chrono::Utc::now(), Some("ana@example.com")).await;

  let started = std::time::Instant::now();
  let outcome = flow
    .apply_transition(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap();
  assert!(outcome.is_applied());
  assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
#[serial]
async fn hooks_run_only_for_written_transitions() {
  setup_tracing();
  reset_counters();
  let store = Arc::new(orderflow::InMemoryOrderStore::new());
  let flow = orderflow::Orderflow::builder(store.clone())
    .settings(inline_settings())
    .hook(Arc::new(CountingHook))
    .build();
  let order = seed_order(store.as_ref(), chrono::Utc::now(), None).await;

  for _ in 0..3 {
    flow
      .apply_transition(TransitionRequest::new(order.id, paid(), operator()))
      .await
      .unwrap();
  }
  let _ = flow
    .apply_transition(TransitionRequest::new(order.id, order_status(OrderStatus::Delivered), operator()))
    .await;
  assert_eq!(HOOK_EXEC_COUNTER.load(Ordering::SeqCst), 1);
}

// --- Racing writers ---

/// Wraps the in-memory store and lets another writer get in just before each
/// compare-and-set: queued `racing_writes` are committed first, and `forced_conflicts`
/// answers `Conflict` without touching the store.
struct RacingStore {
  inner: Arc<InMemoryOrderStore>,
  racing_writes: Mutex<VecDeque<AxisStatus>>,
  forced_conflicts: AtomicUsize,
  cas_calls: AtomicUsize,
}

impl RacingStore {
  fn new(inner: Arc<InMemoryOrderStore>) -> Self {
    Self {
      inner,
      racing_writes: Mutex::new(VecDeque::new()),
      forced_conflicts: AtomicUsize::new(0),
      cas_calls: AtomicUsize::new(0),
    }
  }

  fn race_with(self, target: AxisStatus) -> Self {
    self.racing_writes.lock().push_back(target);
    self
  }

  fn conflict_times(self, n: usize) -> Self {
    self.forced_conflicts.store(n, Ordering::SeqCst);
    self
  }
}

#[async_trait]
impl OrderStore for RacingStore {
  async fn create_order(&self, new_order: NewOrder) -> StoreResult<(Order, Vec<OrderItem>)> {
    self.inner.create_order(new_order).await
  }

  async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    self.inner.get_order(order_id).await
  }

  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
    self.inner.order_items(order_id).await
  }

  async fn status_history(&self, order_id: Uuid) -> StoreResult<Vec<StatusHistoryEntry>> {
    self.inner.status_history(order_id).await
  }

  async fn compare_and_set_status(&self, change: StatusChange) -> StoreResult<CasOutcome> {
    self.cas_calls.fetch_add(1, Ordering::SeqCst);
    let racing = self.racing_writes.lock().pop_front();
    if let Some(target) = racing {
      let current = self.inner.get_order(change.order_id).await?.map(|o| o.status_on(target.axis()));
      if let Some(current) = current {
        let outcome = self
          .inner
          .compare_and_set_status(StatusChange {
            order_id: change.order_id,
            expected: current,
            target,
            actor: Actor::operator("racer"),
            note: None,
            at: Utc::now(),
          })
          .await?;
        assert!(matches!(outcome, CasOutcome::Applied { .. }), "racing write must land");
      }
    }

    let forced = self
      .forced_conflicts
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if forced {
      if let Some(order) = self.inner.get_order(change.order_id).await? {
        return Ok(CasOutcome::Conflict { order });
      }
    }
    self.inner.compare_and_set_status(change).await
  }

  async fn record_reminder(
    &self,
    order_id: Uuid,
    level: ReminderLevel,
    actor: Actor,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> StoreResult<ReminderRecord> {
    self.inner.record_reminder(order_id, level, actor, note, at).await
  }

  async fn unpaid_orders_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Order>> {
    self.inner.unpaid_orders_created_before(cutoff).await
  }

  async fn search_orders(&self, query: &str, limit: i64) -> StoreResult<Vec<Order>> {
    self.inner.search_orders(query, limit).await
  }

  async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
    self.inner.find_by_reference(reference).await
  }

  async fn set_tracking_number(
    &self,
    order_id: Uuid,
    tracking_number: &str,
    at: DateTime<Utc>,
  ) -> StoreResult<Option<Order>> {
    self.inner.set_tracking_number(order_id, tracking_number, at).await
  }

  async fn attach_receipt(&self, order_id: Uuid, receipt_url: &str, at: DateTime<Utc>) -> StoreResult<Option<Order>> {
    self.inner.attach_receipt(order_id, receipt_url, at).await
  }
}

async fn racing_setup(configure: impl FnOnce(RacingStore) -> RacingStore) -> (Arc<RacingStore>, TransitionEngine, Order) {
  setup_tracing();
  let inner = Arc::new(InMemoryOrderStore::new());
  let order = seed_order(inner.as_ref(), Utc::now(), None).await;
  let store = Arc::new(configure(RacingStore::new(inner)));
  let engine = TransitionEngine::new(store.clone(), Vec::new(), TransitionConfig::default());
  (store, engine, order)
}

#[tokio::test]
async fn racing_writer_reaching_the_target_first_yields_unchanged() {
  let (store, engine, order) = racing_setup(|s| s.race_with(paid())).await;

  let outcome = engine
    .apply(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap();
  assert!(matches!(outcome, TransitionOutcome::Unchanged { .. }));
  assert_eq!(outcome.order().payment_status, PaymentStatus::Paid);

  let history = store.status_history(order.id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].actor, "operator:racer");
}

#[tokio::test]
async fn racing_writer_moving_to_an_incompatible_status_rejects_the_transition() {
  let (store, engine, order) = racing_setup(|s| s.race_with(paid())).await;

  let err = engine
    .apply(TransitionRequest::new(
      order.id,
      AxisStatus::Payment(PaymentStatus::Failed),
      operator(),
    ))
    .await
    .unwrap_err();
  assert!(
    matches!(err, OrderflowError::InvalidTransition { ref from, ref to, .. } if from == "paid" && to == "failed"),
    "unexpected error: {err:?}"
  );
  assert_eq!(store.status_history(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn conflict_is_retried_against_the_observed_status() {
  let (store, engine, order) = racing_setup(|s| s.race_with(order_status(OrderStatus::Processing))).await;

  let outcome = engine
    .apply(TransitionRequest::new(order.id, order_status(OrderStatus::Cancelled), operator()))
    .await
    .unwrap();
  let TransitionOutcome::Applied { order: updated, entry } = outcome else {
    panic!("cancellation from processing should apply");
  };
  assert_eq!(updated.order_status, OrderStatus::Cancelled);
  assert_eq!(entry.old_status.as_deref(), Some("processing"));
  assert_eq!(store.cas_calls.load(Ordering::SeqCst), 2);
  assert_eq!(store.status_history(order.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn persistent_conflicts_give_up_with_concurrent_modification() {
  let max_attempts = TransitionConfig::default().max_attempts;
  let (store, engine, order) = racing_setup(|s| s.conflict_times(usize::MAX)).await;

  let err = engine
    .apply(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap_err();
  match err {
    OrderflowError::ConcurrentModification { order_id, attempts } => {
      assert_eq!(order_id, order.id);
      assert_eq!(attempts, max_attempts);
    }
    other => panic!("expected ConcurrentModification, got {other:?}"),
  }
  assert_eq!(store.cas_calls.load(Ordering::SeqCst), max_attempts as usize);
  assert!(store.status_history(order.id).await.unwrap().is_empty());
  assert_eq!(
    store.get_order(order.id).await.unwrap().unwrap().payment_status,
    PaymentStatus::Pending
  );
}

#[tokio::test]
async fn conflicts_below_the_attempt_limit_still_apply() {
  let (store, engine, order) = racing_setup(|s| s.conflict_times(2)).await;

  let outcome = engine
    .apply(TransitionRequest::new(order.id, paid(), operator()))
    .await
    .unwrap();
  assert!(outcome.is_applied());
  assert_eq!(store.cas_calls.load(Ordering::SeqCst), 3);
  assert_eq!(store.status_history(order.id).await.unwrap().len(), 1);
}
