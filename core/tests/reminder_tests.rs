// tests/reminder_tests.rs
mod common;

use chrono::{Duration, Utc};
use common::*;
use orderflow::model::{AxisStatus, OrderStatus, PaymentStatus, ReminderLevel, StatusType};
use orderflow::store::OrderStore;
use orderflow::{InMemoryOrderStore, Orderflow, TransitionRequest};
use std::sync::Arc;

async fn reminder_entries(store: &dyn OrderStore, order_id: uuid::Uuid) -> Vec<String> {
  store
    .status_history(order_id)
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.status_type == StatusType::Reminder)
    .map(|e| e.new_status)
    .collect()
}

#[tokio::test]
async fn fifty_hour_old_order_gets_one_first_reminder() {
  let h = harness();
  let now = Utc::now();
  let order = seed_order(h.store.as_ref(), now - Duration::hours(50), Some("ana@example.com")).await;

  let report = h.flow.run_reminders_at(now).await.unwrap();
  assert_eq!(report.sent, 1);
  assert!(report.errors.is_empty());
  assert_eq!(report.reminders[0].level, ReminderLevel::FirstReminder);
  assert_eq!(reminder_entries(h.store.as_ref(), order.id).await, vec!["first_reminder"]);
  assert_eq!(h.email.count(), 1);
  assert!(h.email.messages()[0].subject.contains("awaiting payment"));

  let rerun = h.flow.run_reminders_at(now + Duration::minutes(30)).await.unwrap();
  assert_eq!(rerun.sent, 0);
  assert_eq!(rerun.skipped, 1);
  assert_eq!(reminder_entries(h.store.as_ref(), order.id).await.len(), 1);
  assert_eq!(h.email.count(), 1);
}

#[tokio::test]
async fn eighty_hour_old_order_goes_straight_to_urgent() {
  let h = harness();
  let now = Utc::now();
  let order = seed_order(h.store.as_ref(), now - Duration::hours(80), Some("ana@example.com")).await;

  let report = h.flow.run_reminders_at(now).await.unwrap();
  assert_eq!(report.sent, 1);
  assert_eq!(reminder_entries(h.store.as_ref(), order.id).await, vec!["urgent_reminder"]);

  // Later runs never backfill the skipped first reminder.
  let later = h.flow.run_reminders_at(now + Duration::hours(24)).await.unwrap();
  assert_eq!(later.sent, 0);
  assert_eq!(reminder_entries(h.store.as_ref(), order.id).await, vec!["urgent_reminder"]);
}

#[tokio::test]
async fn escalation_over_time_yields_one_entry_per_level() {
  let h = harness();
  let created = Utc::now() - Duration::hours(100);
  let order = seed_order(h.store.as_ref(), created, Some("ana@example.com")).await;

  for hours in [10, 47, 48, 49, 60, 71, 72, 73, 96, 200] {
    h.flow.run_reminders_at(created + Duration::hours(hours)).await.unwrap();
  }
  let entries = reminder_entries(h.store.as_ref(), order.id).await;
  assert_eq!(entries, vec!["first_reminder", "urgent_reminder"]);

  let history = h.store.status_history(order.id).await.unwrap();
  let urgent = history.iter().find(|e| e.new_status == "urgent_reminder").unwrap();
  assert_eq!(urgent.old_status.as_deref(), Some("first_reminder"));
  assert_eq!(urgent.actor, "system:reminder_job");
}

#[tokio::test]
async fn paid_cancelled_young_and_emailless_orders_are_left_alone() {
  let h = harness();
  let now = Utc::now();
  let paid = seed_order(h.store.as_ref(), now - Duration::hours(60), Some("paid@example.com")).await;
  h.flow
    .apply_transition(TransitionRequest::new(paid.id, AxisStatus::Payment(PaymentStatus::Paid), operator()))
    .await
    .unwrap();
  let cancelled = seed_order(h.store.as_ref(), now - Duration::hours(60), Some("gone@example.com")).await;
  h.flow
    .apply_transition(TransitionRequest::new(
      cancelled.id,
      AxisStatus::Order(OrderStatus::Cancelled),
      operator(),
    ))
    .await
    .unwrap();
  seed_order(h.store.as_ref(), now - Duration::hours(10), Some("young@example.com")).await;
  seed_order(h.store.as_ref(), now - Duration::hours(90), None).await;
  let emails_before = h.email.count();

  let report = h.flow.run_reminders_at(now).await.unwrap();
  assert_eq!(report.sent, 0);
  assert_eq!(report.skipped, 0);
  assert!(report.errors.is_empty());
  assert_eq!(h.email.count(), emails_before);
}

#[tokio::test]
async fn one_bad_address_does_not_abort_the_sweep() {
  setup_tracing();
  let store = Arc::new(InMemoryOrderStore::new());
  let recorder = RecordingEmailSender::new();
  let flow = Orderflow::builder(store.clone())
    .settings(inline_settings())
    .email_sender(Arc::new(SelectiveEmailSender {
      bad_address: "bounce@example.com".to_string(),
      inner: recorder.clone(),
    }))
    .build();
  let now = Utc::now();
  let good_a = seed_order(store.as_ref(), now - Duration::hours(55), Some("a@example.com")).await;
  let bad = seed_order(store.as_ref(), now - Duration::hours(54), Some("bounce@example.com")).await;
  let good_b = seed_order(store.as_ref(), now - Duration::hours(75), Some("b@example.com")).await;

  let report = flow.run_reminders_at(now).await.unwrap();
  assert_eq!(report.sent, 2);
  assert_eq!(report.errors.len(), 1);
  assert_eq!(report.errors[0].order_id, bad.id);
  assert_eq!(recorder.count(), 2);

  assert_eq!(reminder_entries(store.as_ref(), good_a.id).await, vec!["first_reminder"]);
  assert_eq!(reminder_entries(store.as_ref(), good_b.id).await, vec!["urgent_reminder"]);
  // Not recorded, so the next run tries again.
  assert!(reminder_entries(store.as_ref(), bad.id).await.is_empty());
}

#[tokio::test]
async fn unavailable_store_fails_the_sweep() {
  let h = harness();
  h.store.set_unavailable(true);
  assert!(h.flow.run_reminders().await.is_err());
}
