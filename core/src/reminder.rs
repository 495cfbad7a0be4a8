// orderflow/src/reminder.rs

//! Reminder Escalation Job.
//!
//! Thresholds are measured from `created_at`, and the ledger is the dedupe index: a
//! `reminder` row with `new_status = <level>` means that level was delivered. Running the
//! sweep any number of times, at any cadence, converges to one reminder per level per order.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{OrderflowError, OrderflowResult, PipelineError};
use crate::model::{Actor, Order, ReminderLevel, StatusType};
use crate::notify::{ChannelOutcome, Dispatcher, NotificationRequest};
use crate::pipeline::{ContextData, Pipeline, PipelineControl};
use crate::store::{OrderStore, ReminderRecord};

const STEP_SELECT: &str = "select_candidates";
const STEP_SEND: &str = "send_reminders";

pub const REMINDER_ACTOR: &str = "reminder_job";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderThresholds {
  pub first: Duration,
  pub urgent: Duration,
}

impl Default for ReminderThresholds {
  fn default() -> Self {
    Self {
      first: Duration::hours(48),
      urgent: Duration::hours(72),
    }
  }
}

/// Which reminder, if any, is due. The urgent level wins whenever it is due, even if the first
/// reminder was never sent.
pub fn decide(elapsed: Duration, already_sent: &[ReminderLevel], thresholds: &ReminderThresholds) -> Option<ReminderLevel> {
  if elapsed >= thresholds.urgent {
    return (!already_sent.contains(&ReminderLevel::UrgentReminder)).then_some(ReminderLevel::UrgentReminder);
  }
  if elapsed >= thresholds.first && !already_sent.contains(&ReminderLevel::FirstReminder) {
    return Some(ReminderLevel::FirstReminder);
  }
  None
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentReminder {
  pub order_id: Uuid,
  pub level: ReminderLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderFailure {
  pub order_id: Uuid,
  pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
  pub sent: usize,
  pub skipped: usize,
  pub errors: Vec<ReminderFailure>,
  pub reminders: Vec<SentReminder>,
}

#[derive(Debug)]
pub struct ReminderSweep {
  pub now: DateTime<Utc>,
  pub candidates: Vec<Order>,
  pub report: ReminderReport,
}

pub struct ReminderJob {
  pipeline: Pipeline<ReminderSweep, OrderflowError>,
}

impl ReminderJob {
  pub fn new(store: Arc<dyn OrderStore>, dispatcher: Arc<Dispatcher>, thresholds: ReminderThresholds) -> Self {
    let mut pipeline = Pipeline::new(&[(STEP_SELECT, false, None), (STEP_SEND, false, None)]);

    let select_store = store.clone();
    pipeline.on_root(STEP_SELECT, move |ctx| {
      select_candidates(select_store.clone(), thresholds, ctx)
    });
    pipeline.on_root(STEP_SEND, move |ctx| {
      send_reminders(store.clone(), dispatcher.clone(), thresholds, ctx)
    });

    Self { pipeline }
  }

  pub async fn run(&self) -> OrderflowResult<ReminderReport> {
    self.run_at(Utc::now()).await
  }

  /// One sweep with `now` as the reference time.
  #[instrument(name = "ReminderJob::run", skip(self))]
  pub async fn run_at(&self, now: DateTime<Utc>) -> OrderflowResult<ReminderReport> {
    let ctx = ContextData::new(ReminderSweep {
      now,
      candidates: Vec::new(),
      report: ReminderReport::default(),
    });
    self.pipeline.run(ctx.clone()).await?;

    let report = ctx.update(|s| std::mem::take(&mut s.report));
    info!(
      sent = report.sent,
      skipped = report.skipped,
      errors = report.errors.len(),
      "Reminder sweep finished."
    );
    Ok(report)
  }
}

async fn select_candidates(
  store: Arc<dyn OrderStore>,
  thresholds: ReminderThresholds,
  ctx: ContextData<ReminderSweep>,
) -> OrderflowResult<PipelineControl> {
  let now = ctx.with(|s| s.now);
  let cutoff = now - thresholds.first;
  let candidates = store.unpaid_orders_created_before(cutoff).await?;
  info!(candidates = candidates.len(), %cutoff, "Reminder sweep candidates selected.");

  if candidates.is_empty() {
    return Ok(PipelineControl::Stop);
  }
  ctx.update(|s| s.candidates = candidates);
  Ok(PipelineControl::Continue)
}

async fn send_reminders(
  store: Arc<dyn OrderStore>,
  dispatcher: Arc<Dispatcher>,
  thresholds: ReminderThresholds,
  ctx: ContextData<ReminderSweep>,
) -> OrderflowResult<PipelineControl> {
  let (now, candidates) = ctx.update(|s| (s.now, std::mem::take(&mut s.candidates)));
  if candidates.is_empty() {
    return Err(
      PipelineError::MissingOutput {
        step_name: STEP_SELECT.to_string(),
        missing: "candidates".to_string(),
      }
      .into(),
    );
  }

  for order in candidates {
    let order_id = order.id;
    match remind_one(store.as_ref(), &dispatcher, &thresholds, now, order).await {
      Ok(Some(level)) => ctx.update(|s| {
        s.report.sent += 1;
        s.report.reminders.push(SentReminder { order_id, level });
      }),
      Ok(None) => ctx.update(|s| s.report.skipped += 1),
      Err(e) => {
        warn!(%order_id, error = %e, "Reminder for order failed; continuing sweep.");
        ctx.update(|s| {
          s.report.errors.push(ReminderFailure {
            order_id,
            error: e.to_string(),
          })
        });
      }
    }
  }
  Ok(PipelineControl::Continue)
}

/// `Ok(Some(level))` when a reminder was delivered and recorded, `Ok(None)` when nothing was due.
async fn remind_one(
  store: &dyn OrderStore,
  dispatcher: &Dispatcher,
  thresholds: &ReminderThresholds,
  now: DateTime<Utc>,
  order: Order,
) -> OrderflowResult<Option<ReminderLevel>> {
  let history = store.status_history(order.id).await?;
  let sent: Vec<ReminderLevel> = history
    .iter()
    .filter(|e| e.status_type == StatusType::Reminder)
    .filter_map(|e| ReminderLevel::parse(&e.new_status))
    .collect();

  let Some(level) = decide(now - order.created_at, &sent, thresholds) else {
    return Ok(None);
  };

  let items = store.order_items(order.id).await?;
  let request = NotificationRequest::for_order(level.into(), &order, &items);
  let report = dispatcher.dispatch(&request).await;

  let message_id = match &report.email {
    ChannelOutcome::Sent { message_id } => message_id.clone(),
    ChannelOutcome::Failed { error, .. } => {
      return Err(OrderflowError::NotificationDelivery(format!("{} email failed: {}", level, error)));
    }
    other => {
      return Err(OrderflowError::NotificationDelivery(format!(
        "{} email not sent: {:?}",
        level, other
      )));
    }
  };

  let note = Some(format!("email {}", message_id));
  match store
    .record_reminder(order.id, level, Actor::system(REMINDER_ACTOR), note, now)
    .await?
  {
    ReminderRecord::Recorded(_) => {
      info!("Reminder (Order {}): {} sent.", order.short_id(), level);
      Ok(Some(level))
    }
    ReminderRecord::AlreadyRecorded => {
      warn!("Reminder (Order {}): {} was recorded by an overlapping run.", order.short_id(), level);
      Ok(None)
    }
  }
}
