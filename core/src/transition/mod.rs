// orderflow/src/transition/mod.rs

//! Status Transition Engine.
//!
//! Each call to [`TransitionEngine::apply`] runs a four-step pipeline:
//!
//! 1. `load_order`: fetch the order or fail with `NotFound`.
//! 2. `validate_transition`: state-machine check; an idempotent request stops here.
//! 3. `persist_transition`: compare-and-set on the axis column plus one ledger row, retried
//!    against the freshly observed status when another writer got there first.
//! 4. `notify_transition` (optional): hand the committed change to every `TransitionHook`.
//!    Hook failures and timeouts are logged and never undo the write.

pub mod rules;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::error::{OrderflowError, OrderflowResult, PipelineError};
use crate::model::{Actor, AxisStatus, Order, StatusHistoryEntry};
use crate::pipeline::{ContextData, Pipeline, PipelineControl, SkipCondition};
use crate::store::{CasOutcome, OrderStore, StatusChange};

pub use rules::{check_transition, is_allowed, is_terminal, TransitionMode, Verdict};

const STEP_LOAD: &str = "load_order";
const STEP_VALIDATE: &str = "validate_transition";
const STEP_PERSIST: &str = "persist_transition";
const STEP_NOTIFY: &str = "notify_transition";

#[derive(Debug, Clone)]
pub struct TransitionRequest {
  pub order_id: Uuid,
  pub target: AxisStatus,
  pub actor: Actor,
  pub note: Option<String>,
  pub mode: TransitionMode,
}

impl TransitionRequest {
  pub fn new(order_id: Uuid, target: AxisStatus, actor: Actor) -> Self {
    Self {
      order_id,
      target,
      actor,
      note: None,
      mode: TransitionMode::Normal,
    }
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    let note = note.into();
    self.note = if note.trim().is_empty() { None } else { Some(note) };
    self
  }

  pub fn as_override(mut self) -> Self {
    self.mode = TransitionMode::Override;
    self
  }
}

#[derive(Debug, Clone)]
pub enum TransitionOutcome {
  /// Status written and exactly one ledger row appended.
  Applied { order: Order, entry: StatusHistoryEntry },
  /// The order already held the target status; nothing was written.
  Unchanged { order: Order },
}

impl TransitionOutcome {
  pub fn order(&self) -> &Order {
    match self {
      TransitionOutcome::Applied { order, .. } | TransitionOutcome::Unchanged { order } => order,
    }
  }

  pub fn into_order(self) -> Order {
    match self {
      TransitionOutcome::Applied { order, .. } | TransitionOutcome::Unchanged { order } => order,
    }
  }

  pub fn is_applied(&self) -> bool {
    matches!(self, TransitionOutcome::Applied { .. })
  }
}

/// A committed status change, as handed to hooks.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
  pub order: Order,
  pub entry: StatusHistoryEntry,
  pub previous: AxisStatus,
  pub reached: AxisStatus,
}

/// Side effect run after a transition committed.
#[async_trait]
pub trait TransitionHook: Send + Sync {
  fn name(&self) -> &'static str;

  async fn on_transition(&self, event: TransitionEvent) -> OrderflowResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookMode {
  /// Hooks run on a spawned task; `apply` returns as soon as the write committed.
  #[default]
  Detached,
  /// Hooks are awaited (still time-boxed) before `apply` returns.
  Inline,
}

#[derive(Debug, Clone)]
pub struct TransitionConfig {
  pub hook_mode: HookMode,
  pub notify_timeout: Duration,
  pub max_attempts: u32,
}

impl Default for TransitionConfig {
  fn default() -> Self {
    Self {
      hook_mode: HookMode::Detached,
      notify_timeout: Duration::from_secs(5),
      max_attempts: 3,
    }
  }
}

/// Per-call pipeline state.
#[derive(Debug)]
pub struct TransitionContext {
  pub request: TransitionRequest,
  pub requested_at: DateTime<Utc>,
  pub loaded: Option<Order>,
  pub attempts: u32,
  pub previous: Option<AxisStatus>,
  pub outcome: Option<TransitionOutcome>,
}

impl TransitionContext {
  fn new(request: TransitionRequest) -> Self {
    Self {
      request,
      requested_at: Utc::now(),
      loaded: None,
      attempts: 0,
      previous: None,
      outcome: None,
    }
  }
}

pub struct TransitionEngine {
  pipeline: Pipeline<TransitionContext, OrderflowError>,
}

impl TransitionEngine {
  pub fn new(store: Arc<dyn OrderStore>, hooks: Vec<Arc<dyn TransitionHook>>, config: TransitionConfig) -> Self {
    let skip_unless_applied: SkipCondition<TransitionContext> =
      Arc::new(|ctx: &TransitionContext| !matches!(ctx.outcome, Some(TransitionOutcome::Applied { .. })));

    let mut pipeline = Pipeline::new(&[
      (STEP_LOAD, false, None),
      (STEP_VALIDATE, false, None),
      (STEP_PERSIST, false, None),
      (STEP_NOTIFY, true, Some(skip_unless_applied)),
    ]);

    let load_store = store.clone();
    pipeline.on_root(STEP_LOAD, move |ctx| load_order(load_store.clone(), ctx));
    pipeline.on_root(STEP_VALIDATE, validate_transition);
    let max_attempts = config.max_attempts.max(1);
    pipeline.on_root(STEP_PERSIST, move |ctx| persist_transition(store.clone(), max_attempts, ctx));
    if !hooks.is_empty() {
      let hooks: Arc<[Arc<dyn TransitionHook>]> = hooks.into();
      let config = config.clone();
      pipeline.on_root(STEP_NOTIFY, move |ctx| notify_transition(hooks.clone(), config.clone(), ctx));
    }

    Self { pipeline }
  }

  /// Validates and applies one status change.
  #[instrument(
    name = "TransitionEngine::apply",
    skip_all,
    fields(order_id = %request.order_id, target = %request.target, actor = %request.actor)
  )]
  pub async fn apply(&self, request: TransitionRequest) -> OrderflowResult<TransitionOutcome> {
    let ctx = ContextData::new(TransitionContext::new(request));
    self.pipeline.run(ctx.clone()).await?;

    let outcome = ctx.update(|c| c.outcome.take());
    outcome.ok_or_else(|| {
      OrderflowError::from(PipelineError::MissingOutput {
        step_name: STEP_PERSIST.to_string(),
        missing: "outcome".to_string(),
      })
    })
  }
}

async fn load_order(store: Arc<dyn OrderStore>, ctx: ContextData<TransitionContext>) -> OrderflowResult<PipelineControl> {
  let order_id = ctx.with(|c| c.request.order_id);
  let order = store
    .get_order(order_id)
    .await?
    .ok_or(OrderflowError::NotFound(order_id))?;
  ctx.update(|c| c.loaded = Some(order));
  Ok(PipelineControl::Continue)
}

async fn validate_transition(ctx: ContextData<TransitionContext>) -> OrderflowResult<PipelineControl> {
  let mut guard = ctx.write();
  let c = &mut *guard;
  let order = c.loaded.as_ref().ok_or_else(|| PipelineError::MissingOutput {
    step_name: STEP_LOAD.to_string(),
    missing: "order".to_string(),
  })?;
  let current = order.status_on(c.request.target.axis());

  match check_transition(order.id, current, c.request.target, c.request.mode) {
    Ok(Verdict::Unchanged) => {
      debug!("Transition (Order {}): already {}, nothing to write.", order.short_id(), current);
      c.outcome = Some(TransitionOutcome::Unchanged { order: order.clone() });
      Ok(PipelineControl::Stop)
    }
    Ok(Verdict::Proceed) => {
      c.previous = Some(current);
      Ok(PipelineControl::Continue)
    }
    Err(e) => {
      warn!("Transition (Order {}): rejected: {}", order.short_id(), e);
      Err(e)
    }
  }
}

async fn persist_transition(
  store: Arc<dyn OrderStore>,
  max_attempts: u32,
  ctx: ContextData<TransitionContext>,
) -> OrderflowResult<PipelineControl> {
  let (request, previous) = ctx.with(|c| (c.request.clone(), c.previous));
  let mut expected = previous.ok_or_else(|| PipelineError::MissingOutput {
    step_name: STEP_VALIDATE.to_string(),
    missing: "previous status".to_string(),
  })?;
  let axis = request.target.axis();

  for attempt in 1..=max_attempts {
    ctx.update(|c| c.attempts = attempt);
    let change = StatusChange {
      order_id: request.order_id,
      expected,
      target: request.target,
      actor: request.actor.clone(),
      note: request.note.clone(),
      at: Utc::now(),
    };

    match store.compare_and_set_status(change).await? {
      CasOutcome::Applied { order, entry } => {
        info!(
          "Transition (Order {}): {} {} -> {} by {}.",
          order.short_id(),
          axis,
          expected.as_str(),
          request.target.as_str(),
          request.actor
        );
        ctx.update(|c| {
          c.previous = Some(expected);
          c.outcome = Some(TransitionOutcome::Applied { order, entry });
        });
        return Ok(PipelineControl::Continue);
      }
      CasOutcome::Conflict { order } => {
        let observed = order.status_on(axis);
        if observed == request.target {
          debug!(
            "Transition (Order {}): a concurrent writer already reached {}.",
            order.short_id(),
            observed
          );
          ctx.update(|c| c.outcome = Some(TransitionOutcome::Unchanged { order }));
          return Ok(PipelineControl::Continue);
        }
        debug!(attempt, %observed, "Status moved underneath the transition; re-validating.");
        check_transition(order.id, observed, request.target, request.mode)?;
        expected = observed;
      }
      CasOutcome::Missing => return Err(OrderflowError::NotFound(request.order_id)),
    }
  }

  warn!(order_id = %request.order_id, attempts = max_attempts, "Transition gave up after repeated conflicts.");
  Err(OrderflowError::ConcurrentModification {
    order_id: request.order_id,
    attempts: max_attempts,
  })
}

async fn notify_transition(
  hooks: Arc<[Arc<dyn TransitionHook>]>,
  config: TransitionConfig,
  ctx: ContextData<TransitionContext>,
) -> OrderflowResult<PipelineControl> {
  let event = ctx.with(|c| match (&c.outcome, c.previous) {
    (Some(TransitionOutcome::Applied { order, entry }), Some(previous)) => Some(TransitionEvent {
      order: order.clone(),
      entry: entry.clone(),
      previous,
      reached: c.request.target,
    }),
    _ => None,
  });
  let Some(event) = event else {
    return Ok(PipelineControl::Continue);
  };

  match config.hook_mode {
    HookMode::Detached => {
      for hook in hooks.iter() {
        let hook = Arc::clone(hook);
        let event = event.clone();
        let timeout = config.notify_timeout;
        tokio::spawn(
          async move {
            if let Err(e) = run_hook(hook.as_ref(), event, timeout).await {
              warn!(hook = hook.name(), error = %e, "Detached transition hook failed.");
            }
          }
          .in_current_span(),
        );
      }
      Ok(PipelineControl::Continue)
    }
    HookMode::Inline => {
      let mut failures = Vec::new();
      for hook in hooks.iter() {
        if let Err(e) = run_hook(hook.as_ref(), event.clone(), config.notify_timeout).await {
          failures.push(format!("{}: {}", hook.name(), e));
        }
      }
      if failures.is_empty() {
        Ok(PipelineControl::Continue)
      } else {
        Err(OrderflowError::NotificationDelivery(failures.join("; ")))
      }
    }
  }
}

async fn run_hook(hook: &dyn TransitionHook, event: TransitionEvent, timeout: Duration) -> OrderflowResult<()> {
  match tokio::time::timeout(timeout, hook.on_transition(event)).await {
    Ok(result) => result,
    Err(_) => Err(OrderflowError::NotificationDelivery(format!(
      "hook '{}' timed out after {:?}",
      hook.name(),
      timeout
    ))),
  }
}
