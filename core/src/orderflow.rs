// orderflow/src/orderflow.rs

//! `Orderflow`: every component wired against one store, plus the operator operations that
//! sit directly on the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::checkout::{Checkout, CheckoutReceipt, CheckoutRequest};
use crate::error::{OrderflowError, OrderflowResult};
use crate::links::ActionLinks;
use crate::model::{Order, OrderItem, StatusHistoryEntry};
use crate::notify::{
  DispatchReport, Dispatcher, EmailSender, LogEmailSender, NotificationRequest, NotifyOnTransition, WhatsAppSender,
};
use crate::reminder::{ReminderJob, ReminderReport};
use crate::remote::{ActionPage, ActionQuery, RemoteActions};
use crate::settings::OrderflowSettings;
use crate::store::OrderStore;
use crate::tracking::{TrackingLookup, TrackingView};
use crate::transition::{TransitionEngine, TransitionHook, TransitionOutcome, TransitionRequest};

pub const DEFAULT_SEARCH_LIMIT: i64 = 50;

/// An order with its items and full ledger, oldest entry first.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
  pub order: Order,
  pub items: Vec<OrderItem>,
  pub history: Vec<StatusHistoryEntry>,
}

pub struct OrderflowBuilder {
  store: Arc<dyn OrderStore>,
  settings: OrderflowSettings,
  email: Option<Arc<dyn EmailSender>>,
  whatsapp: Option<Arc<dyn WhatsAppSender>>,
  hooks: Vec<Arc<dyn TransitionHook>>,
}

impl OrderflowBuilder {
  pub fn settings(mut self, settings: OrderflowSettings) -> Self {
    self.settings = settings;
    self
  }

  pub fn email_sender(mut self, sender: Arc<dyn EmailSender>) -> Self {
    self.email = Some(sender);
    self
  }

  pub fn whatsapp_sender(mut self, sender: Arc<dyn WhatsAppSender>) -> Self {
    self.whatsapp = Some(sender);
    self
  }

  /// Extra hook, run after the built-in customer notification hook.
  pub fn hook(mut self, hook: Arc<dyn TransitionHook>) -> Self {
    self.hooks.push(hook);
    self
  }

  pub fn build(self) -> Orderflow {
    let OrderflowBuilder {
      store,
      settings,
      email,
      whatsapp,
      hooks: extra_hooks,
    } = self;

    let links = settings.action_links();
    let email = email.unwrap_or_else(|| Arc::new(LogEmailSender) as Arc<dyn EmailSender>);
    let mut dispatcher = Dispatcher::new(email, links.clone(), settings.dispatcher_config());
    if let Some(whatsapp) = whatsapp {
      dispatcher = dispatcher.with_whatsapp(whatsapp);
    }
    let dispatcher = Arc::new(dispatcher);

    let notify: Arc<dyn TransitionHook> = Arc::new(NotifyOnTransition::new(store.clone(), dispatcher.clone()));
    let mut hooks = vec![notify];
    hooks.extend(extra_hooks);

    let engine = Arc::new(TransitionEngine::new(store.clone(), hooks, settings.transition_config()));
    let checkout = Checkout::new(store.clone(), dispatcher.clone(), settings.checkout_config());
    let reminders = ReminderJob::new(store.clone(), dispatcher.clone(), settings.reminder_thresholds);
    let tracking = TrackingLookup::new(store.clone());
    let remote = RemoteActions::new(store.clone(), engine.clone(), links.clone());

    Orderflow {
      store,
      dispatcher,
      engine,
      checkout,
      reminders,
      tracking,
      remote,
      links,
    }
  }
}

pub struct Orderflow {
  store: Arc<dyn OrderStore>,
  dispatcher: Arc<Dispatcher>,
  engine: Arc<TransitionEngine>,
  checkout: Checkout,
  reminders: ReminderJob,
  tracking: TrackingLookup,
  remote: RemoteActions,
  links: ActionLinks,
}

impl Orderflow {
  pub fn builder(store: Arc<dyn OrderStore>) -> OrderflowBuilder {
    OrderflowBuilder {
      store,
      settings: OrderflowSettings::default(),
      email: None,
      whatsapp: None,
      hooks: Vec::new(),
    }
  }

  pub fn links(&self) -> &ActionLinks {
    &self.links
  }

  pub async fn submit_checkout(&self, request: CheckoutRequest) -> OrderflowResult<CheckoutReceipt> {
    self.checkout.submit(request).await
  }

  pub async fn apply_transition(&self, request: TransitionRequest) -> OrderflowResult<TransitionOutcome> {
    self.engine.apply(request).await
  }

  pub async fn handle_remote_action(&self, query: &ActionQuery) -> ActionPage {
    self.remote.handle(query).await
  }

  pub async fn track(&self, reference: &str) -> OrderflowResult<Option<TrackingView>> {
    self.tracking.lookup(reference).await
  }

  pub async fn run_reminders(&self) -> OrderflowResult<ReminderReport> {
    self.reminders.run().await
  }

  pub async fn run_reminders_at(&self, now: DateTime<Utc>) -> OrderflowResult<ReminderReport> {
    self.reminders.run_at(now).await
  }

  /// The notification send interface. Never fails; unknown types come back as a no-op report.
  pub async fn send_notification(&self, request: &NotificationRequest) -> DispatchReport {
    self.dispatcher.dispatch(request).await
  }

  pub async fn order_details(&self, order_id: Uuid) -> OrderflowResult<OrderDetails> {
    let order = self
      .store
      .get_order(order_id)
      .await?
      .ok_or(OrderflowError::NotFound(order_id))?;
    let items = self.store.order_items(order_id).await?;
    let history = self.store.status_history(order_id).await?;
    Ok(OrderDetails { order, items, history })
  }

  pub async fn search_orders(&self, query: &str, limit: Option<i64>) -> OrderflowResult<Vec<Order>> {
    let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, 500);
    Ok(self.store.search_orders(query, limit).await?)
  }

  #[instrument(skip(self))]
  pub async fn set_tracking_number(&self, order_id: Uuid, tracking_number: &str) -> OrderflowResult<Order> {
    let tracking_number = tracking_number.trim();
    if tracking_number.is_empty() {
      return Err(OrderflowError::Validation("tracking number cannot be empty".to_string()));
    }
    let order = self
      .store
      .set_tracking_number(order_id, tracking_number, Utc::now())
      .await?
      .ok_or(OrderflowError::NotFound(order_id))?;
    info!("Order {}: tracking number set.", order.short_id());
    Ok(order)
  }

  #[instrument(skip(self))]
  pub async fn attach_receipt(&self, order_id: Uuid, receipt_url: &str) -> OrderflowResult<Order> {
    let receipt_url = receipt_url.trim();
    if receipt_url.is_empty() {
      return Err(OrderflowError::Validation("receipt reference cannot be empty".to_string()));
    }
    let order = self
      .store
      .attach_receipt(order_id, receipt_url, Utc::now())
      .await?
      .ok_or(OrderflowError::NotFound(order_id))?;
    info!("Order {}: payment receipt attached.", order.short_id());
    Ok(order)
  }
}
