// orderflow/src/notify/mod.rs

//! Notification Dispatcher.
//!
//! Maps an event plus order context to at most one email and one WhatsApp message. Every
//! channel failure is caught here and downgraded to a manual draft for the operator;
//! [`Dispatcher::dispatch`] cannot fail.

pub mod email;
pub mod hook;
pub mod templates;
pub mod whatsapp;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::links::ActionLinks;
use crate::model::{AxisStatus, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ReminderLevel};

pub use email::{EmailMessage, EmailSender, HttpEmailConfig, HttpEmailSender, LogEmailSender};
pub use hook::NotifyOnTransition;
pub use templates::{format_money, Rendered, TemplateContext};
pub use whatsapp::{HttpWhatsAppConfig, HttpWhatsAppSender, WhatsAppSender};

/// Channel-level failure. Never leaves the dispatcher.
#[derive(Debug, Error)]
pub enum DeliveryError {
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Provider rejected the message (status {status}): {body}")]
  Rejected { status: u16, body: String },

  #[error("Timed out after {0:?}")]
  Timeout(Duration),

  #[error("Channel misconfigured: {0}")]
  Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  OrderCreated,
  PaymentConfirmed,
  OrderShipped,
  FirstReminder,
  UrgentReminder,
}

impl NotificationKind {
  pub fn as_str(self) -> &'static str {
    match self {
      NotificationKind::OrderCreated => "order_created",
      NotificationKind::PaymentConfirmed => "payment_confirmed",
      NotificationKind::OrderShipped => "order_shipped",
      NotificationKind::FirstReminder => "first_reminder",
      NotificationKind::UrgentReminder => "urgent_reminder",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    match value.trim() {
      "order_created" => Some(NotificationKind::OrderCreated),
      "payment_confirmed" => Some(NotificationKind::PaymentConfirmed),
      "order_shipped" => Some(NotificationKind::OrderShipped),
      "first_reminder" => Some(NotificationKind::FirstReminder),
      "urgent_reminder" => Some(NotificationKind::UrgentReminder),
      _ => None,
    }
  }

  /// The notification a status reached by a transition triggers, if any.
  pub fn for_transition(reached: AxisStatus) -> Option<Self> {
    match reached {
      AxisStatus::Payment(PaymentStatus::Paid) => Some(NotificationKind::PaymentConfirmed),
      AxisStatus::Order(OrderStatus::Shipped) => Some(NotificationKind::OrderShipped),
      _ => None,
    }
  }
}

impl From<ReminderLevel> for NotificationKind {
  fn from(level: ReminderLevel) -> Self {
    match level {
      ReminderLevel::FirstReminder => NotificationKind::FirstReminder,
      ReminderLevel::UrgentReminder => NotificationKind::UrgentReminder,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTotals {
  pub subtotal_cents: i64,
  pub shipping_cents: i64,
  pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
  pub name: String,
  #[serde(default)]
  pub variant: Option<String>,
  pub quantity: i32,
  pub unit_price_cents: i64,
  pub total_price_cents: i64,
}

impl From<&OrderItem> for NotificationItem {
  fn from(item: &OrderItem) -> Self {
    Self {
      name: item.product_name.clone(),
      variant: item.variant.clone(),
      quantity: item.quantity,
      unit_price_cents: item.unit_price_cents,
      total_price_cents: item.total_price_cents,
    }
  }
}

/// Input of a send. `kind` stays a raw string so unknown types can be accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
  #[serde(rename = "type")]
  pub kind: String,
  pub order_id: Uuid,
  pub customer_name: String,
  #[serde(default)]
  pub customer_phone: Option<String>,
  #[serde(default)]
  pub customer_email: Option<String>,
  #[serde(default)]
  pub totals: NotificationTotals,
  #[serde(default)]
  pub items: Vec<NotificationItem>,
  #[serde(default)]
  pub payment_method: Option<PaymentMethod>,
  #[serde(default)]
  pub payment_reference: Option<String>,
  #[serde(default)]
  pub tracking_number: Option<String>,
}

impl NotificationRequest {
  pub fn for_order(kind: NotificationKind, order: &Order, items: &[OrderItem]) -> Self {
    Self {
      kind: kind.as_str().to_string(),
      order_id: order.id,
      customer_name: order.customer_name.clone(),
      customer_phone: Some(order.customer_phone.clone()).filter(|p| !p.trim().is_empty()),
      customer_email: order.email().map(str::to_string),
      totals: NotificationTotals {
        subtotal_cents: order.subtotal_cents,
        shipping_cents: order.shipping_cost_cents,
        total_cents: order.total_cents,
      },
      items: items.iter().map(NotificationItem::from).collect(),
      payment_method: Some(order.payment_method),
      payment_reference: order.payment_reference.clone(),
      tracking_number: order.tracking_number.clone(),
    }
  }

  fn email(&self) -> Option<&str> {
    self.customer_email.as_deref().map(str::trim).filter(|e| !e.is_empty())
  }
}

/// What the operator needs to send a message by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManualFallback {
  pub whatsapp_link: Option<String>,
  pub email_subject: Option<String>,
  pub email_body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChannelOutcome {
  Sent { message_id: String },
  /// No automated sender; the link opens WhatsApp with the message pre-filled.
  ManualDraft { link: String },
  Skipped { reason: String },
  Failed { error: String, fallback: ManualFallback },
}

impl ChannelOutcome {
  fn skipped(reason: &str) -> Self {
    ChannelOutcome::Skipped {
      reason: reason.to_string(),
    }
  }

  pub fn is_sent(&self) -> bool {
    matches!(self, ChannelOutcome::Sent { .. })
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, ChannelOutcome::Failed { .. })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
  /// `None` when the request's type was not recognised.
  pub kind: Option<NotificationKind>,
  pub email: ChannelOutcome,
  pub whatsapp: ChannelOutcome,
}

impl DispatchReport {
  fn ignored() -> Self {
    Self {
      kind: None,
      email: ChannelOutcome::skipped("unrecognised notification type"),
      whatsapp: ChannelOutcome::skipped("unrecognised notification type"),
    }
  }

  pub fn is_noop(&self) -> bool {
    self.kind.is_none()
  }

  pub fn email_delivered(&self) -> bool {
    self.email.is_sent()
  }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
  pub store_name: String,
  pub currency: String,
  pub country_code: String,
  /// Recipient of `order_created` operator messages.
  pub operator_whatsapp: Option<String>,
  pub send_timeout: Duration,
}

impl Default for DispatcherConfig {
  fn default() -> Self {
    Self {
      store_name: "Storefront".to_string(),
      currency: "MXN".to_string(),
      country_code: "52".to_string(),
      operator_whatsapp: None,
      send_timeout: Duration::from_secs(5),
    }
  }
}

impl DispatcherConfig {
  fn template_context(&self) -> TemplateContext {
    TemplateContext {
      store_name: self.store_name.clone(),
      currency: self.currency.clone(),
    }
  }
}

pub struct Dispatcher {
  email: Arc<dyn EmailSender>,
  whatsapp: Option<Arc<dyn WhatsAppSender>>,
  links: ActionLinks,
  config: DispatcherConfig,
}

impl Dispatcher {
  pub fn new(email: Arc<dyn EmailSender>, links: ActionLinks, config: DispatcherConfig) -> Self {
    Self {
      email,
      whatsapp: None,
      links,
      config,
    }
  }

  pub fn with_whatsapp(mut self, sender: Arc<dyn WhatsAppSender>) -> Self {
    self.whatsapp = Some(sender);
    self
  }

  #[instrument(name = "Dispatcher::dispatch", skip_all, fields(kind = %request.kind, order_id = %request.order_id))]
  pub async fn dispatch(&self, request: &NotificationRequest) -> DispatchReport {
    let Some(kind) = NotificationKind::parse(&request.kind) else {
      debug!("Unrecognised notification type, nothing to send.");
      return DispatchReport::ignored();
    };

    let ctx = self.config.template_context();
    let rendered = templates::compose(kind, request, &ctx);

    let email = self.send_email(request, &rendered).await;

    let (whatsapp_to, whatsapp_text) = match kind {
      NotificationKind::OrderCreated => (
        self.config.operator_whatsapp.as_deref(),
        templates::operator_new_order(request, &ctx, &self.links),
      ),
      _ => (request.customer_phone.as_deref(), rendered.whatsapp.clone()),
    };
    let whatsapp = self.send_whatsapp(whatsapp_to, &whatsapp_text, &rendered).await;

    info!(
      "Notification {} (Order {}): email {}, whatsapp {}.",
      kind.as_str(),
      crate::model::order::short_id(&request.order_id),
      outcome_label(&email),
      outcome_label(&whatsapp)
    );
    DispatchReport {
      kind: Some(kind),
      email,
      whatsapp,
    }
  }

  async fn send_email(&self, request: &NotificationRequest, rendered: &Rendered) -> ChannelOutcome {
    let Some(to) = request.email() else {
      return ChannelOutcome::skipped("no email address");
    };
    let message = EmailMessage {
      to: to.to_string(),
      subject: rendered.subject.clone(),
      text: rendered.text.clone(),
      html: rendered.html.clone(),
    };

    match time_boxed(self.config.send_timeout, self.email.send(&message)).await {
      Ok(message_id) => ChannelOutcome::Sent { message_id },
      Err(e) => {
        warn!(error = %e, "Email delivery failed; falling back to a manual draft.");
        let whatsapp_link = request
          .customer_phone
          .as_deref()
          .and_then(|p| whatsapp::deep_link(p, &rendered.whatsapp, &self.config.country_code));
        ChannelOutcome::Failed {
          error: e.to_string(),
          fallback: ManualFallback {
            whatsapp_link,
            email_subject: Some(rendered.subject.clone()),
            email_body: Some(rendered.text.clone()),
          },
        }
      }
    }
  }

  async fn send_whatsapp(&self, to: Option<&str>, text: &str, rendered: &Rendered) -> ChannelOutcome {
    let Some(to) = to else {
      return ChannelOutcome::skipped("no WhatsApp recipient");
    };
    let Some(number) = whatsapp::normalize_phone(to, &self.config.country_code) else {
      return ChannelOutcome::skipped("phone number is not usable");
    };
    let link = whatsapp::deep_link(&number, text, &self.config.country_code).unwrap_or_default();

    let Some(sender) = &self.whatsapp else {
      return ChannelOutcome::ManualDraft { link };
    };
    match time_boxed(self.config.send_timeout, sender.send(&number, text)).await {
      Ok(message_id) => ChannelOutcome::Sent { message_id },
      Err(e) => {
        warn!(error = %e, "WhatsApp delivery failed; handing the draft to the operator.");
        ChannelOutcome::Failed {
          error: e.to_string(),
          fallback: ManualFallback {
            whatsapp_link: Some(link),
            email_subject: Some(rendered.subject.clone()),
            email_body: Some(rendered.text.clone()),
          },
        }
      }
    }
  }
}

async fn time_boxed<T>(
  limit: Duration,
  send: impl Future<Output = Result<T, DeliveryError>>,
) -> Result<T, DeliveryError> {
  tokio::time::timeout(limit, send)
    .await
    .unwrap_or(Err(DeliveryError::Timeout(limit)))
}

fn outcome_label(outcome: &ChannelOutcome) -> &'static str {
  match outcome {
    ChannelOutcome::Sent { .. } => "sent",
    ChannelOutcome::ManualDraft { .. } => "manual draft",
    ChannelOutcome::Skipped { .. } => "skipped",
    ChannelOutcome::Failed { .. } => "failed",
  }
}
