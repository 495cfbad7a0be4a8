// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use orderflow::model::{Actor, CustomerContact, NewOrder, NewOrderItem, Order, PaymentMethod, ShippingAddress};
use orderflow::notify::{DeliveryError, EmailMessage, EmailSender, WhatsAppSender};
use orderflow::store::OrderStore;
use orderflow::transition::TransitionEvent;
use orderflow::{
  CheckoutRequest, HookMode, InMemoryOrderStore, OrderflowError, OrderflowResult, OrderflowSettings, Orderflow,
  TransitionHook,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Channel doubles ---

#[derive(Default)]
pub struct RecordingEmailSender {
  sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn messages(&self) -> Vec<EmailMessage> {
    self.sent.lock().clone()
  }

  pub fn count(&self) -> usize {
    self.sent.lock().len()
  }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
  async fn send(&self, message: &EmailMessage) -> Result<String, DeliveryError> {
    let mut sent = self.sent.lock();
    sent.push(message.clone());
    Ok(format!("rec-{}", sent.len()))
  }
}

/// Rejects every message addressed to `bad_address`, records the rest.
pub struct SelectiveEmailSender {
  pub bad_address: String,
  pub inner: Arc<RecordingEmailSender>,
}

#[async_trait]
impl EmailSender for SelectiveEmailSender {
  async fn send(&self, message: &EmailMessage) -> Result<String, DeliveryError> {
    if message.to == self.bad_address {
      return Err(DeliveryError::Rejected {
        status: 422,
        body: "mailbox does not exist".to_string(),
      });
    }
    self.inner.send(message).await
  }
}

pub struct FailingEmailSender;

#[async_trait]
impl EmailSender for FailingEmailSender {
  async fn send(&self, _message: &EmailMessage) -> Result<String, DeliveryError> {
    Err(DeliveryError::Rejected {
      status: 503,
      body: "provider down".to_string(),
    })
  }
}

pub struct SlowEmailSender(pub Duration);

#[async_trait]
impl EmailSender for SlowEmailSender {
  async fn send(&self, _message: &EmailMessage) -> Result<String, DeliveryError> {
    tokio::time::sleep(self.0).await;
    Ok("too-late".to_string())
  }
}

#[derive(Default)]
pub struct RecordingWhatsAppSender {
  sent: Mutex<Vec<(String, String)>>,
}

impl RecordingWhatsAppSender {
  pub fn messages(&self) -> Vec<(String, String)> {
    self.sent.lock().clone()
  }
}

#[async_trait]
impl WhatsAppSender for RecordingWhatsAppSender {
  async fn send(&self, to: &str, text: &str) -> Result<String, DeliveryError> {
    self.sent.lock().push((to.to_string(), text.to_string()));
    Ok("wamid.test".to_string())
  }
}

// --- Hooks ---

pub static HOOK_EXEC_COUNTER: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));

pub fn reset_counters() {
  HOOK_EXEC_COUNTER.store(0, Ordering::SeqCst);
}

pub struct CountingHook;

#[async_trait]
impl TransitionHook for CountingHook {
  fn name(&self) -> &'static str {
    "counting"
  }

  async fn on_transition(&self, _event: TransitionEvent) -> OrderflowResult<()> {
    HOOK_EXEC_COUNTER.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

pub struct ExplodingHook;

#[async_trait]
impl TransitionHook for ExplodingHook {
  fn name(&self) -> &'static str {
    "exploding"
  }

  async fn on_transition(&self, _event: TransitionEvent) -> OrderflowResult<()> {
    Err(OrderflowError::NotificationDelivery("hook exploded".to_string()))
  }
}

// --- Wiring ---

pub fn inline_settings() -> OrderflowSettings {
  OrderflowSettings {
    base_url: "https://shop.test".to_string(),
    store_name: "Test Shop".to_string(),
    hook_mode: HookMode::Inline,
    notify_timeout: Duration::from_millis(200),
    ..OrderflowSettings::default()
  }
}

pub struct Harness {
  pub store: Arc<InMemoryOrderStore>,
  pub email: Arc<RecordingEmailSender>,
  pub flow: Orderflow,
}

pub fn harness() -> Harness {
  harness_with(inline_settings())
}

pub fn harness_with(settings: OrderflowSettings) -> Harness {
  setup_tracing();
  let store = Arc::new(InMemoryOrderStore::new());
  let email = RecordingEmailSender::new();
  let flow = Orderflow::builder(store.clone())
    .settings(settings)
    .email_sender(email.clone())
    .build();
  Harness { store, email, flow }
}

// --- Fixtures ---

pub fn customer(email: Option<&str>) -> CustomerContact {
  CustomerContact {
    name: "Ana López".to_string(),
    phone: "55 1234 5678".to_string(),
    email: email.map(str::to_string),
  }
}

pub fn address() -> ShippingAddress {
  ShippingAddress {
    street: "Av. Reforma 100".to_string(),
    city: "CDMX".to_string(),
    state: "CDMX".to_string(),
    postal_code: "06600".to_string(),
    notes: None,
  }
}

pub fn item(name: &str, unit_price_cents: i64, quantity: i32) -> NewOrderItem {
  NewOrderItem {
    product_name: name.to_string(),
    variant: None,
    quantity,
    unit_price_cents,
  }
}

pub fn checkout_request(method: PaymentMethod, items: Vec<NewOrderItem>) -> CheckoutRequest {
  CheckoutRequest {
    customer: customer(Some("ana@example.com")),
    shipping: address(),
    payment_method: method,
    items,
  }
}

/// Writes an order straight into the store with a chosen creation time.
pub async fn seed_order(store: &dyn OrderStore, created_at: DateTime<Utc>, email: Option<&str>) -> Order {
  let new_order = NewOrder {
    id: Uuid::new_v4(),
    customer: customer(email),
    shipping: address(),
    payment_method: PaymentMethod::Transfer,
    subtotal_cents: 90_000,
    shipping_cost_cents: 0,
    payment_reference: Some(format!("REF-{}", &Uuid::new_v4().simple().to_string()[..10].to_uppercase())),
    items: vec![item("Canvas tote", 45_000, 2)],
    created_at,
  };
  let (order, _items) = store.create_order(new_order).await.expect("seed order");
  order
}

pub fn operator() -> Actor {
  Actor::operator("tests")
}
