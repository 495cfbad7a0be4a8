// orderflow/src/checkout.rs

//! Checkout submission: validate, price, persist atomically, then announce the new order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::error::{OrderflowError, OrderflowResult, PipelineError};
use crate::model::{CustomerContact, NewOrder, NewOrderItem, Order, OrderItem, PaymentMethod, ShippingAddress};
use crate::notify::{Dispatcher, NotificationKind, NotificationRequest};
use crate::pipeline::{ContextData, Pipeline, PipelineControl, SkipCondition};
use crate::store::OrderStore;
use crate::transition::HookMode;

const MIN_PHONE_DIGITS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
  pub customer: CustomerContact,
  pub shipping: ShippingAddress,
  pub payment_method: PaymentMethod,
  pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
  pub free_shipping_threshold_cents: i64,
  pub flat_shipping_cost_cents: i64,
  pub hook_mode: HookMode,
  pub notify_timeout: Duration,
}

impl Default for CheckoutConfig {
  fn default() -> Self {
    Self {
      free_shipping_threshold_cents: 80_000,
      flat_shipping_cost_cents: 15_000,
      hook_mode: HookMode::Detached,
      notify_timeout: Duration::from_secs(5),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pricing {
  pub subtotal_cents: i64,
  pub shipping_cost_cents: i64,
  pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
  /// The 8-character order number shown to the customer.
  pub short_id: String,
  pub order: Order,
  pub items: Vec<OrderItem>,
}

#[derive(Debug)]
pub struct CheckoutContext {
  pub request: CheckoutRequest,
  pub pricing: Option<Pricing>,
  pub placed: Option<(Order, Vec<OrderItem>)>,
}

pub fn validate(request: &CheckoutRequest) -> OrderflowResult<()> {
  let invalid = |msg: &str| Err(OrderflowError::Validation(msg.to_string()));

  if request.customer.name.trim().is_empty() {
    return invalid("customer name is required");
  }
  let phone_digits = request.customer.phone.chars().filter(|c| c.is_ascii_digit()).count();
  if phone_digits < MIN_PHONE_DIGITS {
    return invalid("phone number needs at least 10 digits");
  }
  if let Some(email) = request.customer.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
    if !email.contains('@') {
      return invalid("email address is not valid");
    }
  }
  let s = &request.shipping;
  if [&s.street, &s.city, &s.state, &s.postal_code].iter().any(|f| f.trim().is_empty()) {
    return invalid("shipping address is incomplete");
  }
  if request.items.is_empty() {
    return invalid("cart is empty");
  }
  for item in &request.items {
    if item.product_name.trim().is_empty() {
      return invalid("every item needs a product name");
    }
    if item.quantity <= 0 {
      return invalid("item quantity must be greater than zero");
    }
    if item.unit_price_cents < 0 {
      return invalid("item price cannot be negative");
    }
  }
  Ok(())
}

/// Subtotal from the items, shipping from the free-shipping threshold.
pub fn price(items: &[NewOrderItem], config: &CheckoutConfig) -> OrderflowResult<Pricing> {
  let subtotal_cents = items.iter().try_fold(0i64, |acc, item| {
    item
      .unit_price_cents
      .checked_mul(i64::from(item.quantity))
      .and_then(|line| acc.checked_add(line))
  });
  let subtotal_cents =
    subtotal_cents.ok_or_else(|| OrderflowError::Validation("order total is out of range".to_string()))?;
  let shipping_cost_cents = if subtotal_cents >= config.free_shipping_threshold_cents {
    0
  } else {
    config.flat_shipping_cost_cents
  };
  let total_cents = subtotal_cents
    .checked_add(shipping_cost_cents)
    .ok_or_else(|| OrderflowError::Validation("order total is out of range".to_string()))?;
  Ok(Pricing {
    subtotal_cents,
    shipping_cost_cents,
    total_cents,
  })
}

/// `REF-` followed by ten uppercase hex characters.
pub fn generate_payment_reference() -> String {
  let raw = Uuid::new_v4().simple().to_string();
  format!("REF-{}", raw[..10].to_uppercase())
}

pub struct Checkout {
  pipeline: Pipeline<CheckoutContext, OrderflowError>,
}

impl Checkout {
  pub fn new(store: Arc<dyn OrderStore>, dispatcher: Arc<Dispatcher>, config: CheckoutConfig) -> Self {
    let skip_unless_placed: SkipCondition<CheckoutContext> = Arc::new(|ctx: &CheckoutContext| ctx.placed.is_none());
    let mut p = Pipeline::<CheckoutContext, OrderflowError>::new(&[
      ("validate_checkout", false, None),
      ("price_order", false, None),
      ("persist_order", false, None),
      ("notify_order_created", true, Some(skip_unless_placed)),
    ]);

    p.on_root("validate_checkout", |ctx_data: ContextData<CheckoutContext>| {
      Box::pin(async move {
        ctx_data.with(|c| validate(&c.request))?;
        Ok::<_, OrderflowError>(PipelineControl::Continue)
      })
    });

    let price_config = config.clone();
    p.on_root("price_order", move |ctx_data: ContextData<CheckoutContext>| {
      let config = price_config.clone();
      Box::pin(async move {
        let pricing = ctx_data.with(|c| price(&c.request.items, &config))?;
        ctx_data.update(|c| c.pricing = Some(pricing));
        Ok::<_, OrderflowError>(PipelineControl::Continue)
      })
    });

    let persist_store = store.clone();
    p.on_root("persist_order", move |ctx_data: ContextData<CheckoutContext>| {
      let store = persist_store.clone();
      Box::pin(async move {
        let new_order = {
          let guard = ctx_data.read();
          let pricing = guard.pricing.ok_or_else(|| PipelineError::MissingOutput {
            step_name: "price_order".to_string(),
            missing: "pricing".to_string(),
          })?;
          let request = &guard.request;
          NewOrder {
            id: Uuid::new_v4(),
            customer: request.customer.clone(),
            shipping: request.shipping.clone(),
            payment_method: request.payment_method,
            subtotal_cents: pricing.subtotal_cents,
            shipping_cost_cents: pricing.shipping_cost_cents,
            payment_reference: request
              .payment_method
              .needs_reference()
              .then(generate_payment_reference),
            items: request.items.clone(),
            created_at: Utc::now(),
          }
        };

        let (order, items) = store.create_order(new_order).await?;
        info!(
          "Checkout (Order {}): placed, {} item(s), total {} cents, payment by {}.",
          order.short_id(),
          items.len(),
          order.total_cents,
          order.payment_method.as_str()
        );
        ctx_data.update(|c| c.placed = Some((order, items)));
        Ok::<_, OrderflowError>(PipelineControl::Continue)
      })
    });

    p.on_root("notify_order_created", move |ctx_data: ContextData<CheckoutContext>| {
      let dispatcher = dispatcher.clone();
      let config = config.clone();
      Box::pin(async move {
        let request = ctx_data.with(|c| {
          c.placed
            .as_ref()
            .map(|(order, items)| NotificationRequest::for_order(NotificationKind::OrderCreated, order, items))
        });
        let Some(request) = request else {
          return Ok(PipelineControl::Continue);
        };

        let send = async move {
          match tokio::time::timeout(config.notify_timeout, dispatcher.dispatch(&request)).await {
            Ok(report) if report.email.is_failed() || report.whatsapp.is_failed() => Err(
              OrderflowError::NotificationDelivery("order_created needs a manual send".to_string()),
            ),
            Ok(_) => Ok(()),
            Err(_) => Err(OrderflowError::NotificationDelivery(format!(
              "order_created timed out after {:?}",
              config.notify_timeout
            ))),
          }
        };
        match config.hook_mode {
          HookMode::Inline => send.await?,
          HookMode::Detached => {
            tokio::spawn(
              async move {
                if let Err(e) = send.await {
                  warn!(error = %e, "Order confirmation notification failed.");
                }
              }
              .in_current_span(),
            );
          }
        }
        Ok::<_, OrderflowError>(PipelineControl::Continue)
      })
    });

    Self { pipeline: p }
  }

  #[instrument(name = "Checkout::submit", skip_all, fields(items = request.items.len()))]
  pub async fn submit(&self, request: CheckoutRequest) -> OrderflowResult<CheckoutReceipt> {
    let ctx = ContextData::new(CheckoutContext {
      request,
      pricing: None,
      placed: None,
    });
    self.pipeline.run(ctx.clone()).await?;

    let placed = ctx.update(|c| c.placed.take());
    let (order, items) = placed.ok_or_else(|| PipelineError::MissingOutput {
      step_name: "persist_order".to_string(),
      missing: "order".to_string(),
    })?;
    Ok(CheckoutReceipt {
      short_id: order.short_id(),
      order,
      items,
    })
  }
}
