// orderflow/src/tracking.rs

//! Customer-facing order tracking lookup.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{OrderflowError, OrderflowResult};
use crate::model::{OrderItem, OrderStatus, PaymentStatus};
use crate::store::OrderStore;

const MIN_REFERENCE_CHARS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingItem {
  pub product_name: String,
  pub variant: Option<String>,
  pub quantity: i32,
  pub total_price_cents: i64,
}

impl From<OrderItem> for TrackingItem {
  fn from(item: OrderItem) -> Self {
    Self {
      product_name: item.product_name,
      variant: item.variant,
      quantity: item.quantity,
      total_price_cents: item.total_price_cents,
    }
  }
}

/// What a customer may see about an order. No contact or address data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingView {
  pub short_id: String,
  pub payment_status: PaymentStatus,
  pub order_status: OrderStatus,
  pub tracking_number: Option<String>,
  pub payment_reference: Option<String>,
  pub subtotal_cents: i64,
  pub shipping_cost_cents: i64,
  pub total_cents: i64,
  pub items: Vec<TrackingItem>,
}

#[derive(Clone)]
pub struct TrackingLookup {
  store: Arc<dyn OrderStore>,
}

impl TrackingLookup {
  pub fn new(store: Arc<dyn OrderStore>) -> Self {
    Self { store }
  }

  /// `Ok(None)` when nothing matches. Too-short references are a validation error, since a
  /// partial match on two characters would expose arbitrary orders.
  #[instrument(name = "TrackingLookup::lookup", skip(self))]
  pub async fn lookup(&self, reference: &str) -> OrderflowResult<Option<TrackingView>> {
    let reference = reference.trim();
    if reference.chars().filter(|c| !c.is_whitespace()).count() < MIN_REFERENCE_CHARS {
      return Err(OrderflowError::Validation(format!(
        "tracking reference needs at least {} characters",
        MIN_REFERENCE_CHARS
      )));
    }

    let Some(order) = self.store.find_by_reference(reference).await? else {
      debug!("No order matches the tracking reference.");
      return Ok(None);
    };
    let items = self.store.order_items(order.id).await?;

    Ok(Some(TrackingView {
      short_id: order.short_id(),
      payment_status: order.payment_status,
      order_status: order.order_status,
      tracking_number: order.tracking_number,
      payment_reference: order.payment_reference,
      subtotal_cents: order.subtotal_cents,
      shipping_cost_cents: order.shipping_cost_cents,
      total_cents: order.total_cents,
      items: items.into_iter().map(TrackingItem::from).collect(),
    }))
  }
}
