// orderflow/src/model/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::order_item::NewOrderItem;
use super::status::{AxisStatus, OrderStatus, PaymentMethod, PaymentStatus, StatusAxis};

/// A placed order. Created once at checkout, mutated only through the transition engine
/// (statuses) or the metadata setters (tracking number, receipt), never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub customer_name: String,
  pub customer_phone: String,
  pub customer_email: Option<String>,
  pub shipping_street: String,
  pub shipping_city: String,
  pub shipping_state: String,
  pub shipping_postal_code: String,
  pub shipping_notes: Option<String>,
  pub payment_method: PaymentMethod,
  pub payment_status: PaymentStatus,
  pub order_status: OrderStatus,
  pub subtotal_cents: i64,
  pub shipping_cost_cents: i64,
  pub total_cents: i64, // always subtotal_cents + shipping_cost_cents
  pub tracking_number: Option<String>,
  pub payment_reference: Option<String>,
  pub receipt_url: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  /// Human-facing order number: first 8 characters of the id, uppercased.
  pub fn short_id(&self) -> String {
    short_id(&self.id)
  }

  pub fn status_on(&self, axis: StatusAxis) -> AxisStatus {
    match axis {
      StatusAxis::Payment => AxisStatus::Payment(self.payment_status),
      StatusAxis::Order => AxisStatus::Order(self.order_status),
    }
  }

  /// Writes `status` into the matching axis field. Storage backends call this inside their
  /// atomic compare-and-set; nothing else should.
  pub(crate) fn set_status(&mut self, status: AxisStatus) {
    match status {
      AxisStatus::Payment(s) => self.payment_status = s,
      AxisStatus::Order(s) => self.order_status = s,
    }
  }

  /// Bumps `updated_at`, never moving it backwards or below `created_at`.
  pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
    self.updated_at = at.max(self.updated_at).max(self.created_at);
  }

  pub fn email(&self) -> Option<&str> {
    self.customer_email.as_deref().filter(|e| !e.trim().is_empty())
  }
}

pub fn short_id(id: &Uuid) -> String {
  id.simple().to_string()[..8].to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
  pub name: String,
  pub phone: String,
  #[serde(default)]
  pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
  pub street: String,
  pub city: String,
  pub state: String,
  pub postal_code: String,
  #[serde(default)]
  pub notes: Option<String>,
}

/// Everything needed to persist a new order and its items in one atomic write.
#[derive(Debug, Clone)]
pub struct NewOrder {
  pub id: Uuid,
  pub customer: CustomerContact,
  pub shipping: ShippingAddress,
  pub payment_method: PaymentMethod,
  pub subtotal_cents: i64,
  pub shipping_cost_cents: i64,
  pub payment_reference: Option<String>,
  pub items: Vec<NewOrderItem>,
  pub created_at: DateTime<Utc>,
}

impl NewOrder {
  pub fn total_cents(&self) -> i64 {
    self.subtotal_cents + self.shipping_cost_cents
  }

  /// The order row as it looks right after creation: both axes `pending`.
  pub fn to_order(&self) -> Order {
    Order {
      id: self.id,
      customer_name: self.customer.name.trim().to_string(),
      customer_phone: self.customer.phone.trim().to_string(),
      customer_email: self
        .customer
        .email
        .as_ref()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty()),
      shipping_street: self.shipping.street.clone(),
      shipping_city: self.shipping.city.clone(),
      shipping_state: self.shipping.state.clone(),
      shipping_postal_code: self.shipping.postal_code.clone(),
      shipping_notes: self.shipping.notes.clone(),
      payment_method: self.payment_method,
      payment_status: PaymentStatus::Pending,
      order_status: OrderStatus::Pending,
      subtotal_cents: self.subtotal_cents,
      shipping_cost_cents: self.shipping_cost_cents,
      total_cents: self.total_cents(),
      tracking_number: None,
      payment_reference: self.payment_reference.clone(),
      receipt_url: None,
      created_at: self.created_at,
      updated_at: self.created_at,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_id_is_first_eight_hex_chars_uppercased() {
    let id = Uuid::parse_str("3f2b9c1a-0d4e-4b8f-9a7c-1e2d3c4b5a69").unwrap();
    assert_eq!(short_id(&id), "3F2B9C1A");
  }
}
