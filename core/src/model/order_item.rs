// orderflow/src/model/order_item.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A line item snapshot. The product name and prices are copied at checkout so later catalog
/// edits never rewrite history. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_name: String,
  pub variant: Option<String>,
  pub quantity: i32,
  pub unit_price_cents: i64,
  pub total_price_cents: i64, // unit_price_cents * quantity
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
  pub product_name: String,
  #[serde(default)]
  pub variant: Option<String>,
  pub quantity: i32,
  pub unit_price_cents: i64,
}

impl NewOrderItem {
  pub fn total_price_cents(&self) -> i64 {
    self.unit_price_cents * i64::from(self.quantity)
  }

  pub fn into_item(self, order_id: Uuid) -> OrderItem {
    let total_price_cents = self.total_price_cents();
    OrderItem {
      id: Uuid::new_v4(),
      order_id,
      product_name: self.product_name.trim().to_string(),
      variant: self.variant.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()),
      quantity: self.quantity,
      unit_price_cents: self.unit_price_cents,
      total_price_cents,
    }
  }
}
