// storefront_app/src/test_support.rs

use crate::config::AppConfig;
use crate::state::AppState;
use chrono::Utc;
use orderflow::model::{CustomerContact, NewOrder, NewOrderItem, PaymentMethod, ShippingAddress};
use orderflow::store::OrderStore;
use orderflow::{HookMode, InMemoryOrderStore, Orderflow};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub fn test_config() -> AppConfig {
  AppConfig {
    server_host: "127.0.0.1".to_string(),
    server_port: 0,
    database_url: None,
    database_max_connections: 1,
    app_base_url: "https://shop.test".to_string(),
    store_name: "Test Shop".to_string(),
    currency: "MXN".to_string(),
    country_code: "52".to_string(),
    operator_whatsapp: None,
    action_link_secret: None,
    admin_api_token: Some("admin-secret".to_string()),
    email_api: None,
    whatsapp_api: None,
    free_shipping_threshold_cents: 80_000,
    flat_shipping_cost_cents: 15_000,
    notify_timeout: Duration::from_millis(200),
    reminder_interval_secs: 0,
  }
}

pub async fn app_state_with_order() -> (AppState, Uuid) {
  let config = test_config();
  let store = Arc::new(InMemoryOrderStore::new());
  let mut settings = config.orderflow_settings();
  settings.hook_mode = HookMode::Inline;
  let flow = Orderflow::builder(store.clone()).settings(settings).build();

  let id = Uuid::new_v4();
  store
    .create_order(NewOrder {
      id,
      customer: CustomerContact {
        name: "Ana <b>López</b>".to_string(),
        phone: "5512345678".to_string(),
        email: None,
      },
      shipping: ShippingAddress {
        street: "Av. Reforma 100".to_string(),
        city: "CDMX".to_string(),
        state: "CDMX".to_string(),
        postal_code: "06600".to_string(),
        notes: None,
      },
      payment_method: PaymentMethod::Transfer,
      subtotal_cents: 90_000,
      shipping_cost_cents: 0,
      payment_reference: Some("REF-0011223344".to_string()),
      items: vec![NewOrderItem {
        product_name: "Canvas tote".to_string(),
        variant: None,
        quantity: 2,
        unit_price_cents: 45_000,
      }],
      created_at: Utc::now(),
    })
    .await
    .unwrap();

  let state = AppState {
    flow: Arc::new(flow),
    config: Arc::new(config),
  };
  (state, id)
}
