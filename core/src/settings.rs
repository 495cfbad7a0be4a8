// orderflow/src/settings.rs

use std::time::Duration;

use crate::checkout::CheckoutConfig;
use crate::links::ActionLinks;
use crate::notify::DispatcherConfig;
use crate::reminder::ReminderThresholds;
use crate::transition::{HookMode, TransitionConfig};

/// Library-wide settings. The server fills this from its environment; tests use `Default`
/// plus `HookMode::Inline`.
#[derive(Debug, Clone)]
pub struct OrderflowSettings {
  /// Public base URL the remote action links point at.
  pub base_url: String,
  pub store_name: String,
  pub currency: String,
  pub country_code: String,
  pub operator_whatsapp: Option<String>,
  pub action_link_secret: Option<String>,
  pub free_shipping_threshold_cents: i64,
  pub flat_shipping_cost_cents: i64,
  pub notify_timeout: Duration,
  pub hook_mode: HookMode,
  pub max_transition_attempts: u32,
  pub reminder_thresholds: ReminderThresholds,
}

impl Default for OrderflowSettings {
  fn default() -> Self {
    let checkout = CheckoutConfig::default();
    let transition = TransitionConfig::default();
    let dispatcher = DispatcherConfig::default();
    Self {
      base_url: "http://localhost:8080".to_string(),
      store_name: dispatcher.store_name,
      currency: dispatcher.currency,
      country_code: dispatcher.country_code,
      operator_whatsapp: None,
      action_link_secret: None,
      free_shipping_threshold_cents: checkout.free_shipping_threshold_cents,
      flat_shipping_cost_cents: checkout.flat_shipping_cost_cents,
      notify_timeout: transition.notify_timeout,
      hook_mode: transition.hook_mode,
      max_transition_attempts: transition.max_attempts,
      reminder_thresholds: ReminderThresholds::default(),
    }
  }
}

impl OrderflowSettings {
  pub fn action_links(&self) -> ActionLinks {
    ActionLinks::new(self.base_url.clone(), self.action_link_secret.clone())
  }

  pub fn dispatcher_config(&self) -> DispatcherConfig {
    DispatcherConfig {
      store_name: self.store_name.clone(),
      currency: self.currency.clone(),
      country_code: self.country_code.clone(),
      operator_whatsapp: self.operator_whatsapp.clone(),
      send_timeout: self.notify_timeout,
    }
  }

  /// Whole-hook time box: two channel sends, each bounded by `notify_timeout`, plus lookups.
  fn side_effect_timeout(&self) -> Duration {
    self.notify_timeout * 3
  }

  pub fn transition_config(&self) -> TransitionConfig {
    TransitionConfig {
      hook_mode: self.hook_mode,
      notify_timeout: self.side_effect_timeout(),
      max_attempts: self.max_transition_attempts,
    }
  }

  pub fn checkout_config(&self) -> CheckoutConfig {
    CheckoutConfig {
      free_shipping_threshold_cents: self.free_shipping_threshold_cents,
      flat_shipping_cost_cents: self.flat_shipping_cost_cents,
      hook_mode: self.hook_mode,
      notify_timeout: self.side_effect_timeout(),
    }
  }
}
