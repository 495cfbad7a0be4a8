// storefront_app/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use orderflow::{HookMode, OrderflowSettings};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EmailApiConfig {
  pub url: String,
  pub api_key: String,
  pub sender: String,
}

#[derive(Debug, Clone)]
pub struct WhatsAppApiConfig {
  pub url: String,
  pub token: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// Absent means the in-memory store (demo / local development).
  pub database_url: Option<String>,
  pub database_max_connections: u32,
  pub app_base_url: String,

  pub store_name: String,
  pub currency: String,
  pub country_code: String,
  pub operator_whatsapp: Option<String>,
  pub action_link_secret: Option<String>,
  /// Admin routes are disabled when no token is configured.
  pub admin_api_token: Option<String>,

  pub email_api: Option<EmailApiConfig>,
  pub whatsapp_api: Option<WhatsAppApiConfig>,

  pub free_shipping_threshold_cents: i64,
  pub flat_shipping_cost_cents: i64,
  pub notify_timeout: Duration,
  /// 0 leaves reminder scheduling to an external cron hitting the admin route.
  pub reminder_interval_secs: u64,
}

fn optional_env(var_name: &str) -> Option<String> {
  env::var(var_name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed_env<T>(var_name: &str, default: T) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  match optional_env(var_name) {
    Some(raw) => raw
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
    None => Ok(default),
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let server_host = optional_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parsed_env("SERVER_PORT", 8080u16)?;
    let app_base_url = optional_env("APP_BASE_URL").unwrap_or_else(|| format!("http://{}:{}", server_host, server_port));

    let email_api = match (optional_env("EMAIL_API_URL"), optional_env("EMAIL_API_KEY")) {
      (Some(url), Some(api_key)) => Some(EmailApiConfig {
        url,
        api_key,
        sender: optional_env("EMAIL_SENDER").unwrap_or_else(|| "noreply@example.com".to_string()),
      }),
      (Some(_), None) => return Err(AppError::Config("EMAIL_API_URL is set but EMAIL_API_KEY is missing".to_string())),
      _ => None,
    };
    let whatsapp_api = match (optional_env("WHATSAPP_API_URL"), optional_env("WHATSAPP_API_TOKEN")) {
      (Some(url), Some(token)) => Some(WhatsAppApiConfig { url, token }),
      (Some(_), None) => {
        return Err(AppError::Config(
          "WHATSAPP_API_URL is set but WHATSAPP_API_TOKEN is missing".to_string(),
        ))
      }
      _ => None,
    };

    let defaults = OrderflowSettings::default();
    let config = Self {
      database_url: optional_env("DATABASE_URL"),
      database_max_connections: parsed_env("DATABASE_MAX_CONNECTIONS", 10u32)?,
      store_name: optional_env("STORE_NAME").unwrap_or(defaults.store_name),
      currency: optional_env("CURRENCY").unwrap_or(defaults.currency),
      country_code: optional_env("COUNTRY_CODE").unwrap_or(defaults.country_code),
      operator_whatsapp: optional_env("OPERATOR_WHATSAPP"),
      action_link_secret: optional_env("ACTION_LINK_SECRET"),
      admin_api_token: optional_env("ADMIN_API_TOKEN"),
      email_api,
      whatsapp_api,
      free_shipping_threshold_cents: parsed_env("FREE_SHIPPING_THRESHOLD_CENTS", defaults.free_shipping_threshold_cents)?,
      flat_shipping_cost_cents: parsed_env("FLAT_SHIPPING_COST_CENTS", defaults.flat_shipping_cost_cents)?,
      notify_timeout: Duration::from_millis(parsed_env(
        "NOTIFY_TIMEOUT_MS",
        defaults.notify_timeout.as_millis() as u64,
      )?),
      reminder_interval_secs: parsed_env("REMINDER_INTERVAL_SECS", 0u64)?,
      server_host,
      server_port,
      app_base_url,
    };

    tracing::info!(
      persistent = config.database_url.is_some(),
      email_api = config.email_api.is_some(),
      whatsapp_api = config.whatsapp_api.is_some(),
      "Application configuration loaded successfully."
    );
    Ok(config)
  }

  /// Library settings derived from the environment. Hooks run detached so HTTP responses
  /// never wait on a notification provider.
  pub fn orderflow_settings(&self) -> OrderflowSettings {
    OrderflowSettings {
      base_url: self.app_base_url.clone(),
      store_name: self.store_name.clone(),
      currency: self.currency.clone(),
      country_code: self.country_code.clone(),
      operator_whatsapp: self.operator_whatsapp.clone(),
      action_link_secret: self.action_link_secret.clone(),
      free_shipping_threshold_cents: self.free_shipping_threshold_cents,
      flat_shipping_cost_cents: self.flat_shipping_cost_cents,
      notify_timeout: self.notify_timeout,
      hook_mode: HookMode::Detached,
      ..OrderflowSettings::default()
    }
  }

  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}
