// orderflow/src/notify/whatsapp.rs

//! WhatsApp channel: `wa.me` deep links for manual sends, and an optional automated sender.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::DeliveryError;

const NATIONAL_NUMBER_DIGITS: usize = 10;

/// Digits of `raw` in international form, without `+`.
///
/// Ten-digit national numbers get `country_code` prepended. Anything shorter is unusable.
pub fn normalize_phone(raw: &str, country_code: &str) -> Option<String> {
  let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
  match digits.len() {
    n if n < NATIONAL_NUMBER_DIGITS => None,
    NATIONAL_NUMBER_DIGITS => Some(format!("{}{}", country_code, digits)),
    _ => Some(digits),
  }
}

/// RFC 3986 percent-encoding; only unreserved characters pass through.
pub fn percent_encode(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len() * 3);
  for byte in raw.bytes() {
    match byte {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
      _ => out.push_str(&format!("%{:02X}", byte)),
    }
  }
  out
}

pub fn deep_link(phone: &str, text: &str, country_code: &str) -> Option<String> {
  let number = normalize_phone(phone, country_code)?;
  Some(format!("https://wa.me/{}?text={}", number, percent_encode(text)))
}

#[async_trait]
pub trait WhatsAppSender: Send + Sync {
  /// `to` is already normalised to international digits.
  async fn send(&self, to: &str, text: &str) -> Result<String, DeliveryError>;
}

#[derive(Debug, Clone)]
pub struct HttpWhatsAppConfig {
  pub endpoint: String,
  pub token: String,
  pub timeout: Duration,
}

#[derive(Deserialize)]
struct MessageId {
  id: String,
}

#[derive(Deserialize)]
struct SendResponse {
  #[serde(default)]
  messages: Vec<MessageId>,
}

/// Cloud-API style text message sender.
pub struct HttpWhatsAppSender {
  client: Client,
  config: HttpWhatsAppConfig,
}

impl HttpWhatsAppSender {
  pub fn new(config: HttpWhatsAppConfig) -> Result<Self, DeliveryError> {
    if config.endpoint.is_empty() {
      return Err(DeliveryError::Config("WhatsApp endpoint not configured".to_string()));
    }
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }
}

#[async_trait]
impl WhatsAppSender for HttpWhatsAppSender {
  async fn send(&self, to: &str, text: &str) -> Result<String, DeliveryError> {
    let payload = json!({
      "messaging_product": "whatsapp",
      "to": to,
      "type": "text",
      "text": { "body": text },
    });
    let response = self
      .client
      .post(&self.config.endpoint)
      .bearer_auth(&self.config.token)
      .json(&payload)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!(%status, "WhatsApp API rejected the message.");
      return Err(DeliveryError::Rejected {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
      });
    }

    let parsed: SendResponse = response.json().await?;
    let message_id = parsed
      .messages
      .into_iter()
      .next()
      .map(|m| m.id)
      .ok_or_else(|| DeliveryError::Rejected {
        status: status.as_u16(),
        body: "response carried no message id".to_string(),
      })?;
    debug!(%message_id, "WhatsApp message accepted.");
    Ok(message_id)
  }
}
