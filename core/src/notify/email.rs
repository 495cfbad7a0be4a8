// orderflow/src/notify/email.rs

//! Transactional email channel.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::DeliveryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
  pub to: String,
  pub subject: String,
  pub text: String,
  pub html: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
  /// Returns the provider's message id.
  async fn send(&self, message: &EmailMessage) -> Result<String, DeliveryError>;
}

/// Development sender: logs the message and reports a synthetic id.
#[derive(Debug, Default, Clone)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
  async fn send(&self, message: &EmailMessage) -> Result<String, DeliveryError> {
    let message_id = format!("log-{}", Uuid::new_v4().simple());
    info!(to = %message.to, subject = %message.subject, %message_id, "Email (log only).");
    debug!(body = %message.text, "Email body.");
    Ok(message_id)
  }
}

#[derive(Debug, Clone)]
pub struct HttpEmailConfig {
  pub endpoint: String,
  pub api_key: String,
  pub sender: String,
  pub timeout: Duration,
}

impl HttpEmailConfig {
  pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, sender: impl Into<String>) -> Self {
    Self {
      endpoint: endpoint.into(),
      api_key: api_key.into(),
      sender: sender.into(),
      timeout: Duration::from_secs(10),
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

#[derive(Serialize)]
struct SendEmailBody<'a> {
  from: &'a str,
  to: [&'a str; 1],
  subject: &'a str,
  text: &'a str,
  html: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
  #[serde(default)]
  id: Option<String>,
}

/// JSON POST to a transactional email API with bearer auth.
pub struct HttpEmailSender {
  client: Client,
  config: HttpEmailConfig,
}

impl HttpEmailSender {
  pub fn new(config: HttpEmailConfig) -> Result<Self, DeliveryError> {
    if config.endpoint.is_empty() {
      return Err(DeliveryError::Config("email endpoint not configured".to_string()));
    }
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
  async fn send(&self, message: &EmailMessage) -> Result<String, DeliveryError> {
    let body = SendEmailBody {
      from: &self.config.sender,
      to: [&message.to],
      subject: &message.subject,
      text: &message.text,
      html: &message.html,
    };
    let response = self
      .client
      .post(&self.config.endpoint)
      .bearer_auth(&self.config.api_key)
      .json(&body)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!(endpoint = %self.config.endpoint, %status, "Email provider rejected the message.");
      return Err(DeliveryError::Rejected {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
      });
    }

    let parsed: SendEmailResponse = response.json().await.unwrap_or(SendEmailResponse { id: None });
    let message_id = parsed.id.unwrap_or_else(|| format!("http-{}", Uuid::new_v4().simple()));
    debug!(to = %message.to, %message_id, "Email accepted by provider.");
    Ok(message_id)
  }
}
