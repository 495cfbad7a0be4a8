// orderflow/src/links.rs

//! Remote action links embedded in operator messages.
//!
//! A link is `<base>/confirm-order?order=<id>&action=<action>[&sig=<hex>]`, where
//! `sig = hex(HMAC-SHA256(secret, "<id>:<action>"))`. Without a secret no signature is
//! produced and every link verifies.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteAction {
  ConfirmPayment,
  CancelConfirm,
  CancelExecute,
  MarkShipped,
  View,
}

impl RemoteAction {
  pub const ALL: [RemoteAction; 5] = [
    RemoteAction::ConfirmPayment,
    RemoteAction::CancelConfirm,
    RemoteAction::CancelExecute,
    RemoteAction::MarkShipped,
    RemoteAction::View,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      RemoteAction::ConfirmPayment => "confirm_payment",
      RemoteAction::CancelConfirm => "cancel_confirm",
      RemoteAction::CancelExecute => "cancel_execute",
      RemoteAction::MarkShipped => "mark_shipped",
      RemoteAction::View => "view",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|a| a.as_str() == value.trim())
  }
}

impl fmt::Display for RemoteAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone)]
pub struct ActionLinks {
  base_url: String,
  secret: Option<Vec<u8>>,
}

impl fmt::Debug for ActionLinks {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActionLinks")
      .field("base_url", &self.base_url)
      .field("signed", &self.secret.is_some())
      .finish()
  }
}

impl ActionLinks {
  pub fn new(base_url: impl Into<String>, secret: Option<String>) -> Self {
    Self {
      base_url: base_url.into().trim_end_matches('/').to_string(),
      secret: secret.filter(|s| !s.is_empty()).map(String::into_bytes),
    }
  }

  pub fn requires_signature(&self) -> bool {
    self.secret.is_some()
  }

  fn mac(&self, order_id: Uuid, action: RemoteAction) -> Option<Vec<u8>> {
    let secret = self.secret.as_ref()?;
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}:{}", order_id, action.as_str()).as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
  }

  pub fn sign(&self, order_id: Uuid, action: RemoteAction) -> Option<String> {
    self.mac(order_id, action).map(hex::encode)
  }

  pub fn url(&self, order_id: Uuid, action: RemoteAction) -> String {
    let mut url = format!("{}/confirm-order?order={}&action={}", self.base_url, order_id, action);
    if let Some(sig) = self.sign(order_id, action) {
      url.push_str("&sig=");
      url.push_str(&sig);
    }
    url
  }

  /// `true` when no secret is configured, otherwise only for the exact signature.
  pub fn verify(&self, order_id: Uuid, action: RemoteAction, sig: Option<&str>) -> bool {
    if self.secret.is_none() {
      return true;
    }
    let (Some(expected), Some(given)) = (self.mac(order_id, action), sig) else {
      return false;
    };
    let Ok(given) = hex::decode(given.trim()) else {
      return false;
    };
    expected.ct_eq(given.as_slice()).into()
  }
}
