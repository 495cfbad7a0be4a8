// orderflow/src/notify/hook.rs

use async_trait::async_trait;
use std::sync::Arc;

use super::{Dispatcher, NotificationKind, NotificationRequest};
use crate::error::{OrderflowError, OrderflowResult};
use crate::store::OrderStore;
use crate::transition::{TransitionEvent, TransitionHook};

/// Sends the customer notification tied to the status a transition reached.
pub struct NotifyOnTransition {
  store: Arc<dyn OrderStore>,
  dispatcher: Arc<Dispatcher>,
}

impl NotifyOnTransition {
  pub fn new(store: Arc<dyn OrderStore>, dispatcher: Arc<Dispatcher>) -> Self {
    Self { store, dispatcher }
  }
}

#[async_trait]
impl TransitionHook for NotifyOnTransition {
  fn name(&self) -> &'static str {
    "notify_customer"
  }

  async fn on_transition(&self, event: TransitionEvent) -> OrderflowResult<()> {
    let Some(kind) = NotificationKind::for_transition(event.reached) else {
      return Ok(());
    };
    let items = self.store.order_items(event.order.id).await?;
    let request = NotificationRequest::for_order(kind, &event.order, &items);
    let report = self.dispatcher.dispatch(&request).await;

    if report.email.is_failed() || report.whatsapp.is_failed() {
      return Err(OrderflowError::NotificationDelivery(format!(
        "{} for order {} needs a manual send",
        kind.as_str(),
        event.order.short_id()
      )));
    }
    Ok(())
  }
}
