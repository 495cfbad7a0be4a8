// orderflow/src/remote.rs

//! Remote Action decision logic.
//!
//! Links in operator messages land here. Every outcome, including failures, is an
//! [`ActionPage`] so the HTTP layer only has to render it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::OrderflowError;
use crate::links::{ActionLinks, RemoteAction};
use crate::model::{Actor, AxisStatus, Order, OrderStatus, PaymentStatus};
use crate::store::OrderStore;
use crate::transition::{TransitionEngine, TransitionOutcome, TransitionRequest};

/// Raw query string of `/confirm-order`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActionQuery {
  pub order: Option<String>,
  pub action: Option<String>,
  pub sig: Option<String>,
  pub tracking: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
  Ok,
  BadRequest,
  Forbidden,
  NotFound,
  Internal,
}

impl PageStatus {
  pub fn http_code(self) -> u16 {
    match self {
      PageStatus::Ok => 200,
      PageStatus::BadRequest => 400,
      PageStatus::Forbidden => 403,
      PageStatus::NotFound => 404,
      PageStatus::Internal => 500,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageVariant {
  Success,
  Error,
  Info,
  Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
  pub short_id: String,
  pub customer_name: String,
  pub payment_status: PaymentStatus,
  pub order_status: OrderStatus,
  pub total_cents: i64,
  pub tracking_number: Option<String>,
}

impl From<&Order> for OrderSummary {
  fn from(order: &Order) -> Self {
    Self {
      short_id: order.short_id(),
      customer_name: order.customer_name.clone(),
      payment_status: order.payment_status,
      order_status: order.order_status,
      total_cents: order.total_cents,
      tracking_number: order.tracking_number.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLink {
  pub label: String,
  pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionPage {
  pub status: PageStatus,
  pub variant: PageVariant,
  pub title: String,
  pub message: String,
  pub order: Option<OrderSummary>,
  /// Only set on the cancellation challenge page.
  pub continue_link: Option<PageLink>,
}

impl ActionPage {
  fn new(status: PageStatus, variant: PageVariant, title: &str, message: impl Into<String>) -> Self {
    Self {
      status,
      variant,
      title: title.to_string(),
      message: message.into(),
      order: None,
      continue_link: None,
    }
  }

  fn success(title: &str, message: impl Into<String>, order: &Order) -> Self {
    Self::new(PageStatus::Ok, PageVariant::Success, title, message).with_order(order)
  }

  fn info(title: &str, message: impl Into<String>, order: &Order) -> Self {
    Self::new(PageStatus::Ok, PageVariant::Info, title, message).with_order(order)
  }

  fn warning(title: &str, message: impl Into<String>, order: &Order) -> Self {
    Self::new(PageStatus::Ok, PageVariant::Warning, title, message).with_order(order)
  }

  fn error(status: PageStatus, title: &str, message: impl Into<String>) -> Self {
    Self::new(status, PageVariant::Error, title, message)
  }

  /// Page for a request whose query string could not be read at all.
  pub fn malformed_link() -> Self {
    Self::error(
      PageStatus::BadRequest,
      "Malformed link",
      "This link could not be read. Please use the original link from the message.",
    )
  }

  fn with_order(mut self, order: &Order) -> Self {
    self.order = Some(OrderSummary::from(order));
    self
  }
}

pub struct RemoteActions {
  store: Arc<dyn OrderStore>,
  engine: Arc<TransitionEngine>,
  links: ActionLinks,
}

impl RemoteActions {
  pub fn new(store: Arc<dyn OrderStore>, engine: Arc<TransitionEngine>, links: ActionLinks) -> Self {
    Self { store, engine, links }
  }

  #[instrument(name = "RemoteActions::handle", skip_all, fields(order = ?query.order, action = ?query.action))]
  pub async fn handle(&self, query: &ActionQuery) -> ActionPage {
    let order_param = query.order.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let action_param = query.action.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let (Some(order_param), Some(action_param)) = (order_param, action_param) else {
      return ActionPage::error(
        PageStatus::BadRequest,
        "Incomplete link",
        "This link is missing the order or the action. Please use the full link from the message.",
      );
    };
    let Some(action) = RemoteAction::parse(action_param) else {
      return ActionPage::error(
        PageStatus::BadRequest,
        "Unknown action",
        format!("'{}' is not an action this page can perform.", action_param),
      );
    };
    let Ok(order_id) = Uuid::parse_str(order_param) else {
      return ActionPage::error(PageStatus::BadRequest, "Invalid order", "The order number in this link is not valid.");
    };

    if !self.links.verify(order_id, action, query.sig.as_deref()) {
      warn!(%order_id, %action, "Remote action link with missing or invalid signature.");
      return ActionPage::error(
        PageStatus::Forbidden,
        "Link not valid",
        "This link could not be verified. Please use the original link from the message.",
      );
    }

    let order = match self.store.get_order(order_id).await {
      Ok(Some(order)) => order,
      Ok(None) => return not_found(order_id),
      Err(e) => return internal(OrderflowError::from(e)),
    };

    info!("Remote action (Order {}): {}.", order.short_id(), action);
    match action {
      RemoteAction::ConfirmPayment => self.confirm_payment(order).await,
      RemoteAction::CancelConfirm => self.cancel_confirm(order),
      RemoteAction::CancelExecute => self.cancel_execute(order).await,
      RemoteAction::MarkShipped => self.mark_shipped(order, query.tracking.as_deref()).await,
      RemoteAction::View => ActionPage::info(
        &format!("Order #{}", order.short_id()),
        "Current status of this order.",
        &order,
      ),
    }
  }

  async fn confirm_payment(&self, order: Order) -> ActionPage {
    if order.payment_status == PaymentStatus::Paid {
      return ActionPage::info("Payment already confirmed", "Nothing to do, this payment was confirmed before.", &order);
    }
    let request = TransitionRequest::new(order.id, AxisStatus::Payment(PaymentStatus::Paid), Actor::RemoteLink)
      .with_note("confirmed from remote link");
    match self.engine.apply(request).await {
      Ok(TransitionOutcome::Applied { order, .. }) => ActionPage::success(
        "Payment confirmed",
        "The payment is confirmed and the customer is being notified.",
        &order,
      ),
      Ok(TransitionOutcome::Unchanged { order }) => {
        ActionPage::info("Payment already confirmed", "Nothing to do, this payment was confirmed before.", &order)
      }
      Err(e) => self.transition_failure(e, &order),
    }
  }

  fn cancel_confirm(&self, order: Order) -> ActionPage {
    match order.order_status {
      OrderStatus::Cancelled => ActionPage::info("Already cancelled", "This order was cancelled before.", &order),
      OrderStatus::Shipped | OrderStatus::Delivered => ActionPage::warning(
        "Cannot cancel",
        format!("This order is already {} and can no longer be cancelled.", order.order_status.as_str()),
        &order,
      ),
      OrderStatus::Pending | OrderStatus::Processing => {
        let mut page = ActionPage::warning(
          "Cancel this order?",
          format!(
            "Order #{} will be cancelled. This cannot be undone from here.",
            order.short_id()
          ),
          &order,
        );
        page.continue_link = Some(PageLink {
          label: format!("Yes, cancel order #{}", order.short_id()),
          url: self.links.url(order.id, RemoteAction::CancelExecute),
        });
        page
      }
    }
  }

  async fn cancel_execute(&self, order: Order) -> ActionPage {
    if order.order_status == OrderStatus::Cancelled {
      return ActionPage::info("Already cancelled", "This order was cancelled before.", &order);
    }
    let request = TransitionRequest::new(order.id, AxisStatus::Order(OrderStatus::Cancelled), Actor::RemoteLink)
      .with_note("cancelled from remote link");
    match self.engine.apply(request).await {
      Ok(TransitionOutcome::Applied { order, .. }) => {
        ActionPage::success("Order cancelled", "The order has been cancelled.", &order)
      }
      Ok(TransitionOutcome::Unchanged { order }) => {
        ActionPage::info("Already cancelled", "This order was cancelled before.", &order)
      }
      Err(e) => self.transition_failure(e, &order),
    }
  }

  async fn mark_shipped(&self, order: Order, tracking: Option<&str>) -> ActionPage {
    match order.order_status {
      OrderStatus::Cancelled => {
        return ActionPage::warning("Cannot ship", "This order is cancelled and cannot be shipped.", &order);
      }
      OrderStatus::Shipped | OrderStatus::Delivered => {
        return ActionPage::info(
          "Already shipped",
          format!("This order is already {}.", order.order_status.as_str()),
          &order,
        );
      }
      OrderStatus::Pending | OrderStatus::Processing => {}
    }

    let mut order = order;
    if let Some(tracking) = tracking.map(str::trim).filter(|t| !t.is_empty()) {
      match self.store.set_tracking_number(order.id, tracking, chrono::Utc::now()).await {
        Ok(Some(updated)) => order = updated,
        Ok(None) => return not_found(order.id),
        Err(e) => return internal(OrderflowError::from(e)),
      }
    }

    if order.order_status == OrderStatus::Pending {
      let request =
        TransitionRequest::new(order.id, AxisStatus::Order(OrderStatus::Processing), Actor::RemoteLink)
          .with_note("processing on the way to shipped");
      match self.engine.apply(request).await {
        Ok(outcome) => order = outcome.into_order(),
        Err(e) => return self.transition_failure(e, &order),
      }
    }

    let request = TransitionRequest::new(order.id, AxisStatus::Order(OrderStatus::Shipped), Actor::RemoteLink)
      .with_note("marked shipped from remote link");
    match self.engine.apply(request).await {
      Ok(TransitionOutcome::Applied { order, .. }) => {
        ActionPage::success("Order shipped", "The order is marked as shipped and the customer is being notified.", &order)
      }
      Ok(TransitionOutcome::Unchanged { order }) => ActionPage::info("Already shipped", "This order is already shipped.", &order),
      Err(e) => self.transition_failure(e, &order),
    }
  }

  fn transition_failure(&self, err: OrderflowError, order: &Order) -> ActionPage {
    match err {
      e if e.is_rejected_transition() => {
        warn!(error = %e, "Remote action rejected by the state machine.");
        ActionPage::warning("Action not possible", e.to_string(), order)
      }
      OrderflowError::NotFound(id) => not_found(id),
      OrderflowError::ConcurrentModification { .. } => ActionPage::warning(
        "Order is changing",
        "Someone else is updating this order right now. Please reload in a moment.",
        order,
      ),
      other => internal(other),
    }
  }
}

fn not_found(order_id: Uuid) -> ActionPage {
  ActionPage::error(
    PageStatus::NotFound,
    "Order not found",
    format!("No order {} exists.", crate::model::order::short_id(&order_id)),
  )
}

fn internal(err: OrderflowError) -> ActionPage {
  error!(error = %err, "Remote action failed.");
  ActionPage::error(
    PageStatus::Internal,
    "Something went wrong",
    "The action could not be completed. Please try again in a few minutes.",
  )
}
