// tests/remote_action_tests.rs
mod common;

use chrono::Utc;
use common::*;
use orderflow::model::{AxisStatus, OrderStatus, PaymentStatus};
use orderflow::store::OrderStore;
use orderflow::{ActionQuery, OrderflowSettings, PageStatus, PageVariant, RemoteAction, TransitionRequest};
use uuid::Uuid;

fn query(order: &str, action: &str) -> ActionQuery {
  ActionQuery {
    order: Some(order.to_string()),
    action: Some(action.to_string()),
    sig: None,
    tracking: None,
  }
}

#[tokio::test]
async fn cancel_execute_on_cancelled_order_is_informational() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), Utc::now(), Some("ana@example.com")).await;
  h.flow
    .apply_transition(TransitionRequest::new(
      order.id,
      AxisStatus::Order(OrderStatus::Cancelled),
      operator(),
    ))
    .await
    .unwrap();
  let entries_before = h.store.status_history(order.id).await.unwrap().len();

  let page = h
    .flow
    .handle_remote_action(&query(&order.id.to_string(), "cancel_execute"))
    .await;
  assert_eq!(page.status, PageStatus::Ok);
  assert_eq!(page.variant, PageVariant::Info);
  assert_eq!(h.store.status_history(order.id).await.unwrap().len(), entries_before);
}

#[tokio::test]
async fn cancel_requires_the_confirmation_step() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), Utc::now(), None).await;

  let challenge = h
    .flow
    .handle_remote_action(&query(&order.id.to_string(), "cancel_confirm"))
    .await;
  assert_eq!(challenge.variant, PageVariant::Warning);
  let link = challenge.continue_link.expect("challenge page offers a continuation");
  assert!(link.url.contains("action=cancel_execute"));
  assert_eq!(
    h.store.get_order(order.id).await.unwrap().unwrap().order_status,
    OrderStatus::Pending
  );

  let done = h
    .flow
    .handle_remote_action(&query(&order.id.to_string(), "cancel_execute"))
    .await;
  assert_eq!(done.variant, PageVariant::Success);
  let history = h.store.status_history(order.id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].actor, "remote_link");
}

#[tokio::test]
async fn confirm_payment_uses_the_canonical_paid_status_and_notifies() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), Utc::now(), Some("ana@example.com")).await;

  let page = h
    .flow
    .handle_remote_action(&query(&order.id.to_string(), "confirm_payment"))
    .await;
  assert_eq!(page.variant, PageVariant::Success);
  assert_eq!(page.order.as_ref().unwrap().payment_status, PaymentStatus::Paid);
  assert_eq!(h.email.count(), 1);

  let again = h
    .flow
    .handle_remote_action(&query(&order.id.to_string(), "confirm_payment"))
    .await;
  assert_eq!(again.variant, PageVariant::Info);
  assert_eq!(h.store.status_history(order.id).await.unwrap().len(), 1);
  assert_eq!(h.email.count(), 1);
}

#[tokio::test]
async fn mark_shipped_stores_tracking_and_walks_through_processing() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), Utc::now(), Some("ana@example.com")).await;
  let mut q = query(&order.id.to_string(), "mark_shipped");
  q.tracking = Some(" 1Z999AA10123456784 ".to_string());

  let page = h.flow.handle_remote_action(&q).await;
  assert_eq!(page.variant, PageVariant::Success);

  let stored = h.store.get_order(order.id).await.unwrap().unwrap();
  assert_eq!(stored.order_status, OrderStatus::Shipped);
  assert_eq!(stored.tracking_number.as_deref(), Some("1Z999AA10123456784"));
  let statuses: Vec<String> = h
    .store
    .status_history(order.id)
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.new_status)
    .collect();
  assert_eq!(statuses, vec!["processing", "shipped"]);

  let shipped_mail = h.email.messages().pop().unwrap();
  assert!(shipped_mail.text.contains("1Z999AA10123456784"));
}

#[tokio::test]
async fn mark_shipped_on_cancelled_order_is_a_warning() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), Utc::now(), None).await;
  h.flow
    .apply_transition(TransitionRequest::new(
      order.id,
      AxisStatus::Order(OrderStatus::Cancelled),
      operator(),
    ))
    .await
    .unwrap();
  let page = h
    .flow
    .handle_remote_action(&query(&order.id.to_string(), "mark_shipped"))
    .await;
  assert_eq!(page.status, PageStatus::Ok);
  assert_eq!(page.variant, PageVariant::Warning);
}

#[tokio::test]
async fn malformed_requests_render_error_pages() {
  let h = harness();

  let missing = h.flow.handle_remote_action(&ActionQuery::default()).await;
  assert_eq!(missing.status, PageStatus::BadRequest);
  assert_eq!(missing.variant, PageVariant::Error);

  let bad_action = h
    .flow
    .handle_remote_action(&query(&Uuid::new_v4().to_string(), "delete_everything"))
    .await;
  assert_eq!(bad_action.status, PageStatus::BadRequest);

  let bad_id = h.flow.handle_remote_action(&query("not-a-uuid", "view")).await;
  assert_eq!(bad_id.status, PageStatus::BadRequest);

  let unknown = h
    .flow
    .handle_remote_action(&query(&Uuid::new_v4().to_string(), "view"))
    .await;
  assert_eq!(unknown.status, PageStatus::NotFound);
}

#[tokio::test]
async fn store_outage_renders_internal_error_page() {
  let h = harness();
  let order = seed_order(h.store.as_ref(), Utc::now(), None).await;
  h.store.set_unavailable(true);
  let page = h
    .flow
    .handle_remote_action(&query(&order.id.to_string(), "view"))
    .await;
  assert_eq!(page.status, PageStatus::Internal);
  assert_eq!(page.variant, PageVariant::Error);
}

#[tokio::test]
async fn signed_links_are_enforced_when_a_secret_is_configured() {
  let h = harness_with(OrderflowSettings {
    action_link_secret: Some("link-secret".to_string()),
    ..inline_settings()
  });
  let order = seed_order(h.store.as_ref(), Utc::now(), None).await;

  let unsigned = h
    .flow
    .handle_remote_action(&query(&order.id.to_string(), "cancel_execute"))
    .await;
  assert_eq!(unsigned.status, PageStatus::Forbidden);

  let mut forged = query(&order.id.to_string(), "cancel_execute");
  forged.sig = h.flow.links().sign(order.id, RemoteAction::View);
  assert_eq!(h.flow.handle_remote_action(&forged).await.status, PageStatus::Forbidden);
  assert!(h.store.status_history(order.id).await.unwrap().is_empty());

  let mut signed = query(&order.id.to_string(), "cancel_execute");
  signed.sig = h.flow.links().sign(order.id, RemoteAction::CancelExecute);
  let page = h.flow.handle_remote_action(&signed).await;
  assert_eq!(page.variant, PageVariant::Success);

  // The challenge page hands out a signed continuation.
  let other = seed_order(h.store.as_ref(), Utc::now(), None).await;
  let mut confirm = query(&other.id.to_string(), "cancel_confirm");
  confirm.sig = h.flow.links().sign(other.id, RemoteAction::CancelConfirm);
  let challenge = h.flow.handle_remote_action(&confirm).await;
  assert!(challenge.continue_link.unwrap().url.contains("&sig="));
}

#[test]
fn malformed_link_page_is_a_bad_request_error() {
  let page = orderflow::remote::ActionPage::malformed_link();
  assert_eq!(page.status, PageStatus::BadRequest);
  assert_eq!(page.status.http_code(), 400);
  assert_eq!(page.variant, PageVariant::Error);
  assert!(page.order.is_none());
  assert!(page.continue_link.is_none());
}
