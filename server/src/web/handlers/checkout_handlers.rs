// storefront_app/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use orderflow::CheckoutRequest;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::state::AppState;

#[instrument(
    name = "handler::submit_checkout",
    skip(app_state, req_payload),
    fields(payment_method = %req_payload.payment_method.as_str(), items = req_payload.items.len())
)]
pub async fn submit_checkout_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
  let receipt = app_state.flow.submit_checkout(req_payload.into_inner()).await?;
  info!(
    "Checkout completed. Order ID: {}. Short ID: {}. Total: {} cents.",
    receipt.order.id, receipt.short_id, receipt.order.total_cents
  );

  Ok(HttpResponse::Created().json(json!({
    "orderId": receipt.order.id,
    "shortId": receipt.short_id,
    "paymentMethod": receipt.order.payment_method,
    "paymentReference": receipt.order.payment_reference,
    "subtotalCents": receipt.order.subtotal_cents,
    "shippingCostCents": receipt.order.shipping_cost_cents,
    "totalCents": receipt.order.total_cents,
    "items": receipt.items,
  })))
}
