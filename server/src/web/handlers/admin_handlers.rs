// storefront_app/src/web/handlers/admin_handlers.rs

//! Operator tooling. Every route requires `Authorization: Bearer <ADMIN_API_TOKEN>`.

use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use orderflow::model::{Actor, AxisStatus, StatusAxis};
use orderflow::{NotificationRequest, TransitionOutcome, TransitionRequest};
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// Proof that the request carried the configured admin token.
pub struct AdminToken;

fn token_matches(presented: &str, expected: &str) -> bool {
  presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

impl FromRequest for AdminToken {
  type Error = AppError;
  type Future = futures_util::future::Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let expected = req
      .app_data::<web::Data<AppState>>()
      .and_then(|state| state.config.admin_api_token.clone());
    let Some(expected) = expected else {
      warn!("AdminToken extractor: ADMIN_API_TOKEN is not configured, admin routes are disabled.");
      return futures_util::future::ready(Err(AppError::Auth("Admin API is disabled.".to_string())));
    };

    let presented = req
      .headers()
      .get("Authorization")
      .and_then(|h| h.to_str().ok())
      .and_then(|h| h.strip_prefix("Bearer "))
      .map(str::trim);
    match presented {
      Some(token) if token_matches(token, &expected) => futures_util::future::ready(Ok(AdminToken)),
      _ => {
        warn!("AdminToken extractor: missing or invalid bearer token.");
        futures_util::future::ready(Err(AppError::Auth(
          "A valid admin bearer token is required.".to_string(),
        )))
      }
    }
  }
}

fn admin_actor() -> Actor {
  Actor::operator("admin_api")
}

fn parse_order_id(raw: &str) -> Result<Uuid, AppError> {
  Uuid::parse_str(raw.trim()).map_err(|_| AppError::Validation(format!("'{}' is not a valid order id", raw)))
}

// --- Request DTOs ---

#[derive(Deserialize, Debug)]
pub struct SearchQuery {
  #[serde(default)]
  pub q: String,
  pub limit: Option<i64>,
}

#[derive(Deserialize, Debug)]
pub struct StatusUpdatePayload {
  pub axis: String,
  pub status: String,
  pub note: Option<String>,
  #[serde(default)]
  pub r#override: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TrackingPayload {
  pub tracking_number: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayload {
  pub receipt_url: String,
}

// --- Handlers ---

#[instrument(name = "handler::admin_search_orders", skip(app_state, _admin, query), fields(q = %query.q))]
pub async fn search_orders_handler(
  app_state: web::Data<AppState>,
  _admin: AdminToken,
  query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.flow.search_orders(&query.q, query.limit).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders, "count": orders.len() })))
}

#[instrument(name = "handler::admin_order_details", skip(app_state, _admin))]
pub async fn order_details_handler(
  app_state: web::Data<AppState>,
  _admin: AdminToken,
  order_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order_id = parse_order_id(&order_id)?;
  let details = app_state.flow.order_details(order_id).await?;
  Ok(HttpResponse::Ok().json(details))
}

/// Direct status update. Runs through the same engine and hooks as every other transition.
#[instrument(
    name = "handler::admin_update_status",
    skip(app_state, _admin, payload),
    fields(axis = %payload.axis, status = %payload.status, is_override = payload.r#override)
)]
pub async fn update_status_handler(
  app_state: web::Data<AppState>,
  _admin: AdminToken,
  order_id: web::Path<String>,
  payload: web::Json<StatusUpdatePayload>,
) -> Result<HttpResponse, AppError> {
  let order_id = parse_order_id(&order_id)?;
  let payload = payload.into_inner();
  let axis = StatusAxis::parse(&payload.axis)
    .ok_or_else(|| AppError::Validation(format!("Unknown status axis '{}'", payload.axis)))?;
  let target = AxisStatus::parse(axis, &payload.status)?;

  let mut request = TransitionRequest::new(order_id, target, admin_actor());
  if let Some(note) = payload.note {
    request = request.with_note(note);
  }
  if payload.r#override {
    request = request.as_override();
  }

  let outcome = app_state.flow.apply_transition(request).await?;
  let applied = outcome.is_applied();
  info!("Admin status update for order {}: {} (applied: {}).", order_id, target, applied);
  let body = match outcome {
    TransitionOutcome::Applied { order, entry } => json!({ "applied": true, "order": order, "entry": entry }),
    TransitionOutcome::Unchanged { order } => json!({ "applied": false, "order": order }),
  };
  Ok(HttpResponse::Ok().json(body))
}

#[instrument(name = "handler::admin_set_tracking", skip(app_state, _admin, payload))]
pub async fn set_tracking_handler(
  app_state: web::Data<AppState>,
  _admin: AdminToken,
  order_id: web::Path<String>,
  payload: web::Json<TrackingPayload>,
) -> Result<HttpResponse, AppError> {
  let order_id = parse_order_id(&order_id)?;
  let order = app_state
    .flow
    .set_tracking_number(order_id, &payload.tracking_number)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::admin_attach_receipt", skip(app_state, _admin, payload))]
pub async fn attach_receipt_handler(
  app_state: web::Data<AppState>,
  _admin: AdminToken,
  order_id: web::Path<String>,
  payload: web::Json<ReceiptPayload>,
) -> Result<HttpResponse, AppError> {
  let order_id = parse_order_id(&order_id)?;
  let order = app_state.flow.attach_receipt(order_id, &payload.receipt_url).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::admin_run_reminders", skip(app_state, _admin))]
pub async fn run_reminders_handler(
  app_state: web::Data<AppState>,
  _admin: AdminToken,
) -> Result<HttpResponse, AppError> {
  let report = app_state.flow.run_reminders().await?;
  info!(
    "Reminder sweep via admin API: {} sent, {} skipped, {} errors.",
    report.sent,
    report.skipped,
    report.errors.len()
  );
  Ok(HttpResponse::Ok().json(report))
}

/// The notification send interface. Never fails on channel trouble: the report says what happened.
#[instrument(
    name = "handler::admin_send_notification",
    skip(app_state, _admin, payload),
    fields(kind = %payload.kind, order_id = %payload.order_id)
)]
pub async fn send_notification_handler(
  app_state: web::Data<AppState>,
  _admin: AdminToken,
  payload: web::Json<NotificationRequest>,
) -> Result<HttpResponse, AppError> {
  let report = app_state.flow.send_notification(&payload).await;
  Ok(HttpResponse::Ok().json(report))
}
