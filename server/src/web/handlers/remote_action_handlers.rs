// storefront_app/src/web/handlers/remote_action_handlers.rs

use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use orderflow::remote::ActionPage;
use orderflow::ActionQuery;
use tracing::{info, instrument, warn};

use crate::state::AppState;
use crate::web::pages::render_action_page;

/// `GET /confirm-order`. Always answers with an HTML page, even on failure.
#[instrument(
    name = "handler::remote_action",
    skip(app_state, query),
    fields(order = ?query.order, action = ?query.action, signed = query.sig.is_some())
)]
pub async fn remote_action_handler(app_state: web::Data<AppState>, query: web::Query<ActionQuery>) -> HttpResponse {
  let page = app_state.flow.handle_remote_action(&query).await;
  info!(status = ?page.status, variant = ?page.variant, "Remote action page rendered.");
  page_response(&page, &app_state.config.store_name, &app_state.config.currency)
}

fn page_response(page: &ActionPage, store_name: &str, currency: &str) -> HttpResponse {
  let status = StatusCode::from_u16(page.status.http_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
  HttpResponse::build(status)
    .content_type("text/html; charset=utf-8")
    .insert_header(("Cache-Control", "no-store"))
    .body(render_action_page(page, store_name, currency))
}

/// Query extraction for `/confirm-order`. An unreadable query string (duplicated keys,
/// broken encoding) still gets an HTML page instead of actix's plain-text 400.
pub fn action_query_config() -> web::QueryConfig {
  web::QueryConfig::default().error_handler(|err, req| {
    warn!(error = %err, query = req.query_string(), "Remote action link with an unreadable query string.");
    let (store_name, currency) = req
      .app_data::<web::Data<AppState>>()
      .map(|state| (state.config.store_name.clone(), state.config.currency.clone()))
      .unwrap_or_default();
    let response = page_response(&ActionPage::malformed_link(), &store_name, &currency);
    InternalError::from_response(err, response).into()
  })
}
