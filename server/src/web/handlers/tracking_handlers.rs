// storefront_app/src/web/handlers/tracking_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct TrackQuery {
  #[serde(default)]
  pub reference: String,
}

#[instrument(name = "handler::track_order", skip(app_state, query))]
pub async fn track_order_handler(
  app_state: web::Data<AppState>,
  query: web::Query<TrackQuery>,
) -> Result<HttpResponse, AppError> {
  match app_state.flow.track(&query.reference).await? {
    Some(view) => Ok(HttpResponse::Ok().json(view)),
    None => Err(AppError::NotFound(format!(
      "No order matches reference '{}'",
      query.reference.trim()
    ))),
  }
}
