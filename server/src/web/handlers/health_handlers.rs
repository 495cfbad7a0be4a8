// storefront_app/src/web/handlers/health_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::state::AppState;

/// Liveness plus which backends are wired. Does not touch the store.
pub async fn health_check_handler(app_state: web::Data<AppState>) -> HttpResponse {
  let config = &app_state.config;
  HttpResponse::Ok().json(json!({
    "status": "ok",
    "store": if config.database_url.is_some() { "postgres" } else { "memory" },
    "emailApi": config.email_api.is_some(),
    "whatsappApi": config.whatsapp_api.is_some(),
    "signedLinks": config.action_link_secret.is_some(),
  }))
}
