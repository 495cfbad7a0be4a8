// storefront_app/src/web/routes.rs

use actix_web::web;

use crate::web::handlers::{
  admin_handlers, checkout_handlers, health_handlers, remote_action_handlers, tracking_handlers,
};

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  // Reached from operator WhatsApp links, so it lives outside the API scope.
  cfg.service(
    web::resource("/confirm-order")
      .app_data(remote_action_handlers::action_query_config())
      .route(web::get().to(remote_action_handlers::remote_action_handler)),
  );

  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_handlers::health_check_handler))
      .route("/checkout", web::post().to(checkout_handlers::submit_checkout_handler))
      .route("/orders/track", web::get().to(tracking_handlers::track_order_handler))
      .service(
        web::scope("/admin")
          .route("/orders", web::get().to(admin_handlers::search_orders_handler))
          .route("/orders/{order_id}", web::get().to(admin_handlers::order_details_handler))
          .route(
            "/orders/{order_id}/status",
            web::post().to(admin_handlers::update_status_handler),
          )
          .route(
            "/orders/{order_id}/tracking",
            web::post().to(admin_handlers::set_tracking_handler),
          )
          .route(
            "/orders/{order_id}/receipt",
            web::post().to(admin_handlers::attach_receipt_handler),
          )
          .route("/reminders/run", web::post().to(admin_handlers::run_reminders_handler))
          .route(
            "/notifications",
            web::post().to(admin_handlers::send_notification_handler),
          ),
      ),
  );
}
