// storefront_app/src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod checkout_handlers;
pub mod health_handlers;
pub mod remote_action_handlers;
pub mod tracking_handlers;
