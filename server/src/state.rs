// storefront_app/src/state.rs
use crate::config::AppConfig;
use orderflow::Orderflow;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub flow: Arc<Orderflow>,
  pub config: Arc<AppConfig>,
}
