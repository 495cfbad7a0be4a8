// storefront_app/src/main.rs

mod config;
mod errors;
mod state;
#[cfg(test)]
mod test_support;
mod web;

use crate::config::AppConfig;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use orderflow::notify::{HttpEmailConfig, HttpEmailSender, HttpWhatsAppConfig, HttpWhatsAppSender};
use orderflow::{InMemoryOrderStore, OrderStore, Orderflow, PgOrderStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

async fn build_store(app_config: &AppConfig) -> anyhow::Result<Arc<dyn OrderStore>> {
  match &app_config.database_url {
    Some(url) => {
      let store = PgOrderStore::connect(url, app_config.database_max_connections)
        .await
        .context("Failed to connect to the database")?;
      store.migrate().await.context("Failed to apply the orderflow schema")?;
      tracing::info!("Successfully connected to the database.");
      let store: Arc<dyn OrderStore> = Arc::new(store);
      Ok(store)
    }
    None => {
      tracing::warn!("DATABASE_URL not set: using the in-memory order store. Orders are lost on restart.");
      let store: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
      Ok(store)
    }
  }
}

fn build_orderflow(app_config: &AppConfig, store: Arc<dyn OrderStore>) -> anyhow::Result<Orderflow> {
  let mut builder = Orderflow::builder(store).settings(app_config.orderflow_settings());

  if let Some(email) = &app_config.email_api {
    let sender = HttpEmailSender::new(
      HttpEmailConfig::new(email.url.clone(), email.api_key.clone(), email.sender.clone())
        .with_timeout(app_config.notify_timeout),
    )
    .context("Failed to build the email client")?;
    builder = builder.email_sender(Arc::new(sender));
  } else {
    tracing::warn!("No email API configured: outgoing email is only logged.");
  }

  if let Some(whatsapp) = &app_config.whatsapp_api {
    let sender = HttpWhatsAppSender::new(HttpWhatsAppConfig {
      endpoint: whatsapp.url.clone(),
      token: whatsapp.token.clone(),
      timeout: app_config.notify_timeout,
    })
    .context("Failed to build the WhatsApp client")?;
    builder = builder.whatsapp_sender(Arc::new(sender));
  }

  if app_config.action_link_secret.is_none() {
    tracing::warn!("ACTION_LINK_SECRET not set: remote action links are unsigned.");
  }
  Ok(builder.build())
}

fn spawn_reminder_ticker(flow: Arc<Orderflow>, every: Duration) {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; wait a full period instead.
    ticker.tick().await;
    loop {
      ticker.tick().await;
      match flow.run_reminders().await {
        Ok(report) => tracing::info!(
          sent = report.sent,
          skipped = report.skipped,
          errors = report.errors.len(),
          "Scheduled reminder sweep finished."
        ),
        Err(e) => tracing::error!(error = %e, "Scheduled reminder sweep failed."),
      }
    }
  });
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting storefront server...");

  let app_config = Arc::new(AppConfig::from_env().context("Configuration error")?);
  let store = build_store(&app_config).await?;
  let flow = Arc::new(build_orderflow(&app_config, store)?);

  if app_config.reminder_interval_secs > 0 {
    tracing::info!(every_secs = app_config.reminder_interval_secs, "In-process reminder ticker enabled.");
    spawn_reminder_ticker(flow.clone(), Duration::from_secs(app_config.reminder_interval_secs));
  }
  if app_config.admin_api_token.is_none() {
    tracing::warn!("ADMIN_API_TOKEN not set: admin routes will reject every request.");
  }

  let app_state = AppState {
    flow,
    config: app_config.clone(),
  };

  let server_address = app_config.bind_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)
  .with_context(|| format!("Failed to bind {}", server_address))?
  .run()
  .await?;
  Ok(())
}
