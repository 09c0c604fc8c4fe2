// marketplace/src/main.rs

mod config;
mod db;
mod errors;
mod models;
mod pipelines;
mod services;
mod state;
mod web;

use crate::config::{AppConfig, LogFormat};
use crate::errors::AppError;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use marketflow::Flows;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

fn startup_error(stage: &str, err: AppError) -> io::Error {
  tracing::error!(error = %err, stage, "Startup failed.");
  io::Error::new(io::ErrorKind::Other, format!("{}: {}", stage, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      // Tracing is not up yet; the config decides its format.
      eprintln!("Configuration error: {}", e);
      return Err(io::Error::new(io::ErrorKind::InvalidInput, e.to_string()));
    }
  };
  init_tracing(app_config.log_format);
  tracing::info!(config = ?app_config, "Starting marketplace server...");

  let db_pool = db::connect(&app_config.database_url, app_config.database_max_connections)
    .await
    .map_err(|e| startup_error("database", e))?;
  if app_config.run_migrations {
    db::run_migrations(&db_pool).await.map_err(|e| startup_error("migrations", e))?;
  }

  let gateway = services::payments::gateway_from_config(&app_config).map_err(|e| startup_error("payment gateway", e))?;
  tracing::info!(gateway = gateway.name(), "Payment gateway ready.");

  let flows = Arc::new(Flows::<AppError>::new());
  let app_state = AppState {
    db_pool,
    flows: flows.clone(),
    config: app_config.clone(),
    gateway,
  };
  pipelines::register_all_pipelines(&flows, &app_state);

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!(%server_address, "Binding HTTP server.");

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
