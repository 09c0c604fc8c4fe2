// marketplace/src/db/mod.rs

//! Runtime-checked `sqlx` queries, one module per aggregate.
//!
//! Single-statement helpers take any `PgExecutor` so they run against the pool
//! or inside a transaction (`&mut *tx`). Helpers that issue several
//! statements take the pool or a connection explicitly.

pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod users;

use crate::errors::{AppError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
  let pool = PgPoolOptions::new()
    .max_connections(max_connections)
    .connect(database_url)
    .await?;
  info!(max_connections, "Database pool ready.");
  Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
  sqlx::migrate!("./migrations")
    .run(pool)
    .await
    .map_err(|e| AppError::Internal(format!("Database migration failed: {}", e)))?;
  info!("Database migrations applied.");
  Ok(())
}
