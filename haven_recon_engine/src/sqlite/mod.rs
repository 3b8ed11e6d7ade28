//! SQLite backend for the Haven reconciliation engine.
mod sqlite_impl;

pub mod db;

use std::env;

use log::*;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
pub use sqlite_impl::SqliteDatabase;

use crate::traits::ReconciliationError;

pub fn db_url() -> String {
    env::var("HPS_DATABASE_URL").unwrap_or_else(|_| {
        warn!("🗃️ HPS_DATABASE_URL is not set. Falling back to a local database file.");
        "sqlite://data/haven.db".to_string()
    })
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, ReconciliationError> {
    let options = url
        .parse::<SqliteConnectOptions>()
        .map_err(|e| ReconciliationError::DatabaseError(format!("Invalid database url ({url}): {e}")))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), ReconciliationError> {
    sqlx::migrate!("./src/sqlite/migrations")
        .run(pool)
        .await
        .map_err(|e| ReconciliationError::DatabaseError(format!("Migration error: {e}")))?;
    debug!("🗃️ Database migrations are up to date");
    Ok(())
}
