//! Subcommand implementations. Each wraps `vitrine_core` engine types
//! directly — the CLI adds no engine behavior of its own.

pub mod graph;
pub mod invalidate;
pub mod stats;
pub mod warm;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use vitrine_core::config::DatabaseConfig;
use vitrine_core::error::{FacadeError, Result};

pub use vitrine_core::db::schema_name_from_url;

/// Connect a pool using the façade's own database settings.
pub async fn connect_pool(db: &DatabaseConfig) -> Result<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(db.max_connections)
        .connect(&db.url)
        .await
        .map_err(|e| FacadeError::database(format!("failed to connect to '{}': {e}", db.url)))
}
