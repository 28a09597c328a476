//! Database adapter trait definitions.

use async_trait::async_trait;

use super::types::{DatabaseType, PoolMetrics, Row};
use super::where_clause::WhereExpr;
use crate::error::Result;

/// Database adapter for executing queries against a table.
///
/// Every subsystem that touches the database (table operations, schema
/// discovery, the auto-warmer's secondary pool) goes through this trait
/// rather than holding a raw `sqlx::MySqlPool`, so tests can substitute a
/// fake without a running MariaDB instance.
///
/// # Example
///
/// ```rust,no_run
/// use vitrine_core::db::{DatabaseAdapter, WhereExpr, WhereOperator};
/// use serde_json::json;
///
/// # async fn example(adapter: impl DatabaseAdapter) -> Result<(), Box<dyn std::error::Error>> {
/// let where_expr = WhereExpr::Term {
///     path: vec!["email".to_string()],
///     operator: WhereOperator::Icontains,
///     value: json!("example.com"),
/// };
///
/// let results = adapter
///     .execute_where_query("users", Some(&where_expr), None, None)
///     .await?;
///
/// println!("Found {} rows", results.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Execute a WHERE query against a table and return its rows.
    ///
    /// # Arguments
    ///
    /// * `table` - Table name.
    /// * `where_expr` - Optional filter AST.
    /// * `limit` - Optional row limit (for pagination).
    /// * `offset` - Optional row offset (for pagination).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::FacadeError::Database`] on query execution failure.
    async fn execute_where_query(
        &self,
        table: &str,
        where_expr: Option<&WhereExpr>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Row>>;

    /// Database backend in use (for logging/metrics).
    fn database_type(&self) -> DatabaseType;

    /// Verify database connectivity with a trivial query.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::FacadeError::Database`] if the check fails.
    async fn health_check(&self) -> Result<()>;

    /// Current connection pool statistics.
    fn pool_metrics(&self) -> PoolMetrics;
}
