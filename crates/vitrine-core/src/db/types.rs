//! Database types and data structures.

use serde::{Deserialize, Serialize};

/// Database backend in use. The façade targets MariaDB/MySQL; the variant
/// exists so logs and metrics can name the dialect without hardcoding a
/// string literal at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseType {
    /// MySQL or MariaDB, accessed via the `mysql` wire protocol.
    MySQL,
}

impl DatabaseType {
    /// Short identifier suitable for logs and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySQL => "mysql",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single result row, represented as a JSON object keyed by column name.
///
/// Every adapter converts its wire-format row into this shape so the rest
/// of the façade (caching, search indexing, relation expansion) never has
/// to know about `sqlx::Row`/column types directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row(pub serde_json::Value);

impl Row {
    /// Wrap a JSON object as a row.
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Look up a single column by name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.0.get(column)
    }

    /// Consume the row, returning the underlying JSON value.
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

/// Connection pool health/capacity snapshot, exposed by every
/// [`super::traits::DatabaseAdapter`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMetrics {
    /// Total connections currently held by the pool (idle + active).
    pub total_connections: u32,
    /// Connections sitting idle, available for immediate use.
    pub idle_connections: u32,
    /// Connections currently executing a query.
    pub active_connections: u32,
    /// Callers blocked waiting for a connection to free up.
    pub waiting_requests: u32,
}

impl PoolMetrics {
    /// Fraction of the pool currently in use, in `[0.0, 1.0]`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.total_connections == 0 {
            return 0.0;
        }
        f64::from(self.active_connections) / f64::from(self.total_connections)
    }

    /// True when every connection is active and callers are queueing.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.active_connections >= self.total_connections && self.waiting_requests > 0
    }
}
