//! Cache key derivation for table operations.
//!
//! # Security Critical
//!
//! A fingerprint is the only thing standing between two different queries
//! sharing a cache slot. It MUST change whenever the table, operation,
//! filter, or options change, and MUST stay stable across process restarts
//! for the same logical query (no `HashMap` iteration order, no random
//! seed).
//!
//! # Composition
//!
//! The fingerprint is a SHA-256 hash of:
//! ```text
//! SHA256(table : op : sorted(where) : sorted(options))
//! ```
//! with `correlationId`, `skipCache`, and `withRelations` stripped from
//! `options` before hashing — those fields steer request handling, not
//! what data comes back, so including them would needlessly fragment the
//! cache.

use sha2::{Digest, Sha256};

use crate::db::WhereExpr;

/// Options accompanying a table operation, as they arrive from a caller.
/// Only the fields that affect the resulting row set are hashed; the rest
/// exist purely to steer request handling.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QueryOptions {
    /// Row cap.
    pub limit: Option<u32>,
    /// Row offset.
    pub offset: Option<u32>,
    /// Column(s) to sort by, in order.
    pub order_by: Vec<String>,
    /// Request-tracing identifier. Excluded from the fingerprint.
    #[serde(skip_serializing)]
    pub correlation_id: Option<String>,
    /// Caller opt-out of the cache. Excluded from the fingerprint.
    #[serde(skip_serializing)]
    pub skip_cache: bool,
    /// Whether to expand FK relations in the response. Excluded from the
    /// fingerprint: the cached row set is identical whether or not the
    /// caller later asks for it expanded.
    #[serde(skip_serializing)]
    pub with_relations: bool,
}

/// Derive the cache fingerprint for a table operation.
///
/// 64-character lowercase hex string (SHA-256).
#[must_use]
pub fn fingerprint(table: &str, op: &str, where_expr: Option<&WhereExpr>, options: &QueryOptions) -> String {
    let where_structure = where_expr.map(|w| format!("{w:?}")).unwrap_or_default();
    let options_structure = serde_json::to_string(options).unwrap_or_default();

    let combined = format!("{table}:{op}:{where_structure}:{options_structure}");

    let mut hasher = Sha256::new();
    hasher.update(combined.as_bytes());
    hex::encode(hasher.finalize())
}

/// Shorter fingerprint for id-keyed lookups (`findById`), which skip
/// filter/option hashing entirely since the id alone determines the row.
/// Already a full cache key (`<prefix>:cache:<table>:id:<id>`), not a bare
/// hash — `findById` has no separate fingerprint/cache-key split since the
/// id itself is unique enough to use directly.
#[must_use]
pub fn fingerprint_by_id(prefix: &str, table: &str, id: &str) -> String {
    format!("{prefix}:cache:{table}:id:{id}")
}
