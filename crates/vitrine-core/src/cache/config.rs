//! Cache configuration.
//!
//! Defines how aggressively the façade caches table-operation results and
//! how a write propagates into invalidation.

use serde::{Deserialize, Serialize};

/// When a write to a table triggers invalidation of its cached results
/// (and, per [`CacheConfig::cascade_invalidation`], the results of tables
/// that depend on it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidationStrategy {
    /// Invalidate synchronously with the triggering write (still
    /// fire-and-forget from the write's perspective — see
    /// [`crate::cache::invalidation::InvalidationEngine`]).
    Immediate,
    /// Defer invalidation to the next read, which checks entry freshness.
    Lazy,
    /// Rely entirely on TTL expiry; writes never trigger invalidation.
    TtlOnly,
}

impl Default for InvalidationStrategy {
    fn default() -> Self {
        Self::Immediate
    }
}

/// Cache configuration with memory-safe bounds.
///
/// # Memory Safety
///
/// `max_keys` is a hard cap on cached entries, enforced by the backing
/// store's own eviction policy; `default_ttl_secs` is a safety net for
/// writes that bypass invalidation (e.g. direct database mutation outside
/// the façade).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable query-result caching. `false` disables the cache entirely —
    /// every read goes straight to the database.
    pub enabled: bool,

    /// `redis://` connection URL for the backing key-value store. Shared
    /// by the query-result cache, the inverted index, and the geo index.
    pub redis_url: String,

    /// Default time-to-live, in seconds, for a cached entry.
    pub default_ttl_secs: u64,

    /// Soft cap on cached entries. Enforcement is the backing store's
    /// concern (e.g. Redis `maxmemory-policy`); this is advisory sizing.
    pub max_keys: usize,

    /// Whether a successful write to a table triggers invalidation at all.
    pub invalidate_on_write: bool,

    /// Whether invalidation walks the FK dependency graph (component B) to
    /// also invalidate dependent tables, or only invalidates the written
    /// table itself.
    pub cascade_invalidation: bool,

    /// How invalidation is scheduled relative to the triggering write.
    pub strategy: InvalidationStrategy,
}

impl Default for CacheConfig {
    /// Caching enabled, 24 hour TTL, cascade invalidation fired immediately.
    fn default() -> Self {
        Self::const_default()
    }
}

impl CacheConfig {
    /// Configuration with caching disabled outright, for tests that need
    /// deterministic behavior without cached results.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { enabled: false, ..Self::const_default() }
    }

    /// Configuration with a custom TTL, defaults otherwise.
    #[must_use]
    pub const fn with_ttl_secs(default_ttl_secs: u64) -> Self {
        Self { default_ttl_secs, ..Self::const_default() }
    }

    const fn const_default() -> Self {
        Self {
            enabled: true,
            redis_url: String::new(),
            default_ttl_secs: 86_400,
            max_keys: 10_000,
            invalidate_on_write: true,
            cascade_invalidation: true,
            strategy: InvalidationStrategy::Immediate,
        }
    }
}
