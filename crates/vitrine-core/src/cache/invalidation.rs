//! Cascade invalidation engine (component D).
//!
//! A write to `table` invalidates cached results not just for `table`
//! itself but for every table whose cached rows could have joined or
//! filtered against it, per [`SchemaDependencyGraph::invalidation_targets`].
//! Invalidation is fire-and-forget: it never blocks or fails the write
//! that triggered it, it only logs.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::config::InvalidationStrategy;
use crate::cache::store::CacheStore;
use crate::schema::SchemaDependencyGraph;

/// TTL a lazily-invalidated entry is shrunk to. Short enough that a read
/// landing just after invalidation sees stale data for at most a few
/// seconds, long enough to avoid a delete burst hitting the store at the
/// exact moment of the write.
const LAZY_INVALIDATION_TTL: Duration = Duration::from_secs(5);

/// Drives cascade invalidation for a single discovered schema.
pub struct InvalidationEngine {
    store: Arc<dyn CacheStore>,
    graph: Arc<SchemaDependencyGraph>,
    key_prefix: String,
    cascade: bool,
    strategy: InvalidationStrategy,
}

impl InvalidationEngine {
    /// Build an engine over a store and a previously-built dependency
    /// graph, with cascade invalidation enabled and the `Immediate`
    /// strategy (the common case — see [`Self::with_options`] to
    /// configure otherwise).
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, graph: Arc<SchemaDependencyGraph>, key_prefix: impl Into<String>) -> Self {
        Self::with_options(store, graph, key_prefix, true, InvalidationStrategy::Immediate)
    }

    /// Build an engine with explicit cascade/strategy settings, as read
    /// from [`crate::cache::CacheConfig`].
    #[must_use]
    pub fn with_options(
        store: Arc<dyn CacheStore>,
        graph: Arc<SchemaDependencyGraph>,
        key_prefix: impl Into<String>,
        cascade: bool,
        strategy: InvalidationStrategy,
    ) -> Self {
        Self { store, graph, key_prefix: key_prefix.into(), cascade, strategy }
    }

    /// Invalidate every cached query result touching `table` and, if
    /// [`CacheConfig::cascade_invalidation`](crate::cache::CacheConfig)
    /// is set, every table transitively dependent on it.
    ///
    /// Spawned as a detached task by callers that don't want to wait on
    /// it; a failed scan/delete here is logged and swallowed; it never
    /// propagates to the write that triggered invalidation.
    pub async fn invalidate_table(&self, table: &str) {
        if self.strategy == InvalidationStrategy::TtlOnly {
            tracing::debug!(table, "ttl-only invalidation strategy, skipping explicit invalidation");
            return;
        }

        let targets: Vec<String> =
            if self.cascade { self.graph.invalidation_targets(table) } else { vec![table.to_string()] };

        for target in targets {
            let pattern = format!("{}:cache:{}:*", self.key_prefix, target);
            loop {
                let keys = match self.store.scan(&pattern).await {
                    Ok(keys) => keys,
                    Err(e) => {
                        tracing::warn!(table = %target, error = %e, "cache invalidation scan failed");
                        break;
                    }
                };
                if keys.is_empty() {
                    break;
                }
                let exhausted = keys.len() < crate::cache::MAX_SCAN_BATCH;

                let result = match self.strategy {
                    InvalidationStrategy::Immediate => self.store.multi_del(&keys).await,
                    InvalidationStrategy::Lazy => self.shrink_ttls(&keys).await,
                    InvalidationStrategy::TtlOnly => unreachable!("returned above"),
                };

                match result {
                    Ok(()) => tracing::debug!(table = %target, count = keys.len(), strategy = ?self.strategy, "invalidated cached entries"),
                    Err(e) => {
                        tracing::warn!(table = %target, error = %e, "cache invalidation delete failed");
                        break;
                    }
                }

                if exhausted {
                    break;
                }
            }
        }
    }

    async fn shrink_ttls(&self, keys: &[String]) -> crate::error::Result<()> {
        for key in keys {
            self.store.expire(key, LAZY_INVALIDATION_TTL).await?;
        }
        Ok(())
    }

    /// Spawn [`Self::invalidate_table`] on the async runtime and return
    /// immediately. The caller's write completes without waiting on
    /// cache cleanup.
    pub fn invalidate_table_fire_and_forget(self: &Arc<Self>, table: &str) {
        let engine = Arc::clone(self);
        let table = table.to_string();
        tokio::spawn(async move {
            engine.invalidate_table(&table).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::InMemoryCacheStore;
    use crate::schema::{OnAction, Relationship};

    fn rel(from_table: &str, to_table: &str) -> Relationship {
        Relationship {
            from_table: from_table.to_string(),
            from_column: "parent_id".to_string(),
            to_table: to_table.to_string(),
            to_column: "id".to_string(),
            on_delete: OnAction::Cascade,
            on_update: OnAction::Cascade,
        }
    }

    #[tokio::test]
    async fn test_invalidate_table_removes_own_entries() {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());
        store.set("vitrine:cache:customers:abc", "v", Duration::from_secs(60)).await.unwrap();
        let graph = Arc::new(SchemaDependencyGraph::build(&[]));
        let engine = InvalidationEngine::new(Arc::clone(&store), graph, "vitrine");

        engine.invalidate_table("customers").await;

        let remaining = store.scan("vitrine:cache:customers:*").await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_table_cascades_to_dependents() {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());
        store.set("vitrine:cache:customers:abc", "v", Duration::from_secs(60)).await.unwrap();
        store.set("vitrine:cache:orders:def", "v", Duration::from_secs(60)).await.unwrap();
        store.set("vitrine:cache:products:ghi", "v", Duration::from_secs(60)).await.unwrap();

        let graph = Arc::new(SchemaDependencyGraph::build(&[rel("orders", "customers")]));
        let engine = InvalidationEngine::new(Arc::clone(&store), graph, "vitrine");

        engine.invalidate_table("customers").await;

        assert!(store.scan("vitrine:cache:customers:*").await.unwrap().is_empty());
        assert!(store.scan("vitrine:cache:orders:*").await.unwrap().is_empty());
        assert_eq!(store.scan("vitrine:cache:products:*").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_table_without_cascade_leaves_dependents() {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());
        store.set("vitrine:cache:customers:abc", "v", Duration::from_secs(60)).await.unwrap();
        store.set("vitrine:cache:orders:def", "v", Duration::from_secs(60)).await.unwrap();

        let graph = Arc::new(SchemaDependencyGraph::build(&[rel("orders", "customers")]));
        let engine =
            InvalidationEngine::with_options(Arc::clone(&store), graph, "vitrine", false, InvalidationStrategy::Immediate);

        engine.invalidate_table("customers").await;

        assert!(store.scan("vitrine:cache:customers:*").await.unwrap().is_empty());
        assert_eq!(store.scan("vitrine:cache:orders:*").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ttl_only_strategy_never_deletes() {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());
        store.set("vitrine:cache:customers:abc", "v", Duration::from_secs(60)).await.unwrap();
        let graph = Arc::new(SchemaDependencyGraph::build(&[]));
        let engine =
            InvalidationEngine::with_options(Arc::clone(&store), graph, "vitrine", true, InvalidationStrategy::TtlOnly);

        engine.invalidate_table("customers").await;

        assert_eq!(store.scan("vitrine:cache:customers:*").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lazy_strategy_shrinks_ttl_without_deleting() {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());
        store.set("vitrine:cache:customers:abc", "v", Duration::from_secs(3600)).await.unwrap();
        let graph = Arc::new(SchemaDependencyGraph::build(&[]));
        let engine =
            InvalidationEngine::with_options(Arc::clone(&store), graph, "vitrine", true, InvalidationStrategy::Lazy);

        engine.invalidate_table("customers").await;

        // The in-memory store doesn't track TTLs, so the key survives;
        // this asserts the Lazy path took the expire() branch rather
        // than deleting, by checking the value is still present.
        assert_eq!(store.get("vitrine:cache:customers:abc").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_invalidate_table_tolerates_store_errors() {
        let inner = InMemoryCacheStore::new();
        inner.set_healthy(false);
        let store: Arc<dyn CacheStore> = Arc::new(inner);
        let graph = Arc::new(SchemaDependencyGraph::build(&[]));
        let engine = InvalidationEngine::new(store, graph, "vitrine");

        engine.invalidate_table("customers").await;
    }

    #[tokio::test]
    async fn test_invalidate_table_loops_past_single_scan_batch() {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());
        for i in 0..(crate::cache::MAX_SCAN_BATCH + 25) {
            store.set(&format!("vitrine:cache:customers:{i}"), "v", Duration::from_secs(60)).await.unwrap();
        }
        let graph = Arc::new(SchemaDependencyGraph::build(&[]));
        let engine = InvalidationEngine::new(Arc::clone(&store), graph, "vitrine");

        engine.invalidate_table("customers").await;

        assert!(store.scan("vitrine:cache:customers:*").await.unwrap().is_empty());
    }
}
