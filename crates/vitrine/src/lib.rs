//! # Vitrine
//!
//! Umbrella crate: re-exports [`vitrine_core`]'s public API and wires it
//! together into one [`Facade`] — connect a pool, discover the schema,
//! and get back per-table operations, a dependency graph, and (if
//! configured) a running auto-warmer.
//!
//! ```ignore
//! use vitrine::{Config, Facade};
//!
//! # async fn example() -> vitrine::Result<()> {
//! let config = Config::from_file("vitrine.toml")?;
//! let facade = Facade::connect(config).await?;
//!
//! let users = facade.table("users").find_many(None, &Default::default()).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;
use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

pub use vitrine_core::*;

use vitrine_core::cache::{CacheStore, InvalidationEngine, RedisCacheStore};
use vitrine_core::db::{schema_name_from_url, DatabaseAdapter, MySqlAdapter, PoolMetrics};
use vitrine_core::schema::introspection::{discover_columns, discover_relationships};
use vitrine_core::schema::{Column, Relationship, SchemaDependencyGraph};
use vitrine_core::stats::{QueryStatsTracker, SharedQueryStatsTracker};
use vitrine_core::warmer::{AutoWarmer, UnfilteredWarmSource, WarmerOptions};

/// Default key-prefix namespace for cached entries, the inverted index,
/// and the geo index, when a caller doesn't need to run more than one
/// façade instance against the same store.
pub const DEFAULT_KEY_PREFIX: &str = "vitrine";

/// An end-to-end façade: a discovered MariaDB schema, a connected cache
/// store, and every engine subsystem wired to them.
///
/// Built once via [`Self::connect`] at startup; [`Self::table`] hands out
/// a [`TableOperations`] bound to this façade's adapter, store,
/// invalidation engine, and stats tracker for a given table.
pub struct Facade {
    key_prefix: String,
    adapter: Arc<dyn DatabaseAdapter>,
    store: Arc<dyn CacheStore>,
    graph: Arc<SchemaDependencyGraph>,
    columns: Vec<Column>,
    relationships: Vec<Relationship>,
    invalidation: Arc<InvalidationEngine>,
    stats: SharedQueryStatsTracker,
    cache_enabled: bool,
    default_ttl: Duration,
    invalidate_on_write: bool,
    warmer: Option<Arc<AutoWarmer>>,
}

impl Facade {
    /// Connect to the configured database and cache store, discover the
    /// schema, and assemble every subsystem. Starts the auto-warmer
    /// immediately if `config.warming.enabled`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or cache store can't be reached,
    /// or if schema discovery fails.
    pub async fn connect(config: Config) -> Result<Self> {
        let pool = connect_pool(&config.database, config.database.max_connections).await?;
        let schema_name = schema_name_from_url(&config.database.url)?;

        let columns = discover_columns(&pool, &schema_name).await?;
        let relationships = discover_relationships(&pool, &schema_name).await?;
        let graph = Arc::new(SchemaDependencyGraph::build(&relationships));

        let store: Arc<dyn CacheStore> = Arc::new(RedisCacheStore::new(&config.cache.redis_url)?);
        let invalidation = Arc::new(InvalidationEngine::with_options(
            Arc::clone(&store),
            Arc::clone(&graph),
            DEFAULT_KEY_PREFIX,
            config.cache.cascade_invalidation,
            config.cache.strategy,
        ));

        let stats: SharedQueryStatsTracker = if config.warming.track_in_database {
            let tracker = QueryStatsTracker::with_mirror(config.warming.stats_table_name.clone(), pool.clone());
            tracker.ensure_schema().await?;
            Arc::new(tracker)
        } else {
            Arc::new(QueryStatsTracker::new(config.warming.stats_table_name.clone()))
        };

        let adapter: Arc<dyn DatabaseAdapter> = Arc::new(MySqlAdapter::from_pool(pool.clone()));

        let warmer = if config.warming.enabled {
            let warm_pool = if config.warming.use_separate_pool {
                connect_pool(&config.database, config.warming.warming_pool_size).await?
            } else {
                pool.clone()
            };
            let warm_adapter: Arc<dyn DatabaseAdapter> = Arc::new(MySqlAdapter::from_pool(warm_pool));
            let options = WarmerOptions {
                top_queries_per_table: config.warming.top_queries_per_table,
                min_access_count: config.warming.min_access_count,
                max_stats_age: Duration::from_secs(config.warming.max_stats_age_secs),
                warm_ttl: Duration::from_secs(config.cache.default_ttl_secs.min(config.warming.interval_secs)),
                interval: Duration::from_secs(config.warming.interval_secs),
                ..WarmerOptions::default()
            };
            let warmer = Arc::new(AutoWarmer::new(
                warm_adapter,
                Arc::clone(&store),
                Arc::clone(&stats),
                Arc::new(UnfilteredWarmSource),
                DEFAULT_KEY_PREFIX,
                options,
            ));
            warmer.start().await;
            Some(warmer)
        } else {
            None
        };

        Ok(Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            adapter,
            store,
            graph,
            columns,
            relationships,
            invalidation,
            stats,
            cache_enabled: config.cache.enabled,
            default_ttl: Duration::from_secs(config.cache.default_ttl_secs),
            invalidate_on_write: config.cache.invalidate_on_write,
            warmer,
        })
    }

    /// Bind operations for `table`, with relation specs derived from the
    /// discovered FK graph.
    #[must_use]
    pub fn table(&self, table: &str) -> TableOperations {
        TableOperations::new(
            table,
            self.key_prefix.clone(),
            Arc::clone(&self.adapter),
            Arc::clone(&self.store),
            Arc::clone(&self.invalidation),
            Arc::clone(&self.stats),
            self.cache_enabled,
            self.default_ttl,
            self.invalidate_on_write,
        )
        .with_relations_from_schema(&self.relationships)
    }

    /// The discovered foreign-key dependency graph.
    #[must_use]
    pub fn dependency_graph(&self) -> &SchemaDependencyGraph {
        &self.graph
    }

    /// Every column discovered at connect time, across all tables.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Cascade-invalidate `table` and every table transitively dependent
    /// on it, awaiting completion rather than firing-and-forgetting it
    /// (unlike the invalidation a [`TableOperations`] write schedules).
    pub async fn invalidate(&self, table: &str) {
        self.invalidation.invalidate_table(table).await;
    }

    /// Stop the auto-warmer's background loop, if one is running.
    pub async fn stop_warming(&self) {
        if let Some(warmer) = &self.warmer {
            warmer.stop().await;
        }
    }

    /// Current connection pool statistics for the primary database pool.
    #[must_use]
    pub fn pool_metrics(&self) -> PoolMetrics {
        self.adapter.pool_metrics()
    }

    /// Verify database connectivity with a trivial query.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary database pool can't be reached.
    pub async fn health_check(&self) -> Result<()> {
        self.adapter.health_check().await
    }
}

async fn connect_pool(db: &config::DatabaseConfig, max_connections: u32) -> Result<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(&db.url)
        .await
        .map_err(|e| FacadeError::database(format!("failed to connect to '{}': {e}", db.url)))
}
