//! Auto-warmer (component L): periodically re-executes each table's top
//! queries and re-primes the cache ahead of demand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::cache::CacheStore;
use crate::db::{DatabaseAdapter, WhereExpr};
use crate::error::{FacadeError, Result};
use crate::stats::SharedQueryStatsTracker;

/// Aggregate outcome of one warm cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarmReport {
    /// Queries successfully re-executed and re-cached.
    pub queries_warmed: usize,
    /// Queries attempted but failing (counted, never aborting the cycle).
    pub queries_failed: usize,
    /// Wall-clock time spent executing warm queries, milliseconds.
    pub total_ms: f64,
    /// Fraction of tracked top queries already present in the warm
    /// cache keyspace when the cycle started.
    pub cache_hit_rate_before: f64,
    /// Same measurement taken again once the cycle has finished.
    pub cache_hit_rate_after: f64,
}

/// One table's source of truth for what to warm: how to re-derive and
/// re-issue a query from a stats record's stored `(table, query_type,
/// filters)` triple. Implementers supply this since the filters are stored
/// as an opaque debug string rather than a reconstructable AST.
pub trait WarmQuerySource: Send + Sync {
    /// Re-derive a `WhereExpr` for a stats record, if the table still
    /// supports re-issuing it verbatim. Returning `None` skips the record.
    fn rebuild_where(&self, table: &str, filters: &str) -> Option<WhereExpr>;
}

/// Tuning knobs for the auto-warmer.
#[derive(Clone)]
pub struct WarmerOptions {
    /// Number of top queries to re-execute per table, per cycle.
    pub top_queries_per_table: usize,
    /// Minimum access count a record needs to be eligible.
    pub min_access_count: u64,
    /// Records older than this (since last access) are excluded.
    pub max_stats_age: Duration,
    /// TTL applied to cache entries written by the warmer (normally
    /// shorter than the façade's default TTL).
    pub warm_ttl: Duration,
    /// Interval between warm cycles.
    pub interval: Duration,
    /// Invoked once, with the whole-cycle error, when a cycle aborts
    /// before completing (e.g. the secondary pool is exhausted). Never
    /// invoked for per-query failures, which are counted and skipped.
    pub on_error: Option<Arc<dyn Fn(&FacadeError) + Send + Sync>>,
    /// Invoked once per successfully completed cycle with its report.
    pub on_complete: Option<Arc<dyn Fn(&WarmReport) + Send + Sync>>,
}

impl std::fmt::Debug for WarmerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmerOptions")
            .field("top_queries_per_table", &self.top_queries_per_table)
            .field("min_access_count", &self.min_access_count)
            .field("max_stats_age", &self.max_stats_age)
            .field("warm_ttl", &self.warm_ttl)
            .field("interval", &self.interval)
            .field("on_error", &self.on_error.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl Default for WarmerOptions {
    fn default() -> Self {
        Self {
            top_queries_per_table: 10,
            min_access_count: 2,
            max_stats_age: Duration::from_secs(86_400),
            warm_ttl: Duration::from_secs(300),
            interval: Duration::from_secs(600),
            on_error: None,
            on_complete: None,
        }
    }
}

/// Periodically re-executes each table's top queries using a dedicated
/// connection pool (when configured), so warming never contends with
/// user traffic.
pub struct AutoWarmer {
    adapter: Arc<dyn DatabaseAdapter>,
    store: Arc<dyn CacheStore>,
    stats: SharedQueryStatsTracker,
    source: Arc<dyn WarmQuerySource>,
    options: WarmerOptions,
    key_prefix: String,
    running: AtomicBool,
    cycle_lock: AsyncMutex<()>,
    last_report: AsyncMutex<WarmReport>,
    handle: AsyncMutex<Option<JoinHandle<()>>>,
}

impl AutoWarmer {
    /// Build a warmer. `adapter` should be constructed against the
    /// secondary connection pool when `use_separate_pool` is configured.
    #[must_use]
    pub fn new(
        adapter: Arc<dyn DatabaseAdapter>,
        store: Arc<dyn CacheStore>,
        stats: SharedQueryStatsTracker,
        source: Arc<dyn WarmQuerySource>,
        key_prefix: impl Into<String>,
        options: WarmerOptions,
    ) -> Self {
        Self {
            adapter,
            store,
            stats,
            source,
            options,
            key_prefix: key_prefix.into(),
            running: AtomicBool::new(false),
            cycle_lock: AsyncMutex::new(()),
            last_report: AsyncMutex::new(WarmReport::default()),
            handle: AsyncMutex::new(None),
        }
    }

    /// Start the periodic warm loop: runs one cycle immediately, then
    /// repeats at the configured interval until [`Self::stop`] is called.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let warmer = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = warmer.run_cycle().await {
                    tracing::error!(error = %err, "warm cycle aborted");
                }
                if !warmer.running.load(Ordering::SeqCst) {
                    break;
                }
                tokio::time::sleep(warmer.options.interval).await;
            }
        });
        *self.handle.lock().await = Some(handle);
    }

    /// Stop the periodic loop. A cycle already in flight runs to completion.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
        }
    }

    fn warm_key(&self, table: &str, fingerprint: &str) -> String {
        format!("{}:cache:{}:warm:{}", self.key_prefix, table, fingerprint)
    }

    /// Fraction of currently-tracked top queries whose warm-cache entry
    /// already exists, across every tracked table.
    async fn sample_hit_rate(&self) -> f64 {
        let mut hits = 0usize;
        let mut total = 0usize;

        for table in self.stats.tracked_tables() {
            let top = self.stats.top_queries(
                &table,
                self.options.top_queries_per_table,
                self.options.min_access_count,
                self.options.max_stats_age,
            );
            for record in top {
                total += 1;
                if matches!(self.store.get(&self.warm_key(&table, &record.fingerprint)).await, Ok(Some(_))) {
                    hits += 1;
                }
            }
        }

        if total == 0 { 0.0 } else { hits as f64 / total as f64 }
    }

    /// Run one warm cycle, or — if a cycle is already in progress — return
    /// the previous cycle's report without starting a new one.
    ///
    /// # Errors
    ///
    /// Returns an error, after invoking [`WarmerOptions::on_error`], when
    /// the whole cycle aborts before running any query — currently, when
    /// the secondary pool is exhausted (callers waiting on a connection).
    /// A single query's failure is counted in the report instead and never
    /// aborts the cycle.
    pub async fn run_cycle(&self) -> Result<WarmReport> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            return Ok(self.last_report.lock().await.clone());
        };

        let metrics = self.adapter.pool_metrics();
        if metrics.waiting_requests > 0 {
            let err = FacadeError::warming(format!(
                "secondary pool exhausted: {} requests waiting for a connection",
                metrics.waiting_requests
            ));
            if let Some(on_error) = &self.options.on_error {
                on_error(&err);
            }
            return Err(err);
        }

        let cache_hit_rate_before = self.sample_hit_rate().await;
        let mut report = WarmReport { cache_hit_rate_before, ..WarmReport::default() };

        for table in self.stats.tracked_tables() {
            let top = self.stats.top_queries(
                &table,
                self.options.top_queries_per_table,
                self.options.min_access_count,
                self.options.max_stats_age,
            );

            for record in top {
                let where_expr = self.source.rebuild_where(&table, &record.filters);
                let started = std::time::Instant::now();

                let outcome = self.adapter.execute_where_query(&table, where_expr.as_ref(), None, None).await;
                report.total_ms += started.elapsed().as_secs_f64() * 1000.0;

                match outcome {
                    Ok(rows) => {
                        let values: Vec<&serde_json::Value> = rows.iter().map(crate::db::Row::as_value).collect();
                        if let Ok(serialized) = serde_json::to_string(&values) {
                            let key = self.warm_key(&table, &record.fingerprint);
                            if self.store.set(&key, &serialized, self.options.warm_ttl).await.is_ok() {
                                self.stats.mark_warmed(&record.fingerprint);
                                report.queries_warmed += 1;
                            } else {
                                report.queries_failed += 1;
                            }
                        } else {
                            report.queries_failed += 1;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(table = %table, fingerprint = %record.fingerprint, error = %err, "warm query failed");
                        report.queries_failed += 1;
                    }
                }
            }
        }

        report.cache_hit_rate_after = self.sample_hit_rate().await;

        *self.last_report.lock().await = report.clone();
        if let Some(on_complete) = &self.options.on_complete {
            on_complete(&report);
        }
        Ok(report)
    }
}

/// Trivial [`WarmQuerySource`] for tables with no filters worth
/// reconstructing: every warm re-executes an unfiltered scan.
pub struct UnfilteredWarmSource;

impl WarmQuerySource for UnfilteredWarmSource {
    fn rebuild_where(&self, _table: &str, _filters: &str) -> Option<WhereExpr> {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::cache::InMemoryCacheStore;
    use crate::db::{DatabaseType, PoolMetrics, Row};
    use crate::stats::QueryStatsTracker;

    struct FakeAdapter {
        rows: Vec<serde_json::Value>,
        should_fail: bool,
        waiting_requests: u32,
    }

    #[async_trait]
    impl DatabaseAdapter for FakeAdapter {
        async fn execute_where_query(
            &self,
            _table: &str,
            _where_expr: Option<&WhereExpr>,
            _limit: Option<u32>,
            _offset: Option<u32>,
        ) -> Result<Vec<Row>> {
            if self.should_fail {
                return Err(crate::error::FacadeError::database("boom"));
            }
            Ok(self.rows.iter().cloned().map(Row::new).collect())
        }

        fn database_type(&self) -> DatabaseType {
            DatabaseType::MySQL
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }

        fn pool_metrics(&self) -> PoolMetrics {
            PoolMetrics {
                total_connections: 1,
                idle_connections: 1,
                active_connections: 0,
                waiting_requests: self.waiting_requests,
            }
        }
    }

    fn build_warmer(should_fail: bool) -> Arc<AutoWarmer> {
        build_warmer_with(should_fail, 0, WarmerOptions::default())
    }

    fn build_warmer_with(should_fail: bool, waiting_requests: u32, options: WarmerOptions) -> Arc<AutoWarmer> {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());
        let stats = Arc::new(QueryStatsTracker::new("__test_stats"));
        stats.record_access("fp1", "orders", "find_many", "{}", 5.0);
        stats.record_access("fp1", "orders", "find_many", "{}", 5.0);
        let adapter: Arc<dyn DatabaseAdapter> =
            Arc::new(FakeAdapter { rows: vec![json!({"id": 1})], should_fail, waiting_requests });
        Arc::new(AutoWarmer::new(adapter, store, stats, Arc::new(UnfilteredWarmSource), "vitrine", options))
    }

    #[tokio::test]
    async fn test_run_cycle_warms_eligible_queries() {
        let warmer = build_warmer(false);
        let report = warmer.run_cycle().await.unwrap();
        assert_eq!(report.queries_warmed, 1);
        assert_eq!(report.queries_failed, 0);
    }

    #[tokio::test]
    async fn test_run_cycle_counts_failures_without_aborting() {
        let warmer = build_warmer(true);
        let report = warmer.run_cycle().await.unwrap();
        assert_eq!(report.queries_warmed, 0);
        assert_eq!(report.queries_failed, 1);
    }

    #[tokio::test]
    async fn test_run_cycle_reports_hit_rate_before_and_after() {
        let warmer = build_warmer(false);
        let report = warmer.run_cycle().await.unwrap();
        assert_eq!(report.cache_hit_rate_before, 0.0);
        assert_eq!(report.cache_hit_rate_after, 1.0);
    }

    #[tokio::test]
    async fn test_run_cycle_aborts_on_pool_exhaustion_and_invokes_on_error() {
        let called = Arc::new(AtomicUsize::new(0));
        let on_error_called = Arc::clone(&called);
        let options = WarmerOptions {
            on_error: Some(Arc::new(move |_err: &FacadeError| {
                on_error_called.fetch_add(1, Ordering::SeqCst);
            })),
            ..WarmerOptions::default()
        };
        let warmer = build_warmer_with(false, 3, options);

        let result = warmer.run_cycle().await;

        assert!(result.is_err());
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_cycle_invokes_on_complete() {
        let called = Arc::new(AtomicUsize::new(0));
        let on_complete_called = Arc::clone(&called);
        let options = WarmerOptions {
            on_complete: Some(Arc::new(move |_report: &WarmReport| {
                on_complete_called.fetch_add(1, Ordering::SeqCst);
            })),
            ..WarmerOptions::default()
        };
        let warmer = build_warmer_with(false, 0, options);

        warmer.run_cycle().await.unwrap();

        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_and_stop_lifecycle() {
        let warmer = build_warmer(false);
        warmer.clone().start().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        warmer.stop().await;
        assert!(!warmer.running.load(Ordering::SeqCst));
    }
}
