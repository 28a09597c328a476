//! Query-stats tracker (component K): per-fingerprint access counts and
//! incremental-mean latency, with an optional database mirror.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sqlx::MySqlPool;

use crate::error::Result;

/// One fingerprint's tracked access history.
#[derive(Debug, Clone)]
pub struct QueryStatRecord {
    /// The fingerprint this record tracks.
    pub fingerprint: String,
    /// Table the originating query targeted.
    pub table: String,
    /// Operation kind, e.g. `"find_many"`.
    pub query_type: String,
    /// Debug rendering of the filter used, for warm re-execution.
    pub filters: String,
    /// Number of times this fingerprint has been accessed.
    pub access_count: u64,
    /// Incremental mean of execution time, milliseconds.
    pub avg_execution_ms: f64,
    /// When this fingerprint was last accessed.
    pub last_accessed_at: Instant,
    /// When this fingerprint was last re-executed by the warmer, if ever.
    pub last_warming_time: Option<Instant>,
}

/// In-memory query-stats map, authoritative for ranking, with an optional
/// fire-and-forget mirror to a database table for restart survival.
pub struct QueryStatsTracker {
    records: Mutex<HashMap<String, QueryStatRecord>>,
    mirror_pool: Option<MySqlPool>,
    stats_table_name: String,
}

impl QueryStatsTracker {
    /// Build a tracker with no database mirror.
    #[must_use]
    pub fn new(stats_table_name: impl Into<String>) -> Self {
        Self { records: Mutex::new(HashMap::new()), mirror_pool: None, stats_table_name: stats_table_name.into() }
    }

    /// Build a tracker that also mirrors updates to `pool`, under
    /// `stats_table_name`. Callers must invoke [`Self::ensure_schema`]
    /// before relying on mirror writes.
    #[must_use]
    pub fn with_mirror(stats_table_name: impl Into<String>, pool: MySqlPool) -> Self {
        Self { records: Mutex::new(HashMap::new()), mirror_pool: Some(pool), stats_table_name: stats_table_name.into() }
    }

    /// Idempotently create the mirror table, if a mirror pool is configured.
    pub async fn ensure_schema(&self) -> Result<()> {
        let Some(pool) = &self.mirror_pool else { return Ok(()) };

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                query_id VARCHAR(128) PRIMARY KEY,
                table_name VARCHAR(128) NOT NULL,
                query_type VARCHAR(64) NOT NULL,
                filters TEXT NOT NULL,
                access_count BIGINT UNSIGNED NOT NULL DEFAULT 0,
                last_accessed_at DATETIME NOT NULL,
                avg_execution_time DOUBLE NOT NULL DEFAULT 0,
                last_warming_time DATETIME NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_table_access (table_name, access_count DESC),
                INDEX idx_last_accessed (last_accessed_at)
            )",
            table = self.stats_table_name
        );

        sqlx::query(&ddl).execute(pool).await.map_err(|e| crate::error::FacadeError::database(e.to_string()))?;
        Ok(())
    }

    /// Record one access: increments the access count and folds `sample_ms`
    /// into the running mean, inserting a fresh record on first sight.
    pub fn record_access(&self, fingerprint: &str, table: &str, query_type: &str, filters: &str, sample_ms: f64) {
        let mut records = self.records.lock();
        match records.get_mut(fingerprint) {
            Some(record) => {
                record.access_count += 1;
                record.avg_execution_ms += (sample_ms - record.avg_execution_ms) / record.access_count as f64;
                record.last_accessed_at = Instant::now();
            }
            None => {
                records.insert(
                    fingerprint.to_string(),
                    QueryStatRecord {
                        fingerprint: fingerprint.to_string(),
                        table: table.to_string(),
                        query_type: query_type.to_string(),
                        filters: filters.to_string(),
                        access_count: 1,
                        avg_execution_ms: sample_ms,
                        last_accessed_at: Instant::now(),
                        last_warming_time: None,
                    },
                );
            }
        }
        drop(records);
        self.mirror_fire_and_forget(fingerprint);
    }

    fn mirror_fire_and_forget(&self, fingerprint: &str) {
        let Some(pool) = self.mirror_pool.clone() else { return };
        let Some(record) = self.records.lock().get(fingerprint).cloned() else { return };
        let table = self.stats_table_name.clone();

        tokio::spawn(async move {
            let query = format!(
                "INSERT INTO {table} (query_id, table_name, query_type, filters, access_count, last_accessed_at, avg_execution_time)
                 VALUES (?, ?, ?, ?, ?, NOW(), ?)
                 ON DUPLICATE KEY UPDATE
                   access_count = VALUES(access_count),
                   last_accessed_at = VALUES(last_accessed_at),
                   avg_execution_time = VALUES(avg_execution_time)"
            );
            let result = sqlx::query(&query)
                .bind(&record.fingerprint)
                .bind(&record.table)
                .bind(&record.query_type)
                .bind(&record.filters)
                .bind(record.access_count as i64)
                .bind(record.avg_execution_ms)
                .execute(&pool)
                .await;
            if let Err(err) = result {
                tracing::debug!(fingerprint = %record.fingerprint, error = %err, "query-stats mirror write failed");
            }
        });
    }

    /// Populate the in-memory map from the database mirror, for a process
    /// that's just started and has no accumulated in-memory history yet
    /// (the CLI's `stats`/`warm` commands, or a façade restart). No-op if
    /// no mirror is configured.
    pub async fn load_from_mirror(&self) -> Result<()> {
        let Some(pool) = &self.mirror_pool else { return Ok(()) };

        let query = format!(
            "SELECT query_id, table_name, query_type, filters, access_count, avg_execution_time,
                    TIMESTAMPDIFF(SECOND, last_accessed_at, NOW()) AS age_secs
             FROM {}",
            self.stats_table_name
        );
        let rows = sqlx::query(&query)
            .fetch_all(pool)
            .await
            .map_err(|e| crate::error::FacadeError::stats(format!("failed to load query stats from mirror: {e}")))?;

        let mut records = self.records.lock();
        for row in rows {
            use sqlx::Row as _;
            let fingerprint: String = row.try_get("query_id").unwrap_or_default();
            let age_secs: i64 = row.try_get("age_secs").unwrap_or(0);
            let last_accessed_at = Instant::now()
                .checked_sub(Duration::from_secs(age_secs.max(0) as u64))
                .unwrap_or_else(Instant::now);

            records.insert(
                fingerprint.clone(),
                QueryStatRecord {
                    fingerprint,
                    table: row.try_get("table_name").unwrap_or_default(),
                    query_type: row.try_get("query_type").unwrap_or_default(),
                    filters: row.try_get("filters").unwrap_or_default(),
                    access_count: row.try_get::<i64, _>("access_count").unwrap_or(0).max(0) as u64,
                    avg_execution_ms: row.try_get("avg_execution_time").unwrap_or(0.0),
                    last_accessed_at,
                    last_warming_time: None,
                },
            );
        }
        Ok(())
    }

    /// Mark `fingerprint` as just warmed.
    pub fn mark_warmed(&self, fingerprint: &str) {
        if let Some(record) = self.records.lock().get_mut(fingerprint) {
            record.last_warming_time = Some(Instant::now());
        }
    }

    /// Top `limit` records for `table` with at least `min_access_count`
    /// accesses and at most `max_age` since last access, sorted by
    /// access count descending, then average execution time descending
    /// (slower queries first among ties — warming them yields the larger
    /// win).
    #[must_use]
    pub fn top_queries(&self, table: &str, limit: usize, min_access_count: u64, max_age: Duration) -> Vec<QueryStatRecord> {
        let now = Instant::now();
        let mut matching: Vec<QueryStatRecord> = self
            .records
            .lock()
            .values()
            .filter(|r| r.table == table)
            .filter(|r| r.access_count >= min_access_count)
            .filter(|r| now.saturating_duration_since(r.last_accessed_at) <= max_age)
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then_with(|| b.avg_execution_ms.partial_cmp(&a.avg_execution_ms).unwrap_or(std::cmp::Ordering::Equal))
        });
        matching.truncate(limit);
        matching
    }

    /// Snapshot of all tracked tables (distinct table names present in the
    /// map), for the warmer's per-cycle enumeration step.
    #[must_use]
    pub fn tracked_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self.records.lock().values().map(|r| r.table.clone()).collect();
        tables.sort();
        tables.dedup();
        tables
    }
}

/// Shared handle type used by the table-ops façade and the auto-warmer.
pub type SharedQueryStatsTracker = Arc<QueryStatsTracker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_access_inserts_new_fingerprint() {
        let tracker = QueryStatsTracker::new("__test_stats");
        tracker.record_access("fp1", "orders", "find_many", "{}", 10.0);
        let top = tracker.top_queries("orders", 10, 0, Duration::from_secs(3600));
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].access_count, 1);
        assert_eq!(top[0].avg_execution_ms, 10.0);
    }

    #[test]
    fn test_record_access_updates_incremental_mean() {
        let tracker = QueryStatsTracker::new("__test_stats");
        tracker.record_access("fp1", "orders", "find_many", "{}", 10.0);
        tracker.record_access("fp1", "orders", "find_many", "{}", 20.0);
        let top = tracker.top_queries("orders", 10, 0, Duration::from_secs(3600));
        assert_eq!(top[0].access_count, 2);
        assert_eq!(top[0].avg_execution_ms, 15.0);
    }

    #[test]
    fn test_top_queries_filters_by_min_access_count() {
        let tracker = QueryStatsTracker::new("__test_stats");
        tracker.record_access("fp1", "orders", "find_many", "{}", 10.0);
        tracker.record_access("fp2", "orders", "find_many", "{}", 10.0);
        tracker.record_access("fp2", "orders", "find_many", "{}", 10.0);
        let top = tracker.top_queries("orders", 10, 2, Duration::from_secs(3600));
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].fingerprint, "fp2");
    }

    #[test]
    fn test_top_queries_sorts_by_access_count_desc_then_avg_time_desc() {
        let tracker = QueryStatsTracker::new("__test_stats");
        tracker.record_access("fast", "orders", "find_many", "{}", 5.0);
        tracker.record_access("fast", "orders", "find_many", "{}", 5.0);
        tracker.record_access("slow", "orders", "find_many", "{}", 50.0);
        tracker.record_access("slow", "orders", "find_many", "{}", 50.0);

        let top = tracker.top_queries("orders", 10, 0, Duration::from_secs(3600));
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].fingerprint, "slow");
    }

    #[test]
    fn test_top_queries_excludes_other_tables() {
        let tracker = QueryStatsTracker::new("__test_stats");
        tracker.record_access("fp1", "orders", "find_many", "{}", 10.0);
        tracker.record_access("fp2", "customers", "find_many", "{}", 10.0);
        let top = tracker.top_queries("orders", 10, 0, Duration::from_secs(3600));
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].table, "orders");
    }

    #[test]
    fn test_tracked_tables_dedups_and_sorts() {
        let tracker = QueryStatsTracker::new("__test_stats");
        tracker.record_access("fp1", "orders", "find_many", "{}", 10.0);
        tracker.record_access("fp2", "orders", "find_many", "{}", 10.0);
        tracker.record_access("fp3", "customers", "find_many", "{}", 10.0);
        assert_eq!(tracker.tracked_tables(), vec!["customers".to_string(), "orders".to_string()]);
    }

    #[test]
    fn test_mark_warmed_sets_last_warming_time() {
        let tracker = QueryStatsTracker::new("__test_stats");
        tracker.record_access("fp1", "orders", "find_many", "{}", 10.0);
        tracker.mark_warmed("fp1");
        let top = tracker.top_queries("orders", 10, 0, Duration::from_secs(3600));
        assert!(top[0].last_warming_time.is_some());
    }
}
