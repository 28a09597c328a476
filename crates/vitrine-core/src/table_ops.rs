//! Table operations façade (component M): the public per-table CRUD API
//! that binds fingerprinting, caching, invalidation, stats, and relation
//! expansion into one entry point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::cache::{CacheStore, InvalidationEngine};
use crate::db::{DatabaseAdapter, Row, WhereExpr};
use crate::error::Result;
use crate::fingerprint::{fingerprint, fingerprint_by_id, QueryOptions};
use crate::schema::Relationship;
use crate::stats::SharedQueryStatsTracker;
use crate::utils::to_camel_case;

/// Cache entries for `count` never outlive this, even if the façade's
/// configured default TTL is longer: counts drift faster than row sets
/// under concurrent writes, so they're given a shorter freshness window.
const COUNT_MAX_TTL: Duration = Duration::from_secs(30);

/// Fixed TTL for `raw` query results, independent of the façade's
/// configured default TTL.
const RAW_TTL: Duration = Duration::from_secs(60);

/// Relations to expand on a read, and how to join them.
#[derive(Debug, Clone)]
pub struct RelationSpec {
    /// Table the relation points at (or from).
    pub table: String,
    /// Column on the fetched row holding the join value.
    pub local_column: String,
    /// Column on the related table matching `local_column`.
    pub foreign_column: String,
    /// Key the expanded rows are attached under.
    pub attach_as: String,
}

/// Binds components A–L for one table.
pub struct TableOperations {
    table: String,
    key_prefix: String,
    adapter: Arc<dyn DatabaseAdapter>,
    store: Arc<dyn CacheStore>,
    invalidation: Arc<InvalidationEngine>,
    stats: SharedQueryStatsTracker,
    cache_enabled: bool,
    default_ttl: Duration,
    invalidate_on_write: bool,
    relations: Vec<RelationSpec>,
}

impl TableOperations {
    /// Bind operations for `table`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        table: impl Into<String>,
        key_prefix: impl Into<String>,
        adapter: Arc<dyn DatabaseAdapter>,
        store: Arc<dyn CacheStore>,
        invalidation: Arc<InvalidationEngine>,
        stats: SharedQueryStatsTracker,
        cache_enabled: bool,
        default_ttl: Duration,
        invalidate_on_write: bool,
    ) -> Self {
        Self {
            table: table.into(),
            key_prefix: key_prefix.into(),
            adapter,
            store,
            invalidation,
            stats,
            cache_enabled,
            default_ttl,
            invalidate_on_write,
            relations: Vec::new(),
        }
    }

    /// Derive relation specs from the discovered FK graph: one spec per
    /// edge touching this table, expandable on request via `withRelations`.
    #[must_use]
    pub fn with_relations_from_schema(mut self, relationships: &[Relationship]) -> Self {
        for rel in relationships {
            if rel.from_table == self.table {
                self.relations.push(RelationSpec {
                    table: rel.to_table.clone(),
                    local_column: rel.from_column.clone(),
                    foreign_column: rel.to_column.clone(),
                    attach_as: to_camel_case(&rel.to_table),
                });
            }
            if rel.to_table == self.table && rel.from_table != self.table {
                self.relations.push(RelationSpec {
                    table: rel.from_table.clone(),
                    local_column: rel.to_column.clone(),
                    foreign_column: rel.from_column.clone(),
                    attach_as: to_camel_case(&rel.from_table),
                });
            }
        }
        self
    }

    fn cache_key(&self, op: &str, fp: &str) -> String {
        format!("{}:cache:{}:{}:{}", self.key_prefix, self.table, op, fp)
    }

    async fn cache_get(&self, key: &str) -> Option<Vec<Row>> {
        if !self.cache_enabled {
            return None;
        }
        match self.store.get(key).await {
            Ok(Some(raw)) => serde_json::from_str::<Vec<Value>>(&raw).ok().map(|values| values.into_iter().map(Row::new).collect()),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed, falling through to database");
                None
            }
        }
    }

    async fn cache_put(&self, key: &str, rows: &[Row], ttl: Duration) {
        if !self.cache_enabled {
            return;
        }
        let values: Vec<&Value> = rows.iter().map(Row::as_value).collect();
        let Ok(serialized) = serde_json::to_string(&values) else { return };
        if let Err(err) = self.store.set(key, &serialized, ttl).await {
            tracing::warn!(key, error = %err, "cache write failed");
        }
    }

    async fn record_stats(&self, fp: &str, op: &str, where_expr: Option<&WhereExpr>, started: std::time::Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let filters = where_expr.map(|w| format!("{w:?}")).unwrap_or_default();
        self.stats.record_access(fp, &self.table, op, &filters, elapsed_ms);
    }

    /// Find rows matching `where_expr`, consulting the cache first.
    pub async fn find_many(&self, where_expr: Option<&WhereExpr>, options: &QueryOptions) -> Result<Vec<Row>> {
        let fp = fingerprint(&self.table, "find_many", where_expr, options);
        let key = self.cache_key("find_many", &fp);

        if !options.skip_cache {
            if let Some(cached) = self.cache_get(&key).await {
                return Ok(self.maybe_expand(cached, options.with_relations).await?);
            }
        }

        let started = std::time::Instant::now();
        let rows = self.adapter.execute_where_query(&self.table, where_expr, options.limit, options.offset).await?;
        self.record_stats(&fp, "find_many", where_expr, started).await;
        self.cache_put(&key, &rows, self.default_ttl).await;

        self.maybe_expand(rows, options.with_relations).await
    }

    /// Find the first row matching `where_expr`, if any.
    pub async fn find_one(&self, where_expr: Option<&WhereExpr>, options: &QueryOptions) -> Result<Option<Row>> {
        let limited = QueryOptions { limit: Some(1), ..options.clone() };
        let mut rows = self.find_many(where_expr, &limited).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
    }

    /// Find a single row by primary key, using the shorter id-keyed
    /// fingerprint (no filter/option hashing).
    pub async fn find_by_id(&self, id_column: &str, id: &str, with_relations: bool) -> Result<Option<Row>> {
        let fp = fingerprint_by_id(&self.key_prefix, &self.table, id);

        if let Some(cached) = self.cache_get(&fp).await {
            return Ok(self.maybe_expand(cached, with_relations).await?.into_iter().next());
        }

        let where_expr = WhereExpr::Term {
            path: vec![id_column.to_string()],
            operator: crate::db::WhereOperator::Eq,
            value: Value::String(id.to_string()),
        };

        let started = std::time::Instant::now();
        let rows = self.adapter.execute_where_query(&self.table, Some(&where_expr), Some(1), None).await?;
        self.record_stats(&fp, "find_by_id", Some(&where_expr), started).await;
        self.cache_put(&fp, &rows, self.default_ttl).await;

        Ok(self.maybe_expand(rows, with_relations).await?.into_iter().next())
    }

    /// Count rows matching `where_expr`. Cached for at most
    /// [`COUNT_MAX_TTL`], clamped below the façade's configured default
    /// TTL if that's shorter.
    pub async fn count(&self, where_expr: Option<&WhereExpr>) -> Result<u64> {
        let options = QueryOptions::default();
        let fp = fingerprint(&self.table, "count", where_expr, &options);
        let key = self.cache_key("count", &fp);

        if let Some(raw) = self.store.get(&key).await.ok().flatten() {
            if let Ok(count) = raw.parse::<u64>() {
                return Ok(count);
            }
        }

        let started = std::time::Instant::now();
        let rows = self.adapter.execute_where_query(&self.table, where_expr, None, None).await?;
        self.record_stats(&fp, "count", where_expr, started).await;
        let count = rows.len() as u64;

        if self.cache_enabled {
            let ttl = self.default_ttl.min(COUNT_MAX_TTL);
            self.store.set(&key, &count.to_string(), ttl).await.ok();
        }
        Ok(count)
    }

    /// Execute a raw WHERE expression against the table, through the same
    /// fingerprint → cache → execute → cache-back → stats pipeline as
    /// [`Self::find_many`], but with a fixed TTL independent of the
    /// façade's configured default.
    pub async fn raw(&self, where_expr: Option<&WhereExpr>, limit: Option<u32>, offset: Option<u32>) -> Result<Vec<Row>> {
        let options = QueryOptions { limit, offset, ..QueryOptions::default() };
        let fp = fingerprint(&self.table, "raw", where_expr, &options);
        let key = self.cache_key("raw", &fp);

        if let Some(cached) = self.cache_get(&key).await {
            return Ok(cached);
        }

        let started = std::time::Instant::now();
        let rows = self.adapter.execute_where_query(&self.table, where_expr, limit, offset).await?;
        self.record_stats(&fp, "raw", where_expr, started).await;
        self.cache_put(&key, &rows, RAW_TTL).await;

        Ok(rows)
    }

    /// Record a completed write against this table: schedules cascade
    /// invalidation (fire-and-forget) if configured, never blocking the
    /// caller on it.
    pub fn on_write(self: &Arc<Self>) {
        if !self.invalidate_on_write {
            return;
        }
        self.invalidation.invalidate_table_fire_and_forget(&self.table);
    }

    async fn maybe_expand(&self, rows: Vec<Row>, with_relations: bool) -> Result<Vec<Row>> {
        if !with_relations || self.relations.is_empty() {
            return Ok(rows);
        }

        let mut expanded = Vec::with_capacity(rows.len());
        for row in rows {
            let mut value = row.into_value();
            for spec in &self.relations {
                let Some(local_value) = value.get(&spec.local_column).cloned() else { continue };
                let where_expr = WhereExpr::Term {
                    path: vec![spec.foreign_column.clone()],
                    operator: crate::db::WhereOperator::Eq,
                    value: local_value,
                };
                let related = self.adapter.execute_where_query(&spec.table, Some(&where_expr), None, None).await?;
                let related_values: Vec<Value> = related.into_iter().map(Row::into_value).collect();
                if let Some(obj) = value.as_object_mut() {
                    obj.insert(spec.attach_as.clone(), Value::Array(related_values));
                }
            }
            expanded.push(Row::new(value));
        }
        Ok(expanded)
    }
}

/// Read-only view of the relation specs a [`TableOperations`] resolved, for
/// diagnostics/tests.
#[must_use]
pub fn relation_summary(relations: &[RelationSpec]) -> HashMap<String, String> {
    relations.iter().map(|r| (r.attach_as.clone(), format!("{}.{} = {}.{}", r.table, r.foreign_column, "self", r.local_column))).collect()
}
