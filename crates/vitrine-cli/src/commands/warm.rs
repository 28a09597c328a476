//! `warm` command: force one auto-warmer cycle and print its report.

use std::sync::Arc;

use vitrine_core::cache::{CacheStore, RedisCacheStore};
use vitrine_core::config::Config;
use vitrine_core::db::{DatabaseAdapter, MySqlAdapter};
use vitrine_core::error::Result;
use vitrine_core::stats::QueryStatsTracker;
use vitrine_core::warmer::{AutoWarmer, UnfilteredWarmSource, WarmerOptions};

use super::connect_pool;

pub async fn run(config: &Config, key_prefix: &str) -> Result<()> {
    let warming = &config.warming;

    let stats_pool = connect_pool(&config.database).await?;
    let stats = Arc::new(QueryStatsTracker::with_mirror(warming.stats_table_name.clone(), stats_pool));
    stats.load_from_mirror().await?;

    let db_pool = connect_pool(&config.database).await?;
    let adapter: Arc<dyn DatabaseAdapter> = Arc::new(MySqlAdapter::from_pool(db_pool));
    let store: Arc<dyn CacheStore> = Arc::new(RedisCacheStore::new(&config.cache.redis_url)?);

    let options = WarmerOptions {
        top_queries_per_table: warming.top_queries_per_table,
        min_access_count: warming.min_access_count,
        max_stats_age: std::time::Duration::from_secs(warming.max_stats_age_secs),
        warm_ttl: std::time::Duration::from_secs(warming.interval_secs),
        interval: std::time::Duration::from_secs(warming.interval_secs),
    };

    let warmer = AutoWarmer::new(adapter, store, stats, Arc::new(UnfilteredWarmSource), key_prefix, options);
    let report = warmer.run_cycle().await;

    println!("queries warmed: {}", report.queries_warmed);
    println!("queries failed: {}", report.queries_failed);
    println!("total time:     {:.2}ms", report.total_ms);

    Ok(())
}
