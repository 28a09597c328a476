//! `stats` command: print the top tracked queries for a table, read from
//! the query-stats mirror table (the CLI is a fresh process each run, so
//! there's no live in-memory tracker to ask).

use std::time::Duration;

use vitrine_core::config::Config;
use vitrine_core::error::Result;
use vitrine_core::stats::QueryStatsTracker;

use super::connect_pool;

pub async fn run(config: &Config, table: &str, limit: usize) -> Result<()> {
    let pool = connect_pool(&config.database).await?;
    let tracker = QueryStatsTracker::with_mirror(config.warming.stats_table_name.clone(), pool);
    tracker.load_from_mirror().await?;

    let top = tracker.top_queries(table, limit, 0, Duration::from_secs(u64::MAX / 2));
    if top.is_empty() {
        println!("no tracked queries for table '{table}'");
        return Ok(());
    }

    println!("{:<40} {:>8} {:>12}", "fingerprint", "accesses", "avg_ms");
    for record in top {
        println!("{:<40} {:>8} {:>12.2}", record.fingerprint, record.access_count, record.avg_execution_ms);
    }

    Ok(())
}
