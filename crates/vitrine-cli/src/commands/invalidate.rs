//! `invalidate` command: manually cascade-invalidate a table's cached
//! entries, synchronously, so the CLI can report completion (the façade's
//! own write path fires this off and forgets it instead).

use std::sync::Arc;

use vitrine_core::cache::{CacheStore, InvalidationEngine, RedisCacheStore};
use vitrine_core::config::Config;
use vitrine_core::error::Result;
use vitrine_core::schema::introspection::discover_relationships;
use vitrine_core::schema::SchemaDependencyGraph;

use super::{connect_pool, schema_name_from_url};

pub async fn run(config: &Config, table: &str, key_prefix: &str) -> Result<()> {
    let pool = connect_pool(&config.database).await?;
    let schema_name = schema_name_from_url(&config.database.url)?;
    let relationships = discover_relationships(&pool, &schema_name).await?;
    let graph = Arc::new(SchemaDependencyGraph::build(&relationships));

    let store: Arc<dyn CacheStore> = Arc::new(RedisCacheStore::new(&config.cache.redis_url)?);
    let engine = InvalidationEngine::new(store, graph, key_prefix);

    engine.invalidate_table(table).await;
    println!("invalidated cached entries for '{table}' and its dependents");

    Ok(())
}
