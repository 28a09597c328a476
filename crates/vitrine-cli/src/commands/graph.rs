//! `graph` command: print the foreign-key dependency graph, or a single
//! table's cascade-invalidation targets.

use vitrine_core::config::Config;
use vitrine_core::error::Result;
use vitrine_core::schema::introspection::discover_relationships;
use vitrine_core::schema::SchemaDependencyGraph;

use super::{connect_pool, schema_name_from_url};

pub async fn run(config: &Config, table: Option<&str>) -> Result<()> {
    let pool = connect_pool(&config.database).await?;
    let schema_name = schema_name_from_url(&config.database.url)?;
    let relationships = discover_relationships(&pool, &schema_name).await?;
    let graph = SchemaDependencyGraph::build(&relationships);

    match table {
        Some(table) => {
            println!("dependents:           {:?}", graph.dependents(table));
            println!("dependencies:         {:?}", graph.dependencies(table));
            let mut targets: Vec<String> = graph.invalidation_targets(table).into_iter().collect();
            targets.sort();
            println!("invalidation targets: {targets:?}");
        }
        None => {
            for table in graph.all_tables() {
                println!("{table}");
                println!("  dependents:   {:?}", graph.dependents(&table));
                println!("  dependencies: {:?}", graph.dependencies(&table));
            }
        }
    }

    Ok(())
}
