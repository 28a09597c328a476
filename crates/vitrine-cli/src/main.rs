//! Vitrine CLI - operational tools for the cache/search/geo façade.
//!
//! These commands wrap `vitrine-core` engine internals for operators:
//! inspecting the FK dependency graph, reading tracked query stats,
//! forcing a warm cycle, and manually invalidating a table's cached
//! entries. No engine behavior lives here.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
// Command modules are internal wiring, not a published API surface.
#![allow(missing_docs)]

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vitrine_core::config::Config;

mod commands;

/// Vitrine CLI - operational tools for the cache/search/geo façade
#[derive(Parser)]
#[command(name = "vitrine")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the façade's TOML configuration file
    #[arg(short, long, global = true, default_value = "vitrine.toml")]
    config: String,

    /// Key prefix used for cached entries (must match the running façade's)
    #[arg(long, global = true, default_value = "vitrine")]
    key_prefix: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the foreign-key dependency graph, or one table's cascade-invalidation targets
    Graph {
        /// Table to show cascade-invalidation targets for; omit to dump the whole graph
        table: Option<String>,
    },

    /// Print the top tracked queries for a table
    Stats {
        /// Table to report on
        table: String,

        /// Maximum number of queries to print
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Force one auto-warmer cycle and print its report
    Warm,

    /// Manually cascade-invalidate a table's cached entries
    Invalidate {
        /// Table to invalidate
        table: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    let result = run(&cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if cli.debug {
            eprintln!("\nDebug info:\n{e:?}");
        }
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> vitrine_core::error::Result<()> {
    let config = Config::from_file(&cli.config)?;

    match &cli.command {
        Commands::Graph { table } => commands::graph::run(&config, table.as_deref()).await,
        Commands::Stats { table, limit } => commands::stats::run(&config, table, *limit).await,
        Commands::Warm => commands::warm::run(&config, &cli.key_prefix).await,
        Commands::Invalidate { table } => commands::invalidate::run(&config, table, &cli.key_prefix).await,
    }
}

/// Initialize the tracing subscriber for logging.
fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        "vitrine=debug,vitrine_core=debug"
    } else if verbose {
        "vitrine=info,vitrine_core=info"
    } else {
        "vitrine=warn,vitrine_core=warn"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
