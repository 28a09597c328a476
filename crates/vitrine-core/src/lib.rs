//! # Vitrine Core
//!
//! Cache/search/geo façade sitting between an application and a
//! MariaDB/MySQL database, fronted by a key-value store used both as a
//! query-result cache and a persistent index substrate.
//!
//! ## Architecture
//!
//! ```text
//! Application
//!      │
//!      ↓ TableOperations (component M)
//! ┌────────────────────────────────────────┐
//! │ fingerprint → cache lookup (component C)│
//! │      hit │ miss                         │
//! │           ↓ DatabaseAdapter (db::mysql)  │
//! │         MariaDB                          │
//! │           ↓ write-back to cache           │
//! └────────────────────────────────────────┘
//!      │
//!      ↓ on write: InvalidationEngine (component D)
//!   walks SchemaDependencyGraph (component B)
//! ```
//!
//! Full-text search (tokenizer → inverted index → ranker, components
//! E/F/G) and geo search (normalizer → geo index → bucket builder,
//! components H/I/J) are built on the same cache store, keyed
//! independently of the query-result cache. [`stats`] tracks access
//! counts and latency per fingerprint; [`warmer`] periodically
//! re-executes the hottest queries to keep the cache populated ahead of
//! traffic.
//!
//! This crate is the engine; `vitrine` (the umbrella crate) wires it to a
//! connected database and cache store behind one `Facade` type.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow common pedantic lints that are too noisy for this codebase
#![allow(clippy::doc_markdown)] // Would require many doc changes for backticks
#![allow(clippy::return_self_not_must_use)] // Builder pattern doesn't always need #[must_use]
#![allow(clippy::uninlined_format_args)] // Style preference, not a bug
#![allow(clippy::unused_self)] // Often needed for trait consistency
#![allow(clippy::unnecessary_wraps)] // Sometimes needed for API consistency
#![allow(clippy::must_use_candidate)] // Too noisy for builder methods
#![allow(clippy::missing_errors_doc)] // Would require extensive doc additions
#![allow(clippy::module_name_repetitions)] // Common in Rust APIs
#![allow(clippy::match_same_arms)] // Sometimes clearer to be explicit
#![allow(clippy::cast_possible_truncation)] // Many intentional u64->u32 casts
#![allow(clippy::cast_precision_loss)] // Intentional f64 conversions
#![allow(clippy::cast_sign_loss)] // Intentional signed->unsigned conversions
#![allow(clippy::too_many_arguments)] // Some complex functions need many args
#![allow(clippy::similar_names)] // Variable naming style
#![allow(clippy::missing_panics_doc)] // Would require extensive doc additions

// Core modules
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod schema;

// Data access
pub mod cache;
pub mod db;

// Search (components E, F, G)
pub mod search;

// Geo (components H, I, J)
pub mod geo;

// Operational subsystems (components K, L)
pub mod stats;
pub mod warmer;

// Public façade (component M)
pub mod table_ops;

pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{FacadeError, Result};
pub use fingerprint::{fingerprint, QueryOptions};
pub use table_ops::TableOperations;

/// Version of the façade library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
