//! Configuration management.
//!
//! A single [`Config`] aggregate composed of per-subsystem sub-configs,
//! loaded from TOML:
//!
//! ```toml
//! [database]
//! url = "mysql://localhost/mydb"
//! max_connections = 10
//!
//! [cache]
//! enabled = true
//! default_ttl_secs = 86400
//!
//! [warming]
//! enabled = true
//! interval_secs = 300
//! ```
//!
//! # Environment Variable Expansion
//!
//! Config values can reference environment variables using `${VAR}`
//! syntax, useful for secrets that shouldn't live in a config file.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{FacadeError, Result};

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// MariaDB/MySQL connection URL.
    pub url: String,
    /// Maximum connections in the pool.
    pub max_connections: u32,
    /// Minimum connections to maintain.
    pub min_connections: u32,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Query timeout in seconds.
    pub query_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 10,
            query_timeout_secs: 30,
        }
    }
}

/// Per-table tokenizer/inverted-index settings (components E, F, G).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSearchConfig {
    /// Tokenizer variant: `simple`, `stemming`, or `n-gram`.
    pub variant: String,
    /// Tokens shorter than this are dropped.
    pub min_word_length: usize,
    /// Case-fold tokens before indexing/matching.
    pub case_sensitive: bool,
    /// N-gram size, only used when `variant == "n-gram"`.
    pub ngram_size: Option<usize>,
    /// Columns to index, in declaration order.
    pub fields: Vec<String>,
}

impl Default for TableSearchConfig {
    fn default() -> Self {
        Self {
            variant: "simple".to_string(),
            min_word_length: 2,
            case_sensitive: false,
            ngram_size: None,
            fields: Vec::new(),
        }
    }
}

/// Full-text search configuration, keyed by table name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Per-table tokenizer/index settings.
    pub tables: HashMap<String, TableSearchConfig>,
}

/// Per-table geo indexing settings (components H, I, J).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableGeoConfig {
    /// Column holding latitude.
    pub lat_field: String,
    /// Column holding longitude.
    pub lng_field: String,
    /// Grid cell size in degrees, before k-means subdivision.
    pub bucket_size_degrees: f64,
    /// Starting radius, in kilometers, for elastic radius expansion.
    pub default_radius_km: f64,
}

impl Default for TableGeoConfig {
    fn default() -> Self {
        Self {
            lat_field: "latitude".to_string(),
            lng_field: "longitude".to_string(),
            bucket_size_degrees: 1.0,
            default_radius_km: 10.0,
        }
    }
}

/// Geo indexing configuration, keyed by table name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Per-table geo settings.
    pub tables: HashMap<String, TableGeoConfig>,
}

/// Auto-warmer configuration (component L).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmingConfig {
    /// Run the warm cycle on a schedule.
    pub enabled: bool,
    /// Seconds between warm cycles.
    pub interval_secs: u64,
    /// How many top queries to re-execute per table, per cycle.
    pub top_queries_per_table: usize,
    /// Minimum access count for a query to be considered for warming.
    pub min_access_count: u64,
    /// Drop stats entries older than this many seconds before ranking.
    pub max_stats_age_secs: u64,
    /// Execute warm queries against a separate connection pool so warming
    /// never competes with foreground traffic for connections.
    pub use_separate_pool: bool,
    /// Size of that separate pool, when `use_separate_pool` is set.
    pub warming_pool_size: u32,
    /// Persist query-stats to a database table in addition to memory.
    pub track_in_database: bool,
    /// Name of that table, when `track_in_database` is set.
    pub stats_table_name: String,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 300,
            top_queries_per_table: 10,
            min_access_count: 5,
            max_stats_age_secs: 86_400,
            use_separate_pool: true,
            warming_pool_size: 2,
            track_in_database: false,
            stats_table_name: "vitrine_query_stats".to_string(),
        }
    }
}

impl WarmingConfig {
    /// Configuration with warming disabled, defaults otherwise.
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }
}

/// Complete façade configuration.
///
/// Loaded from a TOML file, environment variables, or built
/// programmatically via [`Default`] plus field assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Cache sizing/TTL/invalidation settings.
    pub cache: CacheConfig,
    /// Full-text search settings, per table.
    pub search: SearchConfig,
    /// Geo indexing settings, per table.
    pub geo: GeoConfig,
    /// Auto-warmer settings.
    pub warming: WarmingConfig,
}

impl Config {
    /// Load configuration from a TOML file, expanding `${VAR}` references
    /// against the process environment first.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::Configuration`] if the file cannot be read or
    /// the contents are not valid TOML for this shape.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FacadeError::configuration(format!("failed to read config file '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::Configuration`] if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded)
            .map_err(|e| FacadeError::configuration(format!("invalid TOML configuration: {e}")))
    }

    /// Serialize back to a TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Expand `${VAR}` references in `content` against the process environment.
/// References to unset variables are left untouched.
fn expand_env_vars(content: &str) -> String {
    expand_with(content, |name| std::env::var(name).ok())
}

/// Expansion core, parameterized over the variable lookup so it can be
/// exercised in tests without mutating the real process environment.
fn expand_with(content: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            result.push_str(rest);
            return result;
        };
        let end = start + end;
        let var_name = &rest[start + 2..end];

        result.push_str(&rest[..start]);
        match lookup(var_name) {
            Some(value) => result.push_str(&value),
            None => result.push_str(&rest[start..=end]),
        }
        rest = &rest[end + 1..];
    }
    result.push_str(rest);
    result
}
