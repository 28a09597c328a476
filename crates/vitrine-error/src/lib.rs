//! Error taxonomy for the cache/search/geo façade.
//!
//! One enum, one classification scheme, shared by every subsystem crate so
//! that callers can match on error *kind* (client mistake vs. transient
//! infrastructure blip vs. genuine bug) without caring which subsystem threw.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

use std::fmt;

/// Result alias used throughout the façade.
pub type Result<T> = std::result::Result<T, FacadeError>;

/// Error taxonomy, one variant per bucket in the error-handling design.
///
/// See the `is_retryable`/`is_client_error`/`is_server_error` classification
/// methods below for how a caller is expected to react to each variant.
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    /// Missing required field, unknown table, malformed config file. Fails
    /// loudly at initialize time; never deferred.
    #[error("configuration error: {message}")]
    Configuration {
        /// Human-readable description.
        message: String,
    },

    /// The key-value store is unreachable or timed out. Callers in the
    /// cache path degrade silently on this variant (get → miss, set →
    /// no-op); it is surfaced here only so the degradation is observable
    /// in logs and metrics, never propagated to the caller of a read/write.
    #[error("cache store unavailable: {message}")]
    TransientStore {
        /// Human-readable description.
        message: String,
    },

    /// A database query failed. Surfaced verbatim to the caller; reads are
    /// not retried automatically.
    #[error("database error: {message}")]
    Database {
        /// Human-readable description.
        message: String,
        /// Vendor SQLSTATE code, when the driver provides one.
        sql_state: Option<String>,
    },

    /// Invalidation failed after a successful write. Logged, never
    /// propagated — the write already succeeded and cache divergence is
    /// bounded by ttl.
    #[error("invalidation failed for table {table}: {message}")]
    Invalidation {
        /// Table the invalidation cascade targeted.
        table: String,
        /// Human-readable description.
        message: String,
    },

    /// A global (not per-document) failure while building the inverted
    /// index or geo buckets: no documents, store offline, etc.
    #[error("build failed: {message}")]
    Build {
        /// Human-readable description.
        message: String,
    },

    /// Query-stats tracking failed. Always silently dropped by callers;
    /// kept as a distinct variant purely for observability.
    #[error("stats tracking error: {message}")]
    Stats {
        /// Human-readable description.
        message: String,
    },

    /// The auto-warmer's whole-cycle error path. Counted per-query
    /// failures do not produce this variant; only cycle-level failures do.
    #[error("warming cycle failed: {message}")]
    Warming {
        /// Human-readable description.
        message: String,
    },

    /// `searchByLocationName` could not resolve coordinates or a bucket
    /// for the given input.
    #[error("unknown location: {query}")]
    UnknownLocation {
        /// The un-normalizable query string.
        query: String,
    },

    /// A requested resource (bucket, fingerprint, table) does not exist.
    #[error("{resource_type} not found: {identifier}")]
    NotFound {
        /// Kind of resource, e.g. "bucket" or "table".
        resource_type: String,
        /// Identifier that was looked up.
        identifier: String,
    },

    /// Anything that doesn't fit the taxonomy above — a genuine bug or an
    /// invariant violation.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable description.
        message: String,
        /// Underlying cause, when available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FacadeError {
    /// Build a [`FacadeError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Build a [`FacadeError::TransientStore`].
    pub fn transient_store(message: impl Into<String>) -> Self {
        Self::TransientStore { message: message.into() }
    }

    /// Build a [`FacadeError::Database`] with no SQLSTATE.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database { message: message.into(), sql_state: None }
    }

    /// Build a [`FacadeError::Database`] carrying a vendor SQLSTATE code.
    pub fn database_with_state(message: impl Into<String>, sql_state: impl Into<String>) -> Self {
        Self::Database { message: message.into(), sql_state: Some(sql_state.into()) }
    }

    /// Build a [`FacadeError::Invalidation`].
    pub fn invalidation(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalidation { table: table.into(), message: message.into() }
    }

    /// Build a [`FacadeError::Build`].
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build { message: message.into() }
    }

    /// Build a [`FacadeError::Stats`].
    pub fn stats(message: impl Into<String>) -> Self {
        Self::Stats { message: message.into() }
    }

    /// Build a [`FacadeError::Warming`].
    pub fn warming(message: impl Into<String>) -> Self {
        Self::Warming { message: message.into() }
    }

    /// Build a [`FacadeError::UnknownLocation`].
    pub fn unknown_location(query: impl Into<String>) -> Self {
        Self::UnknownLocation { query: query.into() }
    }

    /// Build a [`FacadeError::NotFound`].
    pub fn not_found(resource_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound { resource_type: resource_type.into(), identifier: identifier.into() }
    }

    /// Build a [`FacadeError::Internal`] with no source error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Build a [`FacadeError::Internal`] wrapping a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Box::new(source)) }
    }

    /// True for errors caused by the caller's request rather than the
    /// façade's infrastructure.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::UnknownLocation { .. } | Self::NotFound { .. })
    }

    /// True for errors originating in the façade or its collaborators
    /// rather than in the caller's request.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database { .. } | Self::Internal { .. } | Self::Build { .. } | Self::Warming { .. }
        )
    }

    /// True when retrying the same operation might succeed without caller
    /// intervention (the cache store, not the database).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }

    /// HTTP-style status code an operational dashboard might render this
    /// error as, independent of whether the façade exposes HTTP itself.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Configuration { .. } => 400,
            Self::UnknownLocation { .. } | Self::NotFound { .. } => 404,
            Self::TransientStore { .. } => 503,
            Self::Database { .. }
            | Self::Invalidation { .. }
            | Self::Build { .. }
            | Self::Stats { .. }
            | Self::Warming { .. }
            | Self::Internal { .. } => 500,
        }
    }

    /// Stable machine-readable error code for logs/metrics.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION",
            Self::TransientStore { .. } => "TRANSIENT_STORE",
            Self::Database { .. } => "DATABASE",
            Self::Invalidation { .. } => "INVALIDATION",
            Self::Build { .. } => "BUILD",
            Self::Stats { .. } => "STATS",
            Self::Warming { .. } => "WARMING",
            Self::UnknownLocation { .. } => "UNKNOWN_LOCATION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Internal { .. } => "INTERNAL",
        }
    }
}

impl From<serde_json::Error> for FacadeError {
    fn from(err: serde_json::Error) -> Self {
        Self::configuration(format!("invalid JSON: {err}"))
    }
}

impl From<std::io::Error> for FacadeError {
    fn from(err: std::io::Error) -> Self {
        Self::internal_with_source("I/O error", err)
    }
}

/// Adds `.context(...)` to any `Result` whose error converts into
/// [`FacadeError`], wrapping it as an [`FacadeError::Internal`] with the
/// original error preserved as `source`.
pub trait ErrorContext<T> {
    /// Attach a fixed message.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Attach a lazily-computed message (avoids formatting on the hot path).
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<FacadeError>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| wrap_with_context(e.into(), message.into()))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| wrap_with_context(e.into(), f().into()))
    }
}

fn wrap_with_context(err: FacadeError, message: String) -> FacadeError {
    FacadeError::Internal { message: format!("{message}: {err}"), source: Some(Box::new(DisplayError(err))) }
}

#[derive(Debug)]
struct DisplayError(FacadeError);

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DisplayError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_is_client_error() {
        let err = FacadeError::configuration("missing field");
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_code(), "CONFIGURATION");
    }

    #[test]
    fn transient_store_is_retryable_not_client_error() {
        let err = FacadeError::transient_store("connection refused");
        assert!(err.is_retryable());
        assert!(!err.is_client_error());
        assert!(!err.is_server_error());
    }

    #[test]
    fn database_is_server_error_not_retryable() {
        let err = FacadeError::database("syntax error");
        assert!(err.is_server_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn database_with_state_preserves_sql_state() {
        let err = FacadeError::database_with_state("duplicate key", "23000");
        match err {
            FacadeError::Database { sql_state, .. } => assert_eq!(sql_state.as_deref(), Some("23000")),
            _ => panic!("expected Database variant"),
        }
    }

    #[test]
    fn unknown_location_and_not_found_are_404() {
        assert_eq!(FacadeError::unknown_location("Atlantis").status_code(), 404);
        assert_eq!(FacadeError::not_found("bucket", "b-1").status_code(), 404);
    }

    #[test]
    fn context_wraps_and_preserves_source_message() {
        let result: std::result::Result<(), FacadeError> =
            Err(FacadeError::database("timeout")).context("warming query failed");
        let err = result.unwrap_err();
        assert!(matches!(err, FacadeError::Internal { .. }));
        assert!(err.to_string().contains("warming query failed"));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn serde_json_error_becomes_configuration() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: FacadeError = parse_err.into();
        assert!(err.is_client_error());
    }

    #[test]
    fn error_code_is_stable_per_variant() {
        assert_eq!(FacadeError::build("x").error_code(), "BUILD");
        assert_eq!(FacadeError::stats("x").error_code(), "STATS");
        assert_eq!(FacadeError::warming("x").error_code(), "WARMING");
        assert_eq!(FacadeError::invalidation("orders", "x").error_code(), "INVALIDATION");
    }
}
