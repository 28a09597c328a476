//! Error types for the façade.
//!
//! Re-exported from `vitrine-error` so every subsystem in this crate shares
//! one taxonomy and one set of classification rules.

pub use vitrine_error::{ErrorContext, FacadeError, Result};
