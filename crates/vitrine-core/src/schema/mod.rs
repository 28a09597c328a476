//! Table schema discovered from MariaDB's `information_schema`.
//!
//! Discovery never invents columns or relationships: everything here
//! traces back to a result row from [`introspection`]. It runs once at
//! startup (or on explicit rediscovery) and the dependency graph built
//! from it is read-only for the lifetime of the process.

mod dependency_graph;
pub mod introspection;

pub use dependency_graph::SchemaDependencyGraph;

use serde::{Deserialize, Serialize};

/// A discovered column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Table this column belongs to.
    pub table: String,
    /// Column name.
    pub name: String,
    /// MariaDB's reported `DATA_TYPE`, e.g. `"varchar"`, `"int"`.
    pub data_type: String,
    /// Whether the column accepts `NULL`.
    pub nullable: bool,
    /// Indexing role, if any.
    pub key_role: KeyRole,
    /// Column default expression, verbatim from the catalog.
    pub default: Option<String>,
    /// Whether the column is an `AUTO_INCREMENT` column.
    pub auto_generated: bool,
    /// Numeric precision or character length, whichever applies.
    pub precision: Option<u32>,
}

/// A column's role in the table's indexing, if any. A table has at most
/// one [`KeyRole::Primary`] column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyRole {
    /// Part of the primary key.
    Primary,
    /// Part of a unique index.
    Unique,
    /// Part of a non-unique index.
    Index,
    /// Not indexed.
    None,
}

/// A directed foreign-key edge: `(from_table, from_column)` references
/// `(to_table, to_column)`. Self-loops are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Referencing (child) table.
    pub from_table: String,
    /// Referencing (child) column.
    pub from_column: String,
    /// Referenced (parent) table.
    pub to_table: String,
    /// Referenced (parent) column.
    pub to_column: String,
    /// `ON DELETE` action declared on the constraint.
    pub on_delete: OnAction,
    /// `ON UPDATE` action declared on the constraint.
    pub on_update: OnAction,
}

/// Referential action a foreign key constraint may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnAction {
    /// `CASCADE`
    Cascade,
    /// `SET NULL`
    SetNull,
    /// `RESTRICT`
    Restrict,
    /// `NO ACTION`
    NoAction,
}

impl OnAction {
    /// Parse MariaDB's `REFERENTIAL_CONSTRAINTS.{DELETE,UPDATE}_RULE` text.
    /// Unrecognized values fall back to `NoAction`, matching the database's
    /// own default when a constraint doesn't specify one.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "RESTRICT" => Self::Restrict,
            _ => Self::NoAction,
        }
    }
}
