//! MariaDB schema discovery via `information_schema`.
//!
//! Turns `information_schema.{TABLES,COLUMNS,STATISTICS,
//! REFERENTIAL_CONSTRAINTS,KEY_COLUMN_USAGE}` result rows into the typed
//! [`Column`]/[`Relationship`] metadata the dependency graph (component B)
//! and the table-operations façade (component M) are built on.

use sqlx::{Row, mysql::MySqlPool};

use super::{Column, KeyRole, OnAction, Relationship};
use crate::error::{FacadeError, Result};

/// Discover every column of every base table in `schema_name`.
///
/// Never invents columns: a column only appears here if
/// `information_schema.COLUMNS` reports it.
///
/// # Errors
///
/// Returns [`FacadeError::Database`] if the discovery query fails.
pub async fn discover_columns(pool: &MySqlPool, schema_name: &str) -> Result<Vec<Column>> {
    let rows = sqlx::query(
        r"
        SELECT
            c.TABLE_NAME AS table_name,
            c.COLUMN_NAME AS column_name,
            c.DATA_TYPE AS data_type,
            c.IS_NULLABLE AS is_nullable,
            c.COLUMN_DEFAULT AS column_default,
            c.EXTRA AS extra,
            c.NUMERIC_PRECISION AS numeric_precision,
            c.CHARACTER_MAXIMUM_LENGTH AS character_maximum_length,
            (
                SELECT s.INDEX_NAME
                FROM information_schema.STATISTICS s
                WHERE s.TABLE_SCHEMA = c.TABLE_SCHEMA
                  AND s.TABLE_NAME = c.TABLE_NAME
                  AND s.COLUMN_NAME = c.COLUMN_NAME
                ORDER BY s.NON_UNIQUE ASC
                LIMIT 1
            ) AS index_name,
            (
                SELECT MIN(s.NON_UNIQUE)
                FROM information_schema.STATISTICS s
                WHERE s.TABLE_SCHEMA = c.TABLE_SCHEMA
                  AND s.TABLE_NAME = c.TABLE_NAME
                  AND s.COLUMN_NAME = c.COLUMN_NAME
            ) AS non_unique
        FROM information_schema.COLUMNS c
        WHERE c.TABLE_SCHEMA = ?
        ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
        ",
    )
    .bind(schema_name)
    .fetch_all(pool)
    .await
    .map_err(|e| FacadeError::database(format!("column discovery failed: {e}")))?;

    rows.into_iter()
        .map(|row| {
            let table: String = row.try_get("table_name").map_err(db_err)?;
            let name: String = row.try_get("column_name").map_err(db_err)?;
            let data_type: String = row.try_get("data_type").map_err(db_err)?;
            let is_nullable: String = row.try_get("is_nullable").map_err(db_err)?;
            let default: Option<String> = row.try_get("column_default").map_err(db_err)?;
            let extra: String = row.try_get("extra").unwrap_or_default();
            let numeric_precision: Option<u32> = row.try_get("numeric_precision").ok();
            let char_len: Option<i64> = row.try_get("character_maximum_length").ok();
            let index_name: Option<String> = row.try_get("index_name").ok().flatten();
            let non_unique: Option<i64> = row.try_get("non_unique").ok().flatten();

            let key_role = match (index_name.as_deref(), non_unique) {
                (Some("PRIMARY"), _) => KeyRole::Primary,
                (Some(_), Some(0)) => KeyRole::Unique,
                (Some(_), _) => KeyRole::Index,
                (None, _) => KeyRole::None,
            };

            Ok(Column {
                table,
                name,
                data_type,
                nullable: is_nullable.eq_ignore_ascii_case("YES"),
                key_role,
                default,
                auto_generated: extra.contains("auto_increment"),
                precision: numeric_precision.or(char_len.and_then(|l| u32::try_from(l).ok())),
            })
        })
        .collect()
}

/// Discover every foreign-key relationship in `schema_name`.
///
/// Relationships whose referenced table no longer exists are dropped with
/// a warning, never surfaced as a hard discovery failure — a dangling FK
/// metadata row should not take down schema discovery.
///
/// # Errors
///
/// Returns [`FacadeError::Database`] if the discovery query fails.
pub async fn discover_relationships(pool: &MySqlPool, schema_name: &str) -> Result<Vec<Relationship>> {
    let rows = sqlx::query(
        r"
        SELECT
            kcu.TABLE_NAME AS from_table,
            kcu.COLUMN_NAME AS from_column,
            kcu.REFERENCED_TABLE_NAME AS to_table,
            kcu.REFERENCED_COLUMN_NAME AS to_column,
            rc.DELETE_RULE AS delete_rule,
            rc.UPDATE_RULE AS update_rule
        FROM information_schema.KEY_COLUMN_USAGE kcu
        JOIN information_schema.REFERENTIAL_CONSTRAINTS rc
            ON rc.CONSTRAINT_SCHEMA = kcu.TABLE_SCHEMA
           AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
        WHERE kcu.TABLE_SCHEMA = ?
          AND kcu.REFERENCED_TABLE_NAME IS NOT NULL
        ",
    )
    .bind(schema_name)
    .fetch_all(pool)
    .await
    .map_err(|e| FacadeError::database(format!("relationship discovery failed: {e}")))?;

    let mut relationships = Vec::with_capacity(rows.len());
    for row in rows {
        let from_table: String = row.try_get("from_table").map_err(db_err)?;
        let from_column: String = row.try_get("from_column").map_err(db_err)?;
        let to_table: Option<String> = row.try_get("to_table").map_err(db_err)?;
        let to_column: Option<String> = row.try_get("to_column").map_err(db_err)?;
        let delete_rule: String = row.try_get("delete_rule").unwrap_or_default();
        let update_rule: String = row.try_get("update_rule").unwrap_or_default();

        let (Some(to_table), Some(to_column)) = (to_table, to_column) else {
            tracing::warn!(from_table, from_column, "skipping relationship with unresolved FK target");
            continue;
        };

        relationships.push(Relationship {
            from_table,
            from_column,
            to_table,
            to_column,
            on_delete: OnAction::from_str(&delete_rule),
            on_update: OnAction::from_str(&update_rule),
        });
    }

    Ok(relationships)
}

fn db_err(e: sqlx::Error) -> FacadeError {
    FacadeError::database(format!("malformed discovery row: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_action_from_str_known_values() {
        assert_eq!(OnAction::from_str("CASCADE"), OnAction::Cascade);
        assert_eq!(OnAction::from_str("SET NULL"), OnAction::SetNull);
        assert_eq!(OnAction::from_str("RESTRICT"), OnAction::Restrict);
        assert_eq!(OnAction::from_str("NO ACTION"), OnAction::NoAction);
    }

    #[test]
    fn test_on_action_from_str_unknown_defaults_to_no_action() {
        assert_eq!(OnAction::from_str("bogus"), OnAction::NoAction);
    }
}
