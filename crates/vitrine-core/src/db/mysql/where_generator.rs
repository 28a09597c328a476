//! MySQL/MariaDB WHERE-expression SQL generation.

use crate::{
    db::where_clause::{WhereExpr, WhereOperator},
    error::{FacadeError, Result},
};

use super::quote_identifier;

/// Lowers a [`WhereExpr`] tree into a parameterized SQL fragment and its
/// positional bind values, in the order the `?` placeholders appear.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlWhereGenerator;

impl MySqlWhereGenerator {
    /// Create a new generator. Stateless; exists for symmetry with other
    /// dialect generators and to leave room for dialect-specific options.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generate the SQL fragment (without the leading `WHERE `) and its
    /// bind parameters.
    pub fn generate(&self, expr: &WhereExpr) -> Result<(String, Vec<serde_json::Value>)> {
        let mut params = Vec::new();
        let sql = self.generate_expr(expr, &mut params)?;
        Ok((sql, params))
    }

    fn generate_expr(&self, expr: &WhereExpr, params: &mut Vec<serde_json::Value>) -> Result<String> {
        match expr {
            WhereExpr::Term { path, operator, value } => self.generate_term(path, *operator, value, params),
            WhereExpr::And(exprs) => self.generate_conjunction(exprs, "AND", params),
            WhereExpr::Or(exprs) => self.generate_conjunction(exprs, "OR", params),
            WhereExpr::Not(inner) => {
                let inner_sql = self.generate_expr(inner, params)?;
                Ok(format!("NOT ({inner_sql})"))
            },
        }
    }

    fn generate_conjunction(
        &self,
        exprs: &[WhereExpr],
        joiner: &str,
        params: &mut Vec<serde_json::Value>,
    ) -> Result<String> {
        if exprs.is_empty() {
            return Ok("TRUE".to_string());
        }
        let parts: Result<Vec<String>> = exprs.iter().map(|e| self.generate_expr(e, params)).collect();
        let parts = parts?;
        if parts.len() == 1 {
            Ok(parts.into_iter().next().unwrap())
        } else {
            Ok(format!("({})", parts.join(&format!(" {joiner} "))))
        }
    }

    fn generate_term(
        &self,
        path: &[String],
        operator: WhereOperator,
        value: &serde_json::Value,
        params: &mut Vec<serde_json::Value>,
    ) -> Result<String> {
        let column = self.build_column_ref(path);

        match operator {
            WhereOperator::Eq => self.generate_comparison(&column, "=", value, params),
            WhereOperator::Neq => self.generate_comparison(&column, "<>", value, params),
            WhereOperator::Gt => self.generate_comparison(&column, ">", value, params),
            WhereOperator::Gte => self.generate_comparison(&column, ">=", value, params),
            WhereOperator::Lt => self.generate_comparison(&column, "<", value, params),
            WhereOperator::Lte => self.generate_comparison(&column, "<=", value, params),
            WhereOperator::In => self.generate_in(&column, value, params),
            WhereOperator::Nin => Ok(format!("NOT ({})", self.generate_in(&column, value, params)?)),
            WhereOperator::Contains => self.generate_like(&column, value, None, None, false, params),
            WhereOperator::Icontains => self.generate_like(&column, value, None, None, true, params),
            WhereOperator::Startswith => self.generate_like(&column, value, None, Some("%"), false, params),
            WhereOperator::Endswith => self.generate_like(&column, value, Some("%"), None, false, params),
            WhereOperator::Like => self.generate_comparison(&column, "LIKE", value, params),
            WhereOperator::IsNull => {
                let want_null = value.as_bool().unwrap_or(true);
                Ok(format!("{column} IS {}NULL", if want_null { "" } else { "NOT " }))
            },
            WhereOperator::Matches => self.generate_fts(&column, value, params),
        }
    }

    /// Builds a backtick-quoted column reference. Additional path segments
    /// beyond the first drill into a JSON column via `->>`.
    fn build_column_ref(&self, path: &[String]) -> String {
        let column = quote_identifier(&path[0]);
        if path.len() == 1 {
            return column;
        }
        let json_path = format!("$.{}", path[1..].join("."));
        format!("JSON_UNQUOTE(JSON_EXTRACT({column}, '{json_path}'))")
    }

    fn generate_comparison(
        &self,
        column: &str,
        op: &str,
        value: &serde_json::Value,
        params: &mut Vec<serde_json::Value>,
    ) -> Result<String> {
        params.push(value.clone());
        Ok(format!("{column} {op} ?"))
    }

    fn generate_in(
        &self,
        column: &str,
        value: &serde_json::Value,
        params: &mut Vec<serde_json::Value>,
    ) -> Result<String> {
        let items = value
            .as_array()
            .ok_or_else(|| FacadeError::configuration("IN/NIN operator requires an array value"))?;

        if items.is_empty() {
            return Ok("FALSE".to_string());
        }

        let placeholders = vec!["?"; items.len()].join(", ");
        params.extend(items.iter().cloned());
        Ok(format!("{column} IN ({placeholders})"))
    }

    fn generate_like(
        &self,
        column: &str,
        value: &serde_json::Value,
        prefix_wildcard: Option<&str>,
        suffix_wildcard: Option<&str>,
        case_insensitive: bool,
        params: &mut Vec<serde_json::Value>,
    ) -> Result<String> {
        let text = value
            .as_str()
            .ok_or_else(|| FacadeError::configuration("string operator requires a string value"))?;

        // Default to substring match (both sides wildcarded) unless the
        // caller pinned one side (startswith/endswith).
        let prefix = prefix_wildcard.unwrap_or("%");
        let suffix = suffix_wildcard.unwrap_or("%");
        params.push(serde_json::Value::String(text.to_string()));

        let pattern = format!("CONCAT('{prefix}', ?, '{suffix}')");
        if case_insensitive {
            Ok(format!("LOWER({column}) LIKE LOWER({pattern})"))
        } else {
            Ok(format!("{column} LIKE {pattern}"))
        }
    }

    fn generate_fts(
        &self,
        column: &str,
        value: &serde_json::Value,
        params: &mut Vec<serde_json::Value>,
    ) -> Result<String> {
        let text = value
            .as_str()
            .ok_or_else(|| FacadeError::configuration("matches operator requires a string value"))?;
        params.push(serde_json::Value::String(text.to_string()));
        Ok(format!("MATCH({column}) AGAINST(? IN NATURAL LANGUAGE MODE)"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_eq_generates_parameterized_comparison() {
        let gen = MySqlWhereGenerator::new();
        let expr = WhereExpr::Term {
            path: vec!["email".to_string()],
            operator: WhereOperator::Eq,
            value: json!("alice@example.com"),
        };
        let (sql, params) = gen.generate(&expr).unwrap();
        assert_eq!(sql, "`email` = ?");
        assert_eq!(params, vec![json!("alice@example.com")]);
    }

    #[test]
    fn test_icontains_generates_case_insensitive_like() {
        let gen = MySqlWhereGenerator::new();
        let expr = WhereExpr::Term {
            path: vec!["email".to_string()],
            operator: WhereOperator::Icontains,
            value: json!("example.com"),
        };
        let (sql, _) = gen.generate(&expr).unwrap();
        assert_eq!(sql, "LOWER(`email`) LIKE LOWER(CONCAT('%', ?, '%'))");
    }

    #[test]
    fn test_and_conjunction() {
        let gen = MySqlWhereGenerator::new();
        let expr = WhereExpr::And(vec![
            WhereExpr::Term { path: vec!["age".to_string()], operator: WhereOperator::Gte, value: json!(18) },
            WhereExpr::Term { path: vec!["active".to_string()], operator: WhereOperator::Eq, value: json!(true) },
        ]);
        let (sql, params) = gen.generate(&expr).unwrap();
        assert_eq!(sql, "(`age` >= ? AND `active` = ?)");
        assert_eq!(params, vec![json!(18), json!(true)]);
    }

    #[test]
    fn test_in_operator() {
        let gen = MySqlWhereGenerator::new();
        let expr = WhereExpr::Term {
            path: vec!["status".to_string()],
            operator: WhereOperator::In,
            value: json!(["active", "pending"]),
        };
        let (sql, params) = gen.generate(&expr).unwrap();
        assert_eq!(sql, "`status` IN (?, ?)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_in_empty_array_is_false() {
        let gen = MySqlWhereGenerator::new();
        let expr = WhereExpr::Term {
            path: vec!["status".to_string()],
            operator: WhereOperator::In,
            value: json!([]),
        };
        let (sql, params) = gen.generate(&expr).unwrap();
        assert_eq!(sql, "FALSE");
        assert!(params.is_empty());
    }

    #[test]
    fn test_is_null() {
        let gen = MySqlWhereGenerator::new();
        let expr = WhereExpr::Term {
            path: vec!["deleted_at".to_string()],
            operator: WhereOperator::IsNull,
            value: json!(true),
        };
        let (sql, _) = gen.generate(&expr).unwrap();
        assert_eq!(sql, "`deleted_at` IS NULL");
    }

    #[test]
    fn test_json_path_drills_into_document_column() {
        let gen = MySqlWhereGenerator::new();
        let expr = WhereExpr::Term {
            path: vec!["data".to_string(), "address".to_string(), "city".to_string()],
            operator: WhereOperator::Eq,
            value: json!("Berlin"),
        };
        let (sql, _) = gen.generate(&expr).unwrap();
        assert_eq!(sql, "JSON_UNQUOTE(JSON_EXTRACT(`data`, '$.address.city')) = ?");
    }

    #[test]
    fn test_not_wraps_inner_expr() {
        let gen = MySqlWhereGenerator::new();
        let expr = WhereExpr::Not(Box::new(WhereExpr::Term {
            path: vec!["active".to_string()],
            operator: WhereOperator::Eq,
            value: json!(true),
        }));
        let (sql, _) = gen.generate(&expr).unwrap();
        assert_eq!(sql, "NOT (`active` = ?)");
    }
}
