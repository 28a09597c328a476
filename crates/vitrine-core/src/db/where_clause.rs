//! WHERE-expression AST and its MariaDB lowering contract.
//!
//! `WhereExpr` is the database-agnostic filter tree the façade builds from a
//! table operation's `where` argument. [`super::mysql::where_generator`] is
//! the only module that knows how to turn it into SQL.

use serde::{Deserialize, Serialize};

use crate::error::FacadeError;

/// A WHERE-expression tree: a single column test, or a boolean combination
/// of sub-expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereExpr {
    /// A single column comparison.
    Term {
        /// Column name. A single element unless the column is a JSON
        /// document, in which case later elements are a JSON path into it.
        path: Vec<String>,
        /// Comparison to apply.
        operator: WhereOperator,
        /// Value to compare against.
        value: serde_json::Value,
    },
    /// All sub-expressions must hold.
    And(Vec<WhereExpr>),
    /// At least one sub-expression must hold.
    Or(Vec<WhereExpr>),
    /// Negates the sub-expression.
    Not(Box<WhereExpr>),
}

impl WhereExpr {
    /// A WHERE expression with no terms matches everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Term { .. } => false,
            Self::And(exprs) | Self::Or(exprs) => exprs.is_empty(),
            Self::Not(inner) => inner.is_empty(),
        }
    }

    /// Parse a duck-typed filter object into the canonical `WhereExpr`
    /// tree, accepting both legacy Mongo-style operators (`$gt`, `$gte`,
    /// `$and`, ...) and Prisma-style ones (`gte`, `lte`, `in`, `notIn`,
    /// `contains` with a sibling `mode: "insensitive"`, ...) so existing
    /// callers don't have to hand-build the AST. Multiple keys in the
    /// same object are implicitly ANDed together.
    pub fn from_duck_typed(value: &serde_json::Value) -> crate::error::Result<Self> {
        let obj =
            value.as_object().ok_or_else(|| FacadeError::configuration("filter must be a JSON object"))?;

        let mut clauses = Vec::with_capacity(obj.len());
        for (key, val) in obj {
            clauses.push(Self::parse_duck_typed_entry(key, val)?);
        }

        Ok(match clauses.len() {
            1 => clauses.into_iter().next().expect("checked len == 1"),
            _ => Self::And(clauses),
        })
    }

    fn parse_duck_typed_entry(key: &str, val: &serde_json::Value) -> crate::error::Result<Self> {
        match key {
            "$and" | "AND" | "and" => Ok(Self::And(Self::parse_duck_typed_array(val)?)),
            "$or" | "OR" | "or" => Ok(Self::Or(Self::parse_duck_typed_array(val)?)),
            "$not" | "NOT" | "not" => Ok(Self::Not(Box::new(Self::from_duck_typed(val)?))),
            column => Self::parse_duck_typed_column(column, val),
        }
    }

    fn parse_duck_typed_array(val: &serde_json::Value) -> crate::error::Result<Vec<Self>> {
        val.as_array()
            .ok_or_else(|| FacadeError::configuration("logical combinator expects an array of filters"))?
            .iter()
            .map(Self::from_duck_typed)
            .collect()
    }

    fn parse_duck_typed_column(column: &str, val: &serde_json::Value) -> crate::error::Result<Self> {
        let path = vec![column.to_string()];

        let Some(ops) = val.as_object() else {
            return Ok(Self::Term { path, operator: WhereOperator::Eq, value: val.clone() });
        };

        let insensitive = ops.get("mode").and_then(serde_json::Value::as_str) == Some("insensitive");
        let mut terms = Vec::new();

        for (op_key, op_val) in ops {
            if op_key == "mode" {
                continue;
            }
            let operator = match op_key.as_str() {
                "$eq" | "eq" => WhereOperator::Eq,
                "$ne" | "$neq" | "neq" | "not" => WhereOperator::Neq,
                "$gt" | "gt" => WhereOperator::Gt,
                "$gte" | "gte" => WhereOperator::Gte,
                "$lt" | "lt" => WhereOperator::Lt,
                "$lte" | "lte" => WhereOperator::Lte,
                "$in" | "in" => WhereOperator::In,
                "$nin" | "notIn" | "nin" => WhereOperator::Nin,
                "contains" if insensitive => WhereOperator::Icontains,
                "contains" => WhereOperator::Contains,
                "icontains" => WhereOperator::Icontains,
                "startsWith" | "startswith" => WhereOperator::Startswith,
                "endsWith" | "endswith" => WhereOperator::Endswith,
                "like" => WhereOperator::Like,
                "isnull" | "isNull" => WhereOperator::IsNull,
                "matches" => WhereOperator::Matches,
                other => {
                    return Err(FacadeError::configuration(format!("unknown duck-typed filter operator: {other}")))
                }
            };
            terms.push(Self::Term { path: path.clone(), operator, value: op_val.clone() });
        }

        if terms.is_empty() {
            // Only `mode` (or nothing) was present: treat the object
            // itself as the equality value, e.g. a JSON-column probe.
            return Ok(Self::Term { path, operator: WhereOperator::Eq, value: val.clone() });
        }

        Ok(match terms.len() {
            1 => terms.into_iter().next().expect("checked len == 1"),
            _ => Self::And(terms),
        })
    }
}

/// Comparison operators a [`WhereExpr::Term`] may use.
///
/// Restricted to what MariaDB can express directly: scalar comparison, set
/// membership, string matching, nullability, and natural-language full text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WhereOperator {
    /// `=`
    Eq,
    /// `<>`
    Neq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `IN (...)`
    In,
    /// `NOT IN (...)`
    Nin,
    /// Substring match.
    Contains,
    /// Case-insensitive substring match.
    Icontains,
    /// Prefix match.
    Startswith,
    /// Suffix match.
    Endswith,
    /// Raw SQL `LIKE` pattern, caller-supplied wildcards.
    Like,
    /// `IS NULL` / `IS NOT NULL`. The comparison value is a bool: `true`
    /// tests for null, `false` tests for not-null.
    IsNull,
    /// `MATCH(...) AGAINST(? IN NATURAL LANGUAGE MODE)`.
    Matches,
}

impl WhereOperator {
    /// Parse an operator from its wire name (as it appears in a table
    /// operation's filter payload).
    pub fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "eq" => Ok(Self::Eq),
            "neq" => Ok(Self::Neq),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "in" => Ok(Self::In),
            "nin" => Ok(Self::Nin),
            "contains" => Ok(Self::Contains),
            "icontains" => Ok(Self::Icontains),
            "startswith" => Ok(Self::Startswith),
            "endswith" => Ok(Self::Endswith),
            "like" => Ok(Self::Like),
            "isnull" => Ok(Self::IsNull),
            "matches" => Ok(Self::Matches),
            other => Err(FacadeError::configuration(format!("unknown WHERE operator: {other}"))),
        }
    }

    /// Operators whose value must be a JSON array.
    #[must_use]
    pub fn expects_array(self) -> bool {
        matches!(self, Self::In | Self::Nin)
    }

    /// Operators with case-insensitive string matching semantics.
    #[must_use]
    pub fn is_case_insensitive(self) -> bool {
        matches!(self, Self::Icontains)
    }

    /// Operators that compare strings rather than scalars.
    #[must_use]
    pub fn is_string_operator(self) -> bool {
        matches!(self, Self::Contains | Self::Icontains | Self::Startswith | Self::Endswith | Self::Like)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_where_operator_from_str() {
        assert_eq!(WhereOperator::from_str("eq").unwrap(), WhereOperator::Eq);
        assert_eq!(WhereOperator::from_str("icontains").unwrap(), WhereOperator::Icontains);
        assert!(WhereOperator::from_str("bogus").is_err());
    }

    #[test]
    fn test_where_operator_expects_array() {
        assert!(WhereOperator::In.expects_array());
        assert!(WhereOperator::Nin.expects_array());
        assert!(!WhereOperator::Eq.expects_array());
    }

    #[test]
    fn test_where_operator_is_case_insensitive() {
        assert!(WhereOperator::Icontains.is_case_insensitive());
        assert!(!WhereOperator::Contains.is_case_insensitive());
    }

    #[test]
    fn test_where_expr_simple() {
        let expr = WhereExpr::Term {
            path: vec!["email".to_string()],
            operator: WhereOperator::Eq,
            value: json!("alice@example.com"),
        };
        assert!(!expr.is_empty());
    }

    #[test]
    fn test_where_expr_and() {
        let expr = WhereExpr::And(vec![
            WhereExpr::Term { path: vec!["age".to_string()], operator: WhereOperator::Gte, value: json!(18) },
            WhereExpr::Term { path: vec!["active".to_string()], operator: WhereOperator::Eq, value: json!(true) },
        ]);
        assert!(!expr.is_empty());
    }

    #[test]
    fn test_where_expr_empty() {
        assert!(WhereExpr::And(vec![]).is_empty());
        assert!(WhereExpr::Or(vec![]).is_empty());
    }

    #[test]
    fn test_from_duck_typed_bare_scalar_is_equality() {
        let expr = WhereExpr::from_duck_typed(&json!({"email": "alice@example.com"})).unwrap();
        assert_eq!(
            expr,
            WhereExpr::Term {
                path: vec!["email".to_string()],
                operator: WhereOperator::Eq,
                value: json!("alice@example.com"),
            }
        );
    }

    #[test]
    fn test_from_duck_typed_legacy_mongo_operators() {
        let expr = WhereExpr::from_duck_typed(&json!({"age": {"$gt": 18}})).unwrap();
        assert_eq!(
            expr,
            WhereExpr::Term { path: vec!["age".to_string()], operator: WhereOperator::Gt, value: json!(18) }
        );
    }

    #[test]
    fn test_from_duck_typed_prisma_style_range_ands_both_bounds() {
        let expr = WhereExpr::from_duck_typed(&json!({"age": {"gte": 18, "lte": 65}})).unwrap();
        match expr {
            WhereExpr::And(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(terms.contains(&WhereExpr::Term {
                    path: vec!["age".to_string()],
                    operator: WhereOperator::Gte,
                    value: json!(18)
                }));
                assert!(terms.contains(&WhereExpr::Term {
                    path: vec!["age".to_string()],
                    operator: WhereOperator::Lte,
                    value: json!(65)
                }));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_from_duck_typed_prisma_style_in_and_not_in() {
        let expr = WhereExpr::from_duck_typed(&json!({"id": {"in": [1, 2, 3]}})).unwrap();
        assert_eq!(
            expr,
            WhereExpr::Term { path: vec!["id".to_string()], operator: WhereOperator::In, value: json!([1, 2, 3]) }
        );

        let expr = WhereExpr::from_duck_typed(&json!({"status": {"notIn": ["banned"]}})).unwrap();
        assert_eq!(
            expr,
            WhereExpr::Term {
                path: vec!["status".to_string()],
                operator: WhereOperator::Nin,
                value: json!(["banned"])
            }
        );
    }

    #[test]
    fn test_from_duck_typed_contains_with_insensitive_mode() {
        let expr = WhereExpr::from_duck_typed(&json!({"name": {"contains": "smith", "mode": "insensitive"}}))
            .unwrap();
        assert_eq!(
            expr,
            WhereExpr::Term {
                path: vec!["name".to_string()],
                operator: WhereOperator::Icontains,
                value: json!("smith")
            }
        );

        let expr = WhereExpr::from_duck_typed(&json!({"name": {"contains": "smith"}})).unwrap();
        assert_eq!(
            expr,
            WhereExpr::Term {
                path: vec!["name".to_string()],
                operator: WhereOperator::Contains,
                value: json!("smith")
            }
        );
    }

    #[test]
    fn test_from_duck_typed_top_level_logical_combinators() {
        let expr = WhereExpr::from_duck_typed(&json!({
            "$and": [
                {"status": "active"},
                {"age": {"$gte": 21}}
            ]
        }))
        .unwrap();
        match expr {
            WhereExpr::And(terms) => assert_eq!(terms.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }

        let expr = WhereExpr::from_duck_typed(&json!({"OR": [{"a": 1}, {"b": 2}]})).unwrap();
        assert!(matches!(expr, WhereExpr::Or(terms) if terms.len() == 2));

        let expr = WhereExpr::from_duck_typed(&json!({"NOT": {"status": "banned"}})).unwrap();
        assert!(matches!(expr, WhereExpr::Not(_)));
    }

    #[test]
    fn test_from_duck_typed_implicit_and_across_top_level_keys() {
        let expr = WhereExpr::from_duck_typed(&json!({"status": "active", "age": {"gte": 18}})).unwrap();
        assert!(matches!(expr, WhereExpr::And(terms) if terms.len() == 2));
    }

    #[test]
    fn test_from_duck_typed_rejects_unknown_operator() {
        let err = WhereExpr::from_duck_typed(&json!({"age": {"$bogus": 1}})).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_from_duck_typed_rejects_non_object_root() {
        assert!(WhereExpr::from_duck_typed(&json!([1, 2, 3])).is_err());
    }
}
