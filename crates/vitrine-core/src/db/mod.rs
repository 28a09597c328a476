//! Database access layer: the MariaDB adapter, its WHERE-expression AST,
//! and the types that cross the adapter boundary.

pub mod mysql;
pub mod traits;
pub mod types;
pub mod where_clause;

pub use mysql::{schema_name_from_url, MySqlAdapter};
pub use traits::DatabaseAdapter;
pub use types::{DatabaseType, PoolMetrics, Row};
pub use where_clause::{WhereExpr, WhereOperator};
