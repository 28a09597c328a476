//! Table-level foreign-key dependency graph.
//!
//! Built once at schema discovery from the full [`Relationship`] list and
//! read by the invalidation engine (component D) to compute cascade
//! targets. Never mutated except on rediscovery.

use std::collections::{HashMap, HashSet, VecDeque};

use super::Relationship;

/// Foreign-key dependency graph over discovered tables.
///
/// `dependents(t)` answers "which tables reference `t`" (its children in
/// FK terms); `dependencies(t)` answers "which tables does `t` reference"
/// (its parents). Both are direct-edge views; [`Self::invalidation_targets`]
/// walks the dependents edge transitively.
#[derive(Debug, Clone, Default)]
pub struct SchemaDependencyGraph {
    /// table → tables that reference it (incoming FK edges).
    dependents: HashMap<String, HashSet<String>>,
    /// table → tables it references (outgoing FK edges).
    dependencies: HashMap<String, HashSet<String>>,
    all_tables: HashSet<String>,
}

impl SchemaDependencyGraph {
    /// Build the graph from a discovered relationship list.
    ///
    /// Relationships whose endpoints don't resolve to a known table are the
    /// discovery layer's concern (dropped with a warning before this point,
    /// per the column-metadata invariant); this constructor trusts its
    /// input.
    #[must_use]
    pub fn build(relationships: &[Relationship]) -> Self {
        let mut dependents: HashMap<String, HashSet<String>> = HashMap::new();
        let mut dependencies: HashMap<String, HashSet<String>> = HashMap::new();
        let mut all_tables: HashSet<String> = HashSet::new();

        for rel in relationships {
            all_tables.insert(rel.from_table.clone());
            all_tables.insert(rel.to_table.clone());

            // rel.from_table references rel.to_table (child → parent).
            dependencies.entry(rel.from_table.clone()).or_default().insert(rel.to_table.clone());
            dependents.entry(rel.to_table.clone()).or_default().insert(rel.from_table.clone());

            dependents.entry(rel.from_table.clone()).or_default();
            dependencies.entry(rel.to_table.clone()).or_default();
        }

        Self { dependents, dependencies, all_tables }
    }

    /// Tables that reference `table` via a foreign key (direct only).
    #[must_use]
    pub fn dependents(&self, table: &str) -> Vec<String> {
        let mut v: Vec<String> = self.dependents.get(table).cloned().unwrap_or_default().into_iter().collect();
        v.sort();
        v
    }

    /// Tables that `table` references via a foreign key (direct only).
    #[must_use]
    pub fn dependencies(&self, table: &str) -> Vec<String> {
        let mut v: Vec<String> =
            self.dependencies.get(table).cloned().unwrap_or_default().into_iter().collect();
        v.sort();
        v
    }

    /// Every table known to the graph.
    #[must_use]
    pub fn all_tables(&self) -> Vec<String> {
        let mut v: Vec<String> = self.all_tables.iter().cloned().collect();
        v.sort();
        v
    }

    /// Cascade-invalidation closure for `table`: the table itself plus,
    /// transitively, every table whose rows may reference it through a
    /// JOIN/filter on the FK. Breadth-first, visited-set bounded — cycles
    /// are tolerated, each node is processed once. O(V+E).
    #[must_use]
    pub fn invalidation_targets(&self, table: &str) -> HashSet<String> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        queue.push_back(table.to_string());
        visited.insert(table.to_string());

        while let Some(current) = queue.pop_front() {
            if let Some(deps) = self.dependents.get(&current) {
                for dep in deps {
                    if visited.insert(dep.clone()) {
                        queue.push_back(dep.clone());
                    }
                }
            }
        }

        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OnAction;

    fn rel(from_table: &str, to_table: &str) -> Relationship {
        Relationship {
            from_table: from_table.to_string(),
            from_column: "parent_id".to_string(),
            to_table: to_table.to_string(),
            to_column: "id".to_string(),
            on_delete: OnAction::Cascade,
            on_update: OnAction::Cascade,
        }
    }

    #[test]
    fn test_empty_graph() {
        let graph = SchemaDependencyGraph::build(&[]);
        assert!(graph.all_tables().is_empty());
    }

    #[test]
    fn test_direct_dependents_and_dependencies() {
        let graph = SchemaDependencyGraph::build(&[rel("orders", "customers")]);
        assert_eq!(graph.dependents("customers"), vec!["orders"]);
        assert_eq!(graph.dependencies("orders"), vec!["customers"]);
    }

    #[test]
    fn test_invalidation_targets_single_level() {
        let graph = SchemaDependencyGraph::build(&[rel("orders", "customers")]);
        let targets = graph.invalidation_targets("customers");
        assert_eq!(targets.len(), 2);
        assert!(targets.contains("customers"));
        assert!(targets.contains("orders"));
    }

    #[test]
    fn test_invalidation_targets_transitive() {
        let graph = SchemaDependencyGraph::build(&[
            rel("orders", "customers"),
            rel("order_items", "orders"),
        ]);
        let targets = graph.invalidation_targets("customers");
        assert_eq!(targets.len(), 3);
        assert!(targets.contains("customers"));
        assert!(targets.contains("orders"));
        assert!(targets.contains("order_items"));
    }

    #[test]
    fn test_invalidation_targets_branching() {
        let graph = SchemaDependencyGraph::build(&[
            rel("orders", "customers"),
            rel("support_tickets", "customers"),
        ]);
        let targets = graph.invalidation_targets("customers");
        assert_eq!(targets.len(), 3);
        assert!(targets.contains("orders"));
        assert!(targets.contains("support_tickets"));
    }

    #[test]
    fn test_self_loop_tolerated() {
        let graph = SchemaDependencyGraph::build(&[rel("employees", "employees")]);
        let targets = graph.invalidation_targets("employees");
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn test_cycle_tolerated() {
        let graph = SchemaDependencyGraph::build(&[rel("a", "b"), rel("b", "a")]);
        let targets = graph.invalidation_targets("a");
        assert_eq!(targets.len(), 2);
        assert!(targets.contains("a"));
        assert!(targets.contains("b"));
    }

    #[test]
    fn test_leaf_table_has_no_dependents() {
        let graph = SchemaDependencyGraph::build(&[rel("orders", "customers")]);
        assert!(graph.dependents("orders").is_empty());
        let targets = graph.invalidation_targets("orders");
        assert_eq!(targets.len(), 1);
        assert!(targets.contains("orders"));
    }
}
