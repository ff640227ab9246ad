//! Immediate column sources of a SELECT's output columns.

use crate::ast::{Expr, SelectColumn, Statement};
use crate::scope::SourceScope;
use crate::types::{ColumnLineage, FlowNode, LineageSource, NodeType};

/// Table token recorded for an unqualified reference that matches no single source.
pub const UNKNOWN_TABLE: &str = "unknown";

/// Extracts the direct sources of every projected column of a SELECT.
///
/// Other statement kinds yield no lineage. `nodes` is the graph built for the same
/// statement and is only used to attach node ids to resolved tables.
pub fn extract_column_lineage(statement: &Statement, nodes: &[FlowNode]) -> Vec<ColumnLineage> {
    let Some(select) = statement.as_select() else {
        return Vec::new();
    };
    let scope = SourceScope::from_select(select);
    select
        .columns
        .iter()
        .map(|column| ColumnLineage {
            output_column: column.output_name(),
            sources: column_sources(column, &scope, nodes),
        })
        .collect()
}

fn column_sources(
    column: &SelectColumn,
    scope: &SourceScope,
    nodes: &[FlowNode],
) -> Vec<LineageSource> {
    let mut sources: Vec<LineageSource> = Vec::new();
    let mut add = |table: String, column: &str| {
        let duplicate = sources
            .iter()
            .any(|s| s.table.eq_ignore_ascii_case(&table) && s.column.eq_ignore_ascii_case(column));
        if !duplicate {
            sources.push(LineageSource {
                node_id: source_node_id(nodes, &table),
                table,
                column: column.to_string(),
            });
        }
    };

    match &column.expr {
        Expr::Star { table: None } => {
            for entry in scope.entries() {
                add(entry.name.clone(), "*");
            }
        }
        Expr::Star { table: Some(qualifier) } => {
            let table = scope
                .resolve_table(Some(qualifier))
                .unwrap_or_else(|| qualifier.clone());
            add(table, "*");
        }
        expr => {
            for column_ref in expr.column_refs() {
                let table = scope
                    .resolve_table(column_ref.table)
                    .unwrap_or_else(|| UNKNOWN_TABLE.to_string());
                add(table, column_ref.column);
            }
        }
    }
    sources
}

/// The first scan-like node labelled with `table`.
fn source_node_id(nodes: &[FlowNode], table: &str) -> Option<String> {
    nodes
        .iter()
        .find(|n| {
            matches!(
                n.node_type,
                NodeType::Table | NodeType::Cte | NodeType::Subquery
            ) && n.label.eq_ignore_ascii_case(table)
        })
        .map(|n| n.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::parser::parse_sql;

    fn lineage(sql: &str) -> Vec<ColumnLineage> {
        let statement = parse_sql(sql).unwrap().remove(0);
        let graph = build_graph(&statement).unwrap();
        extract_column_lineage(&statement, &graph.nodes)
    }

    #[test]
    fn test_join_column_resolves_through_alias() {
        let lineage = lineage("SELECT a.id, b.name FROM a JOIN b ON a.id = b.a_id");
        let name = lineage.iter().find(|l| l.output_column == "name").unwrap();
        assert_eq!(name.sources.len(), 1);
        assert_eq!(name.sources[0].table, "b");
        assert_eq!(name.sources[0].column, "name");
        assert_eq!(name.sources[0].node_id.as_deref(), Some("table_1"));
    }

    #[test]
    fn test_star_expands_per_table() {
        let lineage = lineage("SELECT * FROM customers c JOIN orders o ON c.id = o.customer_id");
        assert_eq!(lineage.len(), 1);
        let tables: Vec<&str> = lineage[0].sources.iter().map(|s| s.table.as_str()).collect();
        assert_eq!(tables, vec!["customers", "orders"]);
        assert!(lineage[0].sources.iter().all(|s| s.column == "*"));
    }

    #[test]
    fn test_qualified_star() {
        let lineage = lineage("SELECT o.* FROM customers c JOIN orders o ON c.id = o.customer_id");
        assert_eq!(lineage[0].sources.len(), 1);
        assert_eq!(lineage[0].sources[0].table, "orders");
    }

    #[test]
    fn test_expression_sources_are_deduplicated() {
        let lineage = lineage(
            "SELECT CASE WHEN amount > 0 THEN amount ELSE fee END AS net FROM payments",
        );
        let net = &lineage[0];
        assert_eq!(net.output_column, "net");
        let columns: Vec<&str> = net.sources.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(columns, vec!["amount", "fee"]);
        assert!(net.sources.iter().all(|s| s.table == "payments"));
    }

    #[test]
    fn test_unknown_qualifier_kept_as_written() {
        let lineage = lineage("SELECT x.total FROM a JOIN b ON a.id = b.id");
        assert_eq!(lineage[0].sources[0].table, "x");
        assert!(lineage[0].sources[0].node_id.is_none());
    }

    #[test]
    fn test_unqualified_reference_with_many_tables() {
        let lineage = lineage("SELECT total FROM a JOIN b ON a.id = b.id");
        assert_eq!(lineage[0].sources[0].table, UNKNOWN_TABLE);
    }

    #[test]
    fn test_constant_has_no_sources() {
        let lineage = lineage("SELECT 1 AS one");
        assert_eq!(lineage[0].output_column, "one");
        assert!(lineage[0].sources.is_empty());
    }

    #[test]
    fn test_non_select_has_no_lineage() {
        assert!(lineage("DELETE FROM sessions").is_empty());
    }

    #[test]
    fn test_cte_source_gets_cte_node() {
        let lineage = lineage("WITH recent AS (SELECT id FROM orders) SELECT id FROM recent");
        assert_eq!(lineage[0].sources[0].table, "recent");
        assert!(lineage[0].sources[0]
            .node_id
            .as_deref()
            .is_some_and(|id| id.starts_with("cte_")));
    }
}
