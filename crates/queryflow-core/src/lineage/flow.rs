//! Backward lineage tracing over the operator graph.
//!
//! For every output column of a select or result node, [`generate_column_flows`] walks
//! incoming edges back to the table the column originates from. Each branch of the walk
//! carries its own copy of the visited set, and the first branch that yields a non-empty
//! path wins; alternate branches are never merged into one chain.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
#[cfg(feature = "tracing")]
use tracing::trace;

use crate::types::{
    ColumnFlow, ColumnInfo, FlowEdge, FlowNode, LineagePathStep, NodeType, Transformation,
};

/// Bare identifiers (`amount`, `o.amount`) are not computations.
fn is_bare_identifier(expression: &str) -> bool {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER
        .get_or_init(|| Regex::new(r"^[\w.]+$").expect("Invalid regex pattern"))
        .is_match(expression)
}

/// True when a node label names `table`, directly or by its unqualified part.
fn label_matches(label: &str, table: &str) -> bool {
    fn unqualified(name: &str) -> &str {
        name.rsplit_once('.').map_or(name, |(_, last)| last)
    }
    label.eq_ignore_ascii_case(table)
        || unqualified(label).eq_ignore_ascii_case(table)
        || label.eq_ignore_ascii_case(unqualified(table))
}

/// How `column` changes at `node`.
pub fn transformation_for(column: &ColumnInfo, node: &FlowNode) -> Transformation {
    if node.node_type == NodeType::Table {
        return Transformation::Source;
    }
    if column.is_aggregate {
        return Transformation::Aggregated;
    }
    if column.is_window_func || node.node_type == NodeType::Window {
        return Transformation::Calculated;
    }
    if node.node_type == NodeType::Join {
        return Transformation::Joined;
    }
    if column
        .source_column
        .as_deref()
        .is_some_and(|source| source != "*" && !source.eq_ignore_ascii_case(&column.name))
    {
        return Transformation::Renamed;
    }
    if column.expression != column.name && !is_bare_identifier(&column.expression) {
        return Transformation::Calculated;
    }
    Transformation::Passthrough
}

/// Read-only view of one graph prepared for repeated backward traversal.
pub struct LineageTracer<'a> {
    nodes: HashMap<&'a str, &'a FlowNode>,
    /// Target id → source ids, in edge order.
    incoming: HashMap<&'a str, Vec<&'a str>>,
    tables: Vec<&'a FlowNode>,
}

impl<'a> LineageTracer<'a> {
    pub fn new(nodes: &'a [FlowNode], edges: &'a [FlowEdge]) -> Self {
        let node_map: HashMap<&str, &FlowNode> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in edges {
            if node_map.contains_key(edge.source.as_str()) {
                incoming
                    .entry(edge.target.as_str())
                    .or_default()
                    .push(edge.source.as_str());
            }
        }
        Self {
            nodes: node_map,
            incoming,
            tables: nodes
                .iter()
                .filter(|n| n.node_type == NodeType::Table)
                .collect(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&'a FlowNode> {
        self.nodes.get(id).copied()
    }

    /// Path for `column` as it leaves node `node_id`, ordered source → result.
    pub fn trace(&self, column: &ColumnInfo, node_id: &str) -> Vec<LineagePathStep> {
        match self.node(node_id) {
            Some(node) => self.build_column_lineage_path(column, node, &HashSet::new()),
            None => Vec::new(),
        }
    }

    /// Recursive step of the backward walk.
    ///
    /// Returns an empty path when `node` was already visited on this branch. `visited` is
    /// copied before descending, so sibling branches never observe each other's nodes.
    pub fn build_column_lineage_path(
        &self,
        column: &ColumnInfo,
        node: &'a FlowNode,
        visited: &HashSet<&'a str>,
    ) -> Vec<LineagePathStep> {
        if visited.contains(node.id.as_str()) {
            return Vec::new();
        }
        let mut visited = visited.clone();
        visited.insert(node.id.as_str());

        let step = LineagePathStep {
            node_id: node.id.clone(),
            node_name: node.label.clone(),
            node_type: node.node_type,
            column_name: column.name.clone(),
            transformation: transformation_for(column, node),
            expression: (column.expression != column.name).then(|| column.expression.clone()),
        };
        if node.node_type == NodeType::Table {
            return vec![step];
        }

        let sources = self
            .incoming
            .get(node.id.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut path = self.trace_sources(column, sources, &visited, true);
        if path.is_empty() {
            path = self.match_table_by_hint(column, &visited);
        }
        if path.is_empty() {
            path = self.trace_sources(column, sources, &visited, false);
        }
        path.push(step);
        path
    }

    fn trace_sources(
        &self,
        column: &ColumnInfo,
        sources: &[&'a str],
        visited: &HashSet<&'a str>,
        strict: bool,
    ) -> Vec<LineagePathStep> {
        for source_id in sources {
            let Some(source) = self.node(source_id) else {
                continue;
            };
            let Some(matched) = find_source_column(column, source, strict) else {
                continue;
            };
            let path = self.build_column_lineage_path(&unwrap_aggregate(matched), source, visited);
            if !path.is_empty() {
                return path;
            }
        }
        Vec::new()
    }

    /// Last resort: a table node whose label matches the column's table hint.
    fn match_table_by_hint(
        &self,
        column: &ColumnInfo,
        visited: &HashSet<&'a str>,
    ) -> Vec<LineagePathStep> {
        let Some(table) = column.source_table.as_deref() else {
            return Vec::new();
        };
        let candidates = || {
            self.tables
                .iter()
                .copied()
                .filter(|n| !visited.contains(n.id.as_str()))
        };
        let token = table.to_lowercase();
        let found = candidates()
            .find(|n| n.label.eq_ignore_ascii_case(table))
            .or_else(|| {
                if token.chars().count() <= 2 {
                    candidates().find(|n| n.label.to_lowercase().starts_with(&token))
                } else {
                    None
                }
            })
            .or_else(|| {
                if token.chars().count() > 2 {
                    candidates().find(|n| {
                        let label = n.label.to_lowercase();
                        label.contains(&token) || token.contains(&label)
                    })
                } else {
                    None
                }
            });

        match found {
            Some(node) => vec![LineagePathStep {
                node_id: node.id.clone(),
                node_name: node.label.clone(),
                node_type: node.node_type,
                column_name: column
                    .source_column
                    .clone()
                    .unwrap_or_else(|| column.name.clone()),
                transformation: Transformation::Source,
                expression: None,
            }],
            None => Vec::new(),
        }
    }
}

/// Aggregate outputs are traced through the column they aggregate.
fn unwrap_aggregate(column: ColumnInfo) -> ColumnInfo {
    match &column.source_column {
        Some(inner)
            if column.is_aggregate && inner != "*" && !inner.eq_ignore_ascii_case(&column.name) =>
        {
            ColumnInfo::named(inner.clone())
                .with_source(column.source_table.clone(), Some(inner.clone()))
                .aggregate()
        }
        _ => column,
    }
}

/// Column on `source` that feeds `target` one stage downstream.
///
/// In strict mode a table node whose label contradicts the target's table hint yields
/// `None`, so join branches resolve to the table that owns the column.
pub fn find_source_column(
    target: &ColumnInfo,
    source: &FlowNode,
    strict: bool,
) -> Option<ColumnInfo> {
    if let Some(table) = target.source_table.as_deref() {
        if label_matches(&source.label, table) {
            let wanted = target.source_column.as_deref().unwrap_or(&target.name);
            return Some(source.column(wanted).cloned().unwrap_or_else(|| {
                ColumnInfo::named(wanted)
                    .with_source(Some(table.to_string()), target.source_column.clone())
            }));
        }
        if strict && source.node_type == NodeType::Table {
            return None;
        }
    }

    // `COUNT(*)` and friends originate in the whole row.
    if source.node_type == NodeType::Table && target.source_column.as_deref() == Some("*") {
        return Some(
            ColumnInfo::named("*").with_source(Some(source.label.clone()), Some("*".to_string())),
        );
    }

    if let Some(details) = &source.aggregate_details {
        let function = details.functions.iter().find(|f| {
            f.alias
                .as_deref()
                .is_some_and(|alias| alias.eq_ignore_ascii_case(&target.name))
                || f.name.eq_ignore_ascii_case(&target.name)
        });
        if let Some(function) = function {
            let name = function.alias.clone().unwrap_or_else(|| function.name.clone());
            return Some(
                ColumnInfo::named(name)
                    .with_expression(function.expression.clone())
                    .with_source(function.source_table.clone(), function.source_column.clone())
                    .aggregate(),
            );
        }
    }

    if let Some(details) = &source.window_details {
        let function = details.functions.iter().find(|f| {
            f.alias
                .as_deref()
                .is_some_and(|alias| alias.eq_ignore_ascii_case(&target.name))
                || f.name.eq_ignore_ascii_case(&target.name)
        });
        if let Some(function) = function {
            let name = function.alias.clone().unwrap_or_else(|| function.name.clone());
            return Some(
                ColumnInfo::named(name)
                    .with_expression(function.expression.clone())
                    .with_source(function.source_table.clone(), function.source_column.clone())
                    .window(),
            );
        }
    }

    if let Some(found) = direct_match(target, source) {
        return Some(found.clone());
    }

    if source.node_type == NodeType::Join {
        return Some(target.clone());
    }

    if source.node_type == NodeType::Table {
        return Some(
            ColumnInfo::named(target.name.clone())
                .with_source(target.source_table.clone(), target.source_column.clone()),
        );
    }

    // Filters, sorts and limits pass rows through unchanged.
    Some(target.clone())
}

/// Same-name column, shared provenance, or an expression mentioning the name.
///
/// A plain target never binds to an aggregate or window output through shared provenance
/// or expression text: such outputs merely mention the column in their arguments or
/// window clause.
fn direct_match<'n>(target: &ColumnInfo, source: &'n FlowNode) -> Option<&'n ColumnInfo> {
    if let Some(found) = source.column(&target.name) {
        return Some(found);
    }
    let target_computed = target.is_aggregate || target.is_window_func;
    let eligible = |c: &&ColumnInfo| target_computed || !(c.is_aggregate || c.is_window_func);
    if let Some(wanted) = target.source_column.as_deref().filter(|c| *c != "*") {
        let found = source.columns.iter().find(|c| {
            c.name.eq_ignore_ascii_case(wanted)
                || (eligible(c)
                    && c.source_column
                        .as_deref()
                        .is_some_and(|s| s.eq_ignore_ascii_case(&target.name)))
        });
        if found.is_some() {
            return found;
        }
    }
    let name = target.name.to_lowercase();
    source
        .columns
        .iter()
        .filter(eligible)
        .find(|c| c.expression.to_lowercase().contains(&name))
}

/// One [`ColumnFlow`] per output column of every select and result node.
pub fn generate_column_flows(nodes: &[FlowNode], edges: &[FlowEdge]) -> Vec<ColumnFlow> {
    let tracer = LineageTracer::new(nodes, edges);
    let mut flows = Vec::new();
    for node in nodes
        .iter()
        .filter(|n| matches!(n.node_type, NodeType::Select | NodeType::Result))
    {
        for (index, column) in node.columns.iter().enumerate() {
            let lineage_path = tracer.trace(column, &node.id);
            #[cfg(feature = "tracing")]
            trace!(
                node = %node.id,
                column = %column.name,
                steps = lineage_path.len(),
                "traced column lineage"
            );
            flows.push(ColumnFlow {
                id: format!("flow_{}_{}", node.id, index),
                output_column: column.name.clone(),
                output_node_id: node.id.clone(),
                lineage_path,
            });
        }
    }
    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::parser::parse_sql;
    use crate::types::{AggregateDetails, AggregateFunction, EdgeLabel, FlowGraph};

    fn flows(sql: &str) -> (FlowGraph, Vec<ColumnFlow>) {
        let statement = parse_sql(sql).unwrap().remove(0);
        let graph = build_graph(&statement).unwrap();
        let flows = generate_column_flows(&graph.nodes, &graph.edges);
        (graph, flows)
    }

    fn flow<'f>(flows: &'f [ColumnFlow], column: &str) -> &'f ColumnFlow {
        flows
            .iter()
            .find(|f| f.output_column == column)
            .unwrap_or_else(|| panic!("no flow for {column}"))
    }

    fn transformations(flow: &ColumnFlow) -> Vec<Transformation> {
        flow.lineage_path.iter().map(|s| s.transformation).collect()
    }

    fn edge(source: &str, target: &str) -> FlowEdge {
        FlowEdge {
            id: format!("{source}->{target}"),
            source: source.to_string(),
            target: target.to_string(),
            label: Some(EdgeLabel::Flow),
        }
    }

    #[test]
    fn test_aggregate_traces_inner_column() {
        let (_, flows) = flows(
            "SELECT customer_id, COUNT(order_id) AS order_count FROM orders GROUP BY customer_id",
        );
        let count = flow(&flows, "order_count");
        assert_eq!(
            transformations(count),
            vec![
                Transformation::Source,
                Transformation::Aggregated,
                Transformation::Aggregated
            ]
        );
        let origin = count.origin().unwrap();
        assert_eq!(origin.node_name, "orders");
        assert_eq!(origin.column_name, "order_id");
        assert_eq!(
            count.lineage_path.last().unwrap().expression.as_deref(),
            Some("COUNT(order_id)")
        );

        let key = flow(&flows, "customer_id");
        assert_eq!(
            transformations(key),
            vec![
                Transformation::Source,
                Transformation::Passthrough,
                Transformation::Passthrough
            ]
        );
    }

    #[test]
    fn test_join_branch_resolves_owning_table() {
        let (_, flows) = flows("SELECT a.id, b.name FROM a JOIN b ON a.id = b.a_id");
        let name = flow(&flows, "name");
        assert_eq!(name.lineage_path[0].node_name, "b");
        assert_eq!(name.lineage_path[1].transformation, Transformation::Joined);

        let id = flow(&flows, "id");
        assert_eq!(id.lineage_path[0].node_name, "a");
    }

    #[test]
    fn test_rename_and_calculation() {
        let (_, flows) = flows("SELECT amount AS total, price * quantity AS price FROM orders");
        let total = flow(&flows, "total");
        assert_eq!(
            total.lineage_path.last().unwrap().transformation,
            Transformation::Renamed
        );
        assert_eq!(total.origin().unwrap().column_name, "amount");

        let price = flow(&flows, "price");
        assert_eq!(
            price.lineage_path.last().unwrap().transformation,
            Transformation::Calculated
        );
        assert_eq!(price.origin().unwrap().column_name, "price");
    }

    #[test]
    fn test_constant_expression_is_calculated() {
        let column = ColumnInfo::named("one_more").with_expression("1 + 1");
        let node = FlowNode::new("select_0", NodeType::Select, "Select");
        assert_eq!(transformation_for(&column, &node), Transformation::Calculated);
    }

    #[test]
    fn test_window_column_is_calculated() {
        let (_, flows) = flows(
            "SELECT region, RANK() OVER (PARTITION BY region ORDER BY sales) AS r FROM stores",
        );
        let rank = flow(&flows, "r");
        assert_eq!(rank.origin().unwrap().node_name, "stores");
        assert!(rank
            .lineage_path
            .iter()
            .any(|s| s.node_type == NodeType::Window
                && s.transformation == Transformation::Calculated));
    }

    #[test]
    fn test_plain_column_passes_window_node_unchanged() {
        let (_, flows) = flows(
            "SELECT region, RANK() OVER (PARTITION BY region ORDER BY sales) AS r FROM stores",
        );
        let region = flow(&flows, "region");
        let columns: Vec<&str> = region
            .lineage_path
            .iter()
            .map(|s| s.column_name.as_str())
            .collect();
        assert_eq!(columns, vec!["region", "region", "region"]);
        assert_eq!(region.origin().unwrap().node_name, "stores");
    }

    #[test]
    fn test_insert_target_traces_positional_source() {
        let (_, flows) = flows("INSERT INTO t (a, b) SELECT x, y FROM s");
        let a = flow(&flows, "a");
        let origin = a.origin().unwrap();
        assert_eq!((origin.node_name.as_str(), origin.column_name.as_str()), ("s", "x"));
        assert_eq!(a.lineage_path.last().unwrap().transformation, Transformation::Renamed);

        let b = flow(&flows, "b");
        assert_eq!(b.origin().unwrap().column_name, "y");
    }

    #[test]
    fn test_count_star_originates_in_whole_row() {
        let (_, flows) = flows(
            "SELECT department, COUNT(*) AS headcount FROM employees GROUP BY department",
        );
        let headcount = flow(&flows, "headcount");
        let origin = headcount.origin().unwrap();
        assert_eq!((origin.node_name.as_str(), origin.column_name.as_str()), ("employees", "*"));
        assert_eq!(
            transformations(headcount),
            vec![
                Transformation::Source,
                Transformation::Aggregated,
                Transformation::Aggregated
            ]
        );

        let (_, flows) = self::flows("SELECT COUNT(*) FROM t");
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].origin().unwrap().column_name, "*");
    }

    #[test]
    fn test_count_star_through_derived_table() {
        let (_, flows) = flows(
            "SELECT d.headcount FROM (SELECT department, COUNT(*) AS headcount \
             FROM employees GROUP BY department) AS d WHERE d.headcount > 5",
        );
        let headcount = flow(&flows, "headcount");
        let origin = headcount.origin().unwrap();
        assert_eq!((origin.node_name.as_str(), origin.column_name.as_str()), ("employees", "*"));
    }

    #[test]
    fn test_having_filter_keeps_aggregate_classification() {
        let (_, flows) = flows(
            "SELECT customer_id, COUNT(order_id) AS order_count FROM orders \
             GROUP BY customer_id HAVING COUNT(order_id) > 1",
        );
        let count = flow(&flows, "order_count");
        assert_eq!(
            transformations(count),
            vec![
                Transformation::Source,
                Transformation::Aggregated,
                Transformation::Aggregated,
                Transformation::Aggregated
            ]
        );
        assert_eq!(count.origin().unwrap().column_name, "order_id");
    }

    #[test]
    fn test_cte_lineage_reaches_base_table() {
        let (_, flows) = flows(
            "WITH big AS (SELECT id, amount FROM orders WHERE amount > 100) SELECT id FROM big",
        );
        let id = flows
            .iter()
            .find(|f| f.output_column == "id" && f.output_node_id.starts_with("select"))
            .unwrap();
        let names: Vec<&str> = id.lineage_path.iter().map(|s| s.node_name.as_str()).collect();
        assert_eq!(names, vec!["orders", "Filter", "big", "Select"]);
    }

    #[test]
    fn test_cycle_returns_empty_for_visited_node() {
        let nodes = vec![
            FlowNode::new("select_0", NodeType::Select, "A")
                .with_columns(vec![ColumnInfo::named("x")]),
            FlowNode::new("select_1", NodeType::Select, "B")
                .with_columns(vec![ColumnInfo::named("x")]),
        ];
        let edges = vec![edge("select_0", "select_1"), edge("select_1", "select_0")];
        let tracer = LineageTracer::new(&nodes, &edges);

        let path = tracer.trace(&ColumnInfo::named("x"), "select_1");
        let ids: Vec<&str> = path.iter().map(|s| s.node_id.as_str()).collect();
        assert_eq!(ids, vec!["select_0", "select_1"]);

        let visited: HashSet<&str> = ["select_0"].into_iter().collect();
        assert!(tracer
            .build_column_lineage_path(&ColumnInfo::named("x"), &nodes[0], &visited)
            .is_empty());
    }

    #[test]
    fn test_first_incoming_branch_wins() {
        let nodes = vec![
            FlowNode::new("table_0", NodeType::Table, "t"),
            FlowNode::new("filter_1", NodeType::Filter, "a"),
            FlowNode::new("filter_2", NodeType::Filter, "b"),
            FlowNode::new("select_3", NodeType::Select, "Select")
                .with_columns(vec![ColumnInfo::named("x")]),
        ];
        let edges = vec![
            edge("table_0", "filter_1"),
            edge("table_0", "filter_2"),
            edge("filter_2", "select_3"),
            edge("filter_1", "select_3"),
        ];
        let tracer = LineageTracer::new(&nodes, &edges);
        let path = tracer.trace(&nodes[3].columns[0], "select_3");
        let ids: Vec<&str> = path.iter().map(|s| s.node_id.as_str()).collect();
        assert_eq!(ids, vec!["table_0", "filter_2", "select_3"]);
    }

    #[test]
    fn test_alias_heuristic_fallback() {
        let nodes = vec![
            FlowNode::new("table_0", NodeType::Table, "customers"),
            FlowNode::new("select_1", NodeType::Select, "Select"),
        ];
        let tracer = LineageTracer::new(&nodes, &[]);

        let short = ColumnInfo::named("name").with_source(Some("cu".into()), Some("name".into()));
        let path = tracer.trace(&short, "select_1");
        assert_eq!(path[0].node_id, "table_0");
        assert_eq!(path[0].transformation, Transformation::Source);

        let long =
            ColumnInfo::named("name").with_source(Some("customer".into()), Some("name".into()));
        assert_eq!(tracer.trace(&long, "select_1")[0].node_id, "table_0");

        let unrelated =
            ColumnInfo::named("name").with_source(Some("xyz".into()), Some("name".into()));
        let path = tracer.trace(&unrelated, "select_1");
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].node_id, "select_1");
    }

    #[test]
    fn test_find_source_column_uses_aggregate_details() {
        let aggregate = FlowNode::new("aggregate_1", NodeType::Aggregate, "Aggregate")
            .with_aggregate_details(AggregateDetails {
                functions: vec![AggregateFunction {
                    name: "SUM".to_string(),
                    expression: "SUM(amount)".to_string(),
                    alias: Some("total".to_string()),
                    source_column: Some("amount".to_string()),
                    source_table: Some("orders".to_string()),
                }],
                group_by: Vec::new(),
            });
        let found = find_source_column(&ColumnInfo::named("total"), &aggregate, true).unwrap();
        assert!(found.is_aggregate);
        assert_eq!(found.expression, "SUM(amount)");
        assert_eq!(found.source_column.as_deref(), Some("amount"));

        let unwrapped = unwrap_aggregate(found);
        assert_eq!(unwrapped.name, "amount");
        assert!(unwrapped.is_aggregate);
    }

    #[test]
    fn test_strict_mode_skips_mismatched_table() {
        let orders = FlowNode::new("table_0", NodeType::Table, "orders");
        let column = ColumnInfo::named("name").with_source(Some("customers".into()), None);
        assert!(find_source_column(&column, &orders, true).is_none());
        assert!(find_source_column(&column, &orders, false).is_some());
    }

    #[test]
    fn test_union_result_traces_first_branch() {
        let (graph, flows) = flows("SELECT id FROM users UNION SELECT id FROM admins");
        let result = graph.nodes_of_type(NodeType::Result).next().unwrap();
        let id = flows
            .iter()
            .find(|f| f.output_node_id == result.id)
            .unwrap();
        assert_eq!(id.origin().unwrap().node_name, "users");
    }

    #[test]
    fn test_repeated_traces_are_identical() {
        let (graph, _) = flows("SELECT o.id, c.name FROM orders o JOIN customers c ON o.cid = c.id");
        let tracer = LineageTracer::new(&graph.nodes, &graph.edges);
        let select = graph.nodes_of_type(NodeType::Select).next().unwrap();
        for column in &select.columns {
            assert_eq!(tracer.trace(column, &select.id), tracer.trace(column, &select.id));
        }
    }

    #[test]
    fn test_bare_identifier_pattern() {
        assert!(is_bare_identifier("o.amount"));
        assert!(!is_bare_identifier("amount * 2"));
    }
}
