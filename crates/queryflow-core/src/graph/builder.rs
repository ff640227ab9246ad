use std::collections::HashMap;

use super::columns;
use super::ids::IdGenerator;
use crate::ast::{
    DeleteStatement, FromItem, InsertStatement, SelectStatement, Statement, TableSource,
    UpdateStatement,
};
use crate::error::BuildError;
use crate::scope::SourceScope;
use crate::types::{ColumnInfo, EdgeLabel, FlowEdge, FlowGraph, FlowNode, NodeType};
#[cfg(feature = "tracing")]
use tracing::debug;

/// Nesting bound for CTEs, derived tables and set operations.
const MAX_NESTING_DEPTH: usize = 64;

/// What the last stage of a query pipeline becomes.
#[derive(Clone, Copy)]
enum Terminal<'a> {
    Select,
    Cte(&'a str),
    Subquery(&'a str),
}

/// Builds the operator pipeline for one statement.
///
/// Holds the per-build id counter and the CTE registry, so a builder must not be reused
/// across statements.
pub(crate) struct GraphBuilder {
    ids: IdGenerator,
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    /// Lower-cased CTE name → id of its terminal node.
    ctes: HashMap<String, String>,
}

impl GraphBuilder {
    pub(crate) fn new() -> Self {
        Self {
            ids: IdGenerator::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
            ctes: HashMap::new(),
        }
    }

    pub(crate) fn build(mut self, statement: &Statement) -> Result<FlowGraph, BuildError> {
        match statement {
            Statement::Select(select) => {
                self.build_query(select, Terminal::Select, 0)?;
            }
            Statement::Insert(insert) => self.build_insert(insert)?,
            Statement::Update(update) => self.build_update(update),
            Statement::Delete(delete) => self.build_delete(delete),
        }

        if self.nodes.is_empty() {
            self.add_node(
                FlowNode::new("", NodeType::Result, "Empty Query")
                    .with_description("The statement produced no pipeline stages"),
            );
        }

        #[cfg(feature = "tracing")]
        debug!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            "built {} pipeline",
            statement.kind()
        );

        Ok(FlowGraph {
            nodes: self.nodes,
            edges: self.edges,
        })
    }

    /// Assigns the node an id and stores it.
    fn add_node(&mut self, mut node: FlowNode) -> String {
        node.id = self.ids.node(node.node_type.as_str());
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    fn node_columns(&self, id: &str) -> Vec<ColumnInfo> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.columns.clone())
            .unwrap_or_default()
    }

    /// Connects every node of `sources` to `target`, skipping duplicate edges.
    fn connect(&mut self, sources: &[String], target: &str, label: EdgeLabel) {
        for source in sources {
            let exists = self
                .edges
                .iter()
                .any(|e| &e.source == source && e.target == target);
            if exists || source == target {
                continue;
            }
            let id = self.ids.edge();
            self.edges.push(FlowEdge {
                id,
                source: source.clone(),
                target: target.to_string(),
                label: Some(label),
            });
        }
    }

    /// Adds `node` downstream of the current frontier, which then collapses to it.
    fn advance(&mut self, frontier: &mut Vec<String>, node: FlowNode, label: EdgeLabel) {
        let id = self.add_node(node);
        self.connect(frontier, &id, label);
        *frontier = vec![id];
    }

    fn build_query(
        &mut self,
        select: &SelectStatement,
        terminal: Terminal<'_>,
        depth: usize,
    ) -> Result<Option<String>, BuildError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(BuildError::TooDeep {
                limit: MAX_NESTING_DEPTH,
            });
        }

        // Registered after the body is built, so a recursive reference becomes a table.
        for cte in &select.with {
            if let Some(id) = self.build_query(&cte.query, Terminal::Cte(&cte.name), depth + 1)? {
                self.ctes.insert(cte.name.to_lowercase(), id);
            }
        }

        let Some(set_op) = &select.set_op else {
            return self.build_pipeline(select, terminal, true, depth);
        };

        let left = self.build_pipeline(select, Terminal::Select, false, depth)?;
        let right = self.build_query(&set_op.right, Terminal::Select, depth + 1)?;
        let columns: Vec<ColumnInfo> = left
            .as_deref()
            .map(|id| self.node_columns(id))
            .unwrap_or_default()
            .into_iter()
            .map(|c| ColumnInfo::named(c.name))
            .collect();

        let union = FlowNode::new("", NodeType::Union, set_op.op.clone())
            .with_columns(columns.clone());
        let union_id = self.add_node(union);
        let branches: Vec<String> = left.into_iter().chain(right).collect();
        self.connect(&branches, &union_id, EdgeLabel::Flow);

        let mut frontier = vec![union_id];
        self.add_ordering(select, &mut frontier);

        let node = match terminal {
            Terminal::Select => FlowNode::new("", NodeType::Result, "Result"),
            Terminal::Cte(name) => FlowNode::new("", NodeType::Cte, name),
            Terminal::Subquery(alias) => FlowNode::new("", NodeType::Subquery, alias),
        };
        self.advance(&mut frontier, node.with_columns(columns), EdgeLabel::Flow);
        Ok(frontier.pop())
    }

    /// Scan → join → filter → aggregate → having → window → sort → limit → terminal.
    fn build_pipeline(
        &mut self,
        select: &SelectStatement,
        terminal: Terminal<'_>,
        include_ordering: bool,
        depth: usize,
    ) -> Result<Option<String>, BuildError> {
        let scope = SourceScope::from_select(select);
        let referenced = columns::referenced_columns(select, &scope);

        let mut frontier = Vec::with_capacity(select.from.len());
        for item in &select.from {
            let id = self.build_source(item, &referenced, depth)?;
            frontier.push(id);
        }

        if select.from.len() > 1 {
            let join = join_node(&select.from);
            self.advance(&mut frontier, join, EdgeLabel::Join);
        }

        if let Some(condition) = &select.where_clause {
            let filter = FlowNode::new("", NodeType::Filter, "Filter")
                .with_description(format!("WHERE {condition}"));
            self.advance(&mut frontier, filter, EdgeLabel::Where);
        }

        if !select.group_by.is_empty() || select.has_aggregates() {
            let details = columns::aggregate_details(select, &scope);
            let label = match (select.group_by.is_empty(), details.functions.is_empty()) {
                (false, false) => "Group & Aggregate",
                (false, true) => "Group By",
                (true, _) => "Aggregate",
            };
            let mut node = FlowNode::new("", NodeType::Aggregate, label)
                .with_columns(columns::aggregate_columns(select, &scope));
            if !details.group_by.is_empty() {
                node = node.with_description(format!("GROUP BY {}", details.group_by.join(", ")));
            }
            self.advance(&mut frontier, node.with_aggregate_details(details), EdgeLabel::Flow);
        }

        if let Some(condition) = &select.having {
            let having = FlowNode::new("", NodeType::Filter, "Having")
                .with_description(format!("HAVING {condition}"));
            self.advance(&mut frontier, having, EdgeLabel::Having);
        }

        if select.has_window_functions() {
            let details = columns::window_details(select, &scope);
            let node = FlowNode::new("", NodeType::Window, "Window")
                .with_description(
                    details
                        .functions
                        .iter()
                        .map(|f| f.expression.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                )
                .with_columns(columns::window_columns(select, &scope))
                .with_window_details(details);
            self.advance(&mut frontier, node, EdgeLabel::Flow);
        }

        if include_ordering {
            self.add_ordering(select, &mut frontier);
        }

        let output: Vec<ColumnInfo> = select
            .columns
            .iter()
            .map(|c| columns::select_column_info(c, &scope))
            .collect();

        let node = match terminal {
            Terminal::Select if output.is_empty() => return Ok(frontier.pop()),
            Terminal::Select if select.distinct => {
                FlowNode::new("", NodeType::Select, "Select Distinct")
            }
            Terminal::Select => FlowNode::new("", NodeType::Select, "Select"),
            Terminal::Cte(name) => FlowNode::new("", NodeType::Cte, name),
            Terminal::Subquery(alias) => FlowNode::new("", NodeType::Subquery, alias),
        };
        self.advance(&mut frontier, node.with_columns(output), EdgeLabel::Flow);
        Ok(frontier.pop())
    }

    fn add_ordering(&mut self, select: &SelectStatement, frontier: &mut Vec<String>) {
        if !select.order_by.is_empty() {
            let keys: Vec<String> = select.order_by.iter().map(ToString::to_string).collect();
            let sort = FlowNode::new("", NodeType::Sort, "Sort")
                .with_description(format!("ORDER BY {}", keys.join(", ")));
            self.advance(frontier, sort, EdgeLabel::Flow);
        }

        if let Some(limit) = &select.limit {
            let label = match limit.rows() {
                Some(rows) => format!("Limit {rows}"),
                None => "Limit".to_string(),
            };
            let mut description = format!("LIMIT {}", limit.count);
            if let Some(offset) = &limit.offset {
                description.push_str(&format!(" OFFSET {offset}"));
            }
            let node = FlowNode::new("", NodeType::Limit, label).with_description(description);
            self.advance(frontier, node, EdgeLabel::Flow);
        }
    }

    /// One scan node per FROM entry. CTE references reuse the CTE's node.
    fn build_source(
        &mut self,
        item: &FromItem,
        referenced: &HashMap<String, Vec<ColumnInfo>>,
        depth: usize,
    ) -> Result<String, BuildError> {
        let name = item.source_name();
        match &item.source {
            TableSource::Subquery(subquery) => {
                let built = self.build_query(subquery, Terminal::Subquery(&name), depth + 1)?;
                Ok(match built {
                    Some(id) => id,
                    None => self.add_node(FlowNode::new("", NodeType::Subquery, name)),
                })
            }
            TableSource::Table { .. } | TableSource::Unknown(_) => {
                if let Some(id) = self.ctes.get(&name.to_lowercase()) {
                    return Ok(id.clone());
                }
                let mut node = FlowNode::new("", NodeType::Table, name.clone()).with_columns(
                    referenced
                        .get(&name.to_lowercase())
                        .cloned()
                        .unwrap_or_default(),
                );
                if let Some(alias) = &item.alias {
                    node = node.with_description(format!("{name} AS {alias}"));
                }
                Ok(self.add_node(node))
            }
        }
    }

    fn build_insert(&mut self, insert: &InsertStatement) -> Result<(), BuildError> {
        let mut frontier: Vec<String> = match &insert.source {
            Some(select) => self
                .build_query(select, Terminal::Select, 1)?
                .into_iter()
                .collect(),
            None => Vec::new(),
        };
        let produced = frontier
            .first()
            .map(|id| self.node_columns(id))
            .unwrap_or_default();
        let mut target = FlowNode::new("", NodeType::Result, format!("Insert into {}", insert.table))
            .with_columns(insert_columns(&insert.columns, &produced));
        if insert.source.is_none() {
            target = target.with_description("VALUES");
        }
        self.advance(&mut frontier, target, EdgeLabel::Flow);
        Ok(())
    }

    fn build_update(&mut self, update: &UpdateStatement) {
        let mut scope = SourceScope::default();
        scope.push(update.table.clone(), update.alias.clone());

        let mut frontier = Vec::new();
        let table = FlowNode::new("", NodeType::Table, update.table.clone());
        frontier.push(self.add_node(table));

        if let Some(condition) = &update.where_clause {
            let filter = FlowNode::new("", NodeType::Filter, "Filter")
                .with_description(format!("WHERE {condition}"));
            self.advance(&mut frontier, filter, EdgeLabel::Where);
        }

        let assignments: Vec<String> = update
            .assignments
            .iter()
            .map(|a| format!("{} = {}", a.column, a.value))
            .collect();
        let columns = update
            .assignments
            .iter()
            .map(|a| {
                let source = a.value.column_refs().first().map(|r| r.column.to_string());
                ColumnInfo::named(a.column.clone())
                    .with_expression(a.value.to_string())
                    .with_source(source.as_ref().and(scope.resolve_table(None)), source)
            })
            .collect();
        let result = FlowNode::new("", NodeType::Result, format!("Update {}", update.table))
            .with_description(format!("SET {}", assignments.join(", ")))
            .with_columns(columns);
        self.advance(&mut frontier, result, EdgeLabel::Flow);
    }

    fn build_delete(&mut self, delete: &DeleteStatement) {
        let mut frontier = Vec::new();
        let table = FlowNode::new("", NodeType::Table, delete.table.clone());
        frontier.push(self.add_node(table));

        if let Some(condition) = &delete.where_clause {
            let filter = FlowNode::new("", NodeType::Filter, "Filter")
                .with_description(format!("WHERE {condition}"));
            self.advance(&mut frontier, filter, EdgeLabel::Where);
        }

        let result = FlowNode::new("", NodeType::Result, format!("Delete from {}", delete.table));
        self.advance(&mut frontier, result, EdgeLabel::Flow);
    }
}

/// Join stage covering every FROM entry after the first.
/// Target columns of an INSERT, each pointing at the source output in the same position.
/// Without an explicit column list the source outputs keep their names.
fn insert_columns(targets: &[String], produced: &[ColumnInfo]) -> Vec<ColumnInfo> {
    if targets.is_empty() {
        return produced
            .iter()
            .map(|column| {
                ColumnInfo::named(column.name.clone())
                    .with_source(column.source_table.clone(), Some(column.name.clone()))
            })
            .collect();
    }
    targets
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let column = ColumnInfo::named(name.clone());
            match produced.get(position) {
                Some(source) => column
                    .with_source(source.source_table.clone(), Some(source.name.clone())),
                None => column,
            }
        })
        .collect()
}

fn join_node(items: &[FromItem]) -> FlowNode {
    let mut kinds: Vec<&str> = Vec::new();
    let mut conditions = Vec::new();
    for item in items.iter().skip(1) {
        let kind = item.join.as_ref().map_or("CROSS JOIN", |j| j.kind.as_str());
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
        if let Some(join) = &item.join {
            if let Some(on) = &join.on {
                conditions.push(on.to_string());
            } else if !join.using.is_empty() {
                conditions.push(format!("USING ({})", join.using.join(", ")));
            }
        }
    }
    let node = FlowNode::new("", NodeType::Join, kinds.join(" / "));
    if conditions.is_empty() {
        node
    } else {
        node.with_description(conditions.join(" AND "))
    }
}
