//! Operator graph types: pipeline stages (`FlowNode`) and the edges between them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of pipeline stage a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Table,
    Filter,
    Join,
    Aggregate,
    Sort,
    Limit,
    Select,
    Result,
    Cte,
    Union,
    Subquery,
    Window,
    Case,
    Cluster,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Filter => "filter",
            Self::Join => "join",
            Self::Aggregate => "aggregate",
            Self::Sort => "sort",
            Self::Limit => "limit",
            Self::Select => "select",
            Self::Result => "result",
            Self::Cte => "cte",
            Self::Union => "union",
            Self::Subquery => "subquery",
            Self::Window => "window",
            Self::Case => "case",
            Self::Cluster => "cluster",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage of the derived operator pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    /// Unique id within one parse (`<kind>_<n>`)
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Short human-readable label
    pub label: String,

    /// Longer description, typically the clause text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Columns visible at this stage (select, table, cte, subquery and aggregate nodes)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_details: Option<AggregateDetails>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_details: Option<WindowDetails>,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            label: label.into(),
            description: None,
            columns: Vec::new(),
            aggregate_details: None,
            window_details: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnInfo>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_aggregate_details(mut self, details: AggregateDetails) -> Self {
        self.aggregate_details = Some(details);
        self
    }

    pub fn with_window_details(mut self, details: WindowDetails) -> Self {
        self.window_details = Some(details);
        self
    }

    /// Looks up a column by name, case-insensitively.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Clause kind carried on an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EdgeLabel {
    Join,
    Where,
    Having,
    On,
    Filter,
    Flow,
}

/// Directed edge between two pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    pub id: String,
    /// Upstream node id
    pub source: String,
    /// Downstream node id
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<EdgeLabel>,
}

/// A column as it appears in a SELECT list or table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,

    /// SQL text producing the column (the name itself for plain references)
    pub expression: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_column: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_aggregate: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_window_func: bool,
}

impl ColumnInfo {
    /// A plain column whose expression is its own name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            expression: name.clone(),
            name,
            source_column: None,
            source_table: None,
            is_aggregate: false,
            is_window_func: false,
        }
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn with_source(mut self, table: Option<String>, column: Option<String>) -> Self {
        self.source_table = table;
        self.source_column = column;
        self
    }

    pub fn aggregate(mut self) -> Self {
        self.is_aggregate = true;
        self
    }

    pub fn window(mut self) -> Self {
        self.is_window_func = true;
        self
    }
}

/// Aggregate functions and grouping keys computed by an aggregate node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AggregateDetails {
    pub functions: Vec<AggregateFunction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AggregateFunction {
    /// Upper-cased function name (`COUNT`, `SUM`, …)
    pub name: String,
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
}

/// Window functions computed by a window node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WindowDetails {
    pub functions: Vec<WindowFunction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WindowFunction {
    pub name: String,
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
}

/// The node/edge graph derived from one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &FlowNode> {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }
}
