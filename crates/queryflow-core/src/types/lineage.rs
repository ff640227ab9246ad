//! Column-level lineage products.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::graph::NodeType;

/// Immediate sources of one SELECT output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLineage {
    pub output_column: String,
    /// Empty for constant expressions
    pub sources: Vec<LineageSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineageSource {
    pub table: String,
    pub column: String,
    /// Graph node holding the table, absent when the table token did not resolve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

/// Complete source-to-result chain for one output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFlow {
    pub id: String,
    pub output_column: String,
    pub output_node_id: String,
    /// Ordered source → result
    pub lineage_path: Vec<LineagePathStep>,
}

impl ColumnFlow {
    /// The table step the path starts from, if a table origin was found.
    pub fn origin(&self) -> Option<&LineagePathStep> {
        self.lineage_path
            .first()
            .filter(|step| step.transformation == Transformation::Source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineagePathStep {
    pub node_id: String,
    pub node_name: String,
    pub node_type: NodeType,
    pub column_name: String,
    pub transformation: Transformation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// How a column changes at one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Transformation {
    Source,
    Passthrough,
    Renamed,
    Aggregated,
    Calculated,
    Joined,
}

impl Transformation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Passthrough => "passthrough",
            Self::Renamed => "renamed",
            Self::Aggregated => "aggregated",
            Self::Calculated => "calculated",
            Self::Joined => "joined",
        }
    }
}

impl std::fmt::Display for Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
