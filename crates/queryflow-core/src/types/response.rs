//! Response types for the dataflow analysis API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Issue, Severity};
use super::graph::{FlowEdge, FlowNode};
use super::lineage::{ColumnFlow, ColumnLineage};

/// The result of analyzing SQL text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    /// Per-statement graphs and lineage
    pub statements: Vec<StatementFlow>,

    /// All issues encountered during analysis
    pub issues: Vec<Issue>,

    /// Set when the input was rejected before parsing; `statements` is then empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<InputRejection>,

    pub summary: Summary,
}

impl AnalyzeResult {
    /// Recomputes the summary counters from statements and issues.
    pub(crate) fn finalize(mut self) -> Self {
        self.summary = Summary {
            statement_count: self.statements.len(),
            node_count: self.statements.iter().map(|s| s.nodes.len()).sum(),
            column_flow_count: self.statements.iter().map(|s| s.column_flows.len()).sum(),
            has_errors: self.rejection.is_some()
                || self.issues.iter().any(|i| i.severity == Severity::Error),
        };
        self
    }
}

/// Derived data products for one statement.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementFlow {
    /// Zero-based index of the statement in the input SQL
    pub statement_index: usize,

    /// `SELECT`, `INSERT`, `UPDATE`, `DELETE`, or `ERROR` for a failed parse
    pub statement_type: String,

    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_lineage: Vec<ColumnLineage>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_flows: Vec<ColumnFlow>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<QueryDocumentation>,
}

/// Summary statistics for the analysis result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub statement_count: usize,
    pub node_count: usize,
    pub column_flow_count: usize,
    /// Quick check: true if any errors were encountered
    pub has_errors: bool,
}

/// Why input was refused before reaching the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    EmptyInput,
    SizeLimit,
    QueryCountLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputRejection {
    pub reason: RejectionReason,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Human-oriented summary of one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryDocumentation {
    pub summary: String,
    pub complexity: Complexity,
    pub warnings: Vec<String>,
    pub data_flow_steps: Vec<DataFlowStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Complexity {
    pub score: u32,
    pub level: ComplexityLevel,
    pub table_count: usize,
    pub join_count: usize,
    pub aggregate_count: usize,
    pub filter_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ComplexityLevel {
    Simple,
    Moderate,
    Complex,
    #[serde(rename = "Very Complex")]
    VeryComplex,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "Simple",
            Self::Moderate => "Moderate",
            Self::Complex => "Complex",
            Self::VeryComplex => "Very Complex",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataFlowStep {
    /// One-based position in the pipeline
    pub step: usize,
    pub operation: String,
    pub description: String,
    pub volume: DataVolume,
}

/// Rough estimate of the row volume after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum DataVolume {
    Full,
    Reduced,
    Grouped,
    Combined,
    Limited { rows: u64 },
}

impl std::fmt::Display for DataVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => f.write_str("all rows"),
            Self::Reduced => f.write_str("filtered subset"),
            Self::Grouped => f.write_str("one row per group"),
            Self::Combined => f.write_str("combined rows"),
            Self::Limited { rows } => write!(f, "at most {rows} rows"),
        }
    }
}
