//! SQL dataflow derivation.
//!
//! Parses SQL into a small statement model, derives an operator pipeline graph for each
//! statement, and recovers column-level lineage from both the statement and the graph.

pub mod analyze;
pub mod ast;
pub mod error;
pub mod graph;
pub mod lineage;
pub mod navigator;
pub mod parser;
pub mod scope;
pub mod summary;
pub mod types;
pub mod validation;

// Re-export main types and functions
pub use analyze::{analyze, analyze_ast, analyze_json_ast, analyze_result_schema};
pub use error::{BuildError, ParseError, ValidationError};
pub use graph::{build_graph, build_graph_or_error, error_graph};
pub use lineage::{extract_column_lineage, generate_column_flows, LineageTracer};
pub use navigator::{extract_scalar, extract_scalar_value};
pub use parser::{parse_sql, parse_sql_with_dialect};
pub use summary::{summarize, summarize_sql};
pub use validation::validate_input;

pub use types::{
    issue_codes, AggregateDetails, AggregateFunction, AnalysisOptions, AnalyzeRequest,
    AnalyzeResult, ColumnFlow, ColumnInfo, ColumnLineage, Complexity, ComplexityLevel,
    DataFlowStep, DataVolume, Dialect, EdgeLabel, FlowEdge, FlowGraph, FlowNode, InputRejection,
    Issue, LineagePathStep, LineageSource, NodeType, QueryDocumentation, RejectionReason,
    Severity, StatementFlow, Summary, Transformation, ValidationLimits, WindowDetails,
    WindowFunction, DEFAULT_MAX_SQL_BYTES, DEFAULT_MAX_STATEMENTS,
};
