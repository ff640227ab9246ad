//! Types for the dataflow analysis API.
//!
//! This module defines the request and response types for QueryFlow, along with the
//! two data products consumed by rendering and highlighting layers: the operator graph
//! (`FlowNode`/`FlowEdge`) and column lineage (`ColumnLineage`/`ColumnFlow`).

mod common;
mod graph;
mod lineage;
mod request;
mod response;

pub use common::{issue_codes, Issue, Severity};
pub use graph::{
    AggregateDetails, AggregateFunction, ColumnInfo, EdgeLabel, FlowEdge, FlowGraph, FlowNode,
    NodeType, WindowDetails, WindowFunction,
};
pub use lineage::{ColumnFlow, ColumnLineage, LineagePathStep, LineageSource, Transformation};
pub use request::{
    AnalysisOptions, AnalyzeRequest, Dialect, ValidationLimits, DEFAULT_MAX_SQL_BYTES,
    DEFAULT_MAX_STATEMENTS,
};
pub use response::{
    AnalyzeResult, Complexity, ComplexityLevel, DataFlowStep, DataVolume, InputRejection,
    QueryDocumentation, RejectionReason, StatementFlow, Summary,
};
