//! Operator graph derivation.
//!
//! Turns one statement into a directed acyclic pipeline of [`FlowNode`]s connected by
//! [`FlowEdge`]s. Stages appear in logical evaluation order: one scan node per FROM
//! source (CTE and derived-table pipelines are built first and feed in through their
//! terminal node), then join, WHERE filter, aggregation, HAVING filter, window, sort,
//! limit, and the terminal select/result node.
//!
//! Ids are `<kind>_<n>` from a counter that restarts for every call, so repeated builds
//! of the same statement yield identical graphs.

mod builder;
mod columns;
mod ids;

use crate::ast::Statement;
use crate::error::BuildError;
use crate::types::{FlowGraph, FlowNode, NodeType};

/// Builds the operator pipeline for a statement.
pub fn build_graph(statement: &Statement) -> Result<FlowGraph, BuildError> {
    builder::GraphBuilder::new().build(statement)
}

/// Builds the operator pipeline, substituting the error graph on failure.
pub fn build_graph_or_error(statement: &Statement) -> FlowGraph {
    build_graph(statement).unwrap_or_else(|err| error_graph(err.message()))
}

/// The one-node graph reported in place of a statement that failed to parse or build.
pub fn error_graph(message: impl Into<String>) -> FlowGraph {
    FlowGraph {
        nodes: vec![
            FlowNode::new("error_0", NodeType::Result, "Parse Error").with_description(message)
        ],
        edges: Vec::new(),
    }
}
