//! Public entry point: SQL text in, per-statement graphs, lineage and documentation out.

use crate::ast::Statement;
use crate::error::BuildError;
use crate::graph::{build_graph, error_graph};
use crate::lineage::{extract_column_lineage, generate_column_flows};
use crate::parser::parse_each_statement;
use crate::summary::summarize;
use crate::types::{
    issue_codes, AnalysisOptions, AnalyzeRequest, AnalyzeResult, InputRejection, Issue, NodeType,
    QueryDocumentation, StatementFlow,
};
use crate::validation::validate_input;
#[cfg(feature = "tracing")]
use tracing::{debug, info_span};

/// Analyzes every statement in the request.
///
/// Never fails: rejected input is reported through [`AnalyzeResult::rejection`], and a
/// statement that cannot be parsed or built becomes a one-node "Parse Error" graph with
/// an accompanying issue.
pub fn analyze(request: &AnalyzeRequest) -> AnalyzeResult {
    #[cfg(feature = "tracing")]
    let _span = info_span!(
        "analyze_request",
        dialect = ?request.dialect,
        bytes = request.sql.len()
    )
    .entered();

    let options = request.options.clone().unwrap_or_default();
    if let Err(err) = validate_input(&request.sql, request.dialect, &options.limits) {
        #[cfg(feature = "tracing")]
        debug!(reason = ?err.reason(), "input rejected");
        return AnalyzeResult {
            issues: vec![Issue::error(issue_codes::INPUT_REJECTED, err.to_string())],
            rejection: Some(InputRejection::from(&err)),
            ..Default::default()
        }
        .finalize();
    }

    let mut result = AnalyzeResult::default();
    match parse_each_statement(&request.sql, request.dialect) {
        Err(err) => {
            result
                .issues
                .push(Issue::error(issue_codes::PARSE_ERROR, err.to_string()).with_statement(0));
            result
                .statements
                .push(failed_statement(0, &err.message, &options));
        }
        Ok(statements) => {
            for (index, parsed) in statements.into_iter().enumerate() {
                match parsed {
                    Ok(statement) => {
                        let (flow, issues) = analyze_statement(index, &statement, &options);
                        result.issues.extend(issues);
                        result.statements.push(flow);
                    }
                    Err(err) => {
                        result.issues.push(
                            Issue::error(issue_codes::UNSUPPORTED_STATEMENT, err.to_string())
                                .with_statement(index),
                        );
                        result
                            .statements
                            .push(failed_statement(index, &err.message, &options));
                    }
                }
            }
        }
    }
    result.finalize()
}

/// Runs the per-statement pipeline on an already-built AST.
pub fn analyze_ast(statement: &Statement, options: &AnalysisOptions) -> StatementFlow {
    analyze_statement(0, statement, options).0
}

/// Analyzes a JSON AST document holding one statement or an array of statements.
///
/// A document whose statements cannot be converted is reported like a parse failure.
pub fn analyze_json_ast(document: &serde_json::Value, options: &AnalysisOptions) -> AnalyzeResult {
    let mut result = AnalyzeResult::default();
    match Statement::all_from_json(document) {
        Ok(statements) => {
            for (index, statement) in statements.iter().enumerate() {
                let (flow, issues) = analyze_statement(index, statement, options);
                result.issues.extend(issues);
                result.statements.push(flow);
            }
        }
        Err(err) => {
            result
                .issues
                .push(Issue::error(issue_codes::PARSE_ERROR, err.to_string()).with_statement(0));
            result
                .statements
                .push(failed_statement(0, &err.message, options));
        }
    }
    result.finalize()
}

/// JSON schema of [`AnalyzeResult`].
pub fn analyze_result_schema() -> schemars::Schema {
    schemars::schema_for!(AnalyzeResult)
}

fn analyze_statement(
    index: usize,
    statement: &Statement,
    options: &AnalysisOptions,
) -> (StatementFlow, Vec<Issue>) {
    #[cfg(feature = "tracing")]
    let _span = info_span!("analyze_statement", index, kind = statement.kind()).entered();

    let graph = match build_graph(statement) {
        Ok(graph) => graph,
        Err(err) => return build_failure(index, &err, options),
    };

    let column_lineage = extract_column_lineage(statement, &graph.nodes);
    let column_flows = if options.column_flows {
        generate_column_flows(&graph.nodes, &graph.edges)
    } else {
        Vec::new()
    };

    let mut issues = Vec::new();
    for lineage in &column_lineage {
        for source in lineage.sources.iter().filter(|s| s.node_id.is_none()) {
            issues.push(
                Issue::info(
                    issue_codes::APPROXIMATE_LINEAGE,
                    format!(
                        "Column '{}' references '{}.{}', which matches no source in scope",
                        lineage.output_column, source.table, source.column
                    ),
                )
                .with_statement(index),
            );
        }
    }
    if graph.nodes.iter().any(|n| n.node_type == NodeType::Table) {
        for flow in column_flows.iter().filter(|f| f.origin().is_none()) {
            issues.push(
                Issue::info(
                    issue_codes::LINEAGE_UNKNOWN,
                    format!("No source table found for column '{}'", flow.output_column),
                )
                .with_statement(index),
            );
        }
    }

    let flow = StatementFlow {
        statement_index: index,
        statement_type: statement.kind().to_string(),
        nodes: graph.nodes,
        edges: graph.edges,
        column_lineage,
        column_flows,
        documentation: options.documentation.then(|| summarize(statement)),
    };
    (flow, issues)
}

fn build_failure(
    index: usize,
    err: &BuildError,
    options: &AnalysisOptions,
) -> (StatementFlow, Vec<Issue>) {
    #[cfg(feature = "tracing")]
    debug!(index, error = %err, "graph build failed");
    let issue = Issue::error(issue_codes::PARSE_ERROR, err.to_string()).with_statement(index);
    (failed_statement(index, &err.message(), options), vec![issue])
}

/// Statement entry holding the error graph.
fn failed_statement(index: usize, message: &str, options: &AnalysisOptions) -> StatementFlow {
    let graph = error_graph(message);
    StatementFlow {
        statement_index: index,
        statement_type: "ERROR".to_string(),
        nodes: graph.nodes,
        edges: graph.edges,
        column_lineage: Vec::new(),
        column_flows: Vec::new(),
        documentation: options
            .documentation
            .then(|| QueryDocumentation::failed(message)),
    }
}
