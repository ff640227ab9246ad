//! Human-readable table output formatting.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use queryflow_core::{AnalyzeResult, ColumnFlow, Severity, StatementFlow};
use std::fmt::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::SourceReport;
use crate::input::STDIN_NAME;

#[derive(Tabled)]
struct FlowRow {
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Origin")]
    origin: String,
    #[tabled(rename = "Path")]
    path: String,
}

impl From<&ColumnFlow> for FlowRow {
    fn from(flow: &ColumnFlow) -> Self {
        let origin = flow
            .origin()
            .map(|step| format!("{}.{}", step.node_name, step.column_name))
            .unwrap_or_else(|| "-".to_string());
        let path = flow
            .lineage_path
            .iter()
            .map(|step| format!("{} ({})", step.node_name, step.transformation))
            .collect::<Vec<_>>()
            .join(" → ");
        Self {
            column: flow.output_column.clone(),
            origin,
            path,
        }
    }
}

/// Format the reports as human-readable text with optional colors.
pub fn format_table(reports: &[SourceReport], quiet: bool, use_colors: bool) -> String {
    let colored = use_colors && std::io::stdout().is_terminal();
    let mut out = String::new();

    write_header(&mut out, colored);
    for report in reports {
        if reports.len() > 1 || report.name != STDIN_NAME {
            writeln!(out, "Source: {}", report.name).unwrap();
        }
        write_summary(&mut out, &report.result, colored);
        for statement in &report.result.statements {
            write_statement(&mut out, statement, quiet, colored);
        }
        if !quiet {
            write_issues(&mut out, &report.result, colored);
        }
    }

    out
}

fn write_header(out: &mut String, colored: bool) {
    let title = "QueryFlow Analysis";
    let line = "═".repeat(50);

    if colored {
        writeln!(out, "{}", title.bold()).unwrap();
        writeln!(out, "{}", line.dimmed()).unwrap();
    } else {
        writeln!(out, "{title}").unwrap();
        writeln!(out, "{line}").unwrap();
    }
}

fn write_summary(out: &mut String, result: &AnalyzeResult, colored: bool) {
    let summary = &result.summary;
    let stats = format!(
        "Summary: {} statements | {} nodes | {} column flows",
        summary.statement_count, summary.node_count, summary.column_flow_count
    );

    if colored {
        writeln!(out, "{}", stats.cyan()).unwrap();
    } else {
        writeln!(out, "{stats}").unwrap();
    }

    if let Some(rejection) = &result.rejection {
        let line = format!("Input rejected: {}", rejection.message);
        if colored {
            writeln!(out, "{}", line.red()).unwrap();
        } else {
            writeln!(out, "{line}").unwrap();
        }
    }
    writeln!(out).unwrap();
}

fn write_statement(out: &mut String, statement: &StatementFlow, quiet: bool, colored: bool) {
    let heading = format!(
        "Statement {} ({})",
        statement.statement_index + 1,
        statement.statement_type
    );
    if colored {
        writeln!(out, "{}", heading.bold()).unwrap();
    } else {
        writeln!(out, "{heading}").unwrap();
    }

    let stages: Vec<&str> = statement.nodes.iter().map(|n| n.label.as_str()).collect();
    writeln!(out, "  Stages: {}", stages.join(" → ")).unwrap();

    if let Some(doc) = &statement.documentation {
        writeln!(out, "  {}", doc.summary).unwrap();
        writeln!(
            out,
            "  Complexity: {} (score {})",
            doc.complexity.level.as_str(),
            doc.complexity.score
        )
        .unwrap();
        if !quiet {
            for warning in &doc.warnings {
                if colored {
                    writeln!(out, "  {} {warning}", "warning:".yellow()).unwrap();
                } else {
                    writeln!(out, "  warning: {warning}").unwrap();
                }
            }
        }
    }

    if !statement.column_flows.is_empty() {
        let rows: Vec<FlowRow> = statement.column_flows.iter().map(FlowRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        for line in table.to_string().lines() {
            writeln!(out, "  {line}").unwrap();
        }
    }
    writeln!(out).unwrap();
}

fn write_issues(out: &mut String, result: &AnalyzeResult, colored: bool) {
    if result.issues.is_empty() {
        return;
    }

    let count = |severity: Severity| {
        result
            .issues
            .iter()
            .filter(|i| i.severity == severity)
            .count()
    };
    let mut parts = Vec::new();
    for (severity, word) in [
        (Severity::Error, "errors"),
        (Severity::Warning, "warnings"),
        (Severity::Info, "info"),
    ] {
        let n = count(severity);
        if n > 0 {
            parts.push(format!("{n} {word}"));
        }
    }

    let header = format!("Issues ({}):", parts.join(", "));
    if colored {
        writeln!(out, "{}", header.bold()).unwrap();
    } else {
        writeln!(out, "{header}").unwrap();
    }

    for issue in &result.issues {
        let severity_str = match issue.severity {
            Severity::Error if colored => "ERROR".red().to_string(),
            Severity::Error => "ERROR".to_string(),
            Severity::Warning if colored => "WARN".yellow().to_string(),
            Severity::Warning => "WARN".to_string(),
            Severity::Info if colored => "INFO".blue().to_string(),
            Severity::Info => "INFO".to_string(),
        };

        let location = issue
            .statement_index
            .map(|index| format!(" statement {}:", index + 1))
            .unwrap_or_default();

        writeln!(out, "  [{}]{} {}", severity_str, location, issue.message).unwrap();
    }
}
