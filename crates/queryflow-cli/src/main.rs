//! QueryFlow CLI - SQL dataflow and column lineage

use queryflow_cli::cli;
use queryflow_cli::input;
use queryflow_cli::output;

use anyhow::{Context, Result};
use clap::Parser;
use is_terminal::IsTerminal;
use queryflow_core::{analyze, analyze_json_ast, analyze_result_schema, AnalyzeRequest, Dialect};
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cli::{Args, OutputFormat};
use output::{format_json, format_table, SourceReport};

/// Analysis reported errors or input was rejected.
const EXIT_FAILURE: u8 = 1;
/// I/O or configuration error.
const EXIT_CONFIG_ERROR: u8 = 66;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("queryflow: error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

/// Logs go to stderr so JSON on stdout stays parseable.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Analyzes every input and writes the report. Returns whether any input had errors.
fn run(args: Args) -> Result<bool> {
    if args.print_schema {
        let schema = serde_json::to_string_pretty(&analyze_result_schema())
            .context("Failed to serialize result schema")?;
        write_output(&args, &schema)?;
        return Ok(false);
    }

    let sources = input::read_input(&args.files)?;
    let dialect: Dialect = args.dialect.into();
    let options = args.analysis_options();

    let reports = sources
        .into_iter()
        .map(|source| -> Result<SourceReport> {
            tracing::debug!(source = %source.name, bytes = source.content.len(), "analyzing input");
            let result = if args.ast {
                analyze_json_ast(&source.json_ast()?, &options)
            } else {
                analyze(&AnalyzeRequest::new(source.content, dialect).with_options(options.clone()))
            };
            if result.summary.has_errors {
                tracing::warn!(source = %source.name, issues = result.issues.len(), "analysis reported errors");
            }
            Ok(SourceReport {
                name: source.name,
                result,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let has_errors = reports.iter().any(|r| r.result.summary.has_errors);
    let rendered = match args.format {
        OutputFormat::Json => {
            format_json(&reports, args.compact).context("Failed to serialize analysis result")?
        }
        OutputFormat::Table => {
            let use_colors = args.output.is_none() && io::stdout().is_terminal();
            format_table(&reports, args.quiet, use_colors)
        }
    };
    write_output(&args, &rendered)?;

    Ok(has_errors)
}

fn write_output(args: &Args, content: &str) -> Result<()> {
    match &args.output {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("Failed to write output to {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .context("Failed to write to stdout")?;
            if !content.ends_with('\n') {
                writeln!(stdout).context("Failed to write to stdout")?;
            }
            Ok(())
        }
    }
}
