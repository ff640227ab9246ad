//! CLI argument parsing using clap.

use clap::{Parser, ValueEnum};
use queryflow_core::{DEFAULT_MAX_SQL_BYTES, DEFAULT_MAX_STATEMENTS};
use std::path::PathBuf;

/// QueryFlow - SQL dataflow and column lineage
#[derive(Parser, Debug)]
#[command(name = "queryflow")]
#[command(about = "Derive operator graphs and column lineage from SQL", long_about = None)]
#[command(version)]
pub struct Args {
    /// SQL files to analyze; `-` reads stdin (the default when none are given)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// SQL dialect
    #[arg(short, long, default_value = "generic", value_enum)]
    pub dialect: DialectArg,

    /// Output format
    #[arg(short, long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Skip full column flow tracing
    #[arg(long)]
    pub no_flows: bool,

    /// Skip the documentation summary
    #[arg(long)]
    pub no_docs: bool,

    /// Maximum SQL size per input, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_SQL_BYTES)]
    pub max_bytes: usize,

    /// Maximum number of statements per input
    #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_MAX_STATEMENTS)]
    pub max_statements: usize,

    /// Treat inputs as JSON ASTs instead of SQL text
    #[arg(long)]
    pub ast: bool,

    /// Print the JSON schema of the analysis result and exit
    #[arg(long)]
    pub print_schema: bool,

    /// Suppress warnings and issues
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging on stderr (overrides RUST_LOG)
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Compact JSON output (no pretty-printing)
    #[arg(short, long)]
    pub compact: bool,
}

impl Args {
    pub fn analysis_options(&self) -> queryflow_core::AnalysisOptions {
        queryflow_core::AnalysisOptions {
            column_flows: !self.no_flows,
            documentation: !self.no_docs,
            limits: queryflow_core::ValidationLimits {
                max_bytes: self.max_bytes,
                max_statements: self.max_statements,
            },
        }
    }
}

/// SQL dialect options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Generic,
    Ansi,
    Bigquery,
    Clickhouse,
    Databricks,
    Duckdb,
    Hive,
    Mssql,
    Mysql,
    Postgres,
    Redshift,
    Snowflake,
    Sqlite,
}

impl From<DialectArg> for queryflow_core::Dialect {
    fn from(d: DialectArg) -> Self {
        match d {
            DialectArg::Generic => queryflow_core::Dialect::Generic,
            DialectArg::Ansi => queryflow_core::Dialect::Ansi,
            DialectArg::Bigquery => queryflow_core::Dialect::Bigquery,
            DialectArg::Clickhouse => queryflow_core::Dialect::Clickhouse,
            DialectArg::Databricks => queryflow_core::Dialect::Databricks,
            DialectArg::Duckdb => queryflow_core::Dialect::Duckdb,
            DialectArg::Hive => queryflow_core::Dialect::Hive,
            DialectArg::Mssql => queryflow_core::Dialect::Mssql,
            DialectArg::Mysql => queryflow_core::Dialect::Mysql,
            DialectArg::Postgres => queryflow_core::Dialect::Postgres,
            DialectArg::Redshift => queryflow_core::Dialect::Redshift,
            DialectArg::Snowflake => queryflow_core::Dialect::Snowflake,
            DialectArg::Sqlite => queryflow_core::Dialect::Sqlite,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable pipeline and lineage tables
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_conversion() {
        let dialect: queryflow_core::Dialect = DialectArg::Postgres.into();
        assert_eq!(dialect, queryflow_core::Dialect::Postgres);
    }

    #[test]
    fn test_parse_minimal_args() {
        let args = Args::parse_from(["queryflow", "test.sql"]);
        assert_eq!(args.files.len(), 1);
        assert_eq!(args.dialect, DialectArg::Generic);
        assert_eq!(args.format, OutputFormat::Table);
        assert_eq!(args.max_bytes, DEFAULT_MAX_SQL_BYTES);
        assert_eq!(args.max_statements, DEFAULT_MAX_STATEMENTS);
        assert!(!args.print_schema);
        assert!(!args.ast);

        let options = args.analysis_options();
        assert!(options.column_flows);
        assert!(options.documentation);
    }

    #[test]
    fn test_parse_full_args() {
        let args = Args::parse_from([
            "queryflow",
            "-d",
            "snowflake",
            "-f",
            "json",
            "-o",
            "out.json",
            "--no-flows",
            "--no-docs",
            "--max-bytes",
            "4096",
            "--max-statements",
            "3",
            "--quiet",
            "--compact",
            "--ast",
            "a.sql",
            "b.sql",
        ]);
        assert_eq!(args.dialect, DialectArg::Snowflake);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.output.unwrap().to_str().unwrap(), "out.json");
        assert!(args.quiet);
        assert!(args.compact);
        assert!(args.ast);
        assert_eq!(args.files.len(), 2);
    }

    #[test]
    fn test_options_follow_flags() {
        let args = Args::parse_from([
            "queryflow",
            "--no-flows",
            "--max-bytes",
            "4096",
            "--max-statements",
            "3",
        ]);
        let options = args.analysis_options();
        assert!(!options.column_flows);
        assert!(options.documentation);
        assert_eq!(options.limits.max_bytes, 4096);
        assert_eq!(options.limits.max_statements, 3);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Args::try_parse_from(["queryflow", "--verbose", "--quiet"]).is_err());
        assert!(Args::parse_from(["queryflow", "-v"]).verbose);
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Args::try_parse_from(["queryflow", "-f", "mermaid"]).is_err());
    }
}
