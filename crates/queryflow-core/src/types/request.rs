//! Request types for the dataflow analysis API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default byte-size cap applied to SQL input before it reaches the core.
pub const DEFAULT_MAX_SQL_BYTES: usize = 10 * 1024 * 1024;

/// Default statement-count cap applied to SQL input before it reaches the core.
pub const DEFAULT_MAX_STATEMENTS: usize = 50;

/// A request to derive operator graphs and column lineage from SQL text.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// The SQL code to analyze (UTF-8 string, multi-statement supported)
    pub sql: String,

    /// SQL dialect
    #[serde(default)]
    pub dialect: Dialect,

    /// Optional analysis options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<AnalysisOptions>,
}

impl AnalyzeRequest {
    /// Creates a request with default options.
    pub fn new(sql: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            sql: sql.into(),
            dialect,
            options: None,
        }
    }

    /// Sets the analysis options.
    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Options controlling which derived products are computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisOptions {
    /// Trace full column flows (result back to source tables)
    pub column_flows: bool,

    /// Produce the documentation summary (complexity, warnings, data-flow steps)
    pub documentation: bool,

    /// Input limits enforced before parsing
    pub limits: ValidationLimits,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            column_flows: true,
            documentation: true,
            limits: ValidationLimits::default(),
        }
    }
}

/// Size and statement-count caps for SQL input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationLimits {
    /// Maximum SQL size in bytes
    pub max_bytes: usize,
    /// Maximum number of statements
    pub max_statements: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_SQL_BYTES,
            max_statements: DEFAULT_MAX_STATEMENTS,
        }
    }
}

/// SQL dialect used by the parser frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
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

impl Dialect {
    pub fn to_sqlparser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        use sqlparser::dialect::{
            AnsiDialect, BigQueryDialect, ClickHouseDialect, DatabricksDialect, DuckDbDialect,
            GenericDialect, HiveDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
            RedshiftSqlDialect, SQLiteDialect, SnowflakeDialect,
        };
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::Ansi => Box::new(AnsiDialect {}),
            Self::Bigquery => Box::new(BigQueryDialect {}),
            Self::Clickhouse => Box::new(ClickHouseDialect {}),
            Self::Databricks => Box::new(DatabricksDialect {}),
            Self::Duckdb => Box::new(DuckDbDialect {}),
            Self::Hive => Box::new(HiveDialect {}),
            Self::Mssql => Box::new(MsSqlDialect {}),
            Self::Mysql => Box::new(MySqlDialect {}),
            Self::Postgres => Box::new(PostgreSqlDialect {}),
            Self::Redshift => Box::new(RedshiftSqlDialect {}),
            Self::Snowflake => Box::new(SnowflakeDialect {}),
            Self::Sqlite => Box::new(SQLiteDialect {}),
        }
    }
}
