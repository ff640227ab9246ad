//! SQL text frontend: `sqlparser` parsing, statement counting and conversion into the
//! crate's statement model.

mod convert;

use crate::ast::Statement;
use crate::error::ParseError;
use crate::types::Dialect;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
#[cfg(feature = "tracing")]
use tracing::debug;

pub use convert::convert_statement;

/// Parse SQL into `sqlparser` statements using the specified dialect.
pub fn parse_raw(
    sql: &str,
    dialect: Dialect,
) -> Result<Vec<sqlparser::ast::Statement>, ParseError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    match Parser::parse_sql(sqlparser_dialect.as_ref(), sql) {
        Ok(statements) => Ok(statements),
        Err(primary_err) => {
            // Generic frequently fails on Postgres-only operators (`::`, `->>`, `?`).
            if matches!(dialect, Dialect::Generic) && looks_like_postgres_syntax(sql) {
                let postgres = PostgreSqlDialect {};
                if let Ok(statements) = Parser::parse_sql(&postgres, sql) {
                    #[cfg(feature = "tracing")]
                    debug!("generic dialect failed, recovered with postgres fallback");
                    return Ok(statements);
                }
            }
            Err(ParseError::from(primary_err).with_dialect(dialect))
        }
    }
}

fn looks_like_postgres_syntax(sql: &str) -> bool {
    sql.contains("::")
        || sql.contains("->")
        || sql.contains("?|")
        || sql.contains("?&")
        || sql.contains(" ? ")
        || sql.contains(" ?\n")
        || sql.contains("? '")
}

/// Parse SQL and convert every statement, failing on the first unsupported one.
pub fn parse_sql_with_dialect(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, ParseError> {
    parse_each_statement(sql, dialect)?.into_iter().collect()
}

/// Parse SQL using the generic dialect.
pub fn parse_sql(sql: &str) -> Result<Vec<Statement>, ParseError> {
    parse_sql_with_dialect(sql, Dialect::Generic)
}

/// Parse SQL and convert each statement independently.
///
/// The outer error is a syntax failure of the whole text; inner errors are per-statement
/// conversion failures (statement types without a dataflow pipeline).
pub fn parse_each_statement(
    sql: &str,
    dialect: Dialect,
) -> Result<Vec<Result<Statement, ParseError>>, ParseError> {
    let statements = parse_raw(sql, dialect)?;
    Ok(statements
        .iter()
        .map(|statement| convert_statement(statement).map_err(|e| e.with_dialect(dialect)))
        .collect())
}

/// Counts the non-empty statements in `sql` without building an AST.
///
/// Uses the dialect's tokenizer so semicolons inside strings and comments are ignored.
/// Falls back to a plain semicolon split when the text does not tokenize.
pub fn count_statements(sql: &str, dialect: Dialect) -> usize {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    let tokens = match Tokenizer::new(sqlparser_dialect.as_ref(), sql).tokenize() {
        Ok(tokens) => tokens,
        Err(_) => {
            return sql.split(';').filter(|part| !part.trim().is_empty()).count();
        }
    };

    let mut count = 0;
    let mut has_content = false;
    for token in &tokens {
        match token {
            Token::SemiColon => {
                if has_content {
                    count += 1;
                    has_content = false;
                }
            }
            Token::Whitespace(_) | Token::EOF => {}
            _ => has_content = true,
        }
    }
    if has_content {
        count += 1;
    }
    count
}
