//! Error types for parsing, graph building and input validation.
//!
//! # Error Handling Strategy
//!
//! - [`ParseError`]: the SQL frontend rejected the text or produced a statement type the
//!   graph builder does not support.
//! - [`BuildError`]: the only failure the graph builder signals (a wrapped parse error or
//!   runaway nesting). The public entry point turns it into a one-node "Parse Error" graph.
//! - [`ValidationError`]: input refused before parsing (empty, oversized, too many
//!   statements). Carries a typed reason with actual/limit/unit metadata.
//! - Everything else degrades locally: unknown AST shapes become placeholder text and an
//!   unresolvable lineage path is reported as "lineage unknown", never as an error.

use crate::types::{Dialect, InputRejection, RejectionReason};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
#[cfg(feature = "tracing")]
use tracing::trace;

/// Error encountered while turning SQL text into a supported statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// Line/column where the error occurred, if available.
    pub position: Option<Position>,
    /// The SQL dialect being parsed when the error occurred.
    pub dialect: Option<Dialect>,
    /// The specific category of parse error.
    pub kind: ParseErrorKind,
}

/// Position information for a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
}

/// Category of parse error for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorKind {
    /// Unexpected token or character in input.
    #[default]
    SyntaxError,
    /// Missing required clause or keyword.
    MissingClause,
    /// Invalid or unexpected end of input.
    UnexpectedEof,
    /// Statement type or construct the graph builder does not handle.
    UnsupportedFeature,
    /// Lexer/tokenization error.
    LexerError,
}

impl ParseError {
    /// Creates a new parse error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            dialect: None,
            kind: ParseErrorKind::SyntaxError,
        }
    }

    /// Creates an error for a statement type outside SELECT/INSERT/UPDATE/DELETE.
    pub fn unsupported_statement(statement_type: impl fmt::Display) -> Self {
        Self::new(format!("unsupported statement type: {statement_type}"))
            .with_kind(ParseErrorKind::UnsupportedFeature)
    }

    /// Adds dialect context to the error.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Sets the error kind.
    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Parses position from the sqlparser message format
    /// ("Expected ..., found ... at Line: X, Column: Y").
    fn parse_position_from_message(message: &str) -> Option<Position> {
        static POSITION_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = POSITION_REGEX.get_or_init(|| {
            Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").expect("Invalid regex pattern")
        });

        let result = re.captures(message).and_then(|caps| {
            let line: usize = caps.get(1)?.as_str().parse().ok()?;
            let column: usize = caps.get(2)?.as_str().parse().ok()?;
            Some(Position { line, column })
        });

        #[cfg(feature = "tracing")]
        if result.is_none() && message.contains("Line") {
            trace!(
                "Failed to parse position from error message that appears to contain position info: {}",
                message
            );
        }

        result
    }

    /// Determines the error kind from sqlparser message content.
    fn infer_kind_from_message(message: &str) -> ParseErrorKind {
        let lower = message.to_lowercase();
        if lower.contains("unexpected end") || lower.contains("eof") {
            ParseErrorKind::UnexpectedEof
        } else if lower.contains("expected") {
            ParseErrorKind::MissingClause
        } else if lower.contains("not supported") || lower.contains("unsupported") {
            ParseErrorKind::UnsupportedFeature
        } else if lower.contains("lexer") || lower.contains("token") {
            ParseErrorKind::LexerError
        } else {
            ParseErrorKind::SyntaxError
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error")?;

        if let Some(dialect) = self.dialect {
            write!(f, " ({dialect:?})")?;
        }

        if let Some(pos) = self.position {
            write!(f, " at line {}, column {}", pos.line, pos.column)?;
        }

        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        let message = err.to_string();
        let position = Self::parse_position_from_message(&message);
        let kind = Self::infer_kind_from_message(&message);

        Self {
            message,
            position,
            dialect: None,
            kind,
        }
    }
}

/// Failure signalled by the operator graph builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("query nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
}

impl BuildError {
    /// Message without the "Parse error" prefix, used as the error node description.
    pub fn message(&self) -> String {
        match self {
            Self::Parse(err) => err.message.clone(),
            Self::TooDeep { .. } => self.to_string(),
        }
    }
}

/// Input refused before it reaches the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("SQL input is empty")]
    EmptyInput,

    #[error("SQL input is {actual} bytes, exceeding the limit of {limit} bytes")]
    SizeLimit { actual: usize, limit: usize },

    #[error("SQL input contains {actual} statements, exceeding the limit of {limit}")]
    QueryCountLimit { actual: usize, limit: usize },
}

impl ValidationError {
    pub fn reason(&self) -> RejectionReason {
        match self {
            Self::EmptyInput => RejectionReason::EmptyInput,
            Self::SizeLimit { .. } => RejectionReason::SizeLimit,
            Self::QueryCountLimit { .. } => RejectionReason::QueryCountLimit,
        }
    }
}

impl From<&ValidationError> for InputRejection {
    fn from(err: &ValidationError) -> Self {
        let (actual, limit, unit) = match err {
            ValidationError::EmptyInput => (None, None, None),
            ValidationError::SizeLimit { actual, limit } => {
                (Some(*actual), Some(*limit), Some("bytes".to_string()))
            }
            ValidationError::QueryCountLimit { actual, limit } => {
                (Some(*actual), Some(*limit), Some("statements".to_string()))
            }
        };
        Self {
            reason: err.reason(),
            message: err.to_string(),
            actual,
            limit,
            unit,
        }
    }
}
