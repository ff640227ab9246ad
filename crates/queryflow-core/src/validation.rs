//! Input limits checked before SQL reaches the parser.

use crate::error::ValidationError;
use crate::parser::count_statements;
use crate::types::{Dialect, ValidationLimits};

/// Rejects empty, oversized, or too-numerous input.
///
/// Checks run cheapest first: emptiness, byte size, then a tokenizer pass to count
/// statements.
pub fn validate_input(
    sql: &str,
    dialect: Dialect,
    limits: &ValidationLimits,
) -> Result<(), ValidationError> {
    if sql.trim().is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    if sql.len() > limits.max_bytes {
        return Err(ValidationError::SizeLimit {
            actual: sql.len(),
            limit: limits.max_bytes,
        });
    }
    let statements = count_statements(sql, dialect);
    if statements > limits.max_statements {
        return Err(ValidationError::QueryCountLimit {
            actual: statements,
            limit: limits.max_statements,
        });
    }
    Ok(())
}
