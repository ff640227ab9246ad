//! Best-effort scalar extraction from loosely shaped AST nodes.
//!
//! Used wherever the builder needs a display string (table names, LIMIT counts, labels)
//! from a node whose exact shape is not known. Each call walks at most `max_depth`
//! levels and returns the first string, number or boolean leaf it meets.

use serde_json::Value;

use crate::ast::{Expr, Literal};

/// Depth bound used by every caller in the crate.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Keys probed on JSON objects, in priority order.
const SCALAR_KEYS: [&str; 5] = ["value", "name", "column", "table", "expr"];

/// Extracts a display scalar from a model expression.
///
/// Mirrors [`extract_scalar_value`] on the JSON form of the node: literals yield their
/// value, calls their name, column references their column, and wrappers (`NOT x`,
/// `CAST(x AS t)`, `CASE x …`, lists) recurse into the wrapped expression. Binary
/// expressions and subqueries have no scalar.
pub fn extract_scalar(expr: &Expr, max_depth: usize) -> Option<String> {
    if max_depth == 0 {
        return None;
    }
    let next = max_depth - 1;
    match expr {
        Expr::Literal(literal) => match literal {
            Literal::Number(n) => Some(n.clone()),
            Literal::String(s) => Some(s.clone()),
            Literal::Bool(b) => Some(b.to_string()),
            Literal::Null => None,
        },
        Expr::Star { .. } => Some("*".to_string()),
        Expr::Function { name, .. } | Expr::Aggregate { name, .. } => Some(name.clone()),
        Expr::ColumnRef { column, .. } => Some(column.clone()),
        Expr::Unary { expr, .. } | Expr::Cast { expr, .. } => extract_scalar(expr, next),
        Expr::Case {
            operand: Some(operand),
            ..
        } => extract_scalar(operand, next),
        Expr::List(items) => items.iter().find_map(|item| extract_scalar(item, next)),
        Expr::Unknown(value) => extract_scalar_value(value, max_depth),
        Expr::Case { operand: None, .. } | Expr::Binary { .. } | Expr::Subquery(_) => None,
    }
}

/// Extracts a display scalar from raw JSON.
///
/// Primitive leaves are returned as-is. Arrays are scanned left to right and objects
/// are probed through `value`, `name`, `column`, `table`, `expr` in that order; the
/// first branch yielding a leaf wins.
pub fn extract_scalar_value(value: &Value, max_depth: usize) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        _ if max_depth == 0 => None,
        Value::Array(items) => items
            .iter()
            .find_map(|item| extract_scalar_value(item, max_depth - 1)),
        Value::Object(map) => SCALAR_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|child| extract_scalar_value(child, max_depth - 1)),
    }
}
