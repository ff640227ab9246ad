//! Column metadata attached to graph nodes.
//!
//! Every [`ColumnInfo`] carries best-effort provenance hints (`source_table`,
//! `source_column`) taken from the first column reference in its expression. The lineage
//! tracer relies on these hints to pick the right upstream column.

use std::collections::HashMap;

use crate::ast::{Expr, SelectColumn, SelectStatement};
use crate::scope::SourceScope;
use crate::types::{
    AggregateDetails, AggregateFunction, ColumnInfo, WindowDetails, WindowFunction,
};

/// Provenance hint for an expression: resolved table and first referenced column.
fn source_hint(expr: &Expr, scope: &SourceScope) -> (Option<String>, Option<String>) {
    if let Expr::Star { table } = expr {
        return (scope.resolve_table(table.as_deref()), Some("*".to_string()));
    }
    let refs = expr.column_refs();
    let refs = if refs.is_empty() {
        expr.all_column_refs()
    } else {
        refs
    };
    match refs.first() {
        Some(first) => (
            scope.resolve_table(first.table),
            Some(first.column.to_string()),
        ),
        None => match expr.star_argument() {
            Some(qualifier) => (scope.resolve_table(qualifier), Some("*".to_string())),
            None => (None, None),
        },
    }
}

/// Column as it leaves a SELECT (or CTE/derived-table) node.
pub(crate) fn select_column_info(column: &SelectColumn, scope: &SourceScope) -> ColumnInfo {
    let (table, source) = source_hint(&column.expr, scope);
    let mut info = ColumnInfo::named(column.output_name())
        .with_expression(column.expr.to_string())
        .with_source(table, source);
    if column.expr.contains_aggregate() {
        info = info.aggregate();
    }
    if column.expr.contains_window() {
        info = info.window();
    }
    info
}

/// Columns referenced anywhere in the query, grouped by the lower-cased source name
/// they resolve to. Unresolvable references are skipped.
pub(crate) fn referenced_columns(
    select: &SelectStatement,
    scope: &SourceScope,
) -> HashMap<String, Vec<ColumnInfo>> {
    let mut by_table: HashMap<String, Vec<ColumnInfo>> = HashMap::new();
    for expr in select.expressions() {
        for column_ref in expr.all_column_refs() {
            let Some(table) = scope.resolve_table(column_ref.table) else {
                continue;
            };
            let columns = by_table.entry(table.to_lowercase()).or_default();
            if !columns
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(column_ref.column))
            {
                columns.push(
                    ColumnInfo::named(column_ref.column)
                        .with_source(Some(table.clone()), Some(column_ref.column.to_string())),
                );
            }
        }
    }
    by_table
}

/// Grouping keys followed by aggregate outputs.
pub(crate) fn aggregate_columns(select: &SelectStatement, scope: &SourceScope) -> Vec<ColumnInfo> {
    let mut columns = Vec::new();
    for key in &select.group_by {
        let matching = select.columns.iter().find(|c| {
            &c.expr == key
                || matches!(key, Expr::ColumnRef { table: None, column } if c.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(column)))
        });
        let info = match matching {
            Some(column) => select_column_info(column, scope),
            None => select_column_info(&SelectColumn::new(key.clone()), scope),
        };
        if !info.is_aggregate {
            columns.push(info);
        }
    }
    columns.extend(
        select
            .columns
            .iter()
            .filter(|c| c.expr.contains_aggregate())
            .map(|c| select_column_info(c, scope)),
    );
    columns
}

pub(crate) fn aggregate_details(select: &SelectStatement, scope: &SourceScope) -> AggregateDetails {
    let mut functions = Vec::new();
    let outputs = select
        .columns
        .iter()
        .map(|c| (Some(c.output_name()), &c.expr));
    let having = select.having.iter().map(|h| (None, h));
    for (alias, expr) in outputs.chain(having) {
        for call in expr.aggregate_calls() {
            let (source_table, source_column) = source_hint(call, scope);
            functions.push(AggregateFunction {
                name: call.function_name().unwrap_or("AGG").to_ascii_uppercase(),
                expression: call.to_string(),
                alias: alias.clone(),
                source_column,
                source_table,
            });
        }
    }
    AggregateDetails {
        functions,
        group_by: select.group_by.iter().map(ToString::to_string).collect(),
    }
}

/// Output columns computed by window functions.
pub(crate) fn window_columns(select: &SelectStatement, scope: &SourceScope) -> Vec<ColumnInfo> {
    select
        .columns
        .iter()
        .filter(|c| c.expr.contains_window())
        .map(|c| select_column_info(c, scope))
        .collect()
}

pub(crate) fn window_details(select: &SelectStatement, scope: &SourceScope) -> WindowDetails {
    let mut functions = Vec::new();
    for column in &select.columns {
        for call in column.expr.window_calls() {
            let (source_table, source_column) = source_hint(call, scope);
            let spec = call.window_spec();
            functions.push(WindowFunction {
                name: call.function_name().unwrap_or("WINDOW").to_ascii_uppercase(),
                expression: call.to_string(),
                alias: Some(column.output_name()),
                partition_by: spec
                    .map(|s| s.partition_by.iter().map(ToString::to_string).collect())
                    .unwrap_or_default(),
                order_by: spec
                    .map(|s| s.order_by.iter().map(ToString::to_string).collect())
                    .unwrap_or_default(),
                source_column,
                source_table,
            });
        }
    }
    WindowDetails { functions }
}
