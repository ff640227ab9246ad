//! Conversion from `sqlparser` statements into the crate's statement model.

use serde_json::Value;
use sqlparser::ast as sql;

use crate::ast::{
    Assignment, CaseBranch, CommonTableExpr, DeleteStatement, Expr, FromItem, InsertStatement,
    JoinSpec, Limit, Literal, OrderByItem, SelectColumn, SelectStatement, SetOperation,
    Statement, TableSource, UpdateStatement, WindowSpec,
};
use crate::error::{ParseError, ParseErrorKind};

/// Nesting bound for queries (CTEs, derived tables, set operations, subqueries).
const MAX_QUERY_DEPTH: usize = 64;

/// Expression nesting bound; deeper trees are kept as text.
const MAX_EXPR_DEPTH: usize = 100;

/// Converts one parsed statement. Only SELECT, INSERT, UPDATE and DELETE are supported.
pub fn convert_statement(statement: &sql::Statement) -> Result<Statement, ParseError> {
    match statement {
        sql::Statement::Query(query) => Ok(Statement::Select(Box::new(convert_query(query, 0)?))),
        sql::Statement::Insert(insert) => {
            let source = match insert.source.as_deref() {
                Some(query) if !matches!(query.body.as_ref(), sql::SetExpr::Values(_)) => {
                    Some(Box::new(convert_query(query, 0)?))
                }
                _ => None,
            };
            Ok(Statement::Insert(InsertStatement {
                table: insert.table.to_string(),
                columns: insert.columns.iter().map(|c| c.value.clone()).collect(),
                source,
            }))
        }
        sql::Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let (name, alias) = match &table.relation {
                sql::TableFactor::Table { name, alias, .. } => (
                    name.to_string(),
                    alias.as_ref().map(|a| a.name.value.clone()),
                ),
                other => (other.to_string(), None),
            };
            Ok(Statement::Update(UpdateStatement {
                table: name,
                alias,
                assignments: assignments
                    .iter()
                    .map(|assignment| Assignment {
                        column: assignment.target.to_string(),
                        value: convert_expr(&assignment.value, 0),
                    })
                    .collect(),
                where_clause: selection.as_ref().map(|e| convert_expr(e, 0)),
            }))
        }
        sql::Statement::Delete(delete) => {
            let from_tables = match &delete.from {
                sql::FromTable::WithFromKeyword(tables) | sql::FromTable::WithoutKeyword(tables) => {
                    tables
                }
            };
            let table = from_tables
                .first()
                .map(|t| match &t.relation {
                    sql::TableFactor::Table { name, .. } => name.to_string(),
                    other => other.to_string(),
                })
                .or_else(|| delete.tables.first().map(ToString::to_string))
                .unwrap_or_else(|| "unknown".to_string());
            Ok(Statement::Delete(DeleteStatement {
                table,
                where_clause: delete.selection.as_ref().map(|e| convert_expr(e, 0)),
            }))
        }
        other => Err(ParseError::unsupported_statement(statement_keyword(other))),
    }
}

/// Leading keywords of a statement (`CREATE TABLE`, `DROP VIEW`, …) for error messages.
fn statement_keyword(statement: &sql::Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

fn too_deep() -> ParseError {
    ParseError::new(format!("query nesting exceeds {MAX_QUERY_DEPTH} levels"))
        .with_kind(ParseErrorKind::UnsupportedFeature)
}

fn convert_query(query: &sql::Query, depth: usize) -> Result<SelectStatement, ParseError> {
    if depth > MAX_QUERY_DEPTH {
        return Err(too_deep());
    }
    let mut select = convert_set_expr(&query.body, depth)?;

    if let Some(with) = &query.with {
        let mut ctes = Vec::with_capacity(with.cte_tables.len());
        for cte in &with.cte_tables {
            ctes.push(CommonTableExpr {
                name: cte.alias.name.value.clone(),
                query: convert_query(&cte.query, depth + 1)?,
            });
        }
        ctes.append(&mut select.with);
        select.with = ctes;
    }

    if let Some(order_by) = &query.order_by {
        if let sql::OrderByKind::Expressions(exprs) = &order_by.kind {
            select.order_by = exprs.iter().map(convert_order_by).collect();
        }
    }

    if let Some(limit_clause) = &query.limit_clause {
        let (limit, offset) = match limit_clause {
            sql::LimitClause::LimitOffset { limit, offset, .. } => {
                (limit.as_ref(), offset.as_ref().map(|o| &o.value))
            }
            sql::LimitClause::OffsetCommaLimit { offset, limit } => (Some(limit), Some(offset)),
        };
        if let Some(limit) = limit {
            select.limit = Some(Limit {
                count: convert_expr(limit, 0),
                offset: offset.map(|o| convert_expr(o, 0)),
            });
        }
    }

    Ok(select)
}

fn convert_set_expr(body: &sql::SetExpr, depth: usize) -> Result<SelectStatement, ParseError> {
    if depth > MAX_QUERY_DEPTH {
        return Err(too_deep());
    }
    match body {
        sql::SetExpr::Select(select) => convert_select(select, depth),
        sql::SetExpr::Query(query) => convert_query(query, depth + 1),
        sql::SetExpr::SetOperation {
            op,
            set_quantifier,
            left,
            right,
        } => {
            let mut left = convert_set_expr(left, depth + 1)?;
            let right = convert_set_expr(right, depth + 1)?;
            let quantifier = set_quantifier.to_string();
            let op = if quantifier.is_empty() {
                op.to_string()
            } else {
                format!("{op} {quantifier}")
            };
            append_set_operation(&mut left, op.to_ascii_uppercase(), right);
            Ok(left)
        }
        sql::SetExpr::Values(_) => Err(ParseError::new("VALUES list has no dataflow pipeline")
            .with_kind(ParseErrorKind::UnsupportedFeature)),
        other => Err(ParseError::unsupported_statement(
            other
                .to_string()
                .split_whitespace()
                .next()
                .unwrap_or("query")
                .to_ascii_uppercase(),
        )),
    }
}

/// Appends `right` at the end of the set-operation chain hanging off `select`.
fn append_set_operation(select: &mut SelectStatement, op: String, right: SelectStatement) {
    match &mut select.set_op {
        Some(existing) => append_set_operation(&mut existing.right, op, right),
        None => {
            select.set_op = Some(SetOperation {
                op,
                right: Box::new(right),
            })
        }
    }
}

fn convert_select(select: &sql::Select, depth: usize) -> Result<SelectStatement, ParseError> {
    let mut from = Vec::new();
    for table in &select.from {
        from.push(convert_table_factor(&table.relation, None, depth)?);
        for join in &table.joins {
            let spec = convert_join(&join.join_operator);
            from.push(convert_table_factor(&join.relation, Some(spec), depth)?);
        }
    }

    let group_by = match &select.group_by {
        sql::GroupByExpr::Expressions(exprs, _) => {
            exprs.iter().map(|e| convert_expr(e, 0)).collect()
        }
        sql::GroupByExpr::All(_) => Vec::new(),
    };

    Ok(SelectStatement {
        with: Vec::new(),
        distinct: select.distinct.is_some(),
        columns: select.projection.iter().map(convert_select_item).collect(),
        from,
        where_clause: select.selection.as_ref().map(|e| convert_expr(e, 0)),
        group_by,
        having: select.having.as_ref().map(|e| convert_expr(e, 0)),
        order_by: Vec::new(),
        limit: None,
        set_op: None,
    })
}

fn convert_select_item(item: &sql::SelectItem) -> SelectColumn {
    match item {
        sql::SelectItem::UnnamedExpr(expr) => SelectColumn::new(convert_expr(expr, 0)),
        sql::SelectItem::ExprWithAlias { expr, alias } => {
            SelectColumn::new(convert_expr(expr, 0)).with_alias(alias.value.clone())
        }
        sql::SelectItem::QualifiedWildcard(kind, _) => {
            let table = match kind {
                sql::SelectItemQualifiedWildcardKind::ObjectName(name) => name.to_string(),
                sql::SelectItemQualifiedWildcardKind::Expr(expr) => expr.to_string(),
            };
            SelectColumn::new(Expr::Star { table: Some(table) })
        }
        sql::SelectItem::Wildcard(_) => SelectColumn::new(Expr::Star { table: None }),
    }
}

fn convert_table_factor(
    factor: &sql::TableFactor,
    join: Option<JoinSpec>,
    depth: usize,
) -> Result<FromItem, ParseError> {
    let (source, alias) = match factor {
        sql::TableFactor::Table { name, alias, .. } => (
            table_source(name),
            alias.as_ref().map(|a| a.name.value.clone()),
        ),
        sql::TableFactor::Derived {
            subquery, alias, ..
        } => (
            TableSource::Subquery(Box::new(convert_query(subquery, depth + 1)?)),
            alias.as_ref().map(|a| a.name.value.clone()),
        ),
        other => (TableSource::Unknown(Value::String(other.to_string())), None),
    };
    Ok(FromItem {
        source,
        alias,
        join,
    })
}

fn table_source(name: &sql::ObjectName) -> TableSource {
    let parts: Vec<String> = name
        .0
        .iter()
        .filter_map(sql::ObjectNamePart::as_ident)
        .map(|ident| ident.value.clone())
        .collect();
    match parts.split_last() {
        Some((table, schema)) if parts.len() == name.0.len() => TableSource::Table {
            schema: (!schema.is_empty()).then(|| schema.join(".")),
            name: table.clone(),
        },
        _ => TableSource::Table {
            schema: None,
            name: name.to_string(),
        },
    }
}

fn convert_join(operator: &sql::JoinOperator) -> JoinSpec {
    let (kind, constraint) = match operator {
        sql::JoinOperator::Join(c) => ("JOIN", Some(c)),
        sql::JoinOperator::Inner(c) => ("INNER JOIN", Some(c)),
        sql::JoinOperator::Left(c) | sql::JoinOperator::LeftOuter(c) => ("LEFT JOIN", Some(c)),
        sql::JoinOperator::Right(c) | sql::JoinOperator::RightOuter(c) => ("RIGHT JOIN", Some(c)),
        sql::JoinOperator::FullOuter(c) => ("FULL JOIN", Some(c)),
        sql::JoinOperator::CrossJoin(c) => ("CROSS JOIN", Some(c)),
        sql::JoinOperator::Semi(c)
        | sql::JoinOperator::LeftSemi(c)
        | sql::JoinOperator::RightSemi(c) => ("SEMI JOIN", Some(c)),
        sql::JoinOperator::Anti(c)
        | sql::JoinOperator::LeftAnti(c)
        | sql::JoinOperator::RightAnti(c) => ("ANTI JOIN", Some(c)),
        sql::JoinOperator::StraightJoin(c) => ("STRAIGHT_JOIN", Some(c)),
        sql::JoinOperator::AsOf { constraint, .. } => ("ASOF JOIN", Some(constraint)),
        sql::JoinOperator::CrossApply => ("CROSS APPLY", None),
        sql::JoinOperator::OuterApply => ("OUTER APPLY", None),
    };

    let mut spec = JoinSpec::new(kind);
    match constraint {
        Some(sql::JoinConstraint::On(expr)) => spec.on = Some(convert_expr(expr, 0)),
        Some(sql::JoinConstraint::Using(columns)) => {
            spec.using = columns.iter().map(ToString::to_string).collect();
        }
        _ => {}
    }
    spec
}

fn convert_order_by(item: &sql::OrderByExpr) -> OrderByItem {
    OrderByItem {
        expr: convert_expr(&item.expr, 0),
        descending: item.options.asc == Some(false),
    }
}

fn unknown(expr: &sql::Expr) -> Expr {
    Expr::Unknown(Value::String(expr.to_string()))
}

fn convert_expr(expr: &sql::Expr, depth: usize) -> Expr {
    if depth > MAX_EXPR_DEPTH {
        return unknown(expr);
    }
    let next = depth + 1;
    let boxed = |e: &sql::Expr| Box::new(convert_expr(e, next));

    match expr {
        sql::Expr::Identifier(ident) => Expr::column(ident.value.clone()),
        sql::Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [] => unknown(expr),
            [column] => Expr::column(column.value.clone()),
            [.., qualifier, column] => Expr::qualified(qualifier.value.clone(), column.value.clone()),
        },
        sql::Expr::Value(value) => match &value.value {
            sql::Value::Number(n, _) => Expr::Literal(Literal::Number(n.to_string())),
            sql::Value::SingleQuotedString(s) | sql::Value::DoubleQuotedString(s) => {
                Expr::Literal(Literal::String(s.clone()))
            }
            sql::Value::Boolean(b) => Expr::Literal(Literal::Bool(*b)),
            sql::Value::Null => Expr::Literal(Literal::Null),
            _ => unknown(expr),
        },
        sql::Expr::BinaryOp { left, op, right } => Expr::Binary {
            op: op.to_string(),
            left: boxed(left),
            right: boxed(right),
        },
        sql::Expr::UnaryOp { op, expr: inner } => Expr::Unary {
            op: op.to_string(),
            expr: boxed(inner),
        },
        sql::Expr::Nested(inner) => convert_expr(inner, next),
        sql::Expr::Cast {
            expr: inner,
            data_type,
            ..
        } => Expr::Cast {
            expr: boxed(inner),
            data_type: data_type.to_string(),
        },
        sql::Expr::IsNull(inner) => Expr::binary(
            "IS",
            convert_expr(inner, next),
            Expr::Literal(Literal::Null),
        ),
        sql::Expr::IsNotNull(inner) => Expr::binary(
            "IS NOT",
            convert_expr(inner, next),
            Expr::Literal(Literal::Null),
        ),
        sql::Expr::InList {
            expr: inner,
            list,
            negated,
        } => Expr::binary(
            if *negated { "NOT IN" } else { "IN" },
            convert_expr(inner, next),
            Expr::List(list.iter().map(|e| convert_expr(e, next)).collect()),
        ),
        sql::Expr::Between {
            expr: inner,
            negated,
            low,
            high,
        } => Expr::binary(
            if *negated { "NOT BETWEEN" } else { "BETWEEN" },
            convert_expr(inner, next),
            Expr::binary("AND", convert_expr(low, next), convert_expr(high, next)),
        ),
        sql::Expr::Like {
            negated,
            expr: inner,
            pattern,
            ..
        } => Expr::binary(
            if *negated { "NOT LIKE" } else { "LIKE" },
            convert_expr(inner, next),
            convert_expr(pattern, next),
        ),
        sql::Expr::ILike {
            negated,
            expr: inner,
            pattern,
            ..
        } => Expr::binary(
            if *negated { "NOT ILIKE" } else { "ILIKE" },
            convert_expr(inner, next),
            convert_expr(pattern, next),
        ),
        sql::Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => Expr::Case {
            operand: operand.as_deref().map(boxed),
            branches: conditions
                .iter()
                .map(|when| CaseBranch {
                    condition: convert_expr(&when.condition, next),
                    result: convert_expr(&when.result, next),
                })
                .collect(),
            else_result: else_result.as_deref().map(boxed),
        },
        sql::Expr::Function(function) => convert_function(function, next),
        sql::Expr::Subquery(query) => subquery(query, expr),
        sql::Expr::InSubquery {
            expr: inner,
            subquery: query,
            negated,
        } => Expr::binary(
            if *negated { "NOT IN" } else { "IN" },
            convert_expr(inner, next),
            subquery(query, expr),
        ),
        sql::Expr::Exists {
            subquery: query,
            negated,
        } => Expr::Unary {
            op: if *negated { "NOT EXISTS" } else { "EXISTS" }.to_string(),
            expr: Box::new(subquery(query, expr)),
        },
        _ => unknown(expr),
    }
}

fn subquery(query: &sql::Query, original: &sql::Expr) -> Expr {
    match convert_query(query, 1) {
        Ok(select) => Expr::Subquery(Box::new(select)),
        Err(_) => unknown(original),
    }
}

fn convert_function(function: &sql::Function, depth: usize) -> Expr {
    let mut distinct = false;
    let args = match &function.args {
        sql::FunctionArguments::List(list) => {
            distinct = matches!(
                list.duplicate_treatment,
                Some(sql::DuplicateTreatment::Distinct)
            );
            list.args
                .iter()
                .map(|arg| convert_function_arg(arg, depth))
                .collect()
        }
        sql::FunctionArguments::Subquery(query) => match convert_query(query, 1) {
            Ok(select) => vec![Expr::Subquery(Box::new(select))],
            Err(_) => Vec::new(),
        },
        sql::FunctionArguments::None => Vec::new(),
    };

    let over = match &function.over {
        Some(sql::WindowType::WindowSpec(spec)) => Some(WindowSpec {
            partition_by: spec
                .partition_by
                .iter()
                .map(|e| convert_expr(e, depth + 1))
                .collect(),
            order_by: spec.order_by.iter().map(convert_order_by).collect(),
        }),
        Some(sql::WindowType::NamedWindow(_)) => Some(WindowSpec::default()),
        None => None,
    };

    let call = match Expr::call(function.name.to_string(), args) {
        Expr::Aggregate {
            name, args, over, ..
        } => Expr::Aggregate {
            name,
            args,
            distinct,
            over,
        },
        other => other,
    };
    match over {
        Some(spec) => call.with_over(spec),
        None => call,
    }
}

fn convert_function_arg(arg: &sql::FunctionArg, depth: usize) -> Expr {
    let arg_expr = match arg {
        sql::FunctionArg::Unnamed(arg) | sql::FunctionArg::Named { arg, .. } => arg,
        other => return Expr::Unknown(Value::String(other.to_string())),
    };
    match arg_expr {
        sql::FunctionArgExpr::Expr(expr) => convert_expr(expr, depth + 1),
        sql::FunctionArgExpr::QualifiedWildcard(name) => Expr::Star {
            table: Some(name.to_string()),
        },
        sql::FunctionArgExpr::Wildcard => Expr::Star { table: None },
    }
}
