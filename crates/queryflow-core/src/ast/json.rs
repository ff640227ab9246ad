//! Lenient conversion from JSON ASTs in the conventional `type`-tagged layout.
//!
//! The layout is the one produced by common JavaScript SQL parsers: statements carry
//! `type: "select" | "insert" | "update" | "delete"`, expressions carry `type:
//! "column_ref" | "binary_expr" | "aggr_func" | …`. Fields may be missing or null at
//! any level. Unrecognised expression shapes become [`Expr::Unknown`]; only a
//! statement whose `type` is not one of the four supported kinds is an error.

use serde::de::{self, Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::{
    Assignment, CaseBranch, CommonTableExpr, DeleteStatement, Expr, FromItem, InsertStatement,
    JoinSpec, Limit, Literal, OrderByItem, SelectColumn, SelectStatement, SetOperation,
    Statement, TableSource, UpdateStatement, WindowSpec,
};
use crate::error::ParseError;
use crate::navigator::{extract_scalar_value, DEFAULT_MAX_DEPTH};

/// Nesting bound for statements reached through CTEs, derived tables and set operations.
const MAX_STATEMENT_DEPTH: usize = 64;

/// Expression nesting bound; deeper trees are cut off as [`Expr::Unknown`].
const MAX_EXPR_DEPTH: usize = 100;

impl Statement {
    /// Converts one JSON statement.
    ///
    /// Accepts either a statement object or a one-element array around it, plus the
    /// `{ "ast": … }` envelope some parsers wrap results in.
    pub fn from_json(value: &Value) -> Result<Self, ParseError> {
        statement_from_json(unwrap_envelope(value), 0)
    }

    /// Converts a JSON document holding one statement or an array of statements.
    pub fn all_from_json(value: &Value) -> Result<Vec<Self>, ParseError> {
        match unwrap_envelope_object(value) {
            Value::Array(items) => items.iter().map(Self::from_json).collect(),
            other => Ok(vec![Self::from_json(other)?]),
        }
    }
}

impl<'de> Deserialize<'de> for Statement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(de::Error::custom)
    }
}

impl Expr {
    /// Converts one JSON expression; never fails.
    pub fn from_json(value: &Value) -> Self {
        expr_from_json(value, 0)
    }
}

fn unwrap_envelope_object(value: &Value) -> &Value {
    match value.get("ast") {
        Some(inner) if !inner.is_null() => inner,
        _ => value,
    }
}

fn unwrap_envelope(value: &Value) -> &Value {
    match unwrap_envelope_object(value) {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

fn statement_from_json(value: &Value, depth: usize) -> Result<Statement, ParseError> {
    let kind = str_field(value, "type").unwrap_or_default().to_ascii_lowercase();
    match kind.as_str() {
        "select" => Ok(Statement::Select(Box::new(select_from_json(value, depth)?))),
        "insert" | "replace" => insert_from_json(value, depth).map(Statement::Insert),
        "update" => Ok(Statement::Update(update_from_json(value))),
        "delete" => Ok(Statement::Delete(delete_from_json(value))),
        "" => Err(ParseError::new("statement has no type")),
        other => Err(ParseError::unsupported_statement(other.to_ascii_uppercase())),
    }
}

fn select_from_json(value: &Value, depth: usize) -> Result<SelectStatement, ParseError> {
    if depth > MAX_STATEMENT_DEPTH {
        return Err(ParseError::new(format!(
            "statement nesting exceeds {MAX_STATEMENT_DEPTH} levels"
        )));
    }
    let value = unwrap_envelope(value);

    let mut with = Vec::new();
    for cte in array_field(value, "with") {
        let name = cte
            .get("name")
            .and_then(|n| extract_scalar_value(n, DEFAULT_MAX_DEPTH))
            .unwrap_or_else(|| "cte".to_string());
        let Some(stmt) = cte.get("stmt") else {
            continue;
        };
        with.push(CommonTableExpr {
            name,
            query: select_from_json(stmt, depth + 1)?,
        });
    }

    let columns = match value.get("columns") {
        Some(Value::String(s)) if s == "*" => vec![SelectColumn::new(Expr::Star { table: None })],
        Some(Value::Array(items)) => items.iter().map(select_column_from_json).collect(),
        _ => Vec::new(),
    };

    let mut from = Vec::new();
    for item in array_field(value, "from") {
        from.push(from_item_from_json(item, depth)?);
    }

    let group_by = match value.get("groupby") {
        Some(Value::Array(items)) => items.iter().map(Expr::from_json).collect(),
        Some(Value::Object(obj)) => obj
            .get("columns")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Expr::from_json).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let set_op = match (str_field(value, "set_op"), value.get("_next")) {
        (Some(op), Some(next)) if next.is_object() => Some(SetOperation {
            op: op.to_ascii_uppercase(),
            right: Box::new(select_from_json(next, depth + 1)?),
        }),
        _ => None,
    };

    Ok(SelectStatement {
        with,
        distinct: value
            .get("distinct")
            .and_then(|d| extract_scalar_value(d, DEFAULT_MAX_DEPTH))
            .is_some_and(|d| d.eq_ignore_ascii_case("distinct")),
        columns,
        from,
        where_clause: optional_expr(value, "where"),
        group_by,
        having: optional_expr(value, "having"),
        order_by: array_field(value, "orderby")
            .iter()
            .map(order_by_from_json)
            .collect(),
        limit: limit_from_json(value.get("limit")),
        set_op,
    })
}

fn select_column_from_json(value: &Value) -> SelectColumn {
    let expr = match value.get("expr") {
        Some(expr) => Expr::from_json(expr),
        None => Expr::from_json(value),
    };
    let alias = value
        .get("as")
        .and_then(|a| extract_scalar_value(a, DEFAULT_MAX_DEPTH));
    SelectColumn { expr, alias }
}

fn from_item_from_json(value: &Value, depth: usize) -> Result<FromItem, ParseError> {
    let alias = str_field(value, "as").map(str::to_string);

    let source = if let Some(table) = value.get("table").filter(|t| !t.is_null()) {
        match extract_scalar_value(table, DEFAULT_MAX_DEPTH) {
            Some(name) => TableSource::Table {
                schema: str_field(value, "db").map(str::to_string),
                name,
            },
            None => TableSource::Unknown(value.clone()),
        }
    } else if let Some(expr) = value.get("expr").filter(|e| e.get("ast").is_some()) {
        TableSource::Subquery(Box::new(select_from_json(expr, depth + 1)?))
    } else {
        TableSource::Unknown(value.clone())
    };

    let join = str_field(value, "join").map(|kind| JoinSpec {
        kind: kind.to_ascii_uppercase(),
        on: optional_expr(value, "on"),
        using: array_field(value, "using")
            .iter()
            .filter_map(|u| extract_scalar_value(u, DEFAULT_MAX_DEPTH))
            .collect(),
    });

    Ok(FromItem {
        source,
        alias,
        join,
    })
}

fn order_by_from_json(value: &Value) -> OrderByItem {
    OrderByItem {
        expr: value
            .get("expr")
            .map(Expr::from_json)
            .unwrap_or_else(|| Expr::Unknown(value.clone())),
        descending: str_field(value, "type").is_some_and(|t| t.eq_ignore_ascii_case("desc")),
    }
}

fn limit_from_json(value: Option<&Value>) -> Option<Limit> {
    let value = value?;
    let items = match value.get("value") {
        Some(Value::Array(items)) => items.as_slice(),
        _ => return None,
    };
    let (count, offset) = match items {
        [] => return None,
        [count] => (count, None),
        [first, second, ..] => {
            // `LIMIT offset, count` vs `LIMIT count OFFSET offset`
            if str_field(value, "seperator") == Some(",") {
                (second, Some(first))
            } else {
                (first, Some(second))
            }
        }
    };
    Some(Limit {
        count: Expr::from_json(count),
        offset: offset.map(Expr::from_json),
    })
}

fn insert_from_json(value: &Value, depth: usize) -> Result<InsertStatement, ParseError> {
    let table = array_field(value, "table")
        .first()
        .and_then(|t| t.get("table").or(Some(t)))
        .and_then(|t| extract_scalar_value(t, DEFAULT_MAX_DEPTH))
        .unwrap_or_else(|| "unknown".to_string());
    let columns = array_field(value, "columns")
        .iter()
        .filter_map(|c| extract_scalar_value(c, DEFAULT_MAX_DEPTH))
        .collect();
    let source = match value.get("values") {
        Some(values) if str_field(values, "type") == Some("select") => {
            Some(Box::new(select_from_json(values, depth + 1)?))
        }
        _ => match value.get("select") {
            Some(select) if select.is_object() => {
                Some(Box::new(select_from_json(select, depth + 1)?))
            }
            _ => None,
        },
    };
    Ok(InsertStatement {
        table,
        columns,
        source,
    })
}

fn update_from_json(value: &Value) -> UpdateStatement {
    let first = array_field(value, "table").first().cloned().unwrap_or(Value::Null);
    UpdateStatement {
        table: first
            .get("table")
            .and_then(|t| extract_scalar_value(t, DEFAULT_MAX_DEPTH))
            .unwrap_or_else(|| "unknown".to_string()),
        alias: str_field(&first, "as").map(str::to_string),
        assignments: array_field(value, "set")
            .iter()
            .map(|set| Assignment {
                column: set
                    .get("column")
                    .and_then(|c| extract_scalar_value(c, DEFAULT_MAX_DEPTH))
                    .unwrap_or_else(|| "unknown".to_string()),
                value: set
                    .get("value")
                    .map(Expr::from_json)
                    .unwrap_or(Expr::Literal(Literal::Null)),
            })
            .collect(),
        where_clause: optional_expr(value, "where"),
    }
}

fn delete_from_json(value: &Value) -> DeleteStatement {
    let table = array_field(value, "from")
        .first()
        .or_else(|| array_field(value, "table").first())
        .and_then(|t| t.get("table"))
        .and_then(|t| extract_scalar_value(t, DEFAULT_MAX_DEPTH))
        .unwrap_or_else(|| "unknown".to_string());
    DeleteStatement {
        table,
        where_clause: optional_expr(value, "where"),
    }
}

fn expr_from_json(value: &Value, depth: usize) -> Expr {
    if depth > MAX_EXPR_DEPTH {
        return Expr::Unknown(Value::Null);
    }
    let Value::Object(obj) = value else {
        return match value {
            Value::Array(items) => {
                Expr::List(items.iter().map(|i| expr_from_json(i, depth + 1)).collect())
            }
            Value::Null => Expr::Literal(Literal::Null),
            other => Expr::Unknown(other.clone()),
        };
    };
    let kind = obj.get("type").and_then(Value::as_str).unwrap_or_default();
    let child = |key: &str| obj.get(key).map(|v| Box::new(expr_from_json(v, depth + 1)));

    match kind {
        "column_ref" => {
            let column = obj
                .get("column")
                .and_then(|c| extract_scalar_value(c, DEFAULT_MAX_DEPTH))
                .unwrap_or_default();
            let table = obj
                .get("table")
                .and_then(|t| extract_scalar_value(t, DEFAULT_MAX_DEPTH));
            if column == "*" {
                Expr::Star { table }
            } else {
                Expr::ColumnRef { table, column }
            }
        }
        "star" => Expr::Star { table: None },
        "number" | "bigint" => match obj.get("value") {
            Some(v) => Expr::Literal(Literal::Number(
                extract_scalar_value(v, 1).unwrap_or_default(),
            )),
            None => Expr::Unknown(value.clone()),
        },
        "string" | "single_quote_string" | "double_quote_string" => Expr::Literal(
            Literal::String(str_field(value, "value").unwrap_or_default().to_string()),
        ),
        "bool" | "boolean" => Expr::Literal(Literal::Bool(
            obj.get("value").and_then(Value::as_bool).unwrap_or_default(),
        )),
        "null" => Expr::Literal(Literal::Null),
        "binary_expr" => match (child("left"), child("right")) {
            (Some(left), Some(right)) => Expr::Binary {
                op: str_field(value, "operator").unwrap_or("?").to_string(),
                left,
                right,
            },
            _ => Expr::Unknown(value.clone()),
        },
        "unary_expr" => match child("expr") {
            Some(expr) => Expr::Unary {
                op: str_field(value, "operator").unwrap_or("-").to_string(),
                expr,
            },
            None => Expr::Unknown(value.clone()),
        },
        "aggr_func" => {
            let args = obj.get("args");
            let arg = args.and_then(|a| a.get("expr"));
            Expr::Aggregate {
                name: function_name(obj).to_ascii_uppercase(),
                args: arg
                    .map(|a| vec![expr_from_json(a, depth + 1)])
                    .unwrap_or_default(),
                distinct: args
                    .and_then(|a| a.get("distinct"))
                    .and_then(|d| extract_scalar_value(d, 1))
                    .is_some_and(|d| d.eq_ignore_ascii_case("distinct")),
                over: window_from_json(obj.get("over"), depth),
            }
        }
        "function" => {
            let name = function_name(obj);
            let args = function_args(obj.get("args"), depth);
            let call = Expr::call(name, args);
            match window_from_json(obj.get("over"), depth) {
                Some(spec) => call.with_over(spec),
                None => call,
            }
        }
        "case" => {
            let mut branches = Vec::new();
            let mut else_result = None;
            for arg in obj.get("args").and_then(Value::as_array).into_iter().flatten() {
                let result = arg
                    .get("result")
                    .map(|r| expr_from_json(r, depth + 1))
                    .unwrap_or(Expr::Literal(Literal::Null));
                match str_field(arg, "type") {
                    Some("else") => else_result = Some(Box::new(result)),
                    _ => branches.push(CaseBranch {
                        condition: arg
                            .get("cond")
                            .map(|c| expr_from_json(c, depth + 1))
                            .unwrap_or(Expr::Literal(Literal::Null)),
                        result,
                    }),
                }
            }
            Expr::Case {
                operand: obj
                    .get("expr")
                    .filter(|e| !e.is_null())
                    .map(|e| Box::new(expr_from_json(e, depth + 1))),
                branches,
                else_result,
            }
        }
        "cast" => match child("expr") {
            Some(expr) => Expr::Cast {
                expr,
                data_type: obj
                    .get("target")
                    .and_then(|t| {
                        t.get("dataType")
                            .or_else(|| t.as_array().and_then(|a| a.first()?.get("dataType")))
                    })
                    .and_then(|d| extract_scalar_value(d, 1))
                    .unwrap_or_else(|| "unknown".to_string()),
            },
            None => Expr::Unknown(value.clone()),
        },
        "expr_list" => Expr::List(
            obj.get("value")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(|i| expr_from_json(i, depth + 1)).collect())
                .unwrap_or_default(),
        ),
        _ if obj.contains_key("ast") => match select_from_json(value, 0) {
            Ok(select) => Expr::Subquery(Box::new(select)),
            Err(_) => Expr::Unknown(value.clone()),
        },
        _ => Expr::Unknown(value.clone()),
    }
}

fn function_name(obj: &Map<String, Value>) -> String {
    obj.get("name")
        .and_then(|n| extract_scalar_value(n, DEFAULT_MAX_DEPTH))
        .unwrap_or_else(|| "unknown".to_string())
}

fn function_args(args: Option<&Value>, depth: usize) -> Vec<Expr> {
    match args {
        Some(Value::Array(items)) => items.iter().map(|i| expr_from_json(i, depth + 1)).collect(),
        Some(obj @ Value::Object(_)) => match obj.get("value") {
            Some(Value::Array(items)) => {
                items.iter().map(|i| expr_from_json(i, depth + 1)).collect()
            }
            _ => obj
                .get("expr")
                .map(|e| vec![expr_from_json(e, depth + 1)])
                .unwrap_or_default(),
        },
        _ => Vec::new(),
    }
}

fn window_from_json(over: Option<&Value>, depth: usize) -> Option<WindowSpec> {
    let over = over.filter(|o| !o.is_null())?;
    let spec = over
        .get("as_window_specification")
        .and_then(|s| s.get("window_specification"))
        .unwrap_or(over);
    let unwrap_expr = |item: &Value| {
        let inner = item.get("expr").unwrap_or(item);
        expr_from_json(inner, depth + 1)
    };
    Some(WindowSpec {
        partition_by: spec
            .get("partitionby")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(unwrap_expr).collect())
            .unwrap_or_default(),
        order_by: spec
            .get("orderby")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(order_by_from_json).collect())
            .unwrap_or_default(),
    })
}

fn optional_expr(value: &Value, key: &str) -> Option<Expr> {
    value
        .get(key)
        .filter(|v| !v.is_null())
        .map(Expr::from_json)
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn select(value: Value) -> SelectStatement {
        match Statement::from_json(&value).unwrap() {
            Statement::Select(select) => *select,
            other => panic!("expected select, got {other:?}"),
        }
    }

    #[test]
    fn test_select_with_join_and_group_by() {
        let stmt = select(json!({
            "type": "select",
            "columns": [
                { "expr": { "type": "column_ref", "table": "c", "column": "name" }, "as": null },
                {
                    "expr": {
                        "type": "aggr_func",
                        "name": "COUNT",
                        "args": { "expr": { "type": "column_ref", "table": "o", "column": "id" } }
                    },
                    "as": "order_count"
                }
            ],
            "from": [
                { "db": null, "table": "customers", "as": "c" },
                {
                    "db": null, "table": "orders", "as": "o", "join": "INNER JOIN",
                    "on": {
                        "type": "binary_expr", "operator": "=",
                        "left": { "type": "column_ref", "table": "c", "column": "id" },
                        "right": { "type": "column_ref", "table": "o", "column": "customer_id" }
                    }
                }
            ],
            "where": null,
            "groupby": [{ "type": "column_ref", "table": "c", "column": "name" }],
            "limit": { "seperator": "", "value": [{ "type": "number", "value": 10 }] }
        }));

        assert_eq!(stmt.columns.len(), 2);
        assert_eq!(stmt.columns[1].output_name(), "order_count");
        assert!(stmt.columns[1].expr.contains_aggregate());
        assert_eq!(stmt.from[1].join.as_ref().unwrap().kind, "INNER JOIN");
        assert_eq!(
            stmt.from[1].join.as_ref().unwrap().on.as_ref().unwrap().to_string(),
            "c.id = o.customer_id"
        );
        assert_eq!(stmt.group_by.len(), 1);
        assert_eq!(stmt.limit.unwrap().rows(), Some(10));
    }

    #[test]
    fn test_nested_column_name_object() {
        let expr = Expr::from_json(&json!({
            "type": "column_ref",
            "table": null,
            "column": { "expr": { "type": "default", "value": "amount" } }
        }));
        assert_eq!(expr, Expr::column("amount"));
    }

    #[test]
    fn test_unknown_expression_is_kept() {
        let raw = json!({ "type": "interval", "expr": { "type": "number", "value": 3 } });
        assert_eq!(Expr::from_json(&raw), Expr::Unknown(raw.clone()));
    }

    #[test]
    fn test_windowed_function() {
        let expr = Expr::from_json(&json!({
            "type": "function",
            "name": { "name": [{ "type": "default", "value": "ROW_NUMBER" }] },
            "args": { "type": "expr_list", "value": [] },
            "over": {
                "type": "window",
                "as_window_specification": {
                    "window_specification": {
                        "partitionby": [{ "expr": { "type": "column_ref", "table": null, "column": "customer_id" } }],
                        "orderby": [{ "expr": { "type": "column_ref", "table": null, "column": "created_at" }, "type": "DESC" }]
                    }
                }
            }
        }));
        assert!(expr.contains_window());
        assert_eq!(
            expr.to_string(),
            "ROW_NUMBER() OVER (PARTITION BY customer_id ORDER BY created_at DESC)"
        );
    }

    #[test]
    fn test_union_chain() {
        let stmt = select(json!({
            "type": "select",
            "columns": [{ "expr": { "type": "column_ref", "table": null, "column": "id" } }],
            "from": [{ "table": "users" }],
            "set_op": "union all",
            "_next": {
                "type": "select",
                "columns": [{ "expr": { "type": "column_ref", "table": null, "column": "id" } }],
                "from": [{ "table": "admins" }]
            }
        }));
        let set_op = stmt.set_op.unwrap();
        assert_eq!(set_op.op, "UNION ALL");
        assert_eq!(set_op.right.from[0].source_name(), "admins");
    }

    #[test]
    fn test_cte_and_derived_table() {
        let stmt = select(json!({
            "type": "select",
            "with": [{
                "name": { "value": "recent" },
                "stmt": { "ast": { "type": "select", "columns": "*", "from": [{ "table": "orders" }] } }
            }],
            "columns": "*",
            "from": [{
                "expr": { "ast": { "type": "select", "columns": "*", "from": [{ "table": "recent" }] } },
                "as": "r"
            }]
        }));
        assert_eq!(stmt.with.len(), 1);
        assert_eq!(stmt.with[0].name, "recent");
        assert!(matches!(stmt.from[0].source, TableSource::Subquery(_)));
        assert_eq!(stmt.from[0].source_name(), "r");
        assert!(stmt.selects_star());
    }

    #[test]
    fn test_update_and_delete() {
        let update = Statement::from_json(&json!({
            "type": "update",
            "table": [{ "db": null, "table": "users", "as": null }],
            "set": [{ "column": "active", "value": { "type": "bool", "value": false } }],
            "where": null
        }))
        .unwrap();
        match update {
            Statement::Update(update) => {
                assert_eq!(update.table, "users");
                assert_eq!(update.assignments[0].column, "active");
                assert!(update.where_clause.is_none());
            }
            other => panic!("expected update, got {other:?}"),
        }

        let delete = Statement::from_json(&json!({
            "type": "delete",
            "from": [{ "table": "sessions" }],
            "where": { "type": "binary_expr", "operator": "<",
                       "left": { "type": "column_ref", "column": "expires_at" },
                       "right": { "type": "function", "name": "NOW", "args": { "type": "expr_list", "value": [] } } }
        }))
        .unwrap();
        assert_eq!(delete.kind(), "DELETE");
    }

    #[test]
    fn test_unsupported_statement_type() {
        let err = Statement::from_json(&json!({ "type": "create", "keyword": "table" })).unwrap_err();
        assert!(err.message.contains("CREATE"));
    }

    #[test]
    fn test_deserialize_from_str() {
        let stmt: Statement = serde_json::from_str(
            r#"{"type":"select","columns":"*","from":[{"table":"orders"}]}"#,
        )
        .unwrap();
        assert_eq!(stmt.kind(), "SELECT");
    }
}
