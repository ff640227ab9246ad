//! SQL-ish rendering of model expressions, used for labels, descriptions and the
//! `expression` field of column metadata.

use std::fmt;

use super::{CaseBranch, Expr, Literal, OrderByItem, WindowSpec};
use crate::navigator::{extract_scalar_value, DEFAULT_MAX_DEPTH};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnRef { table, column } => match table {
                Some(table) => write!(f, "{table}.{column}"),
                None => f.write_str(column),
            },
            Self::Star { table } => match table {
                Some(table) => write!(f, "{table}.*"),
                None => f.write_str("*"),
            },
            Self::Literal(literal) => literal.fmt(f),
            Self::Binary { op, left, right } => {
                write_operand(f, left)?;
                write!(f, " {op} ")?;
                write_operand(f, right)
            }
            Self::Unary { op, expr } => {
                if op.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
                    write!(f, "{op} ")?;
                } else {
                    f.write_str(op)?;
                }
                write_operand(f, expr)
            }
            Self::Function { name, args, over } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")?;
                write_over(f, over.as_ref())
            }
            Self::Aggregate {
                name,
                args,
                distinct,
                over,
            } => {
                write!(f, "{name}(")?;
                if *distinct {
                    f.write_str("DISTINCT ")?;
                }
                write_list(f, args)?;
                f.write_str(")")?;
                write_over(f, over.as_ref())
            }
            Self::Case {
                operand,
                branches,
                else_result,
            } => {
                f.write_str("CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {operand}")?;
                }
                for CaseBranch { condition, result } in branches {
                    write!(f, " WHEN {condition} THEN {result}")?;
                }
                if let Some(otherwise) = else_result {
                    write!(f, " ELSE {otherwise}")?;
                }
                f.write_str(" END")
            }
            Self::Cast { expr, data_type } => write!(f, "CAST({expr} AS {data_type})"),
            Self::Subquery(_) => f.write_str("(subquery)"),
            Self::List(items) => {
                f.write_str("(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
            Self::Unknown(value) => match extract_scalar_value(value, DEFAULT_MAX_DEPTH) {
                Some(text) => f.write_str(&text),
                None => f.write_str("expr"),
            },
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(n),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
            Self::Null => f.write_str("NULL"),
        }
    }
}

impl fmt::Display for OrderByItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if self.descending {
            f.write_str(" DESC")?;
        }
        Ok(())
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if matches!(expr, Expr::Binary { .. }) {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_over(f: &mut fmt::Formatter<'_>, over: Option<&WindowSpec>) -> fmt::Result {
    let Some(spec) = over else {
        return Ok(());
    };
    f.write_str(" OVER (")?;
    if !spec.partition_by.is_empty() {
        f.write_str("PARTITION BY ")?;
        write_list(f, &spec.partition_by)?;
    }
    if !spec.order_by.is_empty() {
        if !spec.partition_by.is_empty() {
            f.write_str(" ")?;
        }
        f.write_str("ORDER BY ")?;
        write_list(f, &spec.order_by)?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_binary_is_parenthesized() {
        let expr = Expr::binary(
            "*",
            Expr::binary("+", Expr::column("a"), Expr::column("b")),
            Expr::column("c"),
        );
        assert_eq!(expr.to_string(), "(a + b) * c");
    }

    #[test]
    fn test_window_function_rendering() {
        let expr = Expr::call("ROW_NUMBER", Vec::new()).with_over(WindowSpec {
            partition_by: vec![Expr::column("customer_id")],
            order_by: vec![OrderByItem {
                expr: Expr::column("created_at"),
                descending: true,
            }],
        });
        assert_eq!(
            expr.to_string(),
            "ROW_NUMBER() OVER (PARTITION BY customer_id ORDER BY created_at DESC)"
        );
    }

    #[test]
    fn test_case_and_literals() {
        let expr = Expr::Case {
            operand: None,
            branches: vec![CaseBranch {
                condition: Expr::binary(">", Expr::column("amount"), Expr::number("100")),
                result: Expr::Literal(Literal::String("it's big".to_string())),
            }],
            else_result: Some(Box::new(Expr::Literal(Literal::Null))),
        };
        assert_eq!(
            expr.to_string(),
            "CASE WHEN amount > 100 THEN 'it''s big' ELSE NULL END"
        );
    }

    #[test]
    fn test_unary_keyword_spacing() {
        let not = Expr::Unary {
            op: "NOT".to_string(),
            expr: Box::new(Expr::column("active")),
        };
        assert_eq!(not.to_string(), "NOT active");

        let neg = Expr::Unary {
            op: "-".to_string(),
            expr: Box::new(Expr::column("delta")),
        };
        assert_eq!(neg.to_string(), "-delta");
    }

    #[test]
    fn test_unknown_falls_back_to_placeholder() {
        assert_eq!(Expr::Unknown(json!({"type": "interval"})).to_string(), "expr");
        assert_eq!(
            Expr::Unknown(json!({"type": "param", "value": "id"})).to_string(),
            "id"
        );
    }
}
