//! Statement model consumed by the graph builder, lineage extractor and summarizer.
//!
//! The model is deliberately smaller than the `sqlparser` AST: it keeps the clauses that
//! shape a dataflow pipeline (FROM/JOIN, WHERE, GROUP BY, HAVING, windows, ORDER BY,
//! LIMIT, set operations) and folds everything else into [`Expr::Unknown`], which the
//! [`navigator`](crate::navigator) can still mine for a display name.
//!
//! Statements arrive either from SQL text (see [`crate::parser`]) or as JSON documents in
//! the conventional `type`-tagged AST layout (see [`json`]).

mod display;
pub mod json;

use serde_json::Value;

/// Maximum recursion depth for expression walks.
///
/// Prevents stack overflow on deeply nested or adversarial expression trees.
const MAX_RECURSION_DEPTH: usize = 100;

/// Function names treated as aggregates when they appear without an `OVER` clause.
const AGGREGATE_FUNCTIONS: &[&str] = &[
    "ANY_VALUE",
    "APPROX_COUNT_DISTINCT",
    "ARRAY_AGG",
    "AVG",
    "BIT_AND",
    "BIT_OR",
    "BOOL_AND",
    "BOOL_OR",
    "COUNT",
    "COUNT_IF",
    "EVERY",
    "GROUP_CONCAT",
    "JSON_AGG",
    "LISTAGG",
    "MAX",
    "MEDIAN",
    "MIN",
    "MODE",
    "STDDEV",
    "STDDEV_POP",
    "STDDEV_SAMP",
    "STRING_AGG",
    "SUM",
    "VARIANCE",
    "VAR_POP",
    "VAR_SAMP",
];

/// Returns true if `name` is a known aggregate function (case-insensitive).
pub fn is_aggregate_function(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    AGGREGATE_FUNCTIONS.binary_search(&upper.as_str()).is_ok()
}

/// A statement the pipeline builder understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Box<SelectStatement>),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    /// Upper-case statement keyword (`SELECT`, `INSERT`, …).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "SELECT",
            Self::Insert(_) => "INSERT",
            Self::Update(_) => "UPDATE",
            Self::Delete(_) => "DELETE",
        }
    }

    pub fn as_select(&self) -> Option<&SelectStatement> {
        match self {
            Self::Select(select) => Some(select),
            _ => None,
        }
    }
}

/// A SELECT, including its CTEs, ordering and an optional set-operation tail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectStatement {
    pub with: Vec<CommonTableExpr>,
    pub distinct: bool,
    pub columns: Vec<SelectColumn>,
    pub from: Vec<FromItem>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<Limit>,
    /// `UNION`/`INTERSECT`/`EXCEPT` with the right-hand query.
    pub set_op: Option<SetOperation>,
}

impl SelectStatement {
    /// True when any output column computes an aggregate outside a window.
    pub fn has_aggregates(&self) -> bool {
        self.columns.iter().any(|c| c.expr.contains_aggregate())
            || self.having.as_ref().is_some_and(Expr::contains_aggregate)
    }

    pub fn has_window_functions(&self) -> bool {
        self.columns.iter().any(|c| c.expr.contains_window())
    }

    pub fn selects_star(&self) -> bool {
        self.columns
            .iter()
            .any(|c| matches!(c.expr, Expr::Star { .. }))
    }

    /// Every expression that can reference a column, in clause order.
    pub fn expressions(&self) -> Vec<&Expr> {
        let mut exprs: Vec<&Expr> = self.columns.iter().map(|c| &c.expr).collect();
        for item in &self.from {
            if let Some(on) = item.join.as_ref().and_then(|j| j.on.as_ref()) {
                exprs.push(on);
            }
        }
        exprs.extend(self.where_clause.iter());
        exprs.extend(self.group_by.iter());
        exprs.extend(self.having.iter());
        exprs.extend(self.order_by.iter().map(|o| &o.expr));
        exprs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommonTableExpr {
    pub name: String,
    pub query: SelectStatement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectColumn {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The name the column carries in the result set.
    ///
    /// Alias first, then the referenced column name, then the expression text.
    pub fn output_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.expr {
            Expr::ColumnRef { column, .. } => column.clone(),
            Expr::Star { .. } => "*".to_string(),
            other => other.to_string(),
        }
    }
}

/// One entry of the FROM list. Every entry after the first may carry a join.
#[derive(Debug, Clone, PartialEq)]
pub struct FromItem {
    pub source: TableSource,
    pub alias: Option<String>,
    pub join: Option<JoinSpec>,
}

impl FromItem {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            source: TableSource::Table {
                schema: None,
                name: name.into(),
            },
            alias: None,
            join: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_join(mut self, join: JoinSpec) -> Self {
        self.join = Some(join);
        self
    }

    /// Name under which the source is known in the enclosing query.
    ///
    /// Tables use their (possibly qualified) name, derived tables their alias.
    pub fn source_name(&self) -> String {
        match &self.source {
            TableSource::Table { schema, name } => match schema {
                Some(schema) => format!("{schema}.{name}"),
                None => name.clone(),
            },
            TableSource::Subquery(_) => self
                .alias
                .clone()
                .unwrap_or_else(|| "subquery".to_string()),
            TableSource::Unknown(value) => crate::navigator::extract_scalar_value(
                value,
                crate::navigator::DEFAULT_MAX_DEPTH,
            )
            .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Table { schema: Option<String>, name: String },
    Subquery(Box<SelectStatement>),
    /// A FROM entry in a shape the model does not cover (table functions, `UNNEST`, …).
    Unknown(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    /// Join keyword as written, upper-cased (`INNER JOIN`, `LEFT JOIN`, …).
    pub kind: String,
    pub on: Option<Expr>,
    pub using: Vec<String>,
}

impl JoinSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            on: None,
            using: Vec::new(),
        }
    }

    pub fn on(mut self, condition: Expr) -> Self {
        self.on = Some(condition);
        self
    }

    /// True when the join has neither an ON nor a USING condition.
    pub fn is_unconstrained(&self) -> bool {
        self.on.is_none() && self.using.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub count: Expr,
    pub offset: Option<Expr>,
}

impl Limit {
    /// Row count when the LIMIT is a literal number.
    pub fn rows(&self) -> Option<u64> {
        crate::navigator::extract_scalar(&self.count, crate::navigator::DEFAULT_MAX_DEPTH)
            .and_then(|value| value.trim().parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    /// Upper-cased operator (`UNION`, `UNION ALL`, `INTERSECT`, `EXCEPT`).
    pub op: String,
    pub right: Box<SelectStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    /// Absent for `INSERT … VALUES`.
    pub source: Option<Box<SelectStatement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub alias: Option<String>,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<Expr>,
}

/// Expression tree. Shapes the model does not cover are kept as raw JSON in
/// [`Expr::Unknown`] instead of being rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    ColumnRef {
        table: Option<String>,
        column: String,
    },
    Star {
        table: Option<String>,
    },
    Literal(Literal),
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: String,
        expr: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
        over: Option<WindowSpec>,
    },
    Aggregate {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
        over: Option<WindowSpec>,
    },
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<CaseBranch>,
        else_result: Option<Box<Expr>>,
    },
    Cast {
        expr: Box<Expr>,
        data_type: String,
    },
    Subquery(Box<SelectStatement>),
    List(Vec<Expr>),
    Unknown(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(String),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseBranch {
    pub condition: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSpec {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderByItem>,
}

/// A column reference found inside an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef<'a> {
    pub table: Option<&'a str>,
    pub column: &'a str,
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Self::ColumnRef {
            table: None,
            column: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnRef {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    pub fn number(value: impl Into<String>) -> Self {
        Self::Literal(Literal::Number(value.into()))
    }

    pub fn binary(op: impl Into<String>, left: Expr, right: Expr) -> Self {
        Self::Binary {
            op: op.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Builds a function call, classifying known aggregate names as [`Expr::Aggregate`].
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        let name = name.into();
        if is_aggregate_function(&name) {
            Self::Aggregate {
                name: name.to_ascii_uppercase(),
                args,
                distinct: false,
                over: None,
            }
        } else {
            Self::Function {
                name,
                args,
                over: None,
            }
        }
    }

    /// Attaches a window specification to a function or aggregate call.
    pub fn with_over(self, spec: WindowSpec) -> Self {
        match self {
            Self::Function { name, args, .. } => Self::Function {
                name,
                args,
                over: Some(spec),
            },
            Self::Aggregate {
                name,
                args,
                distinct,
                ..
            } => Self::Aggregate {
                name,
                args,
                distinct,
                over: Some(spec),
            },
            other => other,
        }
    }

    /// Direct children, not descending into subqueries.
    fn children(&self) -> Vec<&Expr> {
        match self {
            Self::ColumnRef { .. }
            | Self::Star { .. }
            | Self::Literal(_)
            | Self::Subquery(_)
            | Self::Unknown(_) => Vec::new(),
            Self::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Self::Unary { expr, .. } | Self::Cast { expr, .. } => vec![expr.as_ref()],
            Self::Function { args, .. } | Self::Aggregate { args, .. } => args.iter().collect(),
            Self::Case {
                operand,
                branches,
                else_result,
            } => {
                let mut children: Vec<&Expr> = operand.iter().map(|e| e.as_ref()).collect();
                for branch in branches {
                    children.push(&branch.condition);
                    children.push(&branch.result);
                }
                children.extend(else_result.iter().map(|e| e.as_ref()));
                children
            }
            Self::List(items) => items.iter().collect(),
        }
    }

    /// Column references in left-to-right order, excluding window specs and subqueries.
    pub fn column_refs(&self) -> Vec<ColumnRef<'_>> {
        let mut refs = Vec::new();
        self.collect_column_refs(&mut refs, 0);
        refs
    }

    fn collect_column_refs<'a>(&'a self, refs: &mut Vec<ColumnRef<'a>>, depth: usize) {
        if depth > MAX_RECURSION_DEPTH {
            return;
        }
        if let Self::ColumnRef { table, column } = self {
            refs.push(ColumnRef {
                table: table.as_deref(),
                column,
            });
            return;
        }
        for child in self.children() {
            child.collect_column_refs(refs, depth + 1);
        }
    }

    /// Qualifier of the first `*` inside the expression, as in `COUNT(*)` or `COUNT(o.*)`.
    pub fn star_argument(&self) -> Option<Option<&str>> {
        self.find_star(0)
    }

    fn find_star(&self, depth: usize) -> Option<Option<&str>> {
        if depth > MAX_RECURSION_DEPTH {
            return None;
        }
        if let Self::Star { table } = self {
            return Some(table.as_deref());
        }
        self.children()
            .into_iter()
            .find_map(|child| child.find_star(depth + 1))
    }

    /// Column references including those in window PARTITION BY / ORDER BY.
    pub fn all_column_refs(&self) -> Vec<ColumnRef<'_>> {
        let mut refs = self.column_refs();
        for call in self.window_calls() {
            if let Some(spec) = call.window_spec() {
                for expr in spec
                    .partition_by
                    .iter()
                    .chain(spec.order_by.iter().map(|o| &o.expr))
                {
                    refs.extend(expr.column_refs());
                }
            }
        }
        refs
    }

    pub fn window_spec(&self) -> Option<&WindowSpec> {
        match self {
            Self::Function { over, .. } | Self::Aggregate { over, .. } => over.as_ref(),
            _ => None,
        }
    }

    /// Aggregate calls that are not windowed, outermost first.
    pub fn aggregate_calls(&self) -> Vec<&Expr> {
        let mut calls = Vec::new();
        self.collect_matching(
            &|e| matches!(e, Self::Aggregate { over: None, .. }),
            &mut calls,
            0,
        );
        calls
    }

    /// Function or aggregate calls carrying an `OVER` clause, outermost first.
    pub fn window_calls(&self) -> Vec<&Expr> {
        let mut calls = Vec::new();
        self.collect_matching(&|e| e.window_spec().is_some(), &mut calls, 0);
        calls
    }

    fn collect_matching<'a>(
        &'a self,
        predicate: &dyn Fn(&Expr) -> bool,
        out: &mut Vec<&'a Expr>,
        depth: usize,
    ) {
        if depth > MAX_RECURSION_DEPTH {
            return;
        }
        if predicate(self) {
            out.push(self);
            return;
        }
        for child in self.children() {
            child.collect_matching(predicate, out, depth + 1);
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        !self.aggregate_calls().is_empty()
    }

    pub fn contains_window(&self) -> bool {
        !self.window_calls().is_empty()
    }

    /// Function name for calls, upper-cased for aggregates.
    pub fn function_name(&self) -> Option<&str> {
        match self {
            Self::Function { name, .. } | Self::Aggregate { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_function_list_is_sorted() {
        let mut sorted = AGGREGATE_FUNCTIONS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, AGGREGATE_FUNCTIONS);
    }

    #[test]
    fn test_is_aggregate_function_case_insensitive() {
        assert!(is_aggregate_function("count"));
        assert!(is_aggregate_function("Sum"));
        assert!(!is_aggregate_function("upper"));
    }

    #[test]
    fn test_output_name_precedence() {
        let aliased = SelectColumn::new(Expr::qualified("o", "amount")).with_alias("total");
        assert_eq!(aliased.output_name(), "total");

        let plain = SelectColumn::new(Expr::qualified("o", "amount"));
        assert_eq!(plain.output_name(), "amount");

        let computed = SelectColumn::new(Expr::binary(
            "*",
            Expr::column("price"),
            Expr::column("qty"),
        ));
        assert_eq!(computed.output_name(), "price * qty");
    }

    #[test]
    fn test_column_refs_in_order() {
        let expr = Expr::binary(
            "+",
            Expr::qualified("a", "x"),
            Expr::call("COALESCE", vec![Expr::column("y"), Expr::number("0")]),
        );
        let refs = expr.column_refs();
        assert_eq!(
            refs,
            vec![
                ColumnRef {
                    table: Some("a"),
                    column: "x"
                },
                ColumnRef {
                    table: None,
                    column: "y"
                },
            ]
        );
    }

    #[test]
    fn test_windowed_aggregate_is_not_an_aggregate() {
        let windowed = Expr::call("SUM", vec![Expr::column("amount")]).with_over(WindowSpec {
            partition_by: vec![Expr::column("customer_id")],
            order_by: Vec::new(),
        });
        assert!(!windowed.contains_aggregate());
        assert!(windowed.contains_window());

        let refs: Vec<&str> = windowed.all_column_refs().iter().map(|r| r.column).collect();
        assert_eq!(refs, vec!["amount", "customer_id"]);
    }

    #[test]
    fn test_aggregate_inside_arithmetic() {
        let expr = Expr::binary(
            "/",
            Expr::call("SUM", vec![Expr::column("amount")]),
            Expr::number("100"),
        );
        assert!(expr.contains_aggregate());
        assert_eq!(expr.aggregate_calls().len(), 1);
    }

    #[test]
    fn test_limit_rows() {
        let limit = Limit {
            count: Expr::number("10"),
            offset: None,
        };
        assert_eq!(limit.rows(), Some(10));

        let limit = Limit {
            count: Expr::column("n"),
            offset: None,
        };
        assert_eq!(limit.rows(), None);
    }

    #[test]
    fn test_source_name_for_schema_qualified_table() {
        let item = FromItem {
            source: TableSource::Table {
                schema: Some("sales".to_string()),
                name: "orders".to_string(),
            },
            alias: Some("o".to_string()),
            join: None,
        };
        assert_eq!(item.source_name(), "sales.orders");
    }
}
