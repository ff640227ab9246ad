//! Human-oriented documentation of a statement.
//!
//! The summary is derived from clause counts only: a one-sentence description, a
//! weighted complexity score, warnings about risky patterns, and the data-flow steps in
//! evaluation order with a rough row-volume estimate for each.

use crate::ast::{
    DeleteStatement, Expr, InsertStatement, SelectStatement, Statement, TableSource,
    UpdateStatement,
};
use crate::parser::parse_each_statement;
use crate::types::{
    Complexity, ComplexityLevel, DataFlowStep, DataVolume, Dialect, QueryDocumentation,
};

const TABLE_WEIGHT: usize = 2;
const JOIN_WEIGHT: usize = 5;
const AGGREGATE_WEIGHT: usize = 3;
const FILTER_WEIGHT: usize = 2;

impl QueryDocumentation {
    /// Documentation reported in place of a statement that could not be analyzed.
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            summary: format!("Analysis failed: {reason}"),
            complexity: Complexity::from_counts(Counts::default()),
            warnings: Vec::new(),
            data_flow_steps: Vec::new(),
        }
    }
}

impl ComplexityLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=9 => Self::Simple,
            10..=24 => Self::Moderate,
            25..=39 => Self::Complex,
            _ => Self::VeryComplex,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    tables: usize,
    joins: usize,
    aggregates: usize,
    filters: usize,
}

impl Counts {
    fn of(statement: &Statement) -> Self {
        let mut counts = Self::default();
        match statement {
            Statement::Select(select) => counts.add_select(select),
            Statement::Insert(insert) => {
                counts.tables += 1;
                if let Some(source) = &insert.source {
                    counts.add_select(source);
                }
            }
            Statement::Update(update) => {
                counts.tables += 1;
                counts.filters += usize::from(update.where_clause.is_some());
            }
            Statement::Delete(delete) => {
                counts.tables += 1;
                counts.filters += usize::from(delete.where_clause.is_some());
            }
        }
        counts
    }

    /// Counts one query including its CTEs, derived tables and set-operation tail.
    fn add_select(&mut self, select: &SelectStatement) {
        for cte in &select.with {
            self.add_select(&cte.query);
        }
        for item in &select.from {
            self.tables += 1;
            self.joins += usize::from(item.join.is_some());
            if let TableSource::Subquery(subquery) = &item.source {
                self.add_select(subquery);
            }
        }
        self.aggregates += select
            .columns
            .iter()
            .map(|c| &c.expr)
            .chain(select.having.iter())
            .map(|e| e.aggregate_calls().len())
            .sum::<usize>();
        self.filters += usize::from(select.where_clause.is_some());
        self.filters += usize::from(select.having.is_some());
        if let Some(set_op) = &select.set_op {
            self.add_select(&set_op.right);
        }
    }
}

impl Complexity {
    fn from_counts(counts: Counts) -> Self {
        let score = counts.tables * TABLE_WEIGHT
            + counts.joins * JOIN_WEIGHT
            + counts.aggregates * AGGREGATE_WEIGHT
            + counts.filters * FILTER_WEIGHT;
        let score = u32::try_from(score).unwrap_or(u32::MAX);
        Self {
            score,
            level: ComplexityLevel::from_score(score),
            table_count: counts.tables,
            join_count: counts.joins,
            aggregate_count: counts.aggregates,
            filter_count: counts.filters,
        }
    }
}

/// Documents one statement.
pub fn summarize(statement: &Statement) -> QueryDocumentation {
    QueryDocumentation {
        summary: describe(statement),
        complexity: Complexity::from_counts(Counts::of(statement)),
        warnings: warnings(statement),
        data_flow_steps: data_flow_steps(statement),
    }
}

/// Parses `sql` and documents every statement. Failures are reported in the
/// documentation text rather than returned as errors.
pub fn summarize_sql(sql: &str, dialect: Dialect) -> Vec<QueryDocumentation> {
    match parse_each_statement(sql, dialect) {
        Ok(statements) => statements
            .iter()
            .map(|statement| match statement {
                Ok(statement) => summarize(statement),
                Err(err) => QueryDocumentation::failed(&err.message),
            })
            .collect(),
        Err(err) => vec![QueryDocumentation::failed(&err.message)],
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("1 {word}")
    } else {
        format!("{count} {word}s")
    }
}

fn describe(statement: &Statement) -> String {
    match statement {
        Statement::Select(select) => describe_select(select),
        Statement::Insert(insert) => describe_insert(insert),
        Statement::Update(update) => {
            let scope = if update.where_clause.is_some() {
                "matching rows"
            } else {
                "every row"
            };
            format!(
                "Updates {} in {} for {scope}.",
                plural(update.assignments.len(), "column"),
                update.table
            )
        }
        Statement::Delete(delete) => {
            let scope = if delete.where_clause.is_some() {
                "matching rows"
            } else {
                "every row"
            };
            format!("Deletes {scope} from {}.", delete.table)
        }
    }
}

fn describe_select(select: &SelectStatement) -> String {
    let what = if select.selects_star() {
        "all columns".to_string()
    } else {
        plural(select.columns.len(), "column")
    };
    let mut text = if select.from.is_empty() {
        format!("Computes {what}")
    } else {
        let sources: Vec<String> = select.from.iter().map(|item| item.source_name()).collect();
        format!("Retrieves {what} from {}", sources.join(", "))
    };

    let joins = select.from.iter().filter(|item| item.join.is_some()).count();
    if joins > 0 {
        text.push_str(&format!(" using {}", plural(joins, "join")));
    }
    if select.where_clause.is_some() {
        text.push_str(", filtered by a WHERE condition");
    }
    if !select.group_by.is_empty() {
        let keys: Vec<String> = select.group_by.iter().map(ToString::to_string).collect();
        text.push_str(&format!(", grouped by {}", keys.join(", ")));
    } else if select.has_aggregates() {
        text.push_str(", aggregated into a single row");
    }
    if let Some(set_op) = &select.set_op {
        text.push_str(&format!(", combined with another query via {}", set_op.op));
    }
    if !select.order_by.is_empty() {
        text.push_str(", sorted");
    }
    if let Some(limit) = &select.limit {
        match limit.rows() {
            Some(rows) => {
                let rows = usize::try_from(rows).unwrap_or(usize::MAX);
                text.push_str(&format!(", limited to {}", plural(rows, "row")));
            }
            None => text.push_str(", limited"),
        }
    }
    text.push('.');
    text
}

fn describe_insert(insert: &InsertStatement) -> String {
    match &insert.source {
        Some(source) if !source.from.is_empty() => {
            let sources: Vec<String> = source.from.iter().map(|item| item.source_name()).collect();
            format!(
                "Inserts rows into {} from a query over {}.",
                insert.table,
                sources.join(", ")
            )
        }
        Some(_) => format!("Inserts computed rows into {}.", insert.table),
        None => format!("Inserts literal values into {}.", insert.table),
    }
}

fn warnings(statement: &Statement) -> Vec<String> {
    let mut warnings = Vec::new();
    match statement {
        Statement::Update(UpdateStatement {
            table,
            where_clause: None,
            ..
        }) => warnings.push(format!(
            "UPDATE without a WHERE clause modifies every row in {table}"
        )),
        Statement::Delete(DeleteStatement {
            table,
            where_clause: None,
        }) => warnings.push(format!(
            "DELETE without a WHERE clause removes every row from {table}"
        )),
        Statement::Select(select) => {
            if !select.from.is_empty() && select.limit.is_none() {
                warnings.push("SELECT without LIMIT may return a large result set".to_string());
            }
            select_warnings(select, &mut warnings);
        }
        Statement::Insert(InsertStatement {
            source: Some(source),
            ..
        }) => select_warnings(source, &mut warnings),
        _ => {}
    }
    warnings
}

fn select_warnings(select: &SelectStatement, warnings: &mut Vec<String>) {
    if select.selects_star() {
        warnings.push("SELECT * retrieves every column, including unused ones".to_string());
    }
    let unconstrained = select
        .from
        .iter()
        .skip(1)
        .any(|item| item.join.as_ref().is_none_or(|join| join.is_unconstrained()));
    if unconstrained && select.where_clause.is_none() {
        warnings.push(
            "Multiple tables without a join condition produce a cartesian product".to_string(),
        );
    }
}

/// Accumulates steps while tracking the row volume after the latest one.
struct StepList {
    steps: Vec<DataFlowStep>,
    volume: DataVolume,
}

impl StepList {
    fn new() -> Self {
        Self {
            steps: Vec::new(),
            volume: DataVolume::Full,
        }
    }

    fn push(&mut self, operation: &str, description: String, volume: Option<DataVolume>) {
        if let Some(volume) = volume {
            self.volume = volume;
        }
        self.steps.push(DataFlowStep {
            step: self.steps.len() + 1,
            operation: operation.to_string(),
            description,
            volume: self.volume,
        });
    }

    fn add_select(&mut self, select: &SelectStatement) {
        for item in &select.from {
            let description = match &item.source {
                TableSource::Subquery(_) => format!("Evaluate derived table {}", item.source_name()),
                _ => format!("Read {}", item.source_name()),
            };
            self.push("Scan", description, Some(DataVolume::Full));
        }
        if select.from.len() > 1 {
            let kinds: Vec<&str> = select
                .from
                .iter()
                .skip(1)
                .map(|item| item.join.as_ref().map_or("CROSS JOIN", |j| j.kind.as_str()))
                .collect();
            self.push("Join", kinds.join(", "), Some(DataVolume::Combined));
        }
        if let Some(condition) = &select.where_clause {
            self.push("Filter", format!("WHERE {condition}"), Some(DataVolume::Reduced));
        }
        if !select.group_by.is_empty() || select.has_aggregates() {
            let description = if select.group_by.is_empty() {
                "Aggregate all rows".to_string()
            } else {
                let keys: Vec<String> = select.group_by.iter().map(ToString::to_string).collect();
                format!("GROUP BY {}", keys.join(", "))
            };
            self.push("Aggregate", description, Some(DataVolume::Grouped));
        }
        if let Some(condition) = &select.having {
            self.push("Filter", format!("HAVING {condition}"), Some(DataVolume::Reduced));
        }
        if select.has_window_functions() {
            let calls: Vec<String> = select
                .columns
                .iter()
                .flat_map(|c| c.expr.window_calls())
                .map(Expr::to_string)
                .collect();
            self.push("Window", calls.join(", "), None);
        }
        if let Some(set_op) = &select.set_op {
            self.push("Combine", set_op.op.clone(), Some(DataVolume::Combined));
        }
        if !select.order_by.is_empty() {
            let keys: Vec<String> = select.order_by.iter().map(ToString::to_string).collect();
            self.push("Sort", format!("ORDER BY {}", keys.join(", ")), None);
        }
        if let Some(limit) = &select.limit {
            let volume = match limit.rows() {
                Some(rows) => DataVolume::Limited { rows },
                None => DataVolume::Reduced,
            };
            self.push("Limit", format!("LIMIT {}", limit.count), Some(volume));
        }
        if !select.columns.is_empty() {
            let description = if select.selects_star() {
                "Output all columns".to_string()
            } else {
                format!("Output {}", plural(select.columns.len(), "column"))
            };
            self.push("Project", description, None);
        }
    }
}

fn data_flow_steps(statement: &Statement) -> Vec<DataFlowStep> {
    let mut steps = StepList::new();
    match statement {
        Statement::Select(select) => steps.add_select(select),
        Statement::Insert(insert) => {
            if let Some(source) = &insert.source {
                steps.add_select(source);
            }
            steps.push("Insert", format!("Write rows into {}", insert.table), None);
        }
        Statement::Update(update) => {
            steps.push("Scan", format!("Read {}", update.table), Some(DataVolume::Full));
            if let Some(condition) = &update.where_clause {
                steps.push("Filter", format!("WHERE {condition}"), Some(DataVolume::Reduced));
            }
            steps.push("Update", format!("Modify rows in {}", update.table), None);
        }
        Statement::Delete(delete) => {
            steps.push("Scan", format!("Read {}", delete.table), Some(DataVolume::Full));
            if let Some(condition) = &delete.where_clause {
                steps.push("Filter", format!("WHERE {condition}"), Some(DataVolume::Reduced));
            }
            steps.push("Delete", format!("Remove rows from {}", delete.table), None);
        }
    }
    steps.steps
}
