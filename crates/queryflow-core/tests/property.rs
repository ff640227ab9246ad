use std::collections::HashSet;

use proptest::prelude::*;
use queryflow_core::{
    analyze, AnalyzeRequest, AnalyzeResult, Dialect, NodeType, StatementFlow, Transformation,
};

fn run(sql: &str) -> AnalyzeResult {
    analyze(&AnalyzeRequest::new(sql, Dialect::Generic))
}

fn single(result: &AnalyzeResult) -> &StatementFlow {
    assert_eq!(result.statements.len(), 1, "issues: {:?}", result.issues);
    &result.statements[0]
}

proptest! {
    #[test]
    fn select_pipeline_ends_in_select(
        table in "t_[a-z]{1,8}",
        columns in prop::collection::vec("c_[a-z]{1,6}", 1..5),
        filtered in any::<bool>(),
    ) {
        let mut sql = format!("SELECT {} FROM {table}", columns.join(", "));
        if filtered {
            sql.push_str(&format!(" WHERE {} IS NOT NULL", columns[0]));
        }
        let result = run(&sql);
        prop_assert!(!result.summary.has_errors, "issues: {:?}", result.issues);

        let statement = single(&result);
        prop_assert!(!statement.nodes.is_empty());
        prop_assert_eq!(statement.nodes.last().map(|n| n.node_type), Some(NodeType::Select));
        prop_assert_eq!(statement.nodes[0].node_type, NodeType::Table);
    }

    #[test]
    fn lineage_paths_start_at_source_and_never_repeat_nodes(
        table_a in "t_[a-z]{1,8}",
        table_b in "u_[a-z]{1,8}",
        col_a in "c_[a-z]{1,6}",
        col_b in "d_[a-z]{1,6}",
    ) {
        let sql = format!(
            "SELECT a.{col_a}, b.{col_b}, a.{col_a} + 1 AS bumped \
             FROM {table_a} a JOIN {table_b} b ON a.{col_a} = b.{col_b} \
             WHERE b.{col_b} > 0 ORDER BY a.{col_a} LIMIT 10"
        );
        let result = run(&sql);
        let statement = single(&result);
        prop_assert_eq!(statement.column_flows.len(), 3);

        for flow in &statement.column_flows {
            let ids: HashSet<&str> = flow.lineage_path.iter().map(|s| s.node_id.as_str()).collect();
            prop_assert_eq!(ids.len(), flow.lineage_path.len());
            prop_assert_eq!(flow.lineage_path[0].transformation, Transformation::Source);
        }
        prop_assert_eq!(&statement.column_flows[0].lineage_path[0].node_name, &table_a);
        prop_assert_eq!(&statement.column_flows[1].lineage_path[0].node_name, &table_b);

        let lineage = &statement.column_lineage[1];
        prop_assert_eq!(lineage.sources.len(), 1);
        prop_assert_eq!(&lineage.sources[0].table, &table_b);
        prop_assert_eq!(&lineage.sources[0].column, &col_b);
    }

    #[test]
    fn group_keys_pass_through_aggregates(
        table in "t_[a-z]{1,8}",
        key in "k_[a-z]{1,6}",
        value in "v_[a-z]{1,6}",
    ) {
        let sql = format!(
            "SELECT {key}, COUNT({value}) AS value_count FROM {table} GROUP BY {key}"
        );
        let result = run(&sql);
        let statement = single(&result);

        let key_flow = statement
            .column_flows
            .iter()
            .find(|f| f.output_column == key)
            .unwrap();
        prop_assert!(key_flow
            .lineage_path
            .iter()
            .all(|s| s.transformation != Transformation::Aggregated));
        let aggregate_step = key_flow
            .lineage_path
            .iter()
            .find(|s| s.node_type == NodeType::Aggregate)
            .unwrap();
        prop_assert_eq!(aggregate_step.transformation, Transformation::Passthrough);

        let count_flow = statement
            .column_flows
            .iter()
            .find(|f| f.output_column == "value_count")
            .unwrap();
        prop_assert_eq!(
            count_flow.lineage_path.last().map(|s| s.transformation),
            Some(Transformation::Aggregated)
        );
        prop_assert_eq!(&count_flow.lineage_path[0].column_name, &value);
    }

    #[test]
    fn analysis_is_repeatable(
        table in "t_[a-z]{1,8}",
        column in "c_[a-z]{1,6}",
        limit in 1u32..500,
    ) {
        let sql = format!(
            "WITH base AS (SELECT {column} FROM {table}) \
             SELECT {column} FROM base ORDER BY {column} LIMIT {limit}"
        );
        let first = serde_json::to_value(run(&sql)).unwrap();
        let second = serde_json::to_value(run(&sql)).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn arbitrary_text_never_panics(sql in "\\PC{0,80}") {
        let result = run(&sql);
        prop_assert_eq!(result.summary.statement_count, result.statements.len());
    }
}
