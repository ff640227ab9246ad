#![no_main]

use libfuzzer_sys::fuzz_target;
use queryflow_core::{analyze, AnalyzeRequest, Dialect, Transformation};

fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        let result = analyze(&AnalyzeRequest::new(sql, Dialect::Generic));

        for statement in &result.statements {
            assert!(!statement.nodes.is_empty());
            for flow in &statement.column_flows {
                let mut ids: Vec<&str> =
                    flow.lineage_path.iter().map(|s| s.node_id.as_str()).collect();
                let len = ids.len();
                ids.sort_unstable();
                ids.dedup();
                assert_eq!(ids.len(), len, "lineage path revisits a node");
                if let Some(origin) = flow.origin() {
                    assert_eq!(origin.transformation, Transformation::Source);
                }
            }
        }
    }
});
