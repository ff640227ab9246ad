#![no_main]

use libfuzzer_sys::fuzz_target;
use queryflow_core::ast::Statement;
use queryflow_core::{analyze_ast, AnalysisOptions};

// Loosely-typed AST input must never panic, whatever its shape.
fuzz_target!(|data: &[u8]| {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Ok(statement) = Statement::from_json(&value) {
            let _ = analyze_ast(&statement, &AnalysisOptions::default());
        }
    }
});
