//! Output formatting modules.

pub mod json;
pub mod table;

pub use json::format_json;
pub use table::format_table;

use queryflow_core::AnalyzeResult;

/// Analysis of one input file (or stdin).
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub name: String,
    pub result: AnalyzeResult,
}
