//! JSON output formatting.

use serde_json::{json, Value};

use super::SourceReport;

/// Format the reports as JSON.
///
/// A single input prints its `AnalyzeResult` directly; several inputs print an array of
/// `{ "source": <name>, "result": <AnalyzeResult> }` objects. If `compact` is true,
/// outputs minified JSON without whitespace.
pub fn format_json(reports: &[SourceReport], compact: bool) -> serde_json::Result<String> {
    let value = match reports {
        [single] => serde_json::to_value(&single.result)?,
        many => Value::Array(
            many.iter()
                .map(|report| {
                    Ok(json!({
                        "source": report.name,
                        "result": serde_json::to_value(&report.result)?,
                    }))
                })
                .collect::<serde_json::Result<Vec<_>>>()?,
        ),
    };
    if compact {
        serde_json::to_string(&value)
    } else {
        serde_json::to_string_pretty(&value)
    }
}
