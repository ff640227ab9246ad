//! Column-level lineage.
//!
//! Two products are derived per statement:
//!
//! - [`extract_column_lineage`]: the immediate source columns of each SELECT output,
//!   read straight from the AST.
//! - [`generate_column_flows`]: the full chain from a source table through every graph
//!   stage to each output column, recovered by walking the operator graph backwards.

mod extract;
mod flow;

pub use extract::{extract_column_lineage, UNKNOWN_TABLE};
pub use flow::{find_source_column, generate_column_flows, transformation_for, LineageTracer};
