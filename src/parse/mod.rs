//! Parse phase: JSON → Rust types + graph construction.

pub mod descriptor;
pub mod graph;
pub mod types;

pub use descriptor::*;
pub use graph::WorkflowGraph;
pub use types::*;

use crate::error::CompilerError;

/// Deserialize a workflow definition JSON string.
pub fn parse(json: &str) -> Result<WorkflowDefinition, Vec<CompilerError>> {
    serde_json::from_str::<WorkflowDefinition>(json).map_err(|e| {
        vec![CompilerError::parse(
            "P001",
            format!("Failed to parse workflow JSON: {}", e),
        )]
    })
}
