//! Serde types for the workflow definition JSON.
//!
//! A `WorkflowDefinition` is recursive: map, subworkflow and tool-calling
//! nodes embed a complete nested definition.

use serde::{Deserialize, Serialize};

use super::descriptor::*;

// =============================================================================
// TOP-LEVEL WORKFLOW
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub label: String,
    /// Python module name for the generated package. Derived from `label` when absent.
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub input_variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub state_variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub output_variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub triggers: Vec<TriggerDefinition>,
    /// Secret metadata already fetched by the caller.
    #[serde(default)]
    pub workspace_secrets: Vec<WorkspaceSecret>,
    pub workflow_raw_data: WorkflowRawData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub id: String,
    pub key: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    #[serde(default)]
    pub default: Option<ConstantValue>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDefinition {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub attributes: Vec<VariableDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSecret {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRawData {
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
    #[serde(default)]
    pub output_values: Vec<OutputValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputValue {
    pub output_variable_id: String,
    pub value: WorkflowValueDescriptor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub id: String,
    pub source_node_id: String,
    #[serde(default)]
    pub source_handle_id: Option<String>,
    pub target_node_id: String,
    #[serde(default)]
    pub target_handle_id: Option<String>,
}

// =============================================================================
// NODES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Generic,
    Templating,
    Conditional,
    Map,
    Subworkflow,
    ToolCalling,
    SubworkflowDeployment,
    FinalOutput,
}

impl NodeType {
    /// Node types that embed a nested workflow definition.
    pub fn has_nested_workflow(self) -> bool {
        matches!(
            self,
            NodeType::Map | NodeType::Subworkflow | NodeType::ToolCalling
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
    /// Pointer-rule inputs (coalesced).
    #[serde(default)]
    pub inputs: Vec<NodeInput>,
    /// Descriptor-valued attributes.
    #[serde(default)]
    pub attributes: Vec<NodeAttribute>,
    #[serde(default)]
    pub outputs: Vec<NodeOutputDefinition>,
    #[serde(default)]
    pub ports: Vec<NodePortDefinition>,
    /// Only meaningful on `CONDITIONAL` nodes.
    #[serde(default)]
    pub conditions: Vec<NodeCondition>,
    #[serde(default)]
    pub subworkflow: Option<Box<WorkflowDefinition>>,
    #[serde(default)]
    pub deployment: Option<DeploymentMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAttribute {
    pub id: String,
    pub name: String,
    pub value: WorkflowValueDescriptor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutputDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_output_type")]
    pub var_type: VariableType,
}

fn default_output_type() -> VariableType {
    VariableType::Json
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortType {
    #[default]
    Default,
    If,
    Elif,
    Else,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePortDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub port_type: PortType,
}

/// Metadata of a deployed workflow, fetched by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentMetadata {
    pub name: String,
    #[serde(default = "default_release_tag")]
    pub release_tag: String,
    #[serde(default)]
    pub outputs: Vec<NodeOutputDefinition>,
}

fn default_release_tag() -> String {
    "LATEST".into()
}
