//! Resolved entities stored in the registry, one table per kind.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Scope;
use crate::parse::{ConstantValue, Definition, DeploymentMetadata, NodeType, PortType, VariableType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    InputVariable,
    StateVariable,
    OutputVariable,
    Node,
    Port,
    Trigger,
    Secret,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::InputVariable => "input variable",
            EntityKind::StateVariable => "state variable",
            EntityKind::OutputVariable => "output variable",
            EntityKind::Node => "node",
            EntityKind::Port => "port",
            EntityKind::Trigger => "trigger",
            EntityKind::Secret => "workspace secret",
        };
        write!(f, "{}", name)
    }
}

/// An entity that can be registered in a scope and looked up by id.
pub trait Entity: Sized {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn table(scope: &Scope) -> &IndexMap<String, Self>;
    fn table_mut(scope: &mut Scope) -> &mut IndexMap<String, Self>;
}

macro_rules! entity {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn table(scope: &Scope) -> &IndexMap<String, Self> {
                &scope.$field
            }

            fn table_mut(scope: &mut Scope) -> &mut IndexMap<String, Self> {
                &mut scope.$field
            }
        }
    };
}

// =============================================================================
// VARIABLES
// =============================================================================

#[derive(Debug, Clone)]
pub struct InputVariableContext {
    pub id: String,
    pub key: String,
    /// Attribute name on the generated `Inputs` class.
    pub name: String,
    pub var_type: VariableType,
    pub default: Option<ConstantValue>,
    pub required: bool,
    pub definition: Definition,
}

#[derive(Debug, Clone)]
pub struct StateVariableContext {
    pub id: String,
    pub key: String,
    pub name: String,
    pub var_type: VariableType,
    pub default: Option<ConstantValue>,
    pub definition: Definition,
}

#[derive(Debug, Clone)]
pub struct OutputVariableContext {
    pub id: String,
    pub key: String,
    pub name: String,
    pub var_type: VariableType,
    /// The workflow class whose `Outputs` carry this variable.
    pub definition: Definition,
}

entity!(InputVariableContext, EntityKind::InputVariable, input_variables);
entity!(StateVariableContext, EntityKind::StateVariable, state_variables);
entity!(OutputVariableContext, EntityKind::OutputVariable, output_variables);

// =============================================================================
// NODES & PORTS
// =============================================================================

#[derive(Debug, Clone)]
pub struct NodeOutputContext {
    pub id: String,
    /// Output name as declared.
    pub key: String,
    /// Attribute name on the node's `Outputs` class.
    pub name: String,
    pub var_type: VariableType,
}

#[derive(Debug, Clone)]
pub struct NodeContext {
    pub id: String,
    pub label: String,
    pub node_type: NodeType,
    pub definition: Definition,
    /// Position in the global emission order.
    pub order: u64,
    pub scope: super::ScopeId,
    pub outputs: IndexMap<String, NodeOutputContext>,
    pub port_ids: Vec<String>,
    pub nested_scope: Option<super::ScopeId>,
    pub deployment: Option<DeploymentMetadata>,
}

impl NodeContext {
    pub fn output(&self, output_id: &str) -> Option<&NodeOutputContext> {
        self.outputs.get(output_id)
    }

    pub fn output_by_key(&self, key: &str) -> Option<&NodeOutputContext> {
        self.outputs.values().find(|o| o.key == key)
    }

    pub fn is_deployment(&self) -> bool {
        self.node_type == NodeType::SubworkflowDeployment
    }

    /// Whether output ids may differ from the ids the workflow was authored against.
    pub fn exposes_foreign_outputs(&self) -> bool {
        self.nested_scope.is_some() || self.deployment.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct PortContext {
    pub id: String,
    pub name: String,
    pub node_id: String,
    pub port_type: PortType,
}

entity!(NodeContext, EntityKind::Node, nodes);
entity!(PortContext, EntityKind::Port, ports);

// =============================================================================
// TRIGGERS & SECRETS
// =============================================================================

#[derive(Debug, Clone)]
pub struct TriggerAttributeContext {
    pub id: String,
    pub key: String,
    pub name: String,
    pub var_type: VariableType,
}

#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub id: String,
    pub label: String,
    pub definition: Definition,
    pub attributes: IndexMap<String, TriggerAttributeContext>,
}

#[derive(Debug, Clone)]
pub struct SecretContext {
    pub id: String,
    pub name: String,
}

entity!(TriggerContext, EntityKind::Trigger, triggers);
entity!(SecretContext, EntityKind::Secret, secrets);
