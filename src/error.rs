//! Error types shared across all phases.
//!
//! `GenerationError` is what the resolvers return. Whether a given error
//! aborts generation or degrades to a diagnostic is decided in one place,
//! the collector in `crate::diagnostics`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Every failure the reference resolvers and expression builders can produce.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("Could not find node with id '{node_id}'")]
    NodeNotFound { node_id: String },

    #[error("Could not find output '{output_id}' on node '{node_id}'")]
    NodeOutputNotFound { node_id: String, output_id: String },

    #[error("Could not find output '{output_id}' on subworkflow deployment node '{node_id}'")]
    DeploymentOutputNotFound { node_id: String, output_id: String },

    #[error("Could not find input variable with id '{id}'")]
    InputVariableNotFound { id: String },

    #[error("Could not find state variable with id '{id}'")]
    StateVariableNotFound { id: String },

    #[error("Could not find output variable with id '{id}'")]
    OutputVariableNotFound { id: String },

    #[error("Could not find workspace secret with id '{id}'")]
    SecretNotFound { id: String },

    #[error("Environment variable reference is missing a variable name")]
    EnvironmentVariableMissing,

    #[error("Could not find trigger with id '{trigger_id}'")]
    TriggerNotFound { trigger_id: String },

    #[error("Could not find attribute '{attribute_id}' on trigger '{trigger_id}'")]
    TriggerAttributeNotFound {
        trigger_id: String,
        attribute_id: String,
    },

    #[error("Could not find port '{port_id}' on node '{node_id}'")]
    PortNotFound { node_id: String, port_id: String },

    #[error("Rule '{rule_id}' is missing its {operand}")]
    MissingOperand { rule_id: String, operand: String },

    #[error("Rule '{rule_id}' references node input '{input_id}' which does not exist")]
    ConditionInputNotFound { rule_id: String, input_id: String },

    #[error("Failed to parse {field} value '{value}' as a number")]
    ValueGeneration { value: String, field: String },

    #[error("Unknown operator '{operator}'")]
    UnknownOperator { operator: String },

    #[error("Duplicate {kind} id '{id}'")]
    DuplicateEntity { kind: EntityKind, id: String },

    #[error("Malformed {what}: {reason}")]
    Malformed { what: String, reason: String },
}

impl GenerationError {
    /// Stable code used in diagnostics and `CompilerError` records.
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::NodeNotFound { .. } => "R001",
            GenerationError::NodeOutputNotFound { .. } => "R002",
            GenerationError::DeploymentOutputNotFound { .. } => "R003",
            GenerationError::InputVariableNotFound { .. } => "R004",
            GenerationError::StateVariableNotFound { .. } => "R005",
            GenerationError::OutputVariableNotFound { .. } => "R006",
            GenerationError::SecretNotFound { .. } => "R007",
            GenerationError::EnvironmentVariableMissing => "R008",
            GenerationError::TriggerNotFound { .. } => "R009",
            GenerationError::TriggerAttributeNotFound { .. } => "R010",
            GenerationError::PortNotFound { .. } => "R011",
            GenerationError::MissingOperand { .. } => "R012",
            GenerationError::ConditionInputNotFound { .. } => "R013",
            GenerationError::ValueGeneration { .. } => "R014",
            GenerationError::UnknownOperator { .. } => "R015",
            GenerationError::DuplicateEntity { .. } => "R016",
            GenerationError::Malformed { .. } => "R017",
        }
    }

    /// Dangling references are warnings; malformed values are errors.
    pub fn severity(&self) -> Severity {
        match self {
            GenerationError::ValueGeneration { .. }
            | GenerationError::UnknownOperator { .. }
            | GenerationError::DuplicateEntity { .. }
            | GenerationError::Malformed { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }

    /// Schema contract breaches are never recoverable, strict or not.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            GenerationError::UnknownOperator { .. } | GenerationError::DuplicateEntity { .. }
        )
    }

    /// The node the error is about, when there is one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            GenerationError::NodeNotFound { node_id }
            | GenerationError::NodeOutputNotFound { node_id, .. }
            | GenerationError::DeploymentOutputNotFound { node_id, .. }
            | GenerationError::PortNotFound { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Parse,
    Context,
    Resolve,
    Codegen,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Parse => write!(f, "Parse"),
            Phase::Context => write!(f, "Context"),
            Phase::Resolve => write!(f, "Resolve"),
            Phase::Codegen => write!(f, "Codegen"),
        }
    }
}

/// A phase-tagged error record returned from the public pipeline entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerError {
    pub code: String,
    pub phase: Phase,
    pub message: String,
    pub node_id: Option<String>,
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node_id {
            Some(id) => write!(
                f,
                "[{}:{}] {} (node '{}')",
                self.phase, self.code, self.message, id
            ),
            None => write!(f, "[{}:{}] {}", self.phase, self.code, self.message),
        }
    }
}

impl std::error::Error for CompilerError {}

impl From<GenerationError> for CompilerError {
    fn from(e: GenerationError) -> Self {
        CompilerError::generation(Phase::Resolve, e)
    }
}

impl CompilerError {
    pub fn parse(code: &str, message: impl Into<String>) -> Self {
        CompilerError {
            code: code.into(),
            phase: Phase::Parse,
            message: message.into(),
            node_id: None,
        }
    }

    pub fn generation(phase: Phase, e: GenerationError) -> Self {
        CompilerError {
            code: e.code().into(),
            phase,
            node_id: e.node_id().map(str::to_string),
            message: e.to_string(),
        }
    }
}
