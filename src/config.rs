//! Generator configuration.
//!
//! Everything here is plain serde data so it can travel alongside the
//! workflow JSON (see `wasm::generate_workflow`).

use serde::{Deserialize, Serialize};

use crate::context::EntityKind;
use crate::diagnostics::ErrorPolicy;
use crate::error::CompilerError;

/// What to do when an id is registered twice within one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnDuplicate {
    /// Abort context construction.
    Reject,
    /// Log a warning and keep the first registration.
    KeepFirst,
}

/// Duplicate-registration policy, one entry per entity kind.
///
/// The default rejects duplicate input and state variables and keeps the
/// first registration for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatePolicy {
    pub input_variable: OnDuplicate,
    pub state_variable: OnDuplicate,
    pub output_variable: OnDuplicate,
    pub node: OnDuplicate,
    pub port: OnDuplicate,
    pub trigger: OnDuplicate,
    pub secret: OnDuplicate,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            input_variable: OnDuplicate::Reject,
            state_variable: OnDuplicate::Reject,
            output_variable: OnDuplicate::KeepFirst,
            node: OnDuplicate::KeepFirst,
            port: OnDuplicate::KeepFirst,
            trigger: OnDuplicate::KeepFirst,
            secret: OnDuplicate::KeepFirst,
        }
    }
}

impl DuplicatePolicy {
    pub fn for_kind(&self, kind: EntityKind) -> OnDuplicate {
        match kind {
            EntityKind::InputVariable => self.input_variable,
            EntityKind::StateVariable => self.state_variable,
            EntityKind::OutputVariable => self.output_variable,
            EntityKind::Node => self.node,
            EntityKind::Port => self.port,
            EntityKind::Trigger => self.trigger,
            EntityKind::Secret => self.secret,
        }
    }

    /// Same action for every kind.
    pub fn uniform(action: OnDuplicate) -> Self {
        Self {
            input_variable: action,
            state_variable: action,
            output_variable: action,
            node: action,
            port: action,
            trigger: action,
            secret: action,
        }
    }
}

/// Formatting hints applied when rendering expressions to source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Render typed instantiations one argument per line, each followed by a comma.
    pub trailing_comma: bool,
    /// Spaces per indentation level.
    pub indent: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            trailing_comma: false,
            indent: 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Abort on the first dangling reference instead of degrading to `None`.
    pub strict: bool,
    pub duplicate_policy: DuplicatePolicy,
    pub render: RenderOptions,
    /// Top-level module for generated definitions. Falls back to the
    /// workflow's own `module_name`.
    pub root_module: Option<String>,
}

impl CodegenConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        if self.strict {
            ErrorPolicy::Strict
        } else {
            ErrorPolicy::Lenient
        }
    }

    /// Parse a config object. An empty string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| {
            CompilerError::parse("P002", format!("Failed to parse codegen config JSON: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_rejects_variable_duplicates_only() {
        let policy = DuplicatePolicy::default();
        assert_eq!(policy.for_kind(EntityKind::InputVariable), OnDuplicate::Reject);
        assert_eq!(policy.for_kind(EntityKind::StateVariable), OnDuplicate::Reject);
        assert_eq!(policy.for_kind(EntityKind::Node), OnDuplicate::KeepFirst);
        assert_eq!(policy.for_kind(EntityKind::Trigger), OnDuplicate::KeepFirst);
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config =
            CodegenConfig::from_json(r#"{"strict": true, "duplicate_policy": {"node": "REJECT"}}"#)
                .unwrap();
        assert!(config.strict);
        assert_eq!(config.duplicate_policy.node, OnDuplicate::Reject);
        assert_eq!(config.duplicate_policy.port, OnDuplicate::KeepFirst);
        assert_eq!(config.render.indent, 4);
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(CodegenConfig::from_json("  ").unwrap(), CodegenConfig::default());
    }

    #[test]
    fn malformed_config_is_parse_error() {
        let err = CodegenConfig::from_json("{").unwrap_err();
        assert_eq!(err.code, "P002");
    }
}
