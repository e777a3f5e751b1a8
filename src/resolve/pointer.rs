//! One pointer rule or reference leaf → `Expr`.

use tracing::trace;

use super::ExpressionBuilder;
use super::descriptor::DescriptorMode;
use crate::ast::{Arg, Expr, sdk};
use crate::context::{
    InputVariableContext, NodeContext, NodeOutputContext, OutputVariableContext, SecretContext,
    StateVariableContext, TriggerContext,
};
use crate::error::GenerationError;
use crate::parse::{ConstantValue, PointerRule, WorkflowValueDescriptor};

/// A rule resolved to an expression, before any lazy wrapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRule {
    pub expr: Expr,
    /// The node the rule reads from.
    pub node_id: Option<String>,
    /// The referenced node is not emitted before the current node.
    pub forward: bool,
}

impl ResolvedRule {
    fn value(expr: Expr) -> Self {
        ResolvedRule {
            expr,
            node_id: None,
            forward: false,
        }
    }

    /// The expression, wrapped in a thunk if it is a forward reference.
    pub fn into_expr(self) -> Expr {
        if self.forward { self.expr.lazy() } else { self.expr }
    }
}

impl<'a> ExpressionBuilder<'a> {
    /// Build a single pointer rule. A dangling reference becomes `None`.
    pub fn build_pointer_rule(&mut self, rule: &PointerRule) -> Result<Expr, GenerationError> {
        let resolved = self.resolve_rule(rule).map(ResolvedRule::into_expr);
        self.or_sentinel(resolved, Expr::None)
    }

    /// Resolve a rule without reporting. `Err` carries the unreported failure.
    pub fn resolve_rule(&mut self, rule: &PointerRule) -> Result<ResolvedRule, GenerationError> {
        trace!(?rule, "resolving pointer rule");
        match rule {
            PointerRule::ConstantValue(value) => {
                Ok(ResolvedRule::value(self.constant_expr(value, DescriptorMode::Value)?))
            }
            PointerRule::NodeOutput(p) => self.node_output_leaf(&p.node_id, &p.output_id),
            PointerRule::InputVariable(p) => self.input_leaf(&p.input_variable_id),
            PointerRule::WorkflowState(p) => self.state_leaf(&p.state_variable_id),
            PointerRule::WorkspaceSecret(p) => self.secret_leaf(p.workspace_secret_id.as_deref()),
            PointerRule::EnvironmentVariable(p) => {
                self.environment_leaf(p.environment_variable.as_deref())
            }
            PointerRule::ExecutionCounter(p) => self.execution_counter_leaf(&p.node_id),
            PointerRule::TriggerAttribute(p) => self.trigger_attribute_leaf(&p.trigger_id, &p.attribute_id),
        }
    }

    // =========================================================================
    // LEAVES
    // =========================================================================

    pub(crate) fn node_output_leaf(
        &mut self,
        node_id: &str,
        output_id: &str,
    ) -> Result<ResolvedRule, GenerationError> {
        let node = self.node(node_id)?;
        let output = self.resolve_output(node, output_id)?;
        Ok(ResolvedRule {
            expr: Expr::reference(&node.definition)
                .attr("Outputs")
                .attr(&output.name),
            node_id: Some(node.id.clone()),
            forward: self.is_forward(node),
        })
    }

    pub(crate) fn input_leaf(&mut self, id: &str) -> Result<ResolvedRule, GenerationError> {
        let var = self
            .registry
            .find::<InputVariableContext>(self.scope, id)
            .ok_or_else(|| GenerationError::InputVariableNotFound { id: id.into() })?;
        Ok(ResolvedRule::value(
            Expr::reference(&var.definition).attr(&var.name),
        ))
    }

    pub(crate) fn state_leaf(&mut self, id: &str) -> Result<ResolvedRule, GenerationError> {
        let var = self
            .registry
            .find::<StateVariableContext>(self.scope, id)
            .ok_or_else(|| GenerationError::StateVariableNotFound { id: id.into() })?;
        Ok(ResolvedRule::value(
            Expr::reference(&var.definition).attr(&var.name),
        ))
    }

    pub(crate) fn secret_leaf(&mut self, id: Option<&str>) -> Result<ResolvedRule, GenerationError> {
        let id = id.unwrap_or_default();
        let secret = self
            .registry
            .find::<SecretContext>(self.scope, id)
            .ok_or_else(|| GenerationError::SecretNotFound { id: id.into() })?;
        Ok(ResolvedRule::value(
            Expr::Reference(sdk::secret_reference()).call(vec![Arg::Positional(Expr::str(&secret.name))]),
        ))
    }

    pub(crate) fn environment_leaf(&mut self, name: Option<&str>) -> Result<ResolvedRule, GenerationError> {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .ok_or(GenerationError::EnvironmentVariableMissing)?;
        Ok(ResolvedRule::value(
            Expr::Reference(sdk::environment_variable_reference())
                .call(vec![Arg::named("name", Expr::str(name))]),
        ))
    }

    pub(crate) fn execution_counter_leaf(&mut self, node_id: &str) -> Result<ResolvedRule, GenerationError> {
        let node = self.node(node_id)?;
        Ok(ResolvedRule {
            expr: Expr::reference(&node.definition).attr("Execution").attr("count"),
            node_id: Some(node.id.clone()),
            forward: self.is_forward(node),
        })
    }

    pub(crate) fn trigger_attribute_leaf(
        &mut self,
        trigger_id: &str,
        attribute_id: &str,
    ) -> Result<ResolvedRule, GenerationError> {
        let trigger = self
            .registry
            .find::<TriggerContext>(self.scope, trigger_id)
            .ok_or_else(|| GenerationError::TriggerNotFound {
                trigger_id: trigger_id.into(),
            })?;
        let attribute = trigger.attributes.get(attribute_id).ok_or_else(|| {
            GenerationError::TriggerAttributeNotFound {
                trigger_id: trigger_id.into(),
                attribute_id: attribute_id.into(),
            }
        })?;
        Ok(ResolvedRule::value(
            Expr::reference(&trigger.definition).attr(&attribute.name),
        ))
    }

    /// A typed literal. JSON holding a serialized descriptor is built as one.
    pub(crate) fn constant_expr(
        &mut self,
        value: &ConstantValue,
        mode: DescriptorMode,
    ) -> Result<Expr, GenerationError> {
        if let ConstantValue::Json { value: json } = value {
            if let Some(nested) = WorkflowValueDescriptor::from_json(json) {
                return self.build_descriptor_in(&nested, mode);
            }
        }
        let literal = literal_expr(value);
        Ok(match mode {
            DescriptorMode::Value => literal,
            DescriptorMode::ReferenceObject => Expr::Reference(sdk::constant_value_reference())
                .call(vec![Arg::Positional(literal)]),
        })
    }

    // =========================================================================
    // NODES
    // =========================================================================

    fn node(&self, node_id: &str) -> Result<&'a NodeContext, GenerationError> {
        self.registry
            .find::<NodeContext>(self.scope, node_id)
            .ok_or_else(|| GenerationError::NodeNotFound {
                node_id: node_id.into(),
            })
    }

    /// The declared output `output_id` of `node`.
    ///
    /// Nodes wrapping another workflow may be referenced through that
    /// workflow's output-variable id; those are matched by key instead.
    pub fn resolve_output(
        &self,
        node: &'a NodeContext,
        output_id: &str,
    ) -> Result<&'a NodeOutputContext, GenerationError> {
        if let Some(output) = node.output(output_id) {
            return Ok(output);
        }
        if node.exposes_foreign_outputs() {
            let scope = node.nested_scope.unwrap_or(self.scope);
            let by_key = self
                .registry
                .find::<OutputVariableContext>(scope, output_id)
                .and_then(|var| node.output_by_key(&var.key));
            if let Some(output) = by_key {
                return Ok(output);
            }
        }
        if node.is_deployment() {
            Err(GenerationError::DeploymentOutputNotFound {
                node_id: node.id.clone(),
                output_id: output_id.into(),
            })
        } else {
            Err(GenerationError::NodeOutputNotFound {
                node_id: node.id.clone(),
                output_id: output_id.into(),
            })
        }
    }

    /// Self references and references to later nodes must be deferred.
    pub(crate) fn is_forward(&self, target: &NodeContext) -> bool {
        self.current_node
            .is_some_and(|current| !self.registry.is_emitted_before(target, current))
    }
}

fn literal_expr(value: &ConstantValue) -> Expr {
    match value {
        ConstantValue::String { value } => value.as_deref().map(Expr::str).unwrap_or(Expr::None),
        ConstantValue::Number { value } => value.map(Expr::number).unwrap_or(Expr::None),
        ConstantValue::Json { value } => Expr::from_json(value),
        ConstantValue::Array { value } => Expr::List(value.iter().map(literal_expr).collect()),
        ConstantValue::Error { value: None } => Expr::None,
        ConstantValue::Error { value: Some(err) } => {
            let mut args = vec![Arg::named("message", Expr::str(&err.message))];
            if let Some(code) = &err.code {
                args.push(Arg::named("code", Expr::str(code)));
            }
            Expr::Reference(sdk::workflow_error()).call(args)
        }
    }
}
