//! Legacy compatibility coercions.
//!
//! Older workflow data stores numeric comparison operands as strings and
//! relies on node-output null checks mapping to `is_nil`. These rules are
//! kept here, apart from the builders, so they can be audited and retired
//! on their own.

use crate::context::{InputVariableContext, NodeContext, Registry, ScopeId};
use crate::error::GenerationError;
use crate::parse::{
    BinaryOperator, ConstantValue, UnaryOperator, VariableType, WorkflowValueDescriptor,
};

/// Best-effort static type of a descriptor.
///
/// Constant type, then node output type, then input variable type; execution
/// counters are numbers and secrets are strings. Anything else is JSON.
pub fn infer_type(registry: &Registry, scope: ScopeId, descriptor: &WorkflowValueDescriptor) -> VariableType {
    match descriptor {
        WorkflowValueDescriptor::ConstantValue { value } => value.variable_type(),
        WorkflowValueDescriptor::NodeOutput {
            node_id,
            node_output_id,
        } => registry
            .find::<NodeContext>(scope, node_id)
            .and_then(|node| node.output(node_output_id))
            .map(|output| output.var_type)
            .unwrap_or(VariableType::Json),
        WorkflowValueDescriptor::WorkflowInput { input_variable_id } => registry
            .find::<InputVariableContext>(scope, input_variable_id)
            .map(|var| var.var_type)
            .unwrap_or(VariableType::Json),
        WorkflowValueDescriptor::ExecutionCounter { .. } => VariableType::Number,
        WorkflowValueDescriptor::WorkspaceSecret { .. } => VariableType::String,
        _ => VariableType::Json,
    }
}

/// Whether `operator` expects a numeric right operand given the left operand's type.
pub fn wants_numeric_rhs(operator: BinaryOperator, lhs_type: VariableType) -> bool {
    operator.is_numeric_comparison() || (operator.is_equality() && lhs_type == VariableType::Number)
}

pub fn parse_number(value: &str, field: &str) -> Result<f64, GenerationError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| GenerationError::ValueGeneration {
            value: value.into(),
            field: field.into(),
        })
}

/// A numeric replacement for a constant string right operand, when one is due.
///
/// `Ok(None)` means leave the operand alone.
pub fn coerce_rhs(
    operator: BinaryOperator,
    lhs_type: VariableType,
    rhs: &WorkflowValueDescriptor,
    field: &str,
) -> Result<Option<WorkflowValueDescriptor>, GenerationError> {
    if !wants_numeric_rhs(operator, lhs_type) {
        return Ok(None);
    }
    let WorkflowValueDescriptor::ConstantValue {
        value: ConstantValue::String { value: Some(text) },
    } = rhs
    else {
        return Ok(None);
    };
    let number = parse_number(text, field)?;
    Ok(Some(WorkflowValueDescriptor::constant(ConstantValue::number(number))))
}

/// Null checks on a node output use the `is_nil` family.
pub fn null_check_method(operator: UnaryOperator, lhs: &WorkflowValueDescriptor) -> Option<&'static str> {
    let on_node_output = matches!(lhs, WorkflowValueDescriptor::NodeOutput { .. });
    match operator {
        UnaryOperator::Null if on_node_output => Some("is_nil"),
        UnaryOperator::NotNull if on_node_output => Some("is_not_nil"),
        UnaryOperator::Null => Some("is_null"),
        UnaryOperator::NotNull => Some("is_not_null"),
        _ => None,
    }
}
