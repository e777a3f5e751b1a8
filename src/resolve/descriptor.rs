//! Recursive builder over `WorkflowValueDescriptor`.
//!
//! Two modes share one traversal. `Value` evaluates the descriptor inline;
//! `ReferenceObject` emits it as data for a reference-holding container, so
//! literals and compositions are wrapped in their reference classes.

use super::{ExpressionBuilder, ResolvedRule};
use super::legacy;
use crate::ast::{Arg, Expr, sdk};
use crate::context::naming;
use crate::error::GenerationError;
use crate::parse::{
    Definition, DictionaryEntry, UnaryOperator, WorkflowValueDescriptor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorMode {
    Value,
    ReferenceObject,
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Instantiate this class for a dictionary, overriding the descriptor's own definition.
    pub definition_override: Option<Definition>,
    /// Lay typed instantiations out one argument per line.
    pub trailing_comma: bool,
}

impl<'a> ExpressionBuilder<'a> {
    pub fn build_descriptor(&mut self, descriptor: &WorkflowValueDescriptor) -> Result<Expr, GenerationError> {
        self.build_descriptor_with(descriptor, DescriptorMode::Value, &BuildOptions::default())
    }

    pub fn build_descriptor_reference(
        &mut self,
        descriptor: &WorkflowValueDescriptor,
    ) -> Result<Expr, GenerationError> {
        self.build_descriptor_with(
            descriptor,
            DescriptorMode::ReferenceObject,
            &BuildOptions::default(),
        )
    }

    pub(crate) fn build_descriptor_in(
        &mut self,
        descriptor: &WorkflowValueDescriptor,
        mode: DescriptorMode,
    ) -> Result<Expr, GenerationError> {
        self.build_descriptor_with(descriptor, mode, &BuildOptions::default())
    }

    /// Options apply to the outermost descriptor only.
    pub fn build_descriptor_with(
        &mut self,
        descriptor: &WorkflowValueDescriptor,
        mode: DescriptorMode,
        opts: &BuildOptions,
    ) -> Result<Expr, GenerationError> {
        use WorkflowValueDescriptor as D;

        let leaf = match descriptor {
            D::ConstantValue { value } => return self.constant_expr(value, mode),
            D::NodeOutput {
                node_id,
                node_output_id,
            } => self.node_output_leaf(node_id, node_output_id),
            D::WorkflowInput { input_variable_id } => self.input_leaf(input_variable_id),
            D::WorkflowState { state_variable_id } => self.state_leaf(state_variable_id),
            D::WorkspaceSecret { workspace_secret_id } => {
                self.secret_leaf(workspace_secret_id.as_deref())
            }
            D::EnvironmentVariable {
                environment_variable,
            } => self.environment_leaf(environment_variable.as_deref()),
            D::ExecutionCounter { node_id } => self.execution_counter_leaf(node_id),
            D::TriggerAttribute {
                trigger_id,
                attribute_id,
            } => self.trigger_attribute_leaf(trigger_id, attribute_id),
            D::DictionaryReference { entries, definition } => {
                let definition = opts.definition_override.as_ref().or(definition.as_ref());
                return self.dictionary(entries, definition, mode, opts.trailing_comma);
            }
            D::ArrayReference { items } => {
                let items = items
                    .iter()
                    .map(|item| self.build_descriptor_in(item, mode))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(match mode {
                    DescriptorMode::Value => Expr::List(items),
                    DescriptorMode::ReferenceObject => Expr::Reference(sdk::array_reference())
                        .call(vec![Arg::Positional(Expr::List(items))]),
                });
            }
            D::UnaryExpression { operator, lhs } => {
                let operand = self.operand(lhs, mode)?;
                let method = legacy::null_check_method(*operator, lhs).unwrap_or(unary_method(*operator));
                return Ok(operand.method(method, vec![]));
            }
            D::BinaryExpression { operator, lhs, rhs } => {
                let operand = self.operand(lhs, mode)?;
                let rhs = self.coerced_rhs(*operator, lhs, rhs, "rhs")?;
                let rhs = self.build_descriptor_in(&rhs, mode)?;
                return Ok(operand.method(operator.method(), vec![rhs]));
            }
            D::TernaryExpression {
                operator,
                base,
                lhs,
                rhs,
            } => {
                let base = self.operand(base, mode)?;
                let lhs = self.build_descriptor_in(lhs, mode)?;
                let rhs = self.build_descriptor_in(rhs, mode)?;
                return Ok(base.method(operator.method(), vec![lhs, rhs]));
            }
        };
        self.or_sentinel(leaf.map(ResolvedRule::into_expr), Expr::None)
    }

    /// The receiver of an operator method. Bare literals have no methods, so
    /// they are wrapped in a constant reference.
    fn operand(&mut self, descriptor: &WorkflowValueDescriptor, mode: DescriptorMode) -> Result<Expr, GenerationError> {
        let expr = self.build_descriptor_in(descriptor, mode)?;
        Ok(wrap_literal(expr))
    }

    /// The right operand after legacy numeric coercion. A value that cannot
    /// be coerced is reported and left as it was.
    fn coerced_rhs(
        &mut self,
        operator: crate::parse::BinaryOperator,
        lhs: &WorkflowValueDescriptor,
        rhs: &WorkflowValueDescriptor,
        field: &str,
    ) -> Result<WorkflowValueDescriptor, GenerationError> {
        let lhs_type = legacy::infer_type(self.registry, self.scope, lhs);
        match legacy::coerce_rhs(operator, lhs_type, rhs, field) {
            Ok(Some(coerced)) => Ok(coerced),
            Ok(None) => Ok(rhs.clone()),
            Err(err) => {
                self.report(err)?;
                Ok(rhs.clone())
            }
        }
    }

    fn dictionary(
        &mut self,
        entries: &[DictionaryEntry],
        definition: Option<&Definition>,
        mode: DescriptorMode,
        trailing_comma: bool,
    ) -> Result<Expr, GenerationError> {
        match definition {
            Some(def) => {
                let mut args = Vec::with_capacity(entries.len());
                let mut names = naming::UniqueNames::new();
                for entry in entries {
                    // Explicit nulls would only override the class defaults.
                    if entry.value.is_constant_json_null() {
                        continue;
                    }
                    let base = if naming::is_identifier(&entry.key) {
                        entry.key.clone()
                    } else {
                        naming::snake_name(&entry.key, "field")
                    };
                    let name = names.claim(&base, "_");
                    args.push(Arg::Named(name, self.build_descriptor_in(&entry.value, mode)?));
                }
                let call = Expr::reference(def).call(args);
                Ok(if trailing_comma { call.multiline() } else { call })
            }
            None => {
                let mut pairs = Vec::with_capacity(entries.len());
                for entry in entries {
                    pairs.push((
                        Expr::str(&entry.key),
                        self.build_descriptor_in(&entry.value, mode)?,
                    ));
                }
                Ok(match mode {
                    DescriptorMode::Value => Expr::Dict(pairs),
                    DescriptorMode::ReferenceObject => Expr::Reference(sdk::dictionary_reference())
                        .call(vec![Arg::Positional(Expr::Dict(pairs))]),
                })
            }
        }
    }
}

pub(crate) fn wrap_literal(expr: Expr) -> Expr {
    if expr.is_literal() {
        Expr::Reference(sdk::constant_value_reference()).call(vec![Arg::Positional(expr)])
    } else {
        expr
    }
}

pub(crate) fn unary_method(operator: UnaryOperator) -> &'static str {
    match operator {
        UnaryOperator::Null => "is_null",
        UnaryOperator::NotNull => "is_not_null",
        UnaryOperator::ParseJson => "parse_json",
        UnaryOperator::IsError => "is_error",
        UnaryOperator::IsBlank => "is_blank",
        UnaryOperator::IsNotBlank => "is_not_blank",
        UnaryOperator::Length => "length",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::config::{CodegenConfig, RenderOptions};
    use crate::context::{ScopeId, WorkflowContext};
    use crate::error::Severity;
    use crate::parse::*;

    fn context() -> WorkflowContext {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "label": "Flow",
            "input_variables": [
                {"id": "in-1", "key": "query", "type": "STRING"},
                {"id": "in-2", "key": "score", "type": "NUMBER"}
            ],
            "workflow_raw_data": {"nodes": [
                {"id": "a", "type": "GENERIC", "label": "Node A",
                 "outputs": [{"id": "a-out", "name": "output1", "type": "STRING"}]}
            ]}
        }))
        .unwrap();
        WorkflowContext::build(&def, CodegenConfig::default()).unwrap()
    }

    fn descriptor(value: serde_json::Value) -> WorkflowValueDescriptor {
        serde_json::from_value(value).unwrap()
    }

    fn render(ctx: &mut WorkflowContext, d: &WorkflowValueDescriptor) -> String {
        ctx.builder(ScopeId::ROOT).build_descriptor(d).unwrap().render()
    }

    fn string(s: &str) -> serde_json::Value {
        json!({"type": "CONSTANT_VALUE", "value": {"type": "STRING", "value": s}})
    }

    #[test]
    fn binary_expression_calls_operator_method() {
        let mut ctx = context();
        let d = descriptor(json!({
            "type": "BINARY_EXPRESSION", "operator": "contains",
            "lhs": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-1"},
            "rhs": string("hello")
        }));
        assert_eq!(render(&mut ctx, &d), r#"Inputs.query.contains("hello")"#);
    }

    #[test]
    fn literal_lhs_is_wrapped() {
        let mut ctx = context();
        let d = descriptor(json!({
            "type": "BINARY_EXPRESSION", "operator": "concat",
            "lhs": string("prefix-"),
            "rhs": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-1"}
        }));
        assert_eq!(
            render(&mut ctx, &d),
            r#"ConstantValueReference("prefix-").concat(Inputs.query)"#
        );
    }

    #[test]
    fn ternary_between() {
        let mut ctx = context();
        let d = descriptor(json!({
            "type": "TERNARY_EXPRESSION", "operator": "between",
            "base": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-2"},
            "lhs": {"type": "CONSTANT_VALUE", "value": {"type": "NUMBER", "value": 1}},
            "rhs": {"type": "CONSTANT_VALUE", "value": {"type": "NUMBER", "value": 10}}
        }));
        assert_eq!(render(&mut ctx, &d), "Inputs.score.between(1, 10)");
    }

    #[test]
    fn numeric_comparison_coerces_string_rhs() {
        let mut ctx = context();
        let coerced = descriptor(json!({
            "type": "BINARY_EXPRESSION", "operator": ">",
            "lhs": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-1"},
            "rhs": string("0.5")
        }));
        let direct = descriptor(json!({
            "type": "BINARY_EXPRESSION", "operator": ">",
            "lhs": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-1"},
            "rhs": {"type": "CONSTANT_VALUE", "value": {"type": "NUMBER", "value": 0.5}}
        }));
        assert_eq!(render(&mut ctx, &coerced), render(&mut ctx, &direct));
        assert_eq!(render(&mut ctx, &coerced), "Inputs.query.greater_than(0.5)");
    }

    #[test]
    fn equality_coerces_only_for_number_lhs() {
        let mut ctx = context();
        let number_lhs = descriptor(json!({
            "type": "BINARY_EXPRESSION", "operator": "=",
            "lhs": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-2"},
            "rhs": string("3")
        }));
        let string_lhs = descriptor(json!({
            "type": "BINARY_EXPRESSION", "operator": "=",
            "lhs": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-1"},
            "rhs": string("3")
        }));
        assert_eq!(render(&mut ctx, &number_lhs), "Inputs.score.equals(3)");
        assert_eq!(render(&mut ctx, &string_lhs), r#"Inputs.query.equals("3")"#);
    }

    #[test]
    fn unparseable_number_is_reported() {
        let mut ctx = context();
        let d = descriptor(json!({
            "type": "BINARY_EXPRESSION", "operator": "<",
            "lhs": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-2"},
            "rhs": string("not-a-number")
        }));
        assert_eq!(render(&mut ctx, &d), r#"Inputs.score.less_than("not-a-number")"#);
        let errors = ctx.errors(Some(Severity::Error));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "R014");
        assert!(errors[0].message.contains("not-a-number"));
        assert!(errors[0].message.contains("rhs"));
    }

    #[test]
    fn unparseable_number_raises_in_strict_mode() {
        let mut ctx = context();
        ctx.config = CodegenConfig::strict();
        let d = descriptor(json!({
            "type": "BINARY_EXPRESSION", "operator": "<",
            "lhs": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-2"},
            "rhs": string("not-a-number")
        }));
        let err = ctx.builder(ScopeId::ROOT).build_descriptor(&d).unwrap_err();
        assert_eq!(
            err,
            GenerationError::ValueGeneration {
                value: "not-a-number".into(),
                field: "rhs".into()
            }
        );
    }

    #[test]
    fn null_check_uses_legacy_methods() {
        let mut ctx = context();
        let on_output = descriptor(json!({
            "type": "UNARY_EXPRESSION", "operator": "null",
            "lhs": {"type": "NODE_OUTPUT", "node_id": "a", "node_output_id": "a-out"}
        }));
        let on_input = descriptor(json!({
            "type": "UNARY_EXPRESSION", "operator": "notNull",
            "lhs": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-1"}
        }));
        assert_eq!(render(&mut ctx, &on_output), "NodeA.Outputs.output1.is_nil()");
        assert_eq!(render(&mut ctx, &on_input), "Inputs.query.is_not_null()");
    }

    fn dictionary(definition: Option<serde_json::Value>) -> WorkflowValueDescriptor {
        descriptor(json!({
            "type": "DICTIONARY_REFERENCE",
            "definition": definition,
            "entries": [
                {"key": "name", "value": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-1"}},
                {"key": "nickname", "value": {"type": "CONSTANT_VALUE", "value": {"type": "JSON", "value": null}}}
            ]
        }))
    }

    #[test]
    fn dictionary_with_definition_omits_nulls() {
        let mut ctx = context();
        let d = dictionary(Some(json!({"name": "Person", "module": ["types"]})));
        assert_eq!(render(&mut ctx, &d), "Person(name=Inputs.query)");
    }

    #[test]
    fn dictionary_keys_that_sanitize_alike_stay_distinct() {
        let mut ctx = context();
        let d = descriptor(json!({
            "type": "DICTIONARY_REFERENCE",
            "definition": {"name": "Person", "module": ["types"]},
            "entries": [
                {"key": "my key", "value": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-1"}},
                {"key": "my_key", "value": {"type": "WORKFLOW_INPUT", "input_variable_id": "in-2"}}
            ]
        }));
        assert_eq!(render(&mut ctx, &d), "Person(my_key=Inputs.query, my_key_2=Inputs.score)");
    }

    #[test]
    fn dictionary_without_definition_keeps_nulls() {
        let mut ctx = context();
        let d = dictionary(None);
        assert_eq!(render(&mut ctx, &d), r#"{"name": Inputs.query, "nickname": None}"#);
    }

    #[test]
    fn definition_override_and_trailing_comma() {
        let mut ctx = context();
        let opts = BuildOptions {
            definition_override: Some(Definition::new("Profile", ["types"])),
            trailing_comma: true,
        };
        let expr = ctx
            .builder(ScopeId::ROOT)
            .build_descriptor_with(&dictionary(None), DescriptorMode::Value, &opts)
            .unwrap();
        assert_eq!(expr.render(), "Profile(\n    name=Inputs.query,\n)");
        assert_eq!(
            expr.render_with(&RenderOptions { trailing_comma: false, indent: 2 }),
            "Profile(\n  name=Inputs.query,\n)"
        );
    }

    #[test]
    fn reference_object_mode_wraps_leaves() {
        let mut ctx = context();
        let d = descriptor(json!({
            "type": "ARRAY_REFERENCE",
            "items": [string("a"), {"type": "WORKFLOW_INPUT", "input_variable_id": "in-1"}]
        }));
        let expr = ctx.builder(ScopeId::ROOT).build_descriptor_reference(&d).unwrap();
        assert_eq!(
            expr.render(),
            r#"ArrayReference([ConstantValueReference("a"), Inputs.query])"#
        );
        let value = ctx.builder(ScopeId::ROOT).build_descriptor(&d).unwrap();
        assert_eq!(value.render(), r#"["a", Inputs.query]"#);
    }

    #[test]
    fn dangling_reference_in_expression_degrades_to_none() {
        let mut ctx = context();
        let d = descriptor(json!({
            "type": "BINARY_EXPRESSION", "operator": "coalesce",
            "lhs": {"type": "NODE_OUTPUT", "node_id": "ghost", "node_output_id": "x"},
            "rhs": string("fallback")
        }));
        assert_eq!(
            render(&mut ctx, &d),
            r#"ConstantValueReference(None).coalesce("fallback")"#
        );
        let warnings = ctx.errors(Some(Severity::Warning));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("ghost"));
    }
}
