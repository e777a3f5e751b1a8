//! Condition rule trees → one boolean expression.

use super::ExpressionBuilder;
use super::descriptor::{unary_method, wrap_literal};
use super::legacy;
use crate::ast::{BinOp, Expr};
use crate::error::GenerationError;
use crate::parse::{
    Combinator, ConditionOperator, ConditionRule, NodeInput, PointerRule,
    WorkflowValueDescriptor,
};

impl<'a> ExpressionBuilder<'a> {
    /// Fold a rule tree. `inputs` are the conditional node's inputs, which
    /// leaves name by id.
    ///
    /// An empty group yields `None`. A broken leaf is reported and yields
    /// `None` while folding continues. An unknown operator is always fatal.
    pub fn build_condition(&mut self, rule: &ConditionRule, inputs: &[NodeInput]) -> Result<Expr, GenerationError> {
        let Some(children) = &rule.rules else {
            return self.condition_leaf(rule, inputs);
        };
        let combinator = match rule.combinator {
            Some(c) => c,
            None if children.len() > 1 => {
                self.report(GenerationError::MissingOperand {
                    rule_id: rule.id.clone(),
                    operand: "combinator".into(),
                })?;
                Combinator::And
            }
            None => Combinator::And,
        };

        let mut folded: Option<Expr> = None;
        for child in children {
            let expr = self.build_condition(child, inputs)?;
            folded = Some(match folded {
                None => expr,
                Some(acc) => combine(combinator, acc, expr),
            });
        }
        Ok(folded.unwrap_or(Expr::None))
    }

    fn condition_leaf(&mut self, rule: &ConditionRule, inputs: &[NodeInput]) -> Result<Expr, GenerationError> {
        let Some(token) = rule.operator.as_deref() else {
            self.report(GenerationError::MissingOperand {
                rule_id: rule.id.clone(),
                operand: "operator".into(),
            })?;
            return Ok(Expr::None);
        };
        let operator = ConditionOperator::from_token(token).ok_or_else(|| {
            GenerationError::UnknownOperator {
                operator: token.into(),
            }
        })?;

        let Some(field) = self.condition_input(rule, rule.field_node_input_id.as_deref(), "field", inputs)? else {
            return Ok(Expr::None);
        };
        let field_descriptor = first_rule_descriptor(field);
        let lhs = wrap_literal(self.build_node_input(&field.value)?);

        match operator {
            ConditionOperator::Unary(op) => {
                let method = field_descriptor
                    .as_ref()
                    .and_then(|d| legacy::null_check_method(op, d))
                    .unwrap_or(unary_method(op));
                Ok(lhs.method(method, vec![]))
            }
            ConditionOperator::Binary(op) => {
                let Some(value) = self.condition_input(rule, rule.value_node_input_id.as_deref(), "value", inputs)? else {
                    return Ok(Expr::None);
                };
                let lhs_type = field_descriptor
                    .as_ref()
                    .map(|d| legacy::infer_type(self.registry, self.scope, d))
                    .unwrap_or(crate::parse::VariableType::Json);
                // Coerce what the chain collapsed to, not its first raw rule.
                let rhs = self.build_node_input(&value.value)?;
                let numeric = match &rhs {
                    Expr::Str(text) if legacy::wants_numeric_rhs(op, lhs_type) => {
                        Some(legacy::parse_number(text, &value.key))
                    }
                    _ => None,
                };
                let rhs = match numeric {
                    Some(Ok(n)) => Expr::number(n),
                    Some(Err(err)) => {
                        self.report(err)?;
                        rhs
                    }
                    None => rhs,
                };
                Ok(lhs.method(op.method(), vec![rhs]))
            }
            ConditionOperator::Ternary(op) => {
                let Some(value) = self.condition_input(rule, rule.value_node_input_id.as_deref(), "value", inputs)? else {
                    return Ok(Expr::None);
                };
                let built = self.build_node_input(&value.value)?;
                let bounds = string_literal(&built)
                    .and_then(|text| text.split_once(','))
                    .ok_or_else(|| GenerationError::Malformed {
                        what: format!("{} value of rule '{}'", op.token(), rule.id),
                        reason: "expected two comma-separated numbers".into(),
                    })
                    .and_then(|(low, high)| {
                        Ok((
                            legacy::parse_number(low, &value.key)?,
                            legacy::parse_number(high, &value.key)?,
                        ))
                    });
                match self.recover(bounds)? {
                    Some((low, high)) => Ok(lhs.method(op.method(), vec![Expr::number(low), Expr::number(high)])),
                    None => Ok(Expr::None),
                }
            }
        }
    }

    /// Look up the node input a leaf names, reporting a missing id or input.
    fn condition_input<'i>(
        &mut self,
        rule: &ConditionRule,
        input_id: Option<&str>,
        operand: &str,
        inputs: &'i [NodeInput],
    ) -> Result<Option<&'i NodeInput>, GenerationError> {
        let found = match input_id {
            None => Err(GenerationError::MissingOperand {
                rule_id: rule.id.clone(),
                operand: operand.into(),
            }),
            Some(id) => inputs.iter().find(|i| i.id == id).ok_or_else(|| {
                GenerationError::ConditionInputNotFound {
                    rule_id: rule.id.clone(),
                    input_id: id.into(),
                }
            }),
        };
        self.recover(found)
    }
}

/// `AND` operands that are `OR` expressions get parentheses, and vice versa.
fn combine(combinator: Combinator, lhs: Expr, rhs: Expr) -> Expr {
    let (op, other) = match combinator {
        Combinator::And => (BinOp::And, BinOp::Or),
        Combinator::Or => (BinOp::Or, BinOp::And),
    };
    let guard = |e: Expr| {
        if matches!(&e, Expr::BinaryOp { op, .. } if *op == other) {
            e.group()
        } else {
            e
        }
    };
    Expr::binary(op, guard(lhs), guard(rhs))
}

fn first_rule_descriptor(input: &NodeInput) -> Option<WorkflowValueDescriptor> {
    input.value.rules.first().map(PointerRule::to_descriptor)
}

fn string_literal(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Str(s) => Some(s),
        _ => None,
    }
}
