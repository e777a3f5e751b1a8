#![allow(dead_code)]

use serde_json::{Value, json};
use workflow_codegen::config::CodegenConfig;
use workflow_codegen::context::WorkflowContext;
use workflow_codegen::parse::*;

// =============================================================================
// Workflow builders
// =============================================================================

pub fn definition(value: Value) -> WorkflowDefinition {
    serde_json::from_value(value).expect("fixture should deserialize")
}

/// Two plain nodes, `node-a` (output `output1`) and `node-b` (output `b-out`),
/// plus one string input `in-1` and one number input `in-num`.
pub fn two_node_workflow() -> WorkflowDefinition {
    definition(json!({
        "label": "Two Nodes",
        "input_variables": [
            {"id": "in-1", "key": "query", "type": "STRING"},
            {"id": "in-num", "key": "limit", "type": "NUMBER"}
        ],
        "workflow_raw_data": {"nodes": [
            node_json("node-a", "Node A", &[("output1", "output1", "STRING")]),
            node_json("node-b", "Node B", &[("b-out", "text", "STRING")])
        ]}
    }))
}

pub fn node_json(id: &str, label: &str, outputs: &[(&str, &str, &str)]) -> Value {
    let outputs: Vec<Value> = outputs
        .iter()
        .map(|(id, name, ty)| json!({"id": id, "name": name, "type": ty}))
        .collect();
    json!({"id": id, "type": "GENERIC", "label": label, "outputs": outputs})
}

pub fn context(def: &WorkflowDefinition) -> WorkflowContext {
    WorkflowContext::build(def, CodegenConfig::default()).expect("context should build")
}

pub fn strict_context(def: &WorkflowDefinition) -> WorkflowContext {
    WorkflowContext::build(def, CodegenConfig::strict()).expect("context should build")
}

// =============================================================================
// Rule and descriptor builders
// =============================================================================

pub fn constant(s: &str) -> PointerRule {
    PointerRule::constant(ConstantValue::string(s))
}

pub fn output_rule(node_id: &str, output_id: &str) -> PointerRule {
    PointerRule::node_output(node_id, output_id)
}

pub fn rules(rules: Vec<PointerRule>) -> NodeInputValuePointer {
    NodeInputValuePointer::new(rules)
}

pub fn string_value(s: &str) -> WorkflowValueDescriptor {
    WorkflowValueDescriptor::constant(ConstantValue::string(s))
}

/// Node inputs `x`, `y`, `z`, ... each reading the input variable of the same name.
pub fn boolean_inputs(names: &[&str]) -> Vec<NodeInput> {
    names
        .iter()
        .map(|name| NodeInput {
            id: name.to_string(),
            key: name.to_string(),
            value: rules(vec![PointerRule::input_variable(format!("in-{}", name))]),
        })
        .collect()
}

/// A workflow declaring one JSON input per name, ids `in-{name}`, keys `{name}`.
pub fn boolean_workflow(names: &[&str]) -> WorkflowDefinition {
    let inputs: Vec<Value> = names
        .iter()
        .map(|n| json!({"id": format!("in-{}", n), "key": n, "type": "JSON"}))
        .collect();
    definition(json!({
        "label": "Logic",
        "input_variables": inputs,
        "workflow_raw_data": {}
    }))
}

/// Leaf `{name}.is_not_null()`; rendered as `Inputs.{name}.is_not_null()`.
pub fn truthy_leaf(name: &str) -> ConditionRule {
    ConditionRule::leaf(format!("r-{}", name), name, "notNull", None)
}

// =============================================================================
// Boolean evaluation of rendered conditions
// =============================================================================

/// Evaluate a rendered condition where every leaf has the form
/// `Inputs.{name}.is_not_null()`. `&` binds tighter than `|`, as in Python.
pub fn eval_rendered(text: &str, assignment: &dyn Fn(&str) -> bool) -> bool {
    let tokens = tokenize(text);
    let mut parser = BoolParser {
        tokens: &tokens,
        pos: 0,
        assignment,
    };
    let value = parser.or_expr();
    assert_eq!(parser.pos, tokens.len(), "trailing tokens in {}", text);
    value
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Leaf(String),
    And,
    Or,
    Open,
    Close,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        if let Some(r) = rest.strip_prefix('&') {
            tokens.push(Token::And);
            rest = r;
        } else if let Some(r) = rest.strip_prefix('|') {
            tokens.push(Token::Or);
            rest = r;
        } else if let Some(r) = rest.strip_prefix("Inputs.") {
            let end = r.find(".is_not_null()").expect("leaf shape");
            tokens.push(Token::Leaf(r[..end].to_string()));
            rest = &r[end + ".is_not_null()".len()..];
        } else if let Some(r) = rest.strip_prefix('(') {
            tokens.push(Token::Open);
            rest = r;
        } else if let Some(r) = rest.strip_prefix(')') {
            tokens.push(Token::Close);
            rest = r;
        } else {
            panic!("unexpected input at {:?}", rest);
        }
        rest = rest.trim_start();
    }
    tokens
}

struct BoolParser<'t> {
    tokens: &'t [Token],
    pos: usize,
    assignment: &'t dyn Fn(&str) -> bool,
}

impl BoolParser<'_> {
    fn or_expr(&mut self) -> bool {
        let mut value = self.and_expr();
        while self.tokens.get(self.pos) == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr();
            value = value || rhs;
        }
        value
    }

    fn and_expr(&mut self) -> bool {
        let mut value = self.atom();
        while self.tokens.get(self.pos) == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.atom();
            value = value && rhs;
        }
        value
    }

    fn atom(&mut self) -> bool {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        match token {
            Token::Leaf(name) => (self.assignment)(&name),
            Token::Open => {
                let value = self.or_expr();
                assert_eq!(self.tokens.get(self.pos), Some(&Token::Close));
                self.pos += 1;
                value
            }
            other => panic!("unexpected token {:?}", other),
        }
    }
}

/// Evaluate a rule tree directly, leaves looked up by field input id.
pub fn eval_tree(rule: &ConditionRule, assignment: &dyn Fn(&str) -> bool) -> bool {
    match &rule.rules {
        None => assignment(rule.field_node_input_id.as_deref().unwrap_or_default()),
        Some(children) => match rule.combinator {
            Some(Combinator::Or) => children.iter().any(|c| eval_tree(c, assignment)),
            _ => children.iter().all(|c| eval_tree(c, assignment)),
        },
    }
}
