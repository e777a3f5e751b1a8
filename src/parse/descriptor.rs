//! Value descriptors, pointer rules and condition trees.
//!
//! These are the recursive, loosely-typed inputs the resolvers walk. All
//! unions are closed: an unknown `type` or operator token fails to
//! deserialize.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// SHARED
// =============================================================================

/// A symbol name plus the module it lives in, e.g. `my_workflow.nodes.summarize.Summarize`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub module: Vec<String>,
}

impl Definition {
    pub fn new<S: Into<String>>(name: impl Into<String>, module: impl IntoIterator<Item = S>) -> Self {
        Definition {
            name: name.into(),
            module: module.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableType {
    String,
    Number,
    Json,
    ChatHistory,
    SearchResults,
    Error,
    Array,
    FunctionCall,
    Image,
    Audio,
    Document,
    Video,
    Null,
}

// =============================================================================
// CONSTANTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorValue {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// A typed literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstantValue {
    String {
        value: Option<String>,
    },
    Number {
        value: Option<f64>,
    },
    /// Arbitrary JSON. May itself hold a serialized value descriptor.
    Json {
        #[serde(default)]
        value: Value,
    },
    Array {
        #[serde(default)]
        value: Vec<ConstantValue>,
    },
    Error {
        value: Option<ErrorValue>,
    },
}

impl ConstantValue {
    pub fn string(s: impl Into<String>) -> Self {
        ConstantValue::String {
            value: Some(s.into()),
        }
    }

    pub fn number(n: f64) -> Self {
        ConstantValue::Number { value: Some(n) }
    }

    pub fn json(value: Value) -> Self {
        ConstantValue::Json { value }
    }

    pub fn variable_type(&self) -> VariableType {
        match self {
            ConstantValue::String { .. } => VariableType::String,
            ConstantValue::Number { .. } => VariableType::Number,
            ConstantValue::Json { .. } => VariableType::Json,
            ConstantValue::Array { .. } => VariableType::Array,
            ConstantValue::Error { .. } => VariableType::Error,
        }
    }

    pub fn is_json_null(&self) -> bool {
        matches!(self, ConstantValue::Json { value: Value::Null })
    }
}

// =============================================================================
// OPERATORS
// =============================================================================

/// Declares an operator enum whose serde form is its source token.
macro_rules! operators {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $token:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn token(self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }

            pub fn from_token(token: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|op| op.token() == token)
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(token: String) -> Result<Self, Self::Error> {
                Self::from_token(&token).ok_or_else(|| format!("unknown operator '{}'", token))
            }
        }

        impl From<$name> for String {
            fn from(op: $name) -> String {
                op.token().to_string()
            }
        }
    };
}

operators! {
    UnaryOperator {
        Null => "null",
        NotNull => "notNull",
        ParseJson => "parseJson",
        IsError => "isError",
        IsBlank => "isBlank",
        IsNotBlank => "isNotBlank",
        Length => "length",
    }
}

operators! {
    BinaryOperator {
        Equals => "=",
        NotEquals => "!=",
        LessThan => "<",
        GreaterThan => ">",
        LessThanOrEqual => "<=",
        GreaterThanOrEqual => ">=",
        Contains => "contains",
        BeginsWith => "beginsWith",
        EndsWith => "endsWith",
        DoesNotContain => "doesNotContain",
        DoesNotBeginWith => "doesNotBeginWith",
        DoesNotEndWith => "doesNotEndWith",
        In => "in",
        NotIn => "notIn",
        And => "and",
        Or => "or",
        Coalesce => "coalesce",
        Concat => "concat",
        Add => "+",
        Minus => "-",
        AccessField => "accessField",
    }
}

operators! {
    TernaryOperator {
        Between => "between",
        NotBetween => "notBetween",
    }
}

impl BinaryOperator {
    pub fn is_numeric_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::LessThan
                | BinaryOperator::GreaterThan
                | BinaryOperator::LessThanOrEqual
                | BinaryOperator::GreaterThanOrEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOperator::Equals | BinaryOperator::NotEquals)
    }

    /// Method invoked on the left operand in generated code.
    pub fn method(self) -> &'static str {
        match self {
            BinaryOperator::Equals => "equals",
            BinaryOperator::NotEquals => "does_not_equal",
            BinaryOperator::LessThan => "less_than",
            BinaryOperator::GreaterThan => "greater_than",
            BinaryOperator::LessThanOrEqual => "less_than_or_equal_to",
            BinaryOperator::GreaterThanOrEqual => "greater_than_or_equal_to",
            BinaryOperator::Contains => "contains",
            BinaryOperator::BeginsWith => "begins_with",
            BinaryOperator::EndsWith => "ends_with",
            BinaryOperator::DoesNotContain => "does_not_contain",
            BinaryOperator::DoesNotBeginWith => "does_not_begin_with",
            BinaryOperator::DoesNotEndWith => "does_not_end_with",
            BinaryOperator::In => "in_",
            BinaryOperator::NotIn => "not_in",
            BinaryOperator::And => "and_",
            BinaryOperator::Or => "or_",
            BinaryOperator::Coalesce => "coalesce",
            BinaryOperator::Concat => "concat",
            BinaryOperator::Add => "add",
            BinaryOperator::Minus => "minus",
            BinaryOperator::AccessField => "access_field",
        }
    }
}

impl TernaryOperator {
    pub fn method(self) -> &'static str {
        match self {
            TernaryOperator::Between => "between",
            TernaryOperator::NotBetween => "not_between",
        }
    }
}

/// Any operator a condition rule may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Unary(UnaryOperator),
    Binary(BinaryOperator),
    Ternary(TernaryOperator),
}

impl ConditionOperator {
    pub fn from_token(token: &str) -> Option<Self> {
        UnaryOperator::from_token(token)
            .map(ConditionOperator::Unary)
            .or_else(|| BinaryOperator::from_token(token).map(ConditionOperator::Binary))
            .or_else(|| TernaryOperator::from_token(token).map(ConditionOperator::Ternary))
    }
}

// =============================================================================
// VALUE DESCRIPTORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub key: String,
    pub value: WorkflowValueDescriptor,
}

/// The recursive reference-or-expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowValueDescriptor {
    ConstantValue {
        value: ConstantValue,
    },
    NodeOutput {
        node_id: String,
        node_output_id: String,
    },
    WorkflowInput {
        input_variable_id: String,
    },
    WorkflowState {
        state_variable_id: String,
    },
    WorkspaceSecret {
        workspace_secret_id: Option<String>,
    },
    EnvironmentVariable {
        environment_variable: Option<String>,
    },
    ExecutionCounter {
        node_id: String,
    },
    TriggerAttribute {
        trigger_id: String,
        attribute_id: String,
    },
    DictionaryReference {
        #[serde(default)]
        entries: Vec<DictionaryEntry>,
        #[serde(default)]
        definition: Option<Definition>,
    },
    ArrayReference {
        #[serde(default)]
        items: Vec<WorkflowValueDescriptor>,
    },
    UnaryExpression {
        operator: UnaryOperator,
        lhs: Box<WorkflowValueDescriptor>,
    },
    BinaryExpression {
        operator: BinaryOperator,
        lhs: Box<WorkflowValueDescriptor>,
        rhs: Box<WorkflowValueDescriptor>,
    },
    TernaryExpression {
        operator: TernaryOperator,
        base: Box<WorkflowValueDescriptor>,
        lhs: Box<WorkflowValueDescriptor>,
        rhs: Box<WorkflowValueDescriptor>,
    },
}

/// `type` tags that identify a JSON object as a serialized descriptor.
const DESCRIPTOR_TYPES: &[&str] = &[
    "CONSTANT_VALUE",
    "NODE_OUTPUT",
    "WORKFLOW_INPUT",
    "WORKFLOW_STATE",
    "WORKSPACE_SECRET",
    "ENVIRONMENT_VARIABLE",
    "EXECUTION_COUNTER",
    "TRIGGER_ATTRIBUTE",
    "DICTIONARY_REFERENCE",
    "ARRAY_REFERENCE",
    "UNARY_EXPRESSION",
    "BINARY_EXPRESSION",
    "TERNARY_EXPRESSION",
];

impl WorkflowValueDescriptor {
    pub fn constant(value: ConstantValue) -> Self {
        WorkflowValueDescriptor::ConstantValue { value }
    }

    pub fn node_output(node_id: impl Into<String>, node_output_id: impl Into<String>) -> Self {
        WorkflowValueDescriptor::NodeOutput {
            node_id: node_id.into(),
            node_output_id: node_output_id.into(),
        }
    }

    pub fn workflow_input(input_variable_id: impl Into<String>) -> Self {
        WorkflowValueDescriptor::WorkflowInput {
            input_variable_id: input_variable_id.into(),
        }
    }

    pub fn binary(operator: BinaryOperator, lhs: Self, rhs: Self) -> Self {
        WorkflowValueDescriptor::BinaryExpression {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(operator: UnaryOperator, lhs: Self) -> Self {
        WorkflowValueDescriptor::UnaryExpression {
            operator,
            lhs: Box::new(lhs),
        }
    }

    /// Interpret generic JSON as a descriptor if it is shaped like one.
    pub fn from_json(value: &Value) -> Option<Self> {
        let tag = value.as_object()?.get("type")?.as_str()?;
        if !DESCRIPTOR_TYPES.contains(&tag) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn referenced_node_id(&self) -> Option<&str> {
        match self {
            WorkflowValueDescriptor::NodeOutput { node_id, .. }
            | WorkflowValueDescriptor::ExecutionCounter { node_id } => Some(node_id),
            _ => None,
        }
    }

    pub fn is_constant_json_null(&self) -> bool {
        matches!(self, WorkflowValueDescriptor::ConstantValue { value } if value.is_json_null())
    }
}

// =============================================================================
// POINTER RULES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutputPointer {
    pub node_id: String,
    pub output_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputVariablePointer {
    pub input_variable_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVariablePointer {
    pub state_variable_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSecretPointer {
    #[serde(default)]
    pub workspace_secret_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentVariablePointer {
    #[serde(default)]
    pub environment_variable: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCounterPointer {
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerAttributePointer {
    pub trigger_id: String,
    pub attribute_id: String,
}

/// One way of obtaining a node input value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointerRule {
    ConstantValue(ConstantValue),
    NodeOutput(NodeOutputPointer),
    InputVariable(InputVariablePointer),
    WorkflowState(StateVariablePointer),
    WorkspaceSecret(WorkspaceSecretPointer),
    EnvironmentVariable(EnvironmentVariablePointer),
    ExecutionCounter(ExecutionCounterPointer),
    TriggerAttribute(TriggerAttributePointer),
}

impl PointerRule {
    pub fn constant(value: ConstantValue) -> Self {
        PointerRule::ConstantValue(value)
    }

    pub fn node_output(node_id: impl Into<String>, output_id: impl Into<String>) -> Self {
        PointerRule::NodeOutput(NodeOutputPointer {
            node_id: node_id.into(),
            output_id: output_id.into(),
        })
    }

    pub fn input_variable(input_variable_id: impl Into<String>) -> Self {
        PointerRule::InputVariable(InputVariablePointer {
            input_variable_id: input_variable_id.into(),
        })
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, PointerRule::ConstantValue(_))
    }

    /// The node this rule reads from, if any.
    pub fn referenced_node_id(&self) -> Option<&str> {
        match self {
            PointerRule::NodeOutput(p) => Some(&p.node_id),
            PointerRule::ExecutionCounter(p) => Some(&p.node_id),
            _ => None,
        }
    }

    /// The equivalent reference descriptor.
    pub fn to_descriptor(&self) -> WorkflowValueDescriptor {
        match self {
            PointerRule::ConstantValue(value) => WorkflowValueDescriptor::constant(value.clone()),
            PointerRule::NodeOutput(p) => {
                WorkflowValueDescriptor::node_output(p.node_id.clone(), p.output_id.clone())
            }
            PointerRule::InputVariable(p) => {
                WorkflowValueDescriptor::workflow_input(p.input_variable_id.clone())
            }
            PointerRule::WorkflowState(p) => WorkflowValueDescriptor::WorkflowState {
                state_variable_id: p.state_variable_id.clone(),
            },
            PointerRule::WorkspaceSecret(p) => WorkflowValueDescriptor::WorkspaceSecret {
                workspace_secret_id: p.workspace_secret_id.clone(),
            },
            PointerRule::EnvironmentVariable(p) => WorkflowValueDescriptor::EnvironmentVariable {
                environment_variable: p.environment_variable.clone(),
            },
            PointerRule::ExecutionCounter(p) => WorkflowValueDescriptor::ExecutionCounter {
                node_id: p.node_id.clone(),
            },
            PointerRule::TriggerAttribute(p) => WorkflowValueDescriptor::TriggerAttribute {
                trigger_id: p.trigger_id.clone(),
                attribute_id: p.attribute_id.clone(),
            },
        }
    }
}

/// Ordered rules; the first one that resolves wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInputValuePointer {
    #[serde(default)]
    pub rules: Vec<PointerRule>,
}

impl NodeInputValuePointer {
    pub fn new(rules: Vec<PointerRule>) -> Self {
        Self { rules }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
    pub id: String,
    pub key: String,
    pub value: NodeInputValuePointer,
}

// =============================================================================
// CONDITIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Combinator {
    And,
    Or,
}

/// A rule group (`rules` present) or a leaf comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    pub id: String,
    #[serde(default)]
    pub rules: Option<Vec<ConditionRule>>,
    #[serde(default)]
    pub combinator: Option<Combinator>,
    #[serde(default)]
    pub field_node_input_id: Option<String>,
    /// Raw token; validated when the tree is folded.
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value_node_input_id: Option<String>,
}

impl ConditionRule {
    pub fn leaf(
        id: impl Into<String>,
        field_node_input_id: impl Into<String>,
        operator: impl Into<String>,
        value_node_input_id: Option<&str>,
    ) -> Self {
        ConditionRule {
            id: id.into(),
            rules: None,
            combinator: None,
            field_node_input_id: Some(field_node_input_id.into()),
            operator: Some(operator.into()),
            value_node_input_id: value_node_input_id.map(str::to_string),
        }
    }

    pub fn group(id: impl Into<String>, combinator: Combinator, rules: Vec<ConditionRule>) -> Self {
        ConditionRule {
            id: id.into(),
            rules: Some(rules),
            combinator: Some(combinator),
            field_node_input_id: None,
            operator: None,
            value_node_input_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    If,
    Elif,
    Else,
}

/// One branch of a conditional node. `data` is absent for `ELSE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCondition {
    pub id: String,
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub source_handle_id: String,
    #[serde(default)]
    pub data: Option<ConditionRule>,
}
