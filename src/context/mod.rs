//! Reference resolution context.
//!
//! Scopes live in an arena. Each scope owns one `IndexMap` per entity kind
//! and a parent pointer; nested workflows (map, subworkflow, tool-calling
//! nodes) get a child scope. Lookups walk the local scope, then the parent
//! chain, then a global id index covering every scope in the tree.

pub mod entities;
pub mod naming;

pub use entities::*;

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::{CodegenConfig, DuplicatePolicy, OnDuplicate};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{GenerationError, Severity};
use crate::parse::{
    ConditionType, Definition, NodeType, PortType, VariableDefinition, WorkflowDefinition,
    WorkflowNode,
};
use naming::UniqueNames;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn from_index(index: usize) -> Self {
        ScopeId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

// =============================================================================
// SCOPE
// =============================================================================

#[derive(Debug, Clone)]
pub struct Scope {
    id: ScopeId,
    parent: Option<ScopeId>,
    owner_node_id: Option<String>,
    module: Vec<String>,
    workflow_definition: Definition,
    inputs_definition: Definition,
    state_definition: Definition,
    pub(crate) input_variables: IndexMap<String, InputVariableContext>,
    pub(crate) state_variables: IndexMap<String, StateVariableContext>,
    pub(crate) output_variables: IndexMap<String, OutputVariableContext>,
    pub(crate) nodes: IndexMap<String, NodeContext>,
    pub(crate) ports: IndexMap<String, PortContext>,
    pub(crate) triggers: IndexMap<String, TriggerContext>,
    pub(crate) secrets: IndexMap<String, SecretContext>,
    class_names: UniqueNames,
    module_names: UniqueNames,
}

impl Scope {
    fn new(id: ScopeId, parent: Option<ScopeId>, owner: Option<String>, module: Vec<String>, workflow_class: String) -> Self {
        let child = |name: &str| {
            let mut path = module.clone();
            path.push(name.to_string());
            path
        };
        Scope {
            id,
            parent,
            owner_node_id: owner,
            workflow_definition: Definition::new(workflow_class, child("workflow")),
            inputs_definition: Definition::new("Inputs", child("inputs")),
            state_definition: Definition::new("State", child("state")),
            module,
            input_variables: IndexMap::new(),
            state_variables: IndexMap::new(),
            output_variables: IndexMap::new(),
            nodes: IndexMap::new(),
            ports: IndexMap::new(),
            triggers: IndexMap::new(),
            secrets: IndexMap::new(),
            class_names: UniqueNames::new(),
            module_names: UniqueNames::new(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// The node whose nested workflow this scope holds. `None` for the root.
    pub fn owner_node_id(&self) -> Option<&str> {
        self.owner_node_id.as_deref()
    }

    /// Package path of the generated workflow.
    pub fn module(&self) -> &[String] {
        &self.module
    }

    pub fn workflow_definition(&self) -> &Definition {
        &self.workflow_definition
    }

    pub fn inputs_definition(&self) -> &Definition {
        &self.inputs_definition
    }

    pub fn state_definition(&self) -> &Definition {
        &self.state_definition
    }

    pub fn input_variables(&self) -> impl Iterator<Item = &InputVariableContext> {
        self.input_variables.values()
    }

    pub fn state_variables(&self) -> impl Iterator<Item = &StateVariableContext> {
        self.state_variables.values()
    }

    pub fn output_variables(&self) -> impl Iterator<Item = &OutputVariableContext> {
        self.output_variables.values()
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeContext> {
        self.nodes.values()
    }

    pub fn triggers(&self) -> impl Iterator<Item = &TriggerContext> {
        self.triggers.values()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Clone)]
pub struct Registry {
    scopes: Vec<Scope>,
    /// First scope each id was registered in, per kind.
    global: HashMap<EntityKind, HashMap<String, ScopeId>>,
    next_order: u64,
    policy: DuplicatePolicy,
}

impl Registry {
    pub fn new(root_module: Vec<String>, workflow_class: String, policy: DuplicatePolicy) -> Self {
        Registry {
            scopes: vec![Scope::new(ScopeId::ROOT, None, None, root_module, workflow_class)],
            global: HashMap::new(),
            next_order: 0,
            policy,
        }
    }

    pub fn add_scope(
        &mut self,
        parent: ScopeId,
        owner_node_id: &str,
        module: Vec<String>,
        workflow_class: String,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(
            id,
            Some(parent),
            Some(owner_node_id.to_string()),
            module,
            workflow_class,
        ));
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Register an entity in `scope`.
    ///
    /// Returns `Ok(false)` when the id was already taken and the policy
    /// keeps the first registration, `Err` when the policy rejects it.
    pub fn add<E: Entity>(
        &mut self,
        scope: ScopeId,
        entity: E,
        diagnostics: &mut Diagnostics,
    ) -> Result<bool, GenerationError> {
        let id = entity.id().to_string();
        let kind = E::KIND;
        if E::table(&self.scopes[scope.0]).contains_key(&id) {
            let err = GenerationError::DuplicateEntity { kind, id };
            return match self.policy.for_kind(kind) {
                OnDuplicate::Reject => Err(err),
                OnDuplicate::KeepFirst => {
                    warn!(kind = %kind, scope = scope.0, "{}", err);
                    diagnostics.add_error(
                        scope,
                        Diagnostic {
                            severity: Severity::Warning,
                            ..Diagnostic::from(&err)
                        },
                    );
                    Ok(false)
                }
            };
        }
        self.global
            .entry(kind)
            .or_default()
            .entry(id.clone())
            .or_insert(scope);
        E::table_mut(&mut self.scopes[scope.0]).insert(id, entity);
        Ok(true)
    }

    /// Lookup in `scope` only.
    pub fn find_local<E: Entity>(&self, scope: ScopeId, id: &str) -> Option<&E> {
        E::table(&self.scopes[scope.0]).get(id)
    }

    fn find_local_mut<E: Entity>(&mut self, scope: ScopeId, id: &str) -> Option<&mut E> {
        E::table_mut(&mut self.scopes[scope.0]).get_mut(id)
    }

    /// Lookup in `scope`, then its ancestors, then anywhere in the tree.
    pub fn find<E: Entity>(&self, scope: ScopeId, id: &str) -> Option<&E> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if let Some(entity) = self.find_local::<E>(s, id) {
                return Some(entity);
            }
            current = self.scopes[s.0].parent;
        }
        let owner = self.global.get(&E::KIND)?.get(id)?;
        self.find_local::<E>(*owner, id)
    }

    /// Whether `a` is emitted strictly before `b`.
    pub fn is_emitted_before(&self, a: &NodeContext, b: &NodeContext) -> bool {
        a.order < b.order
    }

    pub fn ports_of<'r>(&'r self, node: &'r NodeContext) -> impl Iterator<Item = &'r PortContext> + 'r {
        node.port_ids
            .iter()
            .filter_map(move |id| self.find_local::<PortContext>(node.scope, id))
    }

    /// The port used by edges that carry no source handle.
    pub fn default_port<'r>(&'r self, node: &'r NodeContext) -> Option<&'r PortContext> {
        self.ports_of(node).find(|p| p.port_type == PortType::Default)
    }

    fn next_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    // -------------------------------------------------------------------------
    // Registration of a whole workflow definition
    // -------------------------------------------------------------------------

    fn register_workflow(
        &mut self,
        scope: ScopeId,
        def: &WorkflowDefinition,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), GenerationError> {
        let inputs_definition = self.scope(scope).inputs_definition.clone();
        let mut names = UniqueNames::new();
        for var in &def.input_variables {
            let entity = InputVariableContext {
                id: var.id.clone(),
                key: var.key.clone(),
                name: names.claim(&naming::snake_name(&var.key, "input"), "_"),
                var_type: var.var_type,
                default: var.default.clone(),
                required: var.required,
                definition: inputs_definition.clone(),
            };
            self.add(scope, entity, diagnostics)?;
        }

        let state_definition = self.scope(scope).state_definition.clone();
        let mut names = UniqueNames::new();
        for var in &def.state_variables {
            let entity = StateVariableContext {
                id: var.id.clone(),
                key: var.key.clone(),
                name: names.claim(&naming::snake_name(&var.key, "state"), "_"),
                var_type: var.var_type,
                default: var.default.clone(),
                definition: state_definition.clone(),
            };
            self.add(scope, entity, diagnostics)?;
        }

        let workflow_definition = self.scope(scope).workflow_definition.clone();
        let mut names = UniqueNames::new();
        for var in &def.output_variables {
            let entity = OutputVariableContext {
                id: var.id.clone(),
                key: var.key.clone(),
                name: names.claim(&naming::snake_name(&var.key, "output"), "_"),
                var_type: var.var_type,
                definition: workflow_definition.clone(),
            };
            self.add(scope, entity, diagnostics)?;
        }

        for trigger in &def.triggers {
            let class_name = naming::class_name(&trigger.label, "Trigger");
            let mut module = self.scope(scope).module.clone();
            module.push("triggers".into());
            module.push(naming::snake_name(&class_name, "trigger"));
            let entity = TriggerContext {
                id: trigger.id.clone(),
                label: trigger.label.clone(),
                definition: Definition::new(class_name, module),
                attributes: attribute_contexts(&trigger.attributes),
            };
            self.add(scope, entity, diagnostics)?;
        }

        for secret in &def.workspace_secrets {
            let entity = SecretContext {
                id: secret.id.clone(),
                name: secret.name.clone(),
            };
            self.add(scope, entity, diagnostics)?;
        }

        for node in &def.workflow_raw_data.nodes {
            self.register_node(scope, node, diagnostics)?;
        }

        debug!(
            scope = scope.0,
            nodes = self.scope(scope).nodes.len(),
            "registered workflow scope"
        );
        Ok(())
    }

    fn register_node(
        &mut self,
        scope: ScopeId,
        node: &WorkflowNode,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), GenerationError> {
        let (class_name, module) = {
            let s = &mut self.scopes[scope.0];
            let class_name = s.class_names.claim(&naming::class_name(&node.label, "Node"), "");
            let module_name = s.module_names.claim(&naming::snake_name(&class_name, "node"), "_");
            let mut module = s.module.clone();
            module.push("nodes".into());
            module.push(module_name);
            (class_name, module)
        };

        let mut names = UniqueNames::new();
        let mut outputs = IndexMap::new();
        let declared = node.outputs.iter();
        let deployed = node.deployment.iter().flat_map(|d| d.outputs.iter());
        for output in declared.chain(deployed) {
            if outputs.contains_key(&output.id) {
                continue;
            }
            outputs.insert(
                output.id.clone(),
                NodeOutputContext {
                    id: output.id.clone(),
                    key: output.name.clone(),
                    name: names.claim(&naming::snake_name(&output.name, "output"), "_"),
                    var_type: output.var_type,
                },
            );
        }

        let ports = port_contexts(node);
        let order = self.next_order();
        let entity = NodeContext {
            id: node.id.clone(),
            label: node.label.clone(),
            node_type: node.node_type,
            definition: Definition::new(class_name, module.clone()),
            order,
            scope,
            outputs,
            port_ids: ports.iter().map(|p| p.id.clone()).collect(),
            nested_scope: None,
            deployment: node.deployment.clone(),
        };
        if !self.add(scope, entity, diagnostics)? {
            return Ok(());
        }
        for port in ports {
            self.add(scope, port, diagnostics)?;
        }

        if let Some(sub) = node.subworkflow.as_deref().filter(|_| node.node_type.has_nested_workflow()) {
            let child = self.add_scope(scope, &node.id, module, naming::class_name(&sub.label, "Workflow"));
            if let Some(owner) = self.find_local_mut::<NodeContext>(scope, &node.id) {
                owner.nested_scope = Some(child);
            }
            self.register_workflow(child, sub, diagnostics)?;
        }
        Ok(())
    }
}

fn attribute_contexts(attributes: &[VariableDefinition]) -> IndexMap<String, TriggerAttributeContext> {
    let mut names = UniqueNames::new();
    attributes
        .iter()
        .map(|attr| {
            let ctx = TriggerAttributeContext {
                id: attr.id.clone(),
                key: attr.key.clone(),
                name: names.claim(&naming::snake_name(&attr.key, "attribute"), "_"),
                var_type: attr.var_type,
            };
            (attr.id.clone(), ctx)
        })
        .collect()
}

fn port_contexts(node: &WorkflowNode) -> Vec<PortContext> {
    if node.node_type == NodeType::Conditional {
        return node
            .conditions
            .iter()
            .enumerate()
            .map(|(i, condition)| PortContext {
                id: condition.source_handle_id.clone(),
                name: format!("branch_{}", i + 1),
                node_id: node.id.clone(),
                port_type: match condition.condition_type {
                    ConditionType::If => PortType::If,
                    ConditionType::Elif => PortType::Elif,
                    ConditionType::Else => PortType::Else,
                },
            })
            .collect();
    }
    if node.ports.is_empty() {
        return vec![PortContext {
            id: format!("{}.default", node.id),
            name: "default".into(),
            node_id: node.id.clone(),
            port_type: PortType::Default,
        }];
    }
    let mut names = UniqueNames::new();
    node.ports
        .iter()
        .map(|p| PortContext {
            id: p.id.clone(),
            name: names.claim(&naming::snake_name(&p.name, "port"), "_"),
            node_id: node.id.clone(),
            port_type: p.port_type,
        })
        .collect()
}

// =============================================================================
// WORKFLOW CONTEXT
// =============================================================================

/// Registry, diagnostics and configuration for one workflow tree.
pub struct WorkflowContext {
    pub registry: Registry,
    pub diagnostics: Diagnostics,
    pub config: CodegenConfig,
}

impl WorkflowContext {
    /// Register every entity of `def` and its nested workflows in one pass.
    pub fn build(def: &WorkflowDefinition, config: CodegenConfig) -> Result<Self, GenerationError> {
        let root_module: Vec<String> = match config.root_module.as_deref().or(def.module_name.as_deref()) {
            Some(module) => module.split('.').map(str::to_string).collect(),
            None => vec![naming::snake_name(&def.label, "workflow")],
        };
        let mut registry = Registry::new(
            root_module,
            naming::class_name(&def.label, "Workflow"),
            config.duplicate_policy.clone(),
        );
        let mut diagnostics = Diagnostics::new();
        registry.register_workflow(ScopeId::ROOT, def, &mut diagnostics)?;
        Ok(WorkflowContext {
            registry,
            diagnostics,
            config,
        })
    }

    pub fn add_error(&mut self, scope: ScopeId, diagnostic: Diagnostic) -> bool {
        self.diagnostics.add_error(scope, diagnostic)
    }

    pub fn errors(&self, severity: Option<Severity>) -> Vec<&Diagnostic> {
        self.diagnostics.errors(severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(value: serde_json::Value) -> WorkflowDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn nested() -> WorkflowDefinition {
        definition(json!({
            "label": "Outer Flow",
            "input_variables": [{"id": "in-1", "key": "query", "type": "STRING"}],
            "workflow_raw_data": {
                "nodes": [
                    {"id": "a", "type": "GENERIC", "label": "Prompt",
                     "outputs": [{"id": "a-out", "name": "text", "type": "STRING"}]},
                    {"id": "m", "type": "MAP", "label": "Map Items",
                     "subworkflow": {
                        "label": "Inner",
                        "output_variables": [{"id": "ov-1", "key": "result", "type": "JSON"}],
                        "workflow_raw_data": {"nodes": [
                            {"id": "inner", "type": "GENERIC", "label": "Prompt"}
                        ]}
                     }},
                    {"id": "b", "type": "GENERIC", "label": "Prompt"}
                ]
            }
        }))
    }

    #[test]
    fn nested_scope_links_to_owner() {
        let ctx = WorkflowContext::build(&nested(), CodegenConfig::default()).unwrap();
        let registry = &ctx.registry;
        let map = registry.find::<NodeContext>(ScopeId::ROOT, "m").unwrap();
        let child = map.nested_scope.unwrap();
        assert_eq!(registry.scope(child).parent(), Some(ScopeId::ROOT));
        assert_eq!(registry.scope(child).owner_node_id(), Some("m"));
        assert_eq!(
            registry.scope(child).workflow_definition().module,
            vec!["outer_flow", "nodes", "map_items", "workflow"]
        );
    }

    #[test]
    fn lookup_walks_parent_chain_then_global() {
        let ctx = WorkflowContext::build(&nested(), CodegenConfig::default()).unwrap();
        let registry = &ctx.registry;
        let child = registry.find::<NodeContext>(ScopeId::ROOT, "m").unwrap().nested_scope.unwrap();

        assert!(registry.find_local::<InputVariableContext>(child, "in-1").is_none());
        assert!(registry.find::<InputVariableContext>(child, "in-1").is_some());
        assert!(registry.find_local::<NodeContext>(ScopeId::ROOT, "inner").is_none());
        assert!(registry.find::<NodeContext>(ScopeId::ROOT, "inner").is_some());
        assert!(registry.find::<OutputVariableContext>(ScopeId::ROOT, "ov-1").is_some());
    }

    #[test]
    fn emission_order_follows_declaration_with_nested_after_owner() {
        let ctx = WorkflowContext::build(&nested(), CodegenConfig::default()).unwrap();
        let registry = &ctx.registry;
        let a = registry.find::<NodeContext>(ScopeId::ROOT, "a").unwrap();
        let m = registry.find::<NodeContext>(ScopeId::ROOT, "m").unwrap();
        let inner = registry.find::<NodeContext>(ScopeId::ROOT, "inner").unwrap();
        let b = registry.find::<NodeContext>(ScopeId::ROOT, "b").unwrap();
        assert!(registry.is_emitted_before(a, m));
        assert!(registry.is_emitted_before(m, inner));
        assert!(registry.is_emitted_before(inner, b));
        assert!(!registry.is_emitted_before(b, a));
    }

    #[test]
    fn class_names_are_unique_per_scope() {
        let ctx = WorkflowContext::build(&nested(), CodegenConfig::default()).unwrap();
        let registry = &ctx.registry;
        let name = |id: &str| registry.find::<NodeContext>(ScopeId::ROOT, id).unwrap().definition.name.clone();
        assert_eq!(name("a"), "Prompt");
        assert_eq!(name("b"), "Prompt2");
        // Separate scope, separate namespace.
        assert_eq!(name("inner"), "Prompt");
    }

    #[test]
    fn default_port_is_implicit() {
        let ctx = WorkflowContext::build(&nested(), CodegenConfig::default()).unwrap();
        let registry = &ctx.registry;
        let a = registry.find::<NodeContext>(ScopeId::ROOT, "a").unwrap();
        let port = registry.default_port(a).unwrap();
        assert_eq!(port.id, "a.default");
        assert_eq!(port.name, "default");
    }

    #[test]
    fn duplicate_input_variable_is_rejected_by_default() {
        let def = definition(json!({
            "label": "Dupes",
            "input_variables": [
                {"id": "in-1", "key": "a", "type": "STRING"},
                {"id": "in-1", "key": "b", "type": "STRING"}
            ],
            "workflow_raw_data": {}
        }));
        let err = WorkflowContext::build(&def, CodegenConfig::default()).err().unwrap();
        assert_eq!(
            err,
            GenerationError::DuplicateEntity {
                kind: EntityKind::InputVariable,
                id: "in-1".into()
            }
        );
    }

    #[test]
    fn duplicate_node_keeps_first_and_warns() {
        let def = definition(json!({
            "label": "Dupes",
            "workflow_raw_data": {"nodes": [
                {"id": "n", "type": "GENERIC", "label": "First"},
                {"id": "n", "type": "GENERIC", "label": "Second"}
            ]}
        }));
        let ctx = WorkflowContext::build(&def, CodegenConfig::default()).unwrap();
        let node = ctx.registry.find::<NodeContext>(ScopeId::ROOT, "n").unwrap();
        assert_eq!(node.label, "First");
        let warnings = ctx.errors(Some(Severity::Warning));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Duplicate node id 'n'");
    }

    #[test]
    fn uniform_keep_first_accepts_duplicate_inputs() {
        let def = definition(json!({
            "label": "Dupes",
            "input_variables": [
                {"id": "in-1", "key": "a", "type": "STRING"},
                {"id": "in-1", "key": "b", "type": "NUMBER"}
            ],
            "workflow_raw_data": {}
        }));
        let config = CodegenConfig {
            duplicate_policy: DuplicatePolicy::uniform(OnDuplicate::KeepFirst),
            ..CodegenConfig::default()
        };
        let ctx = WorkflowContext::build(&def, config).unwrap();
        let var = ctx.registry.find::<InputVariableContext>(ScopeId::ROOT, "in-1").unwrap();
        assert_eq!(var.key, "a");
    }

    #[test]
    fn conditional_ports_come_from_conditions() {
        let def = definition(json!({
            "label": "Branching",
            "workflow_raw_data": {"nodes": [
                {"id": "c", "type": "CONDITIONAL", "label": "Check", "conditions": [
                    {"id": "c1", "type": "IF", "source_handle_id": "h-if", "data": null},
                    {"id": "c2", "type": "ELSE", "source_handle_id": "h-else"}
                ]}
            ]}
        }));
        let ctx = WorkflowContext::build(&def, CodegenConfig::default()).unwrap();
        let registry = &ctx.registry;
        let node = registry.find::<NodeContext>(ScopeId::ROOT, "c").unwrap();
        let ports: Vec<_> = registry.ports_of(node).map(|p| (p.name.as_str(), p.port_type)).collect();
        assert_eq!(ports, vec![("branch_1", PortType::If), ("branch_2", PortType::Else)]);
        assert!(registry.default_port(node).is_none());
    }
}
