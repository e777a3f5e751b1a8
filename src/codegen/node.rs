//! Emit one node module: the node class, its `Outputs` and its `Ports`.

use super::graph::build_ports;
use super::imports::ImportSet;
use super::writer::CodeWriter;
use crate::ast::{Expr, sdk};
use crate::config::RenderOptions;
use crate::context::NodeContext;
use crate::context::naming::{UniqueNames, snake_name};
use crate::error::GenerationError;
use crate::parse::{NodeType, WorkflowNode};
use crate::resolve::ExpressionBuilder;

/// Attribute names the runtime gives meaning to. Claimed before any
/// user-named member so inputs cannot shadow them.
const RESERVED_MEMBERS: &[&str] = &["Outputs", "Ports", "subworkflow", "deployment", "release_tag"];

/// SDK base class for a node type.
pub fn base_class(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Generic => "BaseNode",
        NodeType::Templating => "TemplatingNode",
        NodeType::Conditional => "ConditionalNode",
        NodeType::Map => "MapNode",
        NodeType::Subworkflow => "InlineSubworkflowNode",
        NodeType::ToolCalling => "ToolCallingNode",
        NodeType::SubworkflowDeployment => "SubworkflowDeploymentNode",
        NodeType::FinalOutput => "FinalOutputNode",
    }
}

/// Generate the module for `node`. `builder` must be scoped to the node.
pub fn gen_node(
    builder: &mut ExpressionBuilder<'_>,
    node: &WorkflowNode,
    node_ctx: &NodeContext,
    render: &RenderOptions,
) -> Result<String, GenerationError> {
    let registry = builder.registry();
    let class = &node_ctx.definition.name;
    let base = sdk::node_base(base_class(node.node_type));
    let mut imports = ImportSet::for_module(&node_ctx.definition.module, [class.clone()]);
    imports.add(base.clone());

    let mut names = UniqueNames::new();
    for reserved in RESERVED_MEMBERS {
        names.claim(reserved, "_");
    }

    let mut members: Vec<(String, Expr)> = Vec::new();
    for attribute in &node.attributes {
        let expr = builder.build_descriptor(&attribute.value)?;
        members.push((names.claim(&snake_name(&attribute.name, "attribute"), "_"), expr));
    }
    // Conditional inputs only feed the port conditions.
    if node.node_type != NodeType::Conditional {
        for input in &node.inputs {
            let expr = builder.build_node_input(&input.value)?;
            members.push((names.claim(&snake_name(&input.key, "input"), "_"), expr));
        }
    }
    if let Some(child) = node_ctx.nested_scope {
        let workflow = registry.scope(child).workflow_definition();
        members.push(("subworkflow".into(), Expr::reference(workflow)));
    }
    if let Some(deployment) = &node_ctx.deployment {
        members.push(("deployment".into(), Expr::str(&deployment.name)));
        members.push(("release_tag".into(), Expr::str(&deployment.release_tag)));
    }
    let ports = build_ports(builder, node, node_ctx)?;

    let mut w = CodeWriter::with_indent(render.indent);
    w.block_open(&format!("class {}({})", class, base.name));
    let mut empty = true;

    for (name, expr) in &members {
        imports.add_expr(expr);
        w.lines(&format!("{} = ", name), &expr.render_with(render));
        empty = false;
    }

    if !node_ctx.outputs.is_empty() {
        if !empty {
            w.blank();
        }
        w.block_open(&format!("class Outputs({}.Outputs)", base.name));
        for output in node_ctx.outputs.values() {
            let (hint, import) = sdk::type_hint(output.var_type);
            if let Some(import) = import {
                imports.add(import);
            }
            w.line(&format!("{}: {}", output.name, hint));
        }
        w.block_close(false);
        empty = false;
    }

    if !ports.is_empty() {
        if !empty {
            w.blank();
        }
        w.block_open(&format!("class Ports({}.Ports)", base.name));
        for (name, expr) in &ports {
            imports.add_expr(expr);
            w.lines(&format!("{} = ", name), &expr.render_with(render));
        }
        w.block_close(false);
        empty = false;
    }

    w.block_close(empty);
    Ok(super::assemble(&imports, w.finish(), render))
}
