//! Ports and edges: the graph half of the generated workflow.

use std::collections::HashSet;

use tracing::debug;

use crate::ast::{BinOp, Expr, sdk};
use crate::context::{NodeContext, PortContext};
use crate::error::GenerationError;
use crate::parse::{ConditionType, NodeType, PortType, WorkflowGraph, WorkflowNode, WorkflowRawData};
use crate::resolve::ExpressionBuilder;

/// `(attribute name, Port expression)` for each port the node declares.
///
/// Conditional nodes get one `Port.on_if/on_elif/on_else` per condition.
/// Nodes relying on the implicit default port get none.
pub fn build_ports(
    builder: &mut ExpressionBuilder<'_>,
    node: &WorkflowNode,
    node_ctx: &NodeContext,
) -> Result<Vec<(String, Expr)>, GenerationError> {
    let registry = builder.registry();
    let port = || Expr::Reference(sdk::port());

    if node.node_type == NodeType::Conditional {
        let mut ports = Vec::with_capacity(node.conditions.len());
        for condition in &node.conditions {
            let Some(port_ctx) = registry.find_local::<PortContext>(node_ctx.scope, &condition.source_handle_id) else {
                continue;
            };
            let expr = match condition.condition_type {
                ConditionType::Else => port().method("on_else", vec![]),
                kind => {
                    let test = match &condition.data {
                        Some(rule) => builder.build_condition(rule, &node.inputs)?,
                        None => Expr::None,
                    };
                    let method = if kind == ConditionType::If { "on_if" } else { "on_elif" };
                    port().method(method, vec![test])
                }
            };
            ports.push((port_ctx.name.clone(), expr));
        }
        return Ok(ports);
    }

    if node.ports.is_empty() {
        return Ok(vec![]);
    }
    Ok(registry
        .ports_of(node_ctx)
        .map(|p| {
            let expr = match p.port_type {
                PortType::Default => port().call(vec![]),
                PortType::If => port().method("on_if", vec![Expr::None]),
                PortType::Elif => port().method("on_elif", vec![Expr::None]),
                PortType::Else => port().method("on_else", vec![]),
            };
            (p.name.clone(), expr)
        })
        .collect())
}

/// The workflow's `graph` attribute: one `Source.Ports.port >> Target`
/// per edge plus every node that no edge touches.
///
/// Edges naming an unknown node or port are reported and skipped. `None`
/// when the scope has no nodes.
pub fn build_graph(
    builder: &mut ExpressionBuilder<'_>,
    raw: &WorkflowRawData,
) -> Result<Option<Expr>, GenerationError> {
    let registry = builder.registry();
    let scope = builder.scope();
    let graph = WorkflowGraph::build(raw);
    if graph.has_cycle() {
        debug!(scope = scope.index(), "workflow graph contains a loop");
    }

    let mut items = Vec::new();
    let mut rendered = HashSet::new();
    let mut connected = HashSet::new();

    for edge in &raw.edges {
        let source = registry.find_local::<NodeContext>(scope, &edge.source_node_id);
        let target = registry.find_local::<NodeContext>(scope, &edge.target_node_id);
        let (source, target) = match (source, target) {
            (Some(s), Some(t)) => (s, t),
            (None, _) => {
                builder.report(GenerationError::NodeNotFound {
                    node_id: edge.source_node_id.clone(),
                })?;
                continue;
            }
            (_, None) => {
                builder.report(GenerationError::NodeNotFound {
                    node_id: edge.target_node_id.clone(),
                })?;
                continue;
            }
        };

        let port = match edge.source_handle_id.as_deref() {
            Some(handle) => registry
                .find_local::<PortContext>(scope, handle)
                .filter(|p| p.node_id == source.id),
            None => registry.default_port(source),
        };
        let Some(port) = port else {
            builder.report(GenerationError::PortNotFound {
                node_id: source.id.clone(),
                port_id: edge.source_handle_id.clone().unwrap_or_else(|| "default".into()),
            })?;
            continue;
        };

        let from = if is_implicit_port(port, source) {
            Expr::reference(&source.definition)
        } else {
            Expr::reference(&source.definition).attr("Ports").attr(&port.name)
        };
        let expr = Expr::binary(BinOp::RShift, from, Expr::reference(&target.definition));
        connected.insert(source.id.as_str());
        connected.insert(target.id.as_str());
        if rendered.insert(expr.render()) {
            items.push(expr);
        }
    }

    for node_id in graph.entrypoints() {
        if connected.contains(node_id) || graph.outgoing_count(node_id) > 0 {
            continue;
        }
        if let Some(node) = registry.find_local::<NodeContext>(scope, node_id) {
            items.push(Expr::reference(&node.definition));
        }
    }

    Ok(match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(Expr::Set(items)),
    })
}

/// The port synthesized for nodes that declare none.
fn is_implicit_port(port: &PortContext, node: &NodeContext) -> bool {
    port.id == format!("{}.default", node.id)
}
