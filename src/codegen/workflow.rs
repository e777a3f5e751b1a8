//! Emit the per-scope modules: `inputs`, `state`, `workflow` and the
//! `nodes` package index.

use super::graph::build_graph;
use super::imports::ImportSet;
use super::writer::CodeWriter;
use crate::ast::{Expr, Import, sdk};
use crate::config::RenderOptions;
use crate::context::{NodeContext, OutputVariableContext, Scope};
use crate::error::GenerationError;
use crate::parse::{ConstantValue, Definition, VariableType, WorkflowRawData};
use crate::resolve::{DescriptorMode, ExpressionBuilder};

/// One typed class attribute: `name: hint = default`.
struct Field<'c> {
    name: &'c str,
    var_type: VariableType,
    default: Option<&'c ConstantValue>,
    required: bool,
}

/// `Inputs(BaseInputs)` for the scope. `None` when the scope declares no inputs.
pub fn gen_inputs(
    builder: &mut ExpressionBuilder<'_>,
    scope: &Scope,
    render: &RenderOptions,
) -> Result<Option<String>, GenerationError> {
    let fields: Vec<Field<'_>> = scope
        .input_variables()
        .map(|v| Field {
            name: &v.name,
            var_type: v.var_type,
            default: v.default.as_ref(),
            required: v.required,
        })
        .collect();
    if fields.is_empty() {
        return Ok(None);
    }
    gen_fields_class(builder, scope.inputs_definition(), sdk::base_inputs(), &fields, render).map(Some)
}

/// `State(BaseState)` for the scope. `None` when the scope declares no state.
pub fn gen_state(
    builder: &mut ExpressionBuilder<'_>,
    scope: &Scope,
    render: &RenderOptions,
) -> Result<Option<String>, GenerationError> {
    let fields: Vec<Field<'_>> = scope
        .state_variables()
        .map(|v| Field {
            name: &v.name,
            var_type: v.var_type,
            default: v.default.as_ref(),
            required: false,
        })
        .collect();
    if fields.is_empty() {
        return Ok(None);
    }
    gen_fields_class(builder, scope.state_definition(), sdk::base_state(), &fields, render).map(Some)
}

fn gen_fields_class(
    builder: &mut ExpressionBuilder<'_>,
    definition: &Definition,
    base: Import,
    fields: &[Field<'_>],
    render: &RenderOptions,
) -> Result<String, GenerationError> {
    let mut imports = ImportSet::for_module(&definition.module, [definition.name.clone()]);
    imports.add(base.clone());

    let mut w = CodeWriter::with_indent(render.indent);
    w.block_open(&format!("class {}({})", definition.name, base.name));
    for field in fields {
        let (hint, import) = sdk::type_hint(field.var_type);
        if let Some(import) = import {
            imports.add(import);
        }
        let default = match field.default {
            Some(value) => Some(builder.constant_expr(value, DescriptorMode::Value)?),
            None => None,
        };
        match default {
            Some(expr) => {
                imports.add_expr(&expr);
                w.lines(&format!("{}: {} = ", field.name, hint), &expr.render_with(render));
            }
            None if field.required => w.line(&format!("{}: {}", field.name, hint)),
            None => {
                imports.add(sdk::typing("Optional"));
                w.line(&format!("{}: Optional[{}] = None", field.name, hint));
            }
        }
    }
    w.block_close(fields.is_empty());
    Ok(super::assemble(&imports, w.finish(), render))
}

/// The workflow class: generic parameters, `graph` and `Outputs`.
///
/// Output values naming an unknown output variable are reported and left out.
pub fn gen_workflow(
    builder: &mut ExpressionBuilder<'_>,
    raw: &WorkflowRawData,
    render: &RenderOptions,
) -> Result<String, GenerationError> {
    let registry = builder.registry();
    let scope = registry.scope(builder.scope());
    let definition = scope.workflow_definition();
    let base = sdk::base_workflow();
    let mut imports = ImportSet::for_module(&definition.module, [definition.name.clone()]);
    imports.add(base.clone());

    let has_inputs = scope.input_variables().next().is_some();
    let has_state = scope.state_variables().next().is_some();
    let class_line = if has_inputs || has_state {
        let inputs = if has_inputs { Import::from(scope.inputs_definition()) } else { sdk::base_inputs() };
        let state = if has_state { Import::from(scope.state_definition()) } else { sdk::base_state() };
        let line = format!("class {}({}[{}, {}])", definition.name, base.name, inputs.name, state.name);
        imports.add(inputs);
        imports.add(state);
        line
    } else {
        format!("class {}({})", definition.name, base.name)
    };

    let graph = build_graph(builder, raw)?;

    let mut outputs: Vec<(&str, Expr)> = Vec::new();
    for output in &raw.output_values {
        let Some(var) = registry.find_local::<OutputVariableContext>(scope.id(), &output.output_variable_id) else {
            builder.report(GenerationError::OutputVariableNotFound {
                id: output.output_variable_id.clone(),
            })?;
            continue;
        };
        outputs.push((&var.name, builder.build_descriptor(&output.value)?));
    }

    let mut w = CodeWriter::with_indent(render.indent);
    w.block_open(&class_line);
    let mut empty = true;
    if let Some(graph) = &graph {
        imports.add_expr(graph);
        w.lines("graph = ", &graph.render_with(render));
        empty = false;
    }
    if !outputs.is_empty() {
        if !empty {
            w.blank();
        }
        w.block_open(&format!("class Outputs({}.Outputs)", base.name));
        for (name, expr) in &outputs {
            imports.add_expr(expr);
            w.lines(&format!("{} = ", name), &expr.render_with(render));
        }
        w.block_close(false);
        empty = false;
    }
    w.block_close(empty);
    Ok(super::assemble(&imports, w.finish(), render))
}

/// `nodes/__init__.py`: re-export every node class of the scope.
pub fn gen_nodes_index(scope: &Scope) -> Option<String> {
    let nodes: Vec<&NodeContext> = scope.nodes().collect();
    if nodes.is_empty() {
        return None;
    }
    let mut w = CodeWriter::new();
    for node in &nodes {
        let module = node.definition.module.last().map(String::as_str).unwrap_or_default();
        w.line(&format!("from .{} import {}", module, node.definition.name));
    }
    w.blank();
    w.line("__all__ = [");
    w.indent();
    for node in &nodes {
        w.line(&format!("\"{}\",", node.definition.name));
    }
    w.dedent();
    w.line("]");
    Some(w.finish())
}

/// Root package `__init__.py`: re-export the workflow class.
pub fn gen_package_index(scope: &Scope) -> String {
    let definition = scope.workflow_definition();
    format!(
        "from .workflow import {}\n\n__all__ = [\"{}\"]\n",
        definition.name, definition.name
    )
}
