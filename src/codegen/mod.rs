//! Codegen pass: workflow definition → Python package of generated modules.
//!
//! Public API: `generate(def, config) -> Result<CodegenOutput, Vec<CompilerError>>`

mod graph;
mod imports;
mod node;
mod workflow;
mod writer;

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{CodegenConfig, RenderOptions};
use crate::context::{NodeContext, ScopeId, WorkflowContext};
use crate::diagnostics::Diagnostic;
use crate::error::{CompilerError, GenerationError, Phase};
use crate::parse::{self, WorkflowDefinition};
use imports::ImportSet;
use writer::CodeWriter;

pub use node::base_class;

/// A generated file with its path and content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// The complete output of the codegen pass.
#[derive(Debug, Clone, Serialize)]
pub struct CodegenOutput {
    pub files: Vec<GeneratedFile>,
    /// Everything recorded while generating in lenient mode.
    pub diagnostics: Vec<Diagnostic>,
}

impl CodegenOutput {
    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// Generate the Python package for a workflow definition and its nested workflows.
pub fn generate(def: &WorkflowDefinition, config: CodegenConfig) -> Result<CodegenOutput, Vec<CompilerError>> {
    let mut ctx = WorkflowContext::build(def, config)
        .map_err(|e| vec![CompilerError::generation(Phase::Context, e)])?;
    let render = ctx.config.render.clone();

    let mut files = Vec::new();
    let root = ctx.registry.scope(ScopeId::ROOT);
    files.push(GeneratedFile {
        path: package_path(root.module(), "__init__"),
        content: workflow::gen_package_index(root),
    });
    gen_scope(&mut ctx, ScopeId::ROOT, def, &render, &mut files)
        .map_err(|e| vec![CompilerError::generation(Phase::Resolve, e)])?;

    let diagnostics = ctx.diagnostics.into_vec();
    info!(
        files = files.len(),
        diagnostics = diagnostics.len(),
        "generated workflow '{}'",
        def.label
    );
    Ok(CodegenOutput { files, diagnostics })
}

/// Parse a workflow definition JSON string and generate it.
pub fn generate_json(json: &str, config: CodegenConfig) -> Result<CodegenOutput, Vec<CompilerError>> {
    let def = parse::parse(json)?;
    generate(&def, config)
}

/// Emit every file of one scope, recursing into nested workflows right
/// after the node that owns them.
fn gen_scope(
    ctx: &mut WorkflowContext,
    scope_id: ScopeId,
    def: &WorkflowDefinition,
    render: &RenderOptions,
    files: &mut Vec<GeneratedFile>,
) -> Result<(), GenerationError> {
    debug!(scope = scope_id.index(), label = %def.label, "generating scope");
    let raw = &def.workflow_raw_data;

    {
        let mut builder = ctx.builder(scope_id);
        let scope = builder.registry().scope(scope_id);
        let module = scope.module().to_vec();
        if let Some(content) = workflow::gen_inputs(&mut builder, scope, render)? {
            files.push(GeneratedFile {
                path: package_path(&module, "inputs"),
                content,
            });
        }
        if let Some(content) = workflow::gen_state(&mut builder, scope, render)? {
            files.push(GeneratedFile {
                path: package_path(&module, "state"),
                content,
            });
        }
        files.push(GeneratedFile {
            path: package_path(&module, "workflow"),
            content: workflow::gen_workflow(&mut builder, raw, render)?,
        });
        if let Some(content) = workflow::gen_nodes_index(scope) {
            let mut nodes = module.clone();
            nodes.push("nodes".into());
            files.push(GeneratedFile {
                path: package_path(&nodes, "__init__"),
                content,
            });
        }
    }

    let mut seen = HashSet::new();
    for node in &raw.nodes {
        // Duplicates that survived registration are not emitted twice.
        if !seen.insert(node.id.as_str()) {
            continue;
        }
        let nested = {
            let mut builder = ctx.builder(scope_id).for_node(&node.id);
            let Some(node_ctx) = builder.registry().find_local::<NodeContext>(scope_id, &node.id) else {
                continue;
            };
            let path = match node_ctx.nested_scope {
                Some(_) => package_path(&node_ctx.definition.module, "__init__"),
                None => module_path(&node_ctx.definition.module),
            };
            let content = node::gen_node(&mut builder, node, node_ctx, render)?;
            files.push(GeneratedFile { path, content });
            node_ctx.nested_scope
        };
        if let (Some(child), Some(sub)) = (nested, node.subworkflow.as_deref()) {
            gen_scope(ctx, child, sub, render, files)?;
        }
    }
    Ok(())
}

/// Imports, two blank lines, then the body. Imports only read inside
/// thunks follow the body, once the module's own classes exist.
fn assemble(imports: &ImportSet, body: String, render: &RenderOptions) -> String {
    let mut w = CodeWriter::with_indent(render.indent);
    if !imports.is_empty() {
        imports.emit(&mut w);
        w.blank();
        w.blank();
    }
    let mut out = w.finish();
    out.push_str(&body);
    if imports.has_deferred() {
        let mut tail = CodeWriter::with_indent(render.indent);
        tail.blank();
        tail.blank();
        imports.emit_deferred(&mut tail);
        out.push_str(&tail.finish());
    }
    out
}

/// `a.b` + `c` → `a/b/c.py`
fn package_path(module: &[String], file: &str) -> String {
    let mut parts = module.to_vec();
    parts.push(file.to_string());
    module_path(&parts)
}

fn module_path(module: &[String]) -> String {
    format!("{}.py", module.join("/"))
}
