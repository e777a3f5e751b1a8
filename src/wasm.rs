//! WASM entry points for browser use.

use wasm_bindgen::prelude::*;

use crate::codegen;
use crate::config::CodegenConfig;
use crate::diagnostics::Diagnostic;
use crate::error::{CompilerError, Severity};

/// Full pipeline: parse → context → resolve → codegen.
/// Returns a JSON object with either `files` and `diagnostics` (success)
/// or `errors` (failure). An empty `config_json` means the defaults.
#[wasm_bindgen]
pub fn generate_workflow(json: &str, config_json: &str) -> JsValue {
    let result = generate_workflow_inner(json, config_json);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn generate_workflow_inner(json: &str, config_json: &str) -> GenerateResult {
    let config = match CodegenConfig::from_json(config_json) {
        Ok(c) => c,
        Err(e) => return GenerateResult::errors(vec![e]),
    };
    match codegen::generate_json(json, config) {
        Ok(output) => GenerateResult::Success {
            files: output
                .files
                .into_iter()
                .map(|f| FileDto {
                    path: f.path,
                    content: f.content,
                })
                .collect(),
            diagnostics: output.diagnostics.into_iter().map(DiagnosticDto::from).collect(),
        },
        Err(errors) => GenerateResult::errors(errors),
    }
}

/// Resolve a workflow without returning files: the editor's problem list.
/// Returns a JSON array of diagnostics, or of errors when generation aborts.
#[wasm_bindgen]
pub fn check_workflow(json: &str, config_json: &str) -> JsValue {
    let result = check_workflow_inner(json, config_json);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn check_workflow_inner(json: &str, config_json: &str) -> Vec<DiagnosticDto> {
    match generate_workflow_inner(json, config_json) {
        GenerateResult::Success { diagnostics, .. } => diagnostics,
        GenerateResult::Errors { errors } => errors
            .into_iter()
            .map(|e| DiagnosticDto {
                code: e.code,
                severity: Severity::Error.to_string(),
                message: e.message,
                node_id: e.node_id,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(serde::Serialize, serde::Deserialize)]
struct ErrorDto {
    code: String,
    phase: String,
    message: String,
    node_id: Option<String>,
}

impl From<CompilerError> for ErrorDto {
    fn from(e: CompilerError) -> Self {
        ErrorDto {
            code: e.code,
            phase: e.phase.to_string(),
            message: e.message,
            node_id: e.node_id,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct DiagnosticDto {
    code: String,
    severity: String,
    message: String,
    node_id: Option<String>,
}

impl From<Diagnostic> for DiagnosticDto {
    fn from(d: Diagnostic) -> Self {
        DiagnosticDto {
            code: d.code,
            severity: d.severity.to_string(),
            message: d.message,
            node_id: d.node_id,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct FileDto {
    path: String,
    content: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "status")]
enum GenerateResult {
    #[serde(rename = "success")]
    Success {
        files: Vec<FileDto>,
        diagnostics: Vec<DiagnosticDto>,
    },
    #[serde(rename = "errors")]
    Errors { errors: Vec<ErrorDto> },
}

impl GenerateResult {
    fn errors(errors: Vec<CompilerError>) -> Self {
        GenerateResult::Errors {
            errors: errors.into_iter().map(ErrorDto::from).collect(),
        }
    }
}
