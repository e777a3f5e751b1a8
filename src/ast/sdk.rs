//! Symbols of the workflow runtime SDK that generated code imports.

use super::Import;
use crate::parse::VariableType;

pub const ROOT: &str = "workflows";

fn sdk(module: &str, name: &str) -> Import {
    if module.is_empty() {
        Import::new(ROOT, name)
    } else {
        Import::new(&format!("{}.{}", ROOT, module), name)
    }
}

// References

pub fn lazy_reference() -> Import {
    sdk("references", "LazyReference")
}

pub fn constant_value_reference() -> Import {
    sdk("references", "ConstantValueReference")
}

pub fn dictionary_reference() -> Import {
    sdk("references", "DictionaryReference")
}

pub fn array_reference() -> Import {
    sdk("references", "ArrayReference")
}

pub fn secret_reference() -> Import {
    sdk("references", "SecretReference")
}

pub fn environment_variable_reference() -> Import {
    sdk("references", "EnvironmentVariableReference")
}

pub fn workflow_error() -> Import {
    sdk("types", "WorkflowError")
}

// Graph

pub fn port() -> Import {
    sdk("ports", "Port")
}

// Base classes

pub fn base_workflow() -> Import {
    sdk("", "BaseWorkflow")
}

pub fn base_inputs() -> Import {
    sdk("inputs", "BaseInputs")
}

pub fn base_state() -> Import {
    sdk("state", "BaseState")
}

pub fn node_base(name: &str) -> Import {
    sdk("nodes", name)
}

pub fn typing(name: &str) -> Import {
    Import::new("typing", name)
}

/// Python annotation for a variable type, plus the import it needs.
pub fn type_hint(var_type: VariableType) -> (&'static str, Option<Import>) {
    let runtime = |name: &'static str| (name, Some(sdk("types", name)));
    match var_type {
        VariableType::String => ("str", None),
        VariableType::Number => ("float", None),
        VariableType::Null => ("None", None),
        VariableType::Json => ("Any", Some(typing("Any"))),
        VariableType::Array => ("list", None),
        VariableType::ChatHistory => runtime("ChatHistory"),
        VariableType::SearchResults => runtime("SearchResults"),
        VariableType::Error => runtime("WorkflowError"),
        VariableType::FunctionCall => runtime("FunctionCall"),
        VariableType::Image => runtime("Image"),
        VariableType::Audio => runtime("Audio"),
        VariableType::Document => runtime("Document"),
        VariableType::Video => runtime("Video"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_paths() {
        assert_eq!(lazy_reference().module_path(), "workflows.references");
        assert_eq!(base_workflow().module_path(), "workflows");
        assert_eq!(node_base("MapNode").module_path(), "workflows.nodes");
    }

    #[test]
    fn type_hints() {
        assert_eq!(type_hint(VariableType::String), ("str", None));
        assert_eq!(type_hint(VariableType::Json), ("Any", Some(typing("Any"))));
        assert_eq!(type_hint(VariableType::Error).1, Some(workflow_error()));
    }
}
