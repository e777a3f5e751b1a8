//! Collect the imports a generated file needs and emit them.

use std::collections::{BTreeMap, BTreeSet};

use super::writer::CodeWriter;
use crate::ast::{Expr, Import};

/// Symbols needed from each module, grouped and sorted for stable output.
#[derive(Debug, Default)]
pub struct ImportSet {
    modules: BTreeMap<String, BTreeSet<String>>,
    /// Symbols only read inside a thunk, imported after the module body.
    deferred: BTreeMap<String, BTreeSet<String>>,
    /// The module of the file being generated; never imported from.
    own_module: Option<String>,
    /// Names defined in the file being generated.
    local_names: BTreeSet<String>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// An import set for the file at `module` that defines `local_names`.
    pub fn for_module(module: &[String], local_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            modules: BTreeMap::new(),
            deferred: BTreeMap::new(),
            own_module: Some(module.join(".")),
            local_names: local_names.into_iter().collect(),
        }
    }

    pub fn add(&mut self, import: Import) {
        if self.is_local(&import) {
            return;
        }
        self.modules.entry(import.module_path()).or_default().insert(import.name);
    }

    /// Import `import` below the module body, so that two modules whose
    /// classes refer to each other lazily can load in either order.
    pub fn add_deferred(&mut self, import: Import) {
        if self.is_local(&import) {
            return;
        }
        self.deferred.entry(import.module_path()).or_default().insert(import.name);
    }

    pub fn add_expr(&mut self, expr: &Expr) {
        for import in expr.imports() {
            self.add(import);
        }
        for import in expr.deferred_imports() {
            self.add_deferred(import);
        }
    }

    fn is_local(&self, import: &Import) -> bool {
        self.own_module.as_deref() == Some(import.module_path().as_str()) || self.local_names.contains(&import.name)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Deferred symbols not already imported at the top.
    fn pending(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut out: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (module, names) in &self.deferred {
            let eager = self.modules.get(module);
            for name in names {
                if eager.is_some_and(|e| e.contains(name)) {
                    continue;
                }
                out.entry(module.as_str()).or_default().push(name.as_str());
            }
        }
        out
    }

    pub fn has_deferred(&self) -> bool {
        !self.pending().is_empty()
    }

    /// The imports placed after the module body.
    pub fn emit_deferred(&self, w: &mut CodeWriter) {
        for (module, names) in self.pending() {
            w.line(&format!("from {} import {}", module, names.join(", ")));
        }
    }

    /// `from a.b import X, Y`, one line per module. Standard-library modules
    /// come first, then everything else, each group sorted.
    pub fn emit(&self, w: &mut CodeWriter) {
        let (stdlib, rest): (Vec<_>, Vec<_>) = self
            .modules
            .iter()
            .partition(|(module, _)| STDLIB_MODULES.contains(&module.as_str()));
        for (module, names) in &stdlib {
            emit_line(module, names, w);
        }
        if !stdlib.is_empty() && !rest.is_empty() {
            w.blank();
        }
        for (module, names) in &rest {
            emit_line(module, names, w);
        }
    }
}

const STDLIB_MODULES: &[&str] = &["typing"];

fn emit_line(module: &str, names: &BTreeSet<String>, w: &mut CodeWriter) {
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    w.line(&format!("from {} import {}", module, names.join(", ")));
}
