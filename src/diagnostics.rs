//! Ordered, deduplicated diagnostics and the strict/lenient collector.
//!
//! Resolvers return `Result<T, GenerationError>`. The `Collector` is the one
//! place that decides whether an error aborts generation (strict mode, or a
//! contract violation) or is recorded and replaced by a sentinel (lenient).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::context::ScopeId;
use crate::error::{GenerationError, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    Strict,
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub node_id: Option<String>,
}

impl From<&GenerationError> for Diagnostic {
    fn from(e: &GenerationError) -> Self {
        Diagnostic {
            code: e.code().into(),
            message: e.to_string(),
            severity: e.severity(),
            node_id: e.node_id().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    scope: ScopeId,
    diagnostic: Diagnostic,
}

/// Diagnostics for a whole workflow tree, tagged by the scope they arose in.
///
/// Identical messages are recorded once per scope.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Entry>,
    seen: HashSet<(ScopeId, String)>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic. Returns false if the scope already holds the same message.
    pub fn add_error(&mut self, scope: ScopeId, diagnostic: Diagnostic) -> bool {
        if !self.seen.insert((scope, diagnostic.message.clone())) {
            return false;
        }
        self.entries.push(Entry { scope, diagnostic });
        true
    }

    /// All diagnostics in recording order, optionally filtered by severity.
    pub fn errors(&self, severity: Option<Severity>) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .map(|e| &e.diagnostic)
            .filter(|d| severity.is_none_or(|s| d.severity == s))
            .collect()
    }

    /// Diagnostics recorded for one scope only.
    pub fn errors_in(&self, scope: ScopeId, severity: Option<Severity>) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|e| e.scope == scope)
            .map(|e| &e.diagnostic)
            .filter(|d| severity.is_none_or(|s| d.severity == s))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries.into_iter().map(|e| e.diagnostic).collect()
    }
}

/// Applies the error policy for one scope.
pub struct Collector<'a> {
    diagnostics: &'a mut Diagnostics,
    policy: ErrorPolicy,
    scope: ScopeId,
}

impl<'a> Collector<'a> {
    pub fn new(diagnostics: &'a mut Diagnostics, policy: ErrorPolicy, scope: ScopeId) -> Self {
        Self {
            diagnostics,
            policy,
            scope,
        }
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Record a recoverable error, or hand it back if it must abort generation.
    pub fn report(&mut self, err: GenerationError) -> Result<(), GenerationError> {
        if self.policy == ErrorPolicy::Strict || err.is_contract_violation() {
            return Err(err);
        }
        let diagnostic = Diagnostic::from(&err);
        match diagnostic.severity {
            Severity::Warning => warn!(
                code = %diagnostic.code,
                node_id = diagnostic.node_id.as_deref().unwrap_or(""),
                scope = self.scope.index(),
                "{}",
                diagnostic.message
            ),
            Severity::Error => error!(
                code = %diagnostic.code,
                node_id = diagnostic.node_id.as_deref().unwrap_or(""),
                scope = self.scope.index(),
                "{}",
                diagnostic.message
            ),
        }
        self.diagnostics.add_error(self.scope, diagnostic);
        Ok(())
    }

    /// `Ok(Some(v))` on success, `Ok(None)` when the error was recorded.
    pub fn recover<T>(&mut self, result: Result<T, GenerationError>) -> Result<Option<T>, GenerationError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.report(err)?;
                Ok(None)
            }
        }
    }

    /// Like `recover`, substituting `sentinel` for a recorded error.
    pub fn or_sentinel<T>(
        &mut self,
        result: Result<T, GenerationError>,
        sentinel: T,
    ) -> Result<T, GenerationError> {
        Ok(self.recover(result)?.unwrap_or(sentinel))
    }
}
