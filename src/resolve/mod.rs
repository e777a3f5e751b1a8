//! Resolve phase: value descriptors, pointer rules and condition trees → `Expr`.
//!
//! All builders hang off `ExpressionBuilder`, which pairs read access to the
//! registry with the diagnostics collector of one scope. Builder methods
//! return `Err` only for failures that must abort generation; everything
//! recoverable has already been recorded and replaced by `Expr::None`.

pub mod coalesce;
pub mod condition;
pub mod descriptor;
pub mod legacy;
pub mod pointer;

pub use descriptor::{BuildOptions, DescriptorMode};
pub use pointer::ResolvedRule;

use crate::context::{NodeContext, Registry, ScopeId, WorkflowContext};
use crate::diagnostics::Collector;
use crate::error::GenerationError;

pub struct ExpressionBuilder<'a> {
    registry: &'a Registry,
    collector: Collector<'a>,
    scope: ScopeId,
    /// The node whose class body is being generated, if any.
    current_node: Option<&'a NodeContext>,
}

impl<'a> ExpressionBuilder<'a> {
    pub fn new(registry: &'a Registry, collector: Collector<'a>) -> Self {
        let scope = collector.scope();
        Self {
            registry,
            collector,
            scope,
            current_node: None,
        }
    }

    /// Treat `node_id` as the node under generation for forward and
    /// self-reference detection. Unknown ids leave no current node.
    pub fn for_node(mut self, node_id: &str) -> Self {
        self.current_node = self.registry.find::<NodeContext>(self.scope, node_id);
        self
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn current_node(&self) -> Option<&'a NodeContext> {
        self.current_node
    }

    /// Record a recoverable error or propagate a fatal one.
    pub fn report(&mut self, err: GenerationError) -> Result<(), GenerationError> {
        self.collector.report(err)
    }

    fn recover<T>(&mut self, result: Result<T, GenerationError>) -> Result<Option<T>, GenerationError> {
        self.collector.recover(result)
    }

    fn or_sentinel<T>(&mut self, result: Result<T, GenerationError>, sentinel: T) -> Result<T, GenerationError> {
        self.collector.or_sentinel(result, sentinel)
    }
}

impl WorkflowContext {
    /// A builder for `scope` that records into this context's diagnostics.
    pub fn builder(&mut self, scope: ScopeId) -> ExpressionBuilder<'_> {
        let policy = self.config.policy();
        ExpressionBuilder::new(
            &self.registry,
            Collector::new(&mut self.diagnostics, policy, scope),
        )
    }
}
