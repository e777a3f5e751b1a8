//! Ordered pointer rules → one `coalesce` chain.

use tracing::debug;

use super::ExpressionBuilder;
use super::pointer::ResolvedRule;
use crate::ast::Expr;
use crate::error::GenerationError;
use crate::parse::NodeInputValuePointer;

impl<'a> ExpressionBuilder<'a> {
    /// First present value wins.
    ///
    /// Rules that fail to resolve are dropped. A constant ends the chain and
    /// later rules are never visited. When any retained rule reads the node
    /// under generation, the whole chain is deferred as one thunk.
    pub fn build_node_input(&mut self, pointer: &NodeInputValuePointer) -> Result<Expr, GenerationError> {
        let mut retained: Vec<ResolvedRule> = Vec::with_capacity(pointer.rules.len());
        for rule in &pointer.rules {
            let resolved = self.resolve_rule(rule);
            if let Some(resolved) = self.recover(resolved)? {
                retained.push(resolved);
                if rule.is_constant() {
                    break;
                }
            }
        }

        let self_referencing = self.current_node().is_some_and(|current| {
            retained
                .iter()
                .any(|r| r.node_id.as_deref() == Some(current.id.as_str()))
        });
        if self_referencing {
            debug!(
                node_id = self.current_node().map(|n| n.id.as_str()).unwrap_or(""),
                "deferring self-referencing node input"
            );
            let chain = chain(retained.into_iter().map(|r| r.expr));
            return Ok(chain.lazy());
        }
        Ok(chain(retained.into_iter().map(ResolvedRule::into_expr)))
    }
}

fn chain(mut exprs: impl Iterator<Item = Expr>) -> Expr {
    let Some(first) = exprs.next() else {
        return Expr::None;
    };
    exprs.fold(first, |acc, next| acc.method("coalesce", vec![next]))
}
