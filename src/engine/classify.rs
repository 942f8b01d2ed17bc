//! Shared sub-expression classifier.
//!
//! Used for arguments, assignment right-hand sides, declarator
//! initializers, returns, and the branches of conditionals.

use tracing::trace;

use super::collect::collect_invocation;
use super::verify::Verifier;
use crate::analysis::{LiteralKind, NodeId, NodeKind, SymbolKind};
use crate::qualifier::QualifierSet;

/// What the classifier learned about an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Actual {
    /// The expression carries exactly these qualifiers.
    Known(QualifierSet),
    /// A reference or call that does not resolve; nothing to check.
    Unresolved,
    /// A shape the engine does not model.
    Unsupported,
}

impl Verifier<'_> {
    /// Check `expr` against `expected`, reporting each residual qualifier.
    ///
    /// Both branches of a conditional must satisfy `expected` on their own;
    /// a failing branch is reported at the branch.
    pub(super) fn check_expression(&mut self, expr: NodeId, expected: &QualifierSet) {
        if expected.is_empty() {
            return;
        }

        if let NodeKind::Conditional {
            when_true,
            when_false,
            ..
        } = self.program.kind(expr)
        {
            let (when_true, when_false) = (*when_true, *when_false);
            self.check_expression(when_true, expected);
            self.check_expression(when_false, expected);
            return;
        }

        match self.actual_of(expr) {
            Actual::Known(actual) => {
                let residual = self.session.hierarchy().satisfies(&actual, expected);
                for qualifier in &residual {
                    self.report(expr, qualifier, &actual, None);
                }
            }
            Actual::Unresolved => {
                trace!(at = %self.program.span(expr), "unresolved expression; skipped");
            }
            Actual::Unsupported => self.report_unsupported(expr, expected),
        }
    }

    /// Actual qualifiers of a non-conditional expression.
    pub(super) fn actual_of(&self, expr: NodeId) -> Actual {
        let table = self.session.table();

        match self.program.kind(expr) {
            NodeKind::Identifier { .. } | NodeKind::MemberAccess { .. } => {
                let base = match table.single(expr) {
                    Some(set) => set,
                    None => match self.program.symbol_of(expr) {
                        Some(symbol) if self.program.symbol(symbol).kind == SymbolKind::Type => {
                            return Actual::Unresolved;
                        }
                        Some(symbol) => self.session.declared(self.program, symbol),
                        None => return Actual::Unresolved,
                    },
                };
                Actual::Known(self.guard_narrowed(expr, base))
            }
            NodeKind::This => Actual::Known(self.session.non_null().clone()),
            NodeKind::Literal { kind, .. } => Actual::Known(match kind {
                LiteralKind::String => self.session.string_defaults().clone(),
                LiteralKind::Null => self.session.null_defaults().clone(),
                LiteralKind::Other => QualifierSet::new(),
            }),
            NodeKind::Invocation { .. } => match table.single(expr) {
                Some(set) => Actual::Known(set),
                None => match collect_invocation(self.session, self.program, expr) {
                    Some(returns) => Actual::Known(returns),
                    None => Actual::Unresolved,
                },
            },
            _ => match table.single(expr) {
                Some(set) => Actual::Known(set),
                None => Actual::Unsupported,
            },
        }
    }
}
