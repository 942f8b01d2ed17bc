//! The two flow-sensitive refinements.
//!
//! Assertion refinement rewrites table entries for later uses of a path in
//! the assertion's block. Guard refinement narrows a nullable reference to
//! non-null inside the then-branch of an enclosing `!= null` check. They
//! do not compose: a node refined by an assertion is not narrowed again by
//! a guard.

use tracing::debug;

use super::verify::Verifier;
use crate::analysis::{Constant, NodeId, NodeKind, SymbolId};
use crate::qualifier::{qualifier_set, QualifierSet};

/// `this.key` and `key` name the same path.
fn normalize(path: &str) -> &str {
    path.strip_prefix("this.").unwrap_or(path)
}

/// Split `"path:Qualifier"` at the last colon.
pub fn parse_assertion(text: &str) -> Option<(&str, &str)> {
    let (path, qualifier) = text.rsplit_once(':')?;
    let (path, qualifier) = (path.trim(), qualifier.trim());
    if path.is_empty() || qualifier.is_empty() {
        return None;
    }
    Some((path, qualifier))
}

impl Verifier<'_> {
    /// Apply an assertion invocation `assertQualifier(x, "x:Q")`.
    pub(super) fn apply_assertion(&mut self, invocation: NodeId) {
        let program = self.program;
        let Some(&literal) = program.arguments(invocation).get(1) else {
            return;
        };
        let Some(Constant::Str(text)) = program.constant_value(literal) else {
            debug!(at = %program.span(invocation), "assertion without a string literal; ignored");
            return;
        };
        let Some((path, qualifier)) = parse_assertion(text) else {
            debug!(at = %program.span(invocation), text, "malformed assertion; ignored");
            return;
        };
        let Some(block) = program.enclosing_block(invocation) else {
            return;
        };

        let order = program.preorder(block);
        let Some(position) = order.iter().position(|&n| n == invocation) else {
            return;
        };
        let subtree = program.preorder(invocation).len();

        let refined = qualifier_set([qualifier]);
        let mut count = 0;
        for &node in &order[position + subtree..] {
            if !matches!(
                program.kind(node),
                NodeKind::Identifier { .. } | NodeKind::MemberAccess { .. }
            ) || self.is_assignment_target(node)
            {
                continue;
            }
            let matches_path = program
                .expression_path(node)
                .is_some_and(|p| normalize(&p) == normalize(path));
            if matches_path {
                self.session.table().overwrite(node, refined.clone());
                self.refined.insert(node);
                count += 1;
            }
        }

        debug!(path, qualifier, occurrences = count, "assertion applied");
    }

    fn is_assignment_target(&self, node: NodeId) -> bool {
        self.program.parent(node).is_some_and(|parent| {
            matches!(self.program.kind(parent), NodeKind::Assignment { target, .. } if *target == node)
        })
    }

    /// Narrow `set` to non-null when a `!= null` guard on the same reference
    /// encloses `expr` in its then-branch.
    pub(super) fn guard_narrowed(&self, expr: NodeId, mut set: QualifierSet) -> QualifierSet {
        if self.refined.contains(&expr) {
            return set;
        }
        let mut guards = self.session.active().null_guards().peekable();
        if guards.peek().is_none() || !self.is_null_guarded(expr) {
            return set;
        }
        for guard in guards {
            set.remove(&guard.nullable);
            set.insert(guard.non_null.clone());
        }
        set
    }

    fn is_null_guarded(&self, expr: NodeId) -> bool {
        let program = self.program;
        let symbol = program.symbol_of(expr);
        let path = program.expression_path(expr);

        let mut child = expr;
        for ancestor in program.ancestors(expr) {
            if let NodeKind::If {
                condition,
                then_branch,
                ..
            } = program.kind(ancestor)
            {
                if *then_branch == child
                    && self.compares_not_null(*condition, symbol, path.as_deref())
                {
                    return true;
                }
            }
            child = ancestor;
        }
        false
    }

    fn compares_not_null(
        &self,
        condition: NodeId,
        symbol: Option<SymbolId>,
        path: Option<&str>,
    ) -> bool {
        let program = self.program;
        let NodeKind::Binary { op, left, right } = program.kind(condition) else {
            return false;
        };
        if op != "!=" {
            return false;
        }

        let operand = if program.constant_value(*right) == Some(Constant::Null) {
            *left
        } else if program.constant_value(*left) == Some(Constant::Null) {
            *right
        } else {
            return false;
        };

        let operand_path = program.expression_path(operand);
        let same_path = match (operand_path.as_deref(), path) {
            (Some(a), Some(b)) => normalize(a) == normalize(b),
            _ => false,
        };
        match (program.symbol_of(operand), symbol) {
            (Some(a), Some(b)) => a == b && same_path,
            _ => same_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assertion_splits_at_last_colon() {
        assert_eq!(parse_assertion("key:Encrypted"), Some(("key", "Encrypted")));
        assert_eq!(
            parse_assertion("this.cfg.url:Untainted"),
            Some(("this.cfg.url", "Untainted"))
        );
        assert_eq!(parse_assertion("a:b:NonNull"), Some(("a:b", "NonNull")));
        assert_eq!(parse_assertion(" key : NonNull "), Some(("key", "NonNull")));
    }

    #[test]
    fn test_parse_assertion_rejects_malformed() {
        assert_eq!(parse_assertion("key"), None);
        assert_eq!(parse_assertion(":NonNull"), None);
        assert_eq!(parse_assertion("key:"), None);
    }

    #[test]
    fn test_normalize_this_prefix() {
        assert_eq!(normalize("this.key"), "key");
        assert_eq!(normalize("key"), "key");
        assert_eq!(normalize("other.key"), "other.key");
    }
}
