//! Pass 1: requirement collection.
//!
//! Nodes are independent of one another, so collection fans out across
//! them in parallel; the table's insert-if-absent keeps concurrent writers
//! from clobbering each other.

use rayon::prelude::*;
use tracing::{debug, trace};

use super::Session;
use crate::analysis::{NodeId, NodeKind, Program, SymbolId, SymbolKind};
use crate::qualifier::QualifierSet;

pub(crate) fn collect(session: &Session, program: &Program) {
    let candidates: Vec<NodeId> = program
        .roots()
        .flat_map(|root| program.preorder(root))
        .filter(|&n| is_candidate(program.kind(n)))
        .collect();

    candidates
        .par_iter()
        .for_each(|&node| collect_node(session, program, node));

    debug!(
        candidates = candidates.len(),
        entries = session.table().len(),
        "collection complete"
    );
}

fn is_candidate(kind: &NodeKind) -> bool {
    match kind {
        NodeKind::Invocation { .. } => true,
        NodeKind::Assignment { op, .. } => op == "=",
        NodeKind::VariableDecl { initializer, .. } => initializer.is_some(),
        NodeKind::Return { value } => value.is_some(),
        _ => false,
    }
}

fn collect_node(session: &Session, program: &Program, node: NodeId) {
    match program.kind(node) {
        NodeKind::Invocation { .. } => {
            collect_invocation(session, program, node);
        }
        NodeKind::Assignment { target, .. } => {
            register_target(session, program, *target, program.symbol_of(*target));
        }
        NodeKind::VariableDecl { .. } => {
            register_target(session, program, node, program.declared_symbol(node));
        }
        NodeKind::Return { value: Some(value) } => {
            register_contribution(session, program, *value);
        }
        _ => {}
    }
}

/// Register an invocation's return qualifiers and its per-position
/// argument obligations.
///
/// Returns the declared return qualifiers (possibly empty), or `None` when
/// the callee does not resolve to a method.
pub(crate) fn collect_invocation(
    session: &Session,
    program: &Program,
    invocation: NodeId,
) -> Option<QualifierSet> {
    let NodeKind::Invocation {
        name, arguments, ..
    } = program.kind(invocation)
    else {
        return None;
    };

    let Some(method) = resolved(program, invocation, SymbolKind::Method) else {
        trace!(method = %name, at = %program.span(invocation), "unresolved callee; skipped");
        return None;
    };

    let returns = session.declared(program, method);
    if !returns.is_empty() {
        session
            .table()
            .insert_if_absent(invocation, vec![returns.clone()]);
    }

    let expected: Vec<QualifierSet> = program
        .symbol(method)
        .parameters
        .iter()
        .map(|&p| session.declared(program, p))
        .collect();

    if expected.iter().any(|set| !set.is_empty()) {
        for (&argument, set) in program.arguments(invocation).iter().zip(&expected) {
            if !set.is_empty() {
                register_contribution(session, program, argument);
            }
        }
        session.table().insert_if_absent(*arguments, expected);
    }

    Some(returns)
}

/// Register what an expression itself contributes: declared qualifiers for
/// references, recursion for nested calls, and each branch of a
/// conditional under its own key.
fn register_contribution(session: &Session, program: &Program, expr: NodeId) {
    match program.kind(expr) {
        NodeKind::Identifier { .. } | NodeKind::MemberAccess { .. } => {
            let Some(symbol) = program.symbol_of(expr) else {
                trace!(at = %program.span(expr), "unresolved reference; skipped");
                return;
            };
            let declared = session.declared(program, symbol);
            if !declared.is_empty() {
                session.table().insert_if_absent(expr, vec![declared]);
            }
        }
        NodeKind::Invocation { .. } => {
            collect_invocation(session, program, expr);
        }
        NodeKind::Conditional {
            when_true,
            when_false,
            ..
        } => {
            register_contribution(session, program, *when_true);
            register_contribution(session, program, *when_false);
        }
        _ => {}
    }
}

/// Register the declared qualifiers of an assignment target or declarator.
fn register_target(session: &Session, program: &Program, key: NodeId, symbol: Option<SymbolId>) {
    let Some(symbol) = symbol else {
        trace!(at = %program.span(key), "unresolved assignment target; skipped");
        return;
    };
    let declared = session.declared(program, symbol);
    if !declared.is_empty() {
        session.table().insert_if_absent(key, vec![declared]);
    }
}

fn resolved(program: &Program, node: NodeId, kind: SymbolKind) -> Option<SymbolId> {
    program
        .symbol_of(node)
        .filter(|&s| program.symbol(s).kind == kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;
    use crate::qualifier::qualifier_set;

    #[test]
    fn test_invocation_registers_return_and_arguments() {
        let mut t = TestProgram::new();
        let send = t.method("send", &[], &[&["Encrypted"], &[]]);
        let key = t.field("key", &["Encrypted"]);
        let arg0 = t.ident("key", Some(key));
        let arg1 = t.string("plain");
        let call = t.call("send", Some(send), vec![arg0, arg1]);
        let program = t.finish(vec![call]);

        let session = session_with(&["encrypted"]);
        session.collect(&program);

        assert_eq!(session.table().single(call), None);
        let NodeKind::Invocation { arguments, .. } = program.kind(call) else {
            unreachable!()
        };
        assert_eq!(
            session.table().get(*arguments),
            Some(vec![qualifier_set(["Encrypted"]), QualifierSet::new()])
        );
        assert_eq!(session.table().single(arg0), Some(qualifier_set(["Encrypted"])));
        assert!(!session.table().contains(arg1));
    }

    #[test]
    fn test_unresolved_invocation_registers_nothing() {
        let mut t = TestProgram::new();
        let key = t.field("key", &["Encrypted"]);
        let arg = t.ident("key", Some(key));
        let call = t.call("mystery", None, vec![arg]);
        let program = t.finish(vec![call]);

        let session = session_with(&["encrypted"]);
        session.collect(&program);
        assert!(session.table().is_empty());
    }

    #[test]
    fn test_nested_invocation_and_ternary_branches() {
        let mut t = TestProgram::new();
        let seal = t.method("seal", &["Encrypted"], &[]);
        let sink = t.method("sink", &[], &[&["Encrypted"]]);
        let key = t.field("key", &["Encrypted"]);

        let inner = t.call("seal", Some(seal), vec![]);
        let other = t.ident("key", Some(key));
        let flag = t.ident("flag", None);
        let ternary = t.conditional(flag, inner, other);
        let outer = t.call("sink", Some(sink), vec![ternary]);
        let program = t.finish(vec![outer]);

        let session = session_with(&["encrypted"]);
        session.collect(&program);

        assert_eq!(session.table().single(inner), Some(qualifier_set(["Encrypted"])));
        assert_eq!(session.table().single(other), Some(qualifier_set(["Encrypted"])));
        // The conditional itself never gets a merged entry.
        assert!(!session.table().contains(ternary));
    }

    #[test]
    fn test_qualifiers_of_inactive_plugins_are_ignored() {
        let mut t = TestProgram::new();
        let sink = t.method("sink", &[], &[&["NonNull"]]);
        let arg = t.null();
        let call = t.call("sink", Some(sink), vec![arg]);
        let program = t.finish(vec![call]);

        let session = session_with(&["encrypted"]);
        session.collect(&program);
        assert!(session.table().is_empty());
    }
}
