//! The qualifier checking engine.
//!
//! A `Session` owns everything one analysis needs: the merged hierarchy and
//! rule table of the active plugins and the annotation table. Checking is
//! two passes over a `Program`:
//!
//! 1. **collect** registers obligations: return and per-parameter
//!    qualifiers of resolved invocations, declared qualifiers of assignment
//!    targets and initialized declarators, and the declared qualifiers of
//!    references that feed an obligation.
//! 2. **verify** classifies each obligated expression, applies the
//!    assertion and null-guard refinements, reports residual qualifiers, and
//!    checks override consistency.
//!
//! Unresolved references are skipped rather than reported, so the engine
//! leans toward false negatives.

mod classify;
mod collect;
mod refine;
mod session;
mod table;
mod verify;

pub use refine::parse_assertion;
pub use session::{Session, SessionOptions, DEFAULT_ASSERTION_METHOD};
pub use table::AnnotationTable;


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use crate::detect::UNIMPLEMENTED_CASE;

    #[test]
    fn test_matching_return_qualifier_is_clean() {
        let mut t = TestProgram::new();
        let seal = t.method("seal", &["Encrypted"], &[]);
        let key = t.local("key", &["Encrypted"]);
        let target = t.ident("key", Some(key));
        let value = t.call("seal", Some(seal), vec![]);
        let assign = t.assign(target, value);
        let program = t.finish(vec![assign]);

        assert!(session_with(&["encrypted"]).check(&program).is_empty());
    }

    #[test]
    fn test_unqualified_return_reports_at_rhs() {
        let mut t = TestProgram::new();
        let read = t.method("read", &[], &[]);
        let key = t.local("key", &["Encrypted"]);
        let target = t.ident("key", Some(key));
        let value = t.call("read", Some(read), vec![]);
        let assign = t.assign(target, value);
        let program = t.finish(vec![assign]);

        let diagnostics = session_with(&["encrypted"]).check(&program);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, "missing_encrypted");
        assert_eq!(diagnostics[0].qualifier, "Encrypted");
        assert_eq!(diagnostics[0].line, line(&program, value));
    }

    #[test]
    fn test_initializer_checked_like_assignment() {
        let mut t = TestProgram::new();
        let key = t.local("key", &["Encrypted"]);
        let value = t.string("hunter2");
        let decl = t.declare("key", key, Some(value));
        let program = t.finish(vec![decl]);

        let diagnostics = session_with(&["encrypted"]).check(&program);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, line(&program, value));
    }

    #[test]
    fn test_string_literal_without_default_always_fails() {
        for text in ["", "ciphertext", "key:Encrypted"] {
            let mut t = TestProgram::new();
            let send = t.method("send", &[], &[&["Encrypted"]]);
            let arg = t.string(text);
            let call = t.call("send", Some(send), vec![arg]);
            let program = t.finish(vec![call]);

            let diagnostics = session_with(&["encrypted", "nullness", "tainted"]).check(&program);
            assert_eq!(diagnostics.len(), 1, "literal {:?}", text);
            assert_eq!(diagnostics[0].line, line(&program, arg));
        }
    }

    #[test]
    fn test_string_literal_uses_default() {
        let mut t = TestProgram::new();
        let query = t.method("query", &[], &[&["Untainted"], &["NonNull"]]);
        let a = t.string("select 1");
        let b = t.string("x");
        let call = t.call("query", Some(query), vec![a, b]);
        let program = t.finish(vec![call]);

        assert!(session_with(&["nullness", "tainted"]).check(&program).is_empty());
    }

    #[test]
    fn test_null_literal_against_non_null() {
        let mut t = TestProgram::new();
        let put = t.method("put", &[], &[&["NonNull"], &["MaybeNull"]]);
        let a = t.null();
        let b = t.null();
        let call = t.call("put", Some(put), vec![a, b]);
        let program = t.finish(vec![call]);

        let diagnostics = session_with(&["nullness"]).check(&program);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, "missing_non_null");
        assert_eq!(diagnostics[0].line, line(&program, a));
    }

    #[test]
    fn test_subtype_argument_satisfies_supertype_parameter() {
        let mut t = TestProgram::new();
        let log = t.method("log", &[], &[&["Tainted"]]);
        let clean = t.local("clean", &["Untainted"]);
        let arg = t.ident("clean", Some(clean));
        let call = t.call("log", Some(log), vec![arg]);
        let program = t.finish(vec![call]);

        assert!(session_with(&["tainted"]).check(&program).is_empty());
    }

    #[test]
    fn test_ternary_requires_both_branches() {
        let mut t = TestProgram::new();
        let send = t.method("send", &[], &[&["Encrypted"]]);
        let sealed = t.local("sealed", &["Encrypted"]);
        let plain = t.local("plain", &[]);
        let flag = t.ident("flag", None);
        let good = t.ident("sealed", Some(sealed));
        let bad = t.ident("plain", Some(plain));
        let ternary = t.conditional(flag, good, bad);
        let call = t.call("send", Some(send), vec![ternary]);
        let program = t.finish(vec![call]);

        let diagnostics = session_with(&["encrypted"]).check(&program);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, line(&program, bad));
    }

    #[test]
    fn test_ternary_both_branches_good() {
        let mut t = TestProgram::new();
        let send = t.method("send", &[], &[&["Encrypted"]]);
        let seal = t.method("seal", &["Encrypted"], &[]);
        let sealed = t.local("sealed", &["Encrypted"]);
        let flag = t.ident("flag", None);
        let a = t.ident("sealed", Some(sealed));
        let b = t.call("seal", Some(seal), vec![]);
        let ternary = t.conditional(flag, a, b);
        let call = t.call("send", Some(send), vec![ternary]);
        let program = t.finish(vec![call]);

        assert!(session_with(&["encrypted"]).check(&program).is_empty());
    }

    #[test]
    fn test_unresolved_argument_is_skipped() {
        let mut t = TestProgram::new();
        let send = t.method("send", &[], &[&["Encrypted"]]);
        let arg = t.ident("mystery", None);
        let call = t.call("send", Some(send), vec![arg]);
        let program = t.finish(vec![call]);

        assert!(session_with(&["encrypted"]).check(&program).is_empty());
    }

    #[test]
    fn test_unsupported_shape_reports_once() {
        let mut t = TestProgram::new();
        let exec = t.method("exec", &[], &[&["Untainted", "NonNull"]]);
        let l = t.string("select ");
        let r = t.ident("input", None);
        let concat = t.binary("+", l, r);
        let call = t.call("exec", Some(exec), vec![concat]);
        let program = t.finish(vec![call]);

        let diagnostics = session_with(&["nullness", "tainted"]).check(&program);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, UNIMPLEMENTED_CASE);
        assert_eq!(diagnostics[0].qualifier, "NonNull");
        assert_eq!(
            diagnostics[0].message,
            "@NonNull, @Untainted cannot be checked here (unsupported binary expression)"
        );
        assert_eq!(diagnostics[0].context.as_deref(), Some("binary expression"));
    }

    #[test]
    fn test_return_checked_against_method() {
        let mut t = TestProgram::new();
        let load = t.method("load", &["Encrypted"], &[]);
        let plain = t.local("plain", &[]);
        let value = t.ident("plain", Some(plain));
        let ret = t.ret(Some(value));
        let body = t.block(vec![ret]);
        let decl = t.method_decl(load, Some(body));
        let program = t.finish(vec![decl]);

        let diagnostics = session_with(&["encrypted"]).check(&program);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, line(&program, value));
    }

    #[test]
    fn test_override_omissions_reported_per_qualifier() {
        let mut t = TestProgram::new();
        let base_type = t.type_symbol("Base", &[]);
        let base = t.method_in(base_type, "read", &["Encrypted", "NonNull"], &[&["Untainted"], &[]]);
        let derived_type = t.type_symbol("Derived", &["Base"]);
        let over = t.method_in(derived_type, "read", &["Encrypted"], &[&[], &[]]);
        t.overrides(over, base);
        let base_decl = t.method_decl(base, None);
        let over_decl = t.method_decl(over, None);
        let program = t.finish(vec![base_decl, over_decl]);

        let diagnostics = session_with(&["encrypted", "nullness", "tainted"]).check(&program);
        assert_eq!(diagnostics.len(), 2);

        let over_param = program.symbol(over).parameters[0];
        let param_line = line(&program, program.symbol(over_param).declaration.unwrap());

        let at_decl: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.line == line(&program, over_decl))
            .collect();
        assert_eq!(at_decl.len(), 1);
        assert_eq!(at_decl[0].qualifier, "NonNull");
        assert_eq!(at_decl[0].context.as_deref(), Some("overrides Base.read"));

        let at_param: Vec<_> = diagnostics.iter().filter(|d| d.line == param_line).collect();
        assert_eq!(at_param.len(), 1);
        assert_eq!(at_param[0].qualifier, "Untainted");
    }

    #[test]
    fn test_override_with_narrower_qualifier_is_clean() {
        let mut t = TestProgram::new();
        let base_type = t.type_symbol("Base", &[]);
        let base = t.method_in(base_type, "get", &["MaybeNull"], &[]);
        let derived_type = t.type_symbol("Derived", &["Base"]);
        let over = t.method_in(derived_type, "get", &["NonNull"], &[]);
        t.overrides(over, base);
        let decl = t.method_decl(over, None);
        let program = t.finish(vec![decl]);

        assert!(session_with(&["nullness"]).check(&program).is_empty());
    }

    /// `assertQualifier(x, "x:Encrypted"); send(x);` inside a block, with a
    /// use before the assertion and one in a sibling block.
    #[test]
    fn test_assertion_scoped_to_block() {
        let mut t = TestProgram::new();
        let send = t.method("send", &[], &[&["Encrypted"]]);
        let assert_m = t.method("assertQualifier", &[], &[&[], &[]]);
        let x = t.local("x", &[]);

        let before = t.ident("x", Some(x));
        let call_before = t.call("send", Some(send), vec![before]);

        let asserted = t.ident("x", Some(x));
        let literal = t.string("x:Encrypted");
        let assertion = t.call("assertQualifier", Some(assert_m), vec![asserted, literal]);
        let after = t.ident("x", Some(x));
        let call_after = t.call("send", Some(send), vec![after]);
        let inner = t.block(vec![call_before, assertion, call_after]);

        let elsewhere = t.ident("x", Some(x));
        let call_elsewhere = t.call("send", Some(send), vec![elsewhere]);
        let sibling = t.block(vec![call_elsewhere]);

        let program = t.finish(vec![inner, sibling]);
        let diagnostics = session_with(&["encrypted"]).check(&program);

        let lines: Vec<usize> = diagnostics.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![line(&program, before), line(&program, elsewhere)]);
    }

    #[test]
    fn test_guard_narrows_inside_then_branch_only() {
        let mut t = TestProgram::new();
        let use_m = t.method("use", &[], &[&["NonNull"]]);
        let name = t.local("name", &["MaybeNull"]);

        let checked = t.ident("name", Some(name));
        let null = t.null();
        let condition = t.binary("!=", checked, null);
        let guarded = t.ident("name", Some(name));
        let call_guarded = t.call("use", Some(use_m), vec![guarded]);
        let then_block = t.block(vec![call_guarded]);
        let unguarded = t.ident("name", Some(name));
        let call_else = t.call("use", Some(use_m), vec![unguarded]);
        let else_block = t.block(vec![call_else]);
        let if_node = t.if_then(condition, then_block, Some(else_block));

        let program = t.finish(vec![if_node]);
        let diagnostics = session_with(&["nullness"]).check(&program);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, line(&program, unguarded));
    }

    #[test]
    fn test_equality_guard_does_not_narrow() {
        let mut t = TestProgram::new();
        let use_m = t.method("use", &[], &[&["NonNull"]]);
        let name = t.local("name", &["MaybeNull"]);
        let checked = t.ident("name", Some(name));
        let null = t.null();
        let condition = t.binary("==", checked, null);
        let arg = t.ident("name", Some(name));
        let call = t.call("use", Some(use_m), vec![arg]);
        let then_block = t.block(vec![call]);
        let if_node = t.if_then(condition, then_block, None);
        let program = t.finish(vec![if_node]);

        assert_eq!(session_with(&["nullness"]).check(&program).len(), 1);
    }

    #[test]
    fn test_dereference_of_maybe_null() {
        let mut t = TestProgram::new();
        let length = t.method("length", &[], &[]);
        let name = t.local("name", &["MaybeNull"]);
        let safe = t.local("safe", &["NonNull"]);
        let receiver = t.ident("name", Some(name));
        let call = t.call_on(Some(receiver), "length", Some(length), vec![]);
        let ok_receiver = t.ident("safe", Some(safe));
        let ok_call = t.call_on(Some(ok_receiver), "length", Some(length), vec![]);
        let program = t.finish(vec![call, ok_call]);

        let diagnostics = session_with(&["nullness"]).check(&program);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, "null_dereference");
        assert_eq!(diagnostics[0].line, line(&program, receiver));
    }

    #[test]
    fn test_member_access_uses_declared_field() {
        let mut t = TestProgram::new();
        let send = t.method("send", &[], &[&["Encrypted"]]);
        let key = t.field("key", &["Encrypted"]);
        let this = t.this();
        let access = t.member(this, "key", Some(key));
        let call = t.call("send", Some(send), vec![access]);
        let program = t.finish(vec![call]);

        assert!(session_with(&["encrypted"]).check(&program).is_empty());
    }

    #[test]
    fn test_qualifier_without_rule_uses_fallback() {
        use crate::qualifier::{CheckerPlugin, QualifierNode};

        let mut plugin = CheckerPlugin::new("units");
        plugin.qualifiers.push(QualifierNode::new("Meters"));

        let mut t = TestProgram::new();
        let set = t.method("set", &[], &[&["Meters"]]);
        let arg = t.number("3");
        let call = t.call("set", Some(set), vec![arg]);
        let program = t.finish(vec![call]);

        let session = super::Session::from_plugins(vec![plugin], super::SessionOptions::default());
        let diagnostics = session.check(&program);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, UNIMPLEMENTED_CASE);
        assert_eq!(diagnostics[0].qualifier, "Meters");
    }
}
