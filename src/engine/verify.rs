//! Pass 2: verification.
//!
//! One pre-order walk per file. Assertions rewrite table entries for nodes
//! later in the walk, so the walk is sequential.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::Session;
use crate::analysis::{NodeId, NodeKind, Program, SymbolKind};
use crate::detect::Diagnostic;
use crate::qualifier::{QualifierSet, RuleDescriptor};

pub(crate) fn verify(session: &Session, program: &Program) -> Vec<Diagnostic> {
    let mut verifier = Verifier::new(session, program);
    for root in program.roots() {
        for node in program.preorder(root) {
            verifier.visit(node);
        }
    }

    let mut diagnostics = verifier.diagnostics;
    Diagnostic::sort(&mut diagnostics);
    debug!(diagnostics = diagnostics.len(), "verification complete");
    diagnostics
}

pub(crate) struct Verifier<'a> {
    pub(super) session: &'a Session,
    pub(super) program: &'a Program,
    /// Nodes rewritten by an assertion.
    pub(super) refined: HashSet<NodeId>,
    pub(super) diagnostics: Vec<Diagnostic>,
}

impl<'a> Verifier<'a> {
    pub(super) fn new(session: &'a Session, program: &'a Program) -> Self {
        Self {
            session,
            program,
            refined: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    fn visit(&mut self, node: NodeId) {
        let (session, program) = (self.session, self.program);
        let table = session.table();

        match program.kind(node) {
            NodeKind::Invocation {
                receiver,
                arguments,
                ..
            } => {
                if session.is_assertion(program, node) {
                    self.apply_assertion(node);
                }
                if let Some(expected) = table.get(*arguments) {
                    let args = program.arguments(node);
                    for (&argument, set) in args.iter().zip(&expected) {
                        self.check_expression(argument, set);
                    }
                }
                if let Some(receiver) = receiver {
                    self.check_dereference(*receiver);
                }
            }
            NodeKind::Assignment {
                op, target, value, ..
            } if op == "=" => {
                if let Some(expected) = table.single(*target) {
                    self.check_expression(*value, &expected);
                }
            }
            NodeKind::VariableDecl {
                initializer: Some(initializer),
                ..
            } => {
                if let Some(expected) = table.single(node) {
                    self.check_expression(*initializer, &expected);
                }
            }
            NodeKind::Return { value: Some(value) } => {
                if let Some(expected) = self.return_qualifiers(node) {
                    self.check_expression(*value, &expected);
                }
            }
            NodeKind::MethodDecl { .. } => self.check_override(node),
            NodeKind::MemberAccess { object, .. } => self.check_dereference(*object),
            _ => {}
        }
    }

    /// Declared return qualifiers of the method a return statement exits.
    /// Returns inside lambdas are not checked.
    fn return_qualifiers(&self, ret: NodeId) -> Option<QualifierSet> {
        for ancestor in self.program.ancestors(ret) {
            match self.program.kind(ancestor) {
                NodeKind::MethodDecl { .. } => {
                    let method = self.program.declared_symbol(ancestor)?;
                    return Some(self.session.declared(self.program, method));
                }
                NodeKind::Other { kind } if kind == "lambda_expression" => return None,
                _ => {}
            }
        }
        None
    }

    /// Compare an overriding method's declared qualifiers with its base.
    fn check_override(&mut self, decl: NodeId) {
        let program = self.program;
        let Some(method) = program.declared_symbol(decl) else {
            return;
        };
        let symbol = program.symbol(method);
        let Some(base) = symbol.overrides else {
            return;
        };
        let base_symbol = program.symbol(base);
        let context = Some(format!("overrides {}", qualified_name(program, base)));

        let own = self.session.declared(program, method);
        let expected = self.session.declared(program, base);
        for qualifier in &self.session.hierarchy().satisfies(&own, &expected) {
            self.report(decl, qualifier, &own, context.clone());
        }

        let NodeKind::MethodDecl { params, .. } = program.kind(decl) else {
            return;
        };
        for (i, (&param, &base_param)) in symbol
            .parameters
            .iter()
            .zip(&base_symbol.parameters)
            .enumerate()
        {
            let own = self.session.declared(program, param);
            let expected = self.session.declared(program, base_param);
            let at = program
                .symbol(param)
                .declaration
                .or_else(|| params.get(i).copied())
                .unwrap_or(decl);
            for qualifier in &self.session.hierarchy().satisfies(&own, &expected) {
                self.report(at, qualifier, &own, context.clone());
            }
        }
    }

    /// Report a receiver that may be null when it is dereferenced.
    fn check_dereference(&mut self, receiver: NodeId) {
        if !matches!(
            self.program.kind(receiver),
            NodeKind::Identifier { .. } | NodeKind::MemberAccess { .. } | NodeKind::Invocation { .. }
        ) {
            return;
        }
        let hooks: Vec<_> = self.session.active().dereference_hooks().cloned().collect();
        if hooks.is_empty() {
            return;
        }
        let super::classify::Actual::Known(actual) = self.actual_of(receiver) else {
            return;
        };
        for hook in hooks {
            if actual.contains(&hook.nullable) {
                self.push(receiver, &hook.rule, &hook.nullable, &actual, None);
            }
        }
    }

    /// Report one unsatisfied qualifier using its registered rule.
    pub(super) fn report(
        &mut self,
        at: NodeId,
        qualifier: &str,
        found: &QualifierSet,
        context: Option<String>,
    ) {
        let rule = self.session.rules().rule_for(qualifier).clone();
        let context = if self.session.rules().get(qualifier).is_none() {
            Some(context.unwrap_or_else(|| format!("no rule registered for @{}", qualifier)))
        } else {
            context
        };
        self.push(at, &rule, qualifier, found, context);
    }

    /// One diagnostic for an expression shape the engine cannot classify.
    /// `qualifier` holds the first expected name; the message lists all.
    pub(super) fn report_unsupported(&mut self, at: NodeId, expected: &QualifierSet) {
        let rule = self.session.rules().fallback().clone();
        let label = self.program.kind(at).label().to_string();
        let qualifier = expected.iter().next().cloned().unwrap_or_default();
        let all = expected.iter().cloned().collect::<Vec<_>>().join(", @");
        let message = rule.render(&all, &format!("unsupported {}", label));
        trace!(at = %self.program.span(at), shape = %label, "unsupported expression");
        let diagnostic = self.diagnostic(at, &rule, qualifier, message, Some(label));
        self.diagnostics.push(diagnostic);
    }

    fn push(
        &mut self,
        at: NodeId,
        rule: &RuleDescriptor,
        qualifier: &str,
        found: &QualifierSet,
        context: Option<String>,
    ) {
        let message = rule.render(qualifier, &describe(found));
        let diagnostic = self.diagnostic(at, rule, qualifier.to_string(), message, context);
        self.diagnostics.push(diagnostic);
    }

    fn diagnostic(
        &self,
        at: NodeId,
        rule: &RuleDescriptor,
        qualifier: String,
        message: String,
        context: Option<String>,
    ) -> Diagnostic {
        let span = self.program.span(at);
        Diagnostic {
            rule_id: rule.id.clone(),
            severity: rule.severity,
            file: self.program.file_of(at).path.clone(),
            line: span.start_line,
            column: span.start_col,
            qualifier,
            message,
            context,
        }
    }
}

fn describe(found: &QualifierSet) -> String {
    if found.is_empty() {
        "no qualifier".to_string()
    } else {
        found
            .iter()
            .map(|q| format!("@{}", q))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `Type.method` for a method symbol.
fn qualified_name(program: &Program, method: crate::analysis::SymbolId) -> String {
    let symbol = program.symbol(method);
    match symbol.container.map(|c| program.symbol(c)) {
        Some(owner) if owner.kind == SymbolKind::Type => format!("{}.{}", owner.name, symbol.name),
        _ => symbol.name.clone(),
    }
}
