//! Per-session checking context.

use tracing::info;

use super::{collect, verify, AnnotationTable};
use crate::analysis::{NodeId, NodeKind, Program, SymbolId};
use crate::detect::Diagnostic;
use crate::qualifier::{
    build_hierarchy_and_rules, ActivePlugins, CheckerPlugin, PluginError, QualifierHierarchy,
    QualifierSet, RuleTable,
};

/// Name of the default assertion method.
pub const DEFAULT_ASSERTION_METHOD: &str = "assertQualifier";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Invocations treated as qualifier assertions, by simple name
    /// (`assertQualifier`) or receiver-qualified name (`Qual.assertQualifier`).
    pub assertion_methods: Vec<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            assertion_methods: vec![DEFAULT_ASSERTION_METHOD.to_string()],
        }
    }
}

/// One analysis session: the merged hierarchy and rules of the active
/// plugins and the annotation table both passes share.
///
/// A session is checked against one program; start a new session for the
/// next one.
#[derive(Debug)]
pub struct Session {
    active: ActivePlugins,
    options: SessionOptions,
    table: AnnotationTable,
    string_defaults: QualifierSet,
    null_defaults: QualifierSet,
    non_null: QualifierSet,
}

impl Session {
    pub fn new(active: ActivePlugins, options: SessionOptions) -> Self {
        let string_defaults = active.string_literal_defaults();
        let null_defaults = active.null_literal_defaults();
        let non_null = active.null_guards().map(|g| g.non_null.clone()).collect();
        Self {
            active,
            options,
            table: AnnotationTable::new(),
            string_defaults,
            null_defaults,
            non_null,
        }
    }

    pub fn from_plugins(plugins: Vec<CheckerPlugin>, options: SessionOptions) -> Self {
        Self::new(build_hierarchy_and_rules(plugins), options)
    }

    pub fn hierarchy(&self) -> &QualifierHierarchy {
        &self.active.hierarchy
    }

    pub fn rules(&self) -> &RuleTable {
        &self.active.rules
    }

    pub fn active(&self) -> &ActivePlugins {
        &self.active
    }

    pub fn rejected(&self) -> &[PluginError] {
        &self.active.rejected
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn table(&self) -> &AnnotationTable {
        &self.table
    }

    /// Pass 1: register obligations for every invocation, assignment,
    /// initialized declarator, and return in the program.
    pub fn collect(&self, program: &Program) {
        collect::collect(self, program);
    }

    /// Pass 2: check obligations and overrides. Run after `collect`.
    pub fn verify(&self, program: &Program) -> Vec<Diagnostic> {
        verify::verify(self, program)
    }

    /// Both passes.
    pub fn check(&self, program: &Program) -> Vec<Diagnostic> {
        self.collect(program);
        let diagnostics = self.verify(program);
        info!(
            checkers = ?self.active.names(),
            files = program.files().len(),
            entries = self.table.len(),
            diagnostics = diagnostics.len(),
            "session complete"
        );
        diagnostics
    }

    /// Declared qualifiers of a symbol that belong to an active plugin.
    pub(crate) fn declared(&self, program: &Program, symbol: SymbolId) -> QualifierSet {
        self.active.hierarchy.known(program.qualifiers_of(symbol))
    }

    pub(crate) fn string_defaults(&self) -> &QualifierSet {
        &self.string_defaults
    }

    pub(crate) fn null_defaults(&self) -> &QualifierSet {
        &self.null_defaults
    }

    /// Qualifiers implied for `this`.
    pub(crate) fn non_null(&self) -> &QualifierSet {
        &self.non_null
    }

    pub(crate) fn is_assertion(&self, program: &Program, invocation: NodeId) -> bool {
        let NodeKind::Invocation { name, receiver, .. } = program.kind(invocation) else {
            return false;
        };
        let qualified = receiver
            .and_then(|r| program.expression_path(r))
            .map(|path| format!("{}.{}", path, name));

        self.options
            .assertion_methods
            .iter()
            .any(|m| m == name || Some(m) == qualified.as_ref())
    }
}
