//! Core types for check results.

use serde::{Deserialize, Serialize};

/// Severity levels for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Rule id reported when the engine meets an expression shape it does not
/// model, or a qualifier with no registered rule.
pub const UNIMPLEMENTED_CASE: &str = "unimplemented_case";

/// A single unsatisfied (or uncheckable) qualifier obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule_id: String,
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub column: usize,
    /// The qualifier that could not be proven present.
    pub qualifier: String,
    pub message: String,
    /// Free-text detail, e.g. the expression kind or the overridden method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Diagnostic {
    /// Unique key for deduplication and comparison.
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}:{}|{}",
            self.rule_id, self.file, self.line, self.column, self.qualifier
        )
    }

    /// Ordering used for every emitted diagnostic list.
    pub fn sort(diagnostics: &mut [Diagnostic]) {
        diagnostics.sort_by(|a, b| {
            (&a.file, a.line, a.column, &a.rule_id, &a.qualifier).cmp(&(
                &b.file,
                b.line,
                b.column,
                &b.rule_id,
                &b.qualifier,
            ))
        });
    }
}

/// Results of checking a set of files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResult {
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics that were suppressed by inline comments
    #[serde(default)]
    pub suppressed: Vec<super::SuppressedDiagnostic>,
    /// Number of files checked
    pub scanned: usize,
    /// Checker plugins active for the session
    #[serde(default)]
    pub checkers: Vec<String>,
    /// Configuration problems reported at session start
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_warnings: Vec<String>,
    /// Files whose syntax tree contained errors. They are still checked.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parse_errors: Vec<String>,
}

impl CheckResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: CheckResult) {
        self.diagnostics.extend(other.diagnostics);
        self.suppressed.extend(other.suppressed);
        self.scanned += other.scanned;
        for checker in other.checkers {
            if !self.checkers.contains(&checker) {
                self.checkers.push(checker);
            }
        }
        self.config_warnings.extend(other.config_warnings);
        self.parse_errors.extend(other.parse_errors);
    }

    pub fn suppressed_count(&self) -> usize {
        self.suppressed.len()
    }

    /// Check if there are any error-severity diagnostics.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}
