//! Qualcheck - pluggable qualifier type checking.
//!
//! Qualcheck checks that values flowing into qualified positions (parameters,
//! fields, locals, and returns annotated with e.g. `@Encrypted`, `@NonNull`,
//! or `@Untainted`) carry qualifiers that satisfy them.
//!
//! # Architecture
//!
//! - `analysis`: tree-sitter front ends lowering sources into a `Program`
//! - `qualifier`: qualifier hierarchies, checker plugins, and rule tables
//! - `engine`: the two-pass checker (collect obligations, then verify)
//! - `detect`: diagnostics, inline suppressions, and the runner
//! - `config`: YAML configuration schema
//! - `report`: Output formatting (pretty, JSON, SARIF)
//!
//! # Adding a Checker
//!
//! Built-in checkers live in `src/qualifier/plugin.rs`. Custom checkers can
//! also be declared in `qualcheck.yaml` under `custom_checkers`.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod detect;
pub mod engine;
pub mod logging;
pub mod qualifier;
pub mod report;

pub use analysis::{register_frontends, AnalysisContext, LanguageFrontend, Program};
pub use config::{Config, ConfigError};
pub use detect::{CheckResult, Diagnostic, Runner, Severity};
pub use engine::{Session, SessionOptions};
pub use qualifier::{build_hierarchy_and_rules, CheckerPlugin, QualifierHierarchy};

/// Initialize all subsystems.
///
/// Call this once at startup.
pub fn init() {
    register_frontends();
}
