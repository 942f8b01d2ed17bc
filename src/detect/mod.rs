//! Diagnostics, suppression, and the check runner.

mod runner;
mod suppress;
mod types;

pub use runner::Runner;
pub use suppress::{
    collect_suppressions, filter_suppressed, matches_suppression, parse_suppressions,
    SuppressedDiagnostic, Suppression, SuppressionType,
};
pub use types::{CheckResult, Diagnostic, Severity, UNIMPLEMENTED_CASE};
