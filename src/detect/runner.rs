//! Check runner: loads sources, runs one session per program, and applies
//! inline suppressions.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::analysis::AnalysisContext;
use crate::config::Config;
use crate::engine::Session;
use crate::qualifier::build_hierarchy_and_rules;

use super::{collect_suppressions, filter_suppressed, CheckResult};

/// Executes qualifier checks against a set of files.
pub struct Runner {
    base_dir: PathBuf,
    checkers: Option<Vec<String>>,
}

impl Runner {
    /// Create a new runner rooted at `base_dir`. Reported paths are
    /// relative to it.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            checkers: None,
        }
    }

    /// Replace the config's built-in checker selection.
    pub fn checkers(mut self, names: Vec<String>) -> Self {
        self.checkers = Some(names);
        self
    }

    /// Check `files` with the plugins `config` activates.
    pub fn run(&self, files: &[PathBuf], config: &Config) -> anyhow::Result<CheckResult> {
        let mut result = CheckResult::new();

        let (plugins, errors) = match &self.checkers {
            Some(names) => config.with_checkers(names).plugins(),
            None => config.plugins(),
        };
        for error in &errors {
            warn!(error = %error, "configuration problem");
            result.config_warnings.push(error.to_string());
        }

        let active = build_hierarchy_and_rules(plugins);
        result
            .config_warnings
            .extend(active.rejected.iter().map(|e| e.to_string()));
        result.checkers = active.names();

        let context = AnalysisContext::new(&self.base_dir);
        let programs = context.load(files)?;

        for loaded in programs {
            let program = &loaded.program;
            debug!(language = loaded.language, files = program.files().len(), "checking program");

            let session = Session::new(active.clone(), config.session_options());
            let diagnostics = session.check(program);

            let suppressions = collect_suppressions(program);
            let (diagnostics, suppressed) = filter_suppressed(diagnostics, &suppressions);

            let parse_errors: Vec<String> = program
                .files()
                .iter()
                .filter(|f| f.has_parse_errors)
                .map(|f| f.path.clone())
                .collect();
            for file in &parse_errors {
                warn!(file = %file, "syntax errors; checking the recovered tree");
            }

            result.merge(CheckResult {
                diagnostics,
                suppressed,
                scanned: program.files().len(),
                parse_errors,
                ..Default::default()
            });
        }

        Ok(result)
    }
}
