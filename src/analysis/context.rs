//! Analysis context: reads, parses, and lowers a set of source files.
//!
//! Files are parsed in parallel, grouped by front end, and each group is
//! lowered into one `Program` so cross-file references resolve.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::analysis::{get_frontend, LanguageFrontend, ParsedFile, Program};

/// A lowered program together with the language it was written in.
pub struct LoadedProgram {
    pub language: &'static str,
    pub program: Program,
}

/// Analysis context for a set of files.
pub struct AnalysisContext {
    /// Base directory for relative path resolution.
    base_dir: PathBuf,
}

impl AnalysisContext {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Path relative to the base directory, as reported in diagnostics.
    pub fn relative_path(&self, path: &Path) -> String {
        let abs_path = self.absolute(path);
        abs_path
            .strip_prefix(&self.base_dir)
            .unwrap_or(&abs_path)
            .to_string_lossy()
            .to_string()
    }

    /// Parse one file. Returns `None` for extensions no front end handles.
    pub fn parse_file(
        &self,
        path: &Path,
    ) -> anyhow::Result<Option<(&'static dyn LanguageFrontend, ParsedFile)>> {
        let abs_path = self.absolute(path);
        let ext = abs_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        let Some(frontend) = get_frontend(ext) else {
            return Ok(None);
        };

        let source = fs::read(&abs_path)?;
        let mut parsed = frontend.parse(&abs_path, &source)?;
        parsed.path = self.relative_path(&abs_path);
        Ok(Some((frontend, parsed)))
    }

    /// Parse every file in parallel and lower each language group.
    ///
    /// Unreadable or unparseable files are logged and skipped.
    pub fn load(&self, paths: &[PathBuf]) -> anyhow::Result<Vec<LoadedProgram>> {
        let results: Vec<_> = paths
            .par_iter()
            .map(|p| (p, self.parse_file(p)))
            .collect();

        let mut groups: BTreeMap<&'static str, (&'static dyn LanguageFrontend, Vec<ParsedFile>)> =
            BTreeMap::new();
        for (path, result) in results {
            match result {
                Ok(Some((frontend, parsed))) => {
                    groups
                        .entry(frontend.language_id())
                        .or_insert_with(|| (frontend, Vec::new()))
                        .1
                        .push(parsed);
                }
                Ok(None) => debug!(path = %path.display(), "no front end for file"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to parse file"),
            }
        }

        let mut programs = Vec::new();
        for (language, (frontend, mut files)) in groups {
            files.sort_by(|a, b| a.path.cmp(&b.path));
            debug!(language, files = files.len(), "lowering");
            let program = frontend.lower(&files)?;
            programs.push(LoadedProgram { language, program });
        }

        Ok(programs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_groups_java_files() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("A.java");
        let b = temp.path().join("B.java");
        let notes = temp.path().join("notes.txt");
        fs::write(&a, "class A { void f() {} }").unwrap();
        fs::write(&b, "class B extends A { void f() {} }").unwrap();
        fs::write(&notes, "not code").unwrap();

        let ctx = AnalysisContext::new(temp.path());
        let programs = ctx.load(&[b, a, notes]).unwrap();

        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].language, "java");
        let paths: Vec<&str> = programs[0]
            .program
            .files()
            .iter()
            .map(|f| f.path.as_str())
            .collect();
        assert_eq!(paths, vec!["A.java", "B.java"]);
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        let ctx = AnalysisContext::new(temp.path());
        let programs = ctx.load(&[temp.path().join("Gone.java")]).unwrap();
        assert!(programs.is_empty());
    }

    #[test]
    fn test_relative_path() {
        let ctx = AnalysisContext::new("/work");
        assert_eq!(ctx.relative_path(Path::new("/work/src/A.java")), "src/A.java");
        assert_eq!(ctx.relative_path(Path::new("src/A.java")), "src/A.java");
    }
}
