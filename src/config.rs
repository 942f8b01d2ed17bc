//! Configuration schema for qualcheck.
//!
//! A `qualcheck.yaml` selects the active checker plugins, defines custom
//! ones, and scopes which files are checked.

use std::fs;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

use crate::engine::{SessionOptions, DEFAULT_ASSERTION_METHOD};
use crate::qualifier::{builtin, builtin_names, CheckerPlugin};

/// Config file looked up in the checked directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "qualcheck.yaml";

/// Errors loading or applying a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown checker '{name}' (available: {available})")]
    UnknownChecker { name: String, available: String },

    #[error("custom checker #{index} is malformed: {message}")]
    MalformedChecker { index: usize, message: String },

    #[error("`{field}` must be a list, found {found}")]
    MalformedCheckerList { field: &'static str, found: String },

    #[error("`checkers` entry #{index} is not a checker name: {found}")]
    MalformedCheckerName { index: usize, found: String },

    #[error("invalid excluded_paths pattern {pattern:?}: {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("assertion method names must not be empty")]
    EmptyAssertionMethod,
}

fn default_checkers() -> Value {
    names_value(builtin_names().as_slice())
}

fn names_value<S: AsRef<str>>(names: &[S]) -> Value {
    Value::Sequence(
        names
            .iter()
            .map(|n| Value::String(n.as_ref().to_string()))
            .collect(),
    )
}

/// Short rendering of a YAML value for error messages.
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Sequence(_) => "a list".to_string(),
        Value::Mapping(_) => "a mapping".to_string(),
        Value::Tagged(t) => format!("tagged value {}", t.tag),
    }
}

/// Entries of a list-valued field. A missing or null field is empty.
fn list_entries<'a>(field: &'static str, value: &'a Value) -> Result<&'a [Value], ConfigError> {
    match value {
        Value::Null => Ok(&[]),
        Value::Sequence(entries) => Ok(entries),
        other => Err(ConfigError::MalformedCheckerList {
            field,
            found: describe(other),
        }),
    }
}

fn default_assertion_methods() -> Vec<String> {
    vec![DEFAULT_ASSERTION_METHOD.to_string()]
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Built-in checkers to activate (default: all). Both checker fields
    /// stay raw YAML; shape errors surface from `plugins`.
    #[serde(default = "default_checkers")]
    pub checkers: Value,
    /// Data-defined checkers.
    #[serde(default)]
    pub custom_checkers: Value,
    /// Invocations treated as qualifier assertions.
    #[serde(default = "default_assertion_methods")]
    pub assertion_methods: Vec<String>,
    /// Glob patterns for paths to exclude (e.g., "**/generated/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Whether to check test sources (default: true)
    #[serde(default)]
    pub include_tests: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: String::new(),
            name: String::new(),
            description: None,
            checkers: default_checkers(),
            custom_checkers: Value::Null,
            assertion_methods: default_assertion_methods(),
            excluded_paths: Vec::new(),
            include_tests: None,
        }
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path_str,
            source,
        })
    }

    /// Returns whether to include test files (defaults to true).
    pub fn should_include_tests(&self) -> bool {
        self.include_tests.unwrap_or(true)
    }

    /// Compiled matcher for `excluded_paths`.
    pub fn excluded_matcher(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| ConfigError::InvalidGlob {
            pattern: self.excluded_paths.join(", "),
            message: e.to_string(),
        })
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }
        self.excluded_matcher()
            .map(|set| set.is_match(path))
            .unwrap_or(false)
    }

    /// The same config with `names` as the built-in checker selection.
    pub fn with_checkers(&self, names: &[String]) -> Config {
        Config {
            checkers: names_value(names),
            ..self.clone()
        }
    }

    /// Built-in checker names listed under `checkers`. Entries that are not
    /// strings are returned as errors.
    pub fn checker_names(&self) -> (Vec<String>, Vec<ConfigError>) {
        let entries = match list_entries("checkers", &self.checkers) {
            Ok(entries) => entries,
            Err(e) => return (Vec::new(), vec![e]),
        };

        let mut names = Vec::new();
        let mut errors = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            match entry {
                Value::String(name) => names.push(name.trim().to_string()),
                other => errors.push(ConfigError::MalformedCheckerName {
                    index,
                    found: describe(other),
                }),
            }
        }
        (names, errors)
    }

    /// Resolve the plugins this config activates: built-ins by name, then
    /// custom checkers. Unknown names and malformed entries or lists are
    /// returned as errors and left out.
    pub fn plugins(&self) -> (Vec<CheckerPlugin>, Vec<ConfigError>) {
        let mut plugins = Vec::new();
        let (names, mut errors) = self.checker_names();

        for name in names {
            match builtin(&name) {
                Some(plugin) => plugins.push(plugin),
                None => errors.push(ConfigError::UnknownChecker {
                    name,
                    available: builtin_names().join(", "),
                }),
            }
        }

        match list_entries("custom_checkers", &self.custom_checkers) {
            Ok(entries) => {
                for (index, raw) in entries.iter().enumerate() {
                    match serde_yaml::from_value::<CheckerPlugin>(raw.clone()) {
                        Ok(plugin) => plugins.push(plugin),
                        Err(e) => errors.push(ConfigError::MalformedChecker {
                            index,
                            message: e.to_string(),
                        }),
                    }
                }
            }
            Err(e) => errors.push(e),
        }

        (plugins, errors)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            assertion_methods: self.assertion_methods.clone(),
        }
    }
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    config.excluded_matcher()?;

    if config.assertion_methods.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::EmptyAssertionMethod);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("name: empty").unwrap();
        let (names, errors) = config.checker_names();
        assert_eq!(names, vec!["encrypted", "nullness", "tainted"]);
        assert!(errors.is_empty());
        assert_eq!(config.assertion_methods, vec!["assertQualifier"]);
        assert!(config.should_include_tests());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
version: "1.0"
name: "payments"
checkers: [encrypted, nullness]
assertion_methods: [assertQualifier, Qual.check]
excluded_paths:
  - "**/generated/**"
custom_checkers:
  - name: units
    qualifiers:
      - name: Meters
    rules:
      Meters:
        id: missing_meters
        message: "expected @{qualifier}, found {found}"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let (plugins, errors) = config.plugins();
        assert!(errors.is_empty());
        let names: Vec<_> = plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["encrypted", "nullness", "units"]);
        assert_eq!(
            config.session_options().assertion_methods,
            vec!["assertQualifier", "Qual.check"]
        );
        assert!(config.is_path_excluded(Path::new("src/generated/Api.java")));
        assert!(!config.is_path_excluded(Path::new("src/main/Api.java")));
    }

    #[test]
    fn test_bad_entries_are_reported_and_skipped() {
        let yaml = r#"
checkers: [encrypted, units]
custom_checkers:
  - qualifiers: "not a list"
  - name: ok
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let (plugins, errors) = config.plugins();
        let names: Vec<_> = plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["encrypted", "ok"]);
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ConfigError::UnknownChecker { .. }));
        assert!(matches!(errors[1], ConfigError::MalformedChecker { index: 0, .. }));
    }

    #[test]
    fn test_wrong_shaped_checker_lists_are_not_fatal() {
        let yaml = r#"
checkers: encrypted
custom_checkers:
  name: units
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let (plugins, errors) = config.plugins();
        assert!(plugins.is_empty());
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0],
            ConfigError::MalformedCheckerList { field: "checkers", .. }
        ));
        assert!(matches!(
            errors[1],
            ConfigError::MalformedCheckerList { field: "custom_checkers", .. }
        ));
        assert!(errors[0].to_string().contains("string \"encrypted\""));

        let yaml = r#"
checkers: [nullness, 7, {name: x}]
custom_checkers: ~
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let (plugins, errors) = config.plugins();
        let names: Vec<_> = plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["nullness"]);
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ConfigError::MalformedCheckerName { index: 1, .. }));
        assert!(matches!(errors[1], ConfigError::MalformedCheckerName { index: 2, .. }));
    }

    #[test]
    fn test_with_checkers_replaces_builtin_selection() {
        let config = Config::default().with_checkers(&["tainted".to_string()]);
        let (names, errors) = config.checker_names();
        assert_eq!(names, vec!["tainted"]);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_glob() {
        let config = Config {
            excluded_paths: vec!["[unclosed".to_string()],
            ..Default::default()
        };
        assert!(matches!(validate(&config), Err(ConfigError::InvalidGlob { .. })));
    }

    #[test]
    fn test_parse_file_errors() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("missing.yaml");
        assert!(matches!(Config::parse_file(&missing), Err(ConfigError::Io { .. })));

        let broken = temp.path().join("broken.yaml");
        fs::write(&broken, "checkers: [unterminated").unwrap();
        assert!(matches!(Config::parse_file(&broken), Err(ConfigError::Parse { .. })));
    }
}
