//! Checker plugins: one data record per qualifier system.
//!
//! A plugin contributes a hierarchy fragment, a rule per qualifier, literal
//! defaults, and optional hooks. Built-in plugins are plain constructors in
//! a static map; custom plugins deserialize from configuration.

use std::collections::BTreeMap;

use phf::phf_map;
use serde::{Deserialize, Serialize};

use super::QualifierNode;
use crate::detect::Severity;

fn default_severity() -> Severity {
    Severity::Error
}

/// Diagnostic rule attached to a qualifier.
///
/// `message` may contain `{qualifier}` and `{found}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub id: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    pub message: String,
}

impl RuleDescriptor {
    pub fn new(id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
        }
    }

    pub fn render(&self, qualifier: &str, found: &str) -> String {
        self.message
            .replace("{qualifier}", qualifier)
            .replace("{found}", found)
    }
}

/// Narrows an identifier to `non_null` inside `if (x != null)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullGuardHook {
    pub non_null: String,
    pub nullable: String,
}

/// Reports a receiver that may carry `nullable` when it is dereferenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DereferenceHook {
    pub nullable: String,
    pub rule: RuleDescriptor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginHooks {
    #[serde(default)]
    pub null_guard: Option<NullGuardHook>,
    #[serde(default)]
    pub dereference: Option<DereferenceHook>,
}

/// A qualifier system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerPlugin {
    pub name: String,
    #[serde(default)]
    pub qualifiers: Vec<QualifierNode>,
    /// Rule per qualifier name.
    #[serde(default)]
    pub rules: BTreeMap<String, RuleDescriptor>,
    /// Qualifier of a bare string literal; `None` means literals never
    /// carry one.
    #[serde(default)]
    pub string_literal_default: Option<String>,
    #[serde(default)]
    pub null_literal_default: Option<String>,
    #[serde(default)]
    pub hooks: PluginHooks,
}

impl CheckerPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualifiers: Vec::new(),
            rules: BTreeMap::new(),
            string_literal_default: None,
            null_literal_default: None,
            hooks: PluginHooks::default(),
        }
    }

    pub fn qualifier(mut self, node: QualifierNode, rule: RuleDescriptor) -> Self {
        self.rules.insert(node.name.clone(), rule);
        self.qualifiers.push(node);
        self
    }

    /// Rule problems that do not depend on other plugins.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("checker plugin has an empty name".to_string());
        }
        for qualifier in self.rules.keys() {
            if !self.qualifiers.iter().any(|q| &q.name == qualifier) {
                errors.push(format!(
                    "plugin '{}': rule for undeclared qualifier '{}'",
                    self.name, qualifier
                ));
            }
        }
        let defaults = [
            ("string_literal_default", &self.string_literal_default),
            ("null_literal_default", &self.null_literal_default),
        ];
        for (field, default) in defaults {
            if let Some(name) = default {
                if !self.qualifiers.iter().any(|q| &q.name == name) {
                    errors.push(format!(
                        "plugin '{}': {} '{}' is not one of its qualifiers",
                        self.name, field, name
                    ));
                }
            }
        }
        errors
    }
}

fn encrypted() -> CheckerPlugin {
    CheckerPlugin::new("encrypted").qualifier(
        QualifierNode::new("Encrypted"),
        RuleDescriptor::new(
            "missing_encrypted",
            Severity::Error,
            "expected an @{qualifier} value, found {found}",
        ),
    )
}

fn nullness() -> CheckerPlugin {
    let mut plugin = CheckerPlugin::new("nullness")
        .qualifier(
            QualifierNode::new("MaybeNull"),
            RuleDescriptor::new(
                "missing_maybe_null",
                Severity::Error,
                "expected a @{qualifier} value, found {found}",
            ),
        )
        .qualifier(
            QualifierNode::new("NonNull").with_supertypes(["MaybeNull"]),
            RuleDescriptor::new(
                "missing_non_null",
                Severity::Error,
                "value may be null where @{qualifier} is required (found {found})",
            ),
        );
    plugin.string_literal_default = Some("NonNull".to_string());
    plugin.null_literal_default = Some("MaybeNull".to_string());
    plugin.hooks = PluginHooks {
        null_guard: Some(NullGuardHook {
            non_null: "NonNull".to_string(),
            nullable: "MaybeNull".to_string(),
        }),
        dereference: Some(DereferenceHook {
            nullable: "MaybeNull".to_string(),
            rule: RuleDescriptor::new(
                "null_dereference",
                Severity::Warning,
                "dereference of a @{qualifier} value",
            ),
        }),
    };
    plugin
}

fn tainted() -> CheckerPlugin {
    let mut plugin = CheckerPlugin::new("tainted")
        .qualifier(
            QualifierNode::new("Tainted"),
            RuleDescriptor::new(
                "missing_tainted",
                Severity::Error,
                "expected a @{qualifier} value, found {found}",
            ),
        )
        .qualifier(
            QualifierNode::new("Untainted").with_supertypes(["Tainted"]),
            RuleDescriptor::new(
                "missing_untainted",
                Severity::Error,
                "possibly tainted value flows where @{qualifier} is required (found {found})",
            ),
        );
    plugin.string_literal_default = Some("Untainted".to_string());
    plugin.null_literal_default = Some("Untainted".to_string());
    plugin
}

/// Built-in plugins by name.
static BUILTIN_PLUGINS: phf::Map<&'static str, fn() -> CheckerPlugin> = phf_map! {
    "encrypted" => encrypted as fn() -> CheckerPlugin,
    "nullness" => nullness as fn() -> CheckerPlugin,
    "tainted" => tainted as fn() -> CheckerPlugin,
};

/// Look up a built-in plugin by name.
pub fn builtin(name: &str) -> Option<CheckerPlugin> {
    BUILTIN_PLUGINS.get(name).map(|make| make())
}

/// Names of all built-in plugins, sorted.
pub fn builtin_names() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTIN_PLUGINS.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_valid() {
        assert_eq!(builtin_names(), vec!["encrypted", "nullness", "tainted"]);
        for name in builtin_names() {
            let plugin = builtin(name).unwrap();
            assert_eq!(plugin.name, name);
            assert!(plugin.validate().is_empty(), "{:?}", plugin.validate());
        }
        assert!(builtin("units").is_none());
    }

    #[test]
    fn test_encrypted_has_no_literal_defaults() {
        let plugin = builtin("encrypted").unwrap();
        assert!(plugin.string_literal_default.is_none());
        assert!(plugin.null_literal_default.is_none());
    }

    #[test]
    fn test_render_placeholders() {
        let rule = RuleDescriptor::new("r", Severity::Error, "need {qualifier}, got {found}");
        assert_eq!(rule.render("NonNull", "MaybeNull"), "need NonNull, got MaybeNull");
    }

    #[test]
    fn test_custom_plugin_from_yaml() {
        let yaml = r#"
name: units
qualifiers:
  - name: Meters
  - name: Length
  - name: Feet
    supertypes: [Length]
rules:
  Meters:
    id: missing_meters
    message: "expected @{qualifier}"
  Feet:
    id: missing_feet
    severity: warning
    message: "expected @{qualifier}"
string_literal_default: Meters
"#;
        let plugin: CheckerPlugin = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(plugin.qualifiers.len(), 3);
        assert_eq!(plugin.rules["Meters"].severity, Severity::Error);
        assert_eq!(plugin.rules["Feet"].severity, Severity::Warning);
        assert!(plugin.hooks.null_guard.is_none());
        assert!(plugin.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_dangling_rule_and_default() {
        let mut plugin = CheckerPlugin::new("broken");
        plugin.rules.insert(
            "Ghost".to_string(),
            RuleDescriptor::new("ghost", Severity::Error, "x"),
        );
        plugin.null_literal_default = Some("Ghost".to_string());
        assert_eq!(plugin.validate().len(), 2);
    }
}
