//! Qualifier systems: the hierarchy, checker plugins, and the rule table.
//!
//! Active plugins are merged once per session into one hierarchy and one
//! rule table. A plugin whose fragment cannot be merged is reported and
//! skipped; the rest stay active.

mod hierarchy;
mod plugin;
mod rules;

pub use hierarchy::{qualifier_set, HierarchyError, QualifierHierarchy, QualifierNode, QualifierSet};
pub use plugin::{
    builtin, builtin_names, CheckerPlugin, DereferenceHook, NullGuardHook, PluginHooks,
    RuleDescriptor,
};
pub use rules::RuleTable;

use thiserror::Error;
use tracing::{debug, warn};

/// Why a plugin was left out of a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("checker '{plugin}': {source}")]
    Hierarchy {
        plugin: String,
        #[source]
        source: HierarchyError,
    },

    #[error("checker '{plugin}': {message}")]
    Invalid { plugin: String, message: String },

    #[error("checker '{0}' is activated more than once")]
    Duplicate(String),
}

/// Merged state for the active plugins of one session.
#[derive(Debug, Clone, Default)]
pub struct ActivePlugins {
    pub hierarchy: QualifierHierarchy,
    pub rules: RuleTable,
    pub plugins: Vec<CheckerPlugin>,
    pub rejected: Vec<PluginError>,
}

impl ActivePlugins {
    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name.clone()).collect()
    }

    /// Union of the string-literal defaults of all active plugins.
    pub fn string_literal_defaults(&self) -> QualifierSet {
        self.plugins
            .iter()
            .filter_map(|p| p.string_literal_default.clone())
            .collect()
    }

    /// Union of the null-literal defaults of all active plugins.
    pub fn null_literal_defaults(&self) -> QualifierSet {
        self.plugins
            .iter()
            .filter_map(|p| p.null_literal_default.clone())
            .collect()
    }

    pub fn null_guards(&self) -> impl Iterator<Item = &NullGuardHook> {
        self.plugins.iter().filter_map(|p| p.hooks.null_guard.as_ref())
    }

    pub fn dereference_hooks(&self) -> impl Iterator<Item = &DereferenceHook> {
        self.plugins.iter().filter_map(|p| p.hooks.dereference.as_ref())
    }
}

/// Merge plugins into one hierarchy and rule table.
///
/// Plugins are applied in order. Each rejection is logged once and kept in
/// `rejected`.
pub fn build_hierarchy_and_rules(plugins: Vec<CheckerPlugin>) -> ActivePlugins {
    let mut active = ActivePlugins::default();

    for plugin in plugins {
        if let Err(err) = admit(&mut active, &plugin) {
            warn!(error = %err, "checker disabled");
            active.rejected.push(err);
            continue;
        }
        debug!(checker = %plugin.name, qualifiers = plugin.qualifiers.len(), "checker enabled");
        active.plugins.push(plugin);
    }

    active
}

fn admit(active: &mut ActivePlugins, plugin: &CheckerPlugin) -> Result<(), PluginError> {
    if active.plugins.iter().any(|p| p.name == plugin.name) {
        return Err(PluginError::Duplicate(plugin.name.clone()));
    }

    if let Some(message) = plugin.validate().into_iter().next() {
        return Err(PluginError::Invalid {
            plugin: plugin.name.clone(),
            message,
        });
    }

    active
        .hierarchy
        .add_fragment(&plugin.qualifiers)
        .map_err(|source| PluginError::Hierarchy {
            plugin: plugin.name.clone(),
            source,
        })?;

    for (qualifier, rule) in &plugin.rules {
        if !active.rules.insert(qualifier, rule.clone()) {
            debug!(qualifier = %qualifier, checker = %plugin.name, "rule already registered");
        }
    }

    Ok(())
}
