//! Merged rule table: qualifier name to diagnostic rule.

use std::collections::BTreeMap;

use super::RuleDescriptor;
use crate::detect::{Severity, UNIMPLEMENTED_CASE};

/// Rule lookup for a session. Qualifiers are globally named, so the first
/// plugin to register a qualifier's rule owns it.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: BTreeMap<String, RuleDescriptor>,
    fallback: RuleDescriptor,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleTable {
    pub fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
            fallback: RuleDescriptor::new(
                UNIMPLEMENTED_CASE,
                Severity::Error,
                "@{qualifier} cannot be checked here ({found})",
            ),
        }
    }

    /// Register a rule unless one already exists. Returns whether it was added.
    pub fn insert(&mut self, qualifier: &str, rule: RuleDescriptor) -> bool {
        if self.rules.contains_key(qualifier) {
            return false;
        }
        self.rules.insert(qualifier.to_string(), rule);
        true
    }

    pub fn get(&self, qualifier: &str) -> Option<&RuleDescriptor> {
        self.rules.get(qualifier)
    }

    /// The qualifier's rule, or the "unimplemented case" rule when none is
    /// registered.
    pub fn rule_for(&self, qualifier: &str) -> &RuleDescriptor {
        self.rules.get(qualifier).unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &RuleDescriptor {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleDescriptor)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }
}
