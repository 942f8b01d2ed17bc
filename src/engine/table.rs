//! The annotation table: obligations and actual qualifiers keyed by node.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::analysis::NodeId;
use crate::qualifier::QualifierSet;

/// Concurrent map from a node's identity to alternative qualifier sets.
///
/// Argument lists store one set per parameter position; every other key
/// stores a single set. Collection only ever inserts if absent. The two
/// refinements overwrite, during the single-threaded verification pass.
#[derive(Debug, Default)]
pub struct AnnotationTable {
    entries: RwLock<HashMap<NodeId, Vec<QualifierSet>>>,
}

impl AnnotationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is already present. Returns whether it was
    /// inserted; an existing entry is never replaced.
    pub fn insert_if_absent(&self, node: NodeId, sets: Vec<QualifierSet>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.entry(node) {
            Entry::Vacant(slot) => {
                slot.insert(sets);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, node: NodeId) -> Option<Vec<QualifierSet>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&node).cloned()
    }

    /// First alternative of a single-set entry.
    pub fn single(&self, node: NodeId) -> Option<QualifierSet> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&node).and_then(|sets| sets.first().cloned())
    }

    pub fn contains(&self, node: NodeId) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(&node)
    }

    /// Replace a node's entry with one set. Reserved for refinements.
    pub(crate) fn overwrite(&self, node: NodeId, set: QualifierSet) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(node, vec![set]);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
