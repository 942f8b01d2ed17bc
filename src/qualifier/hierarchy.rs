//! Qualifier hierarchy: a DAG of named qualifiers with supertype edges.
//!
//! A qualifier may have several direct supertypes, so substitutability is
//! answered from the full transitive closure, computed once when fragments
//! are merged.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A set of qualifier names.
pub type QualifierSet = BTreeSet<String>;

/// Build a `QualifierSet` from names.
pub fn qualifier_set<I, S>(names: I) -> QualifierSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

/// A qualifier and its direct supertypes, as contributed by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifierNode {
    pub name: String,
    #[serde(default)]
    pub supertypes: Vec<String>,
}

impl QualifierNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
        }
    }

    pub fn with_supertypes<I, S>(mut self, supertypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supertypes = supertypes.into_iter().map(Into::into).collect();
        self
    }
}

/// Errors building a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("qualifier '{qualifier}' lists unknown supertype '{supertype}'")]
    UnknownSupertype { qualifier: String, supertype: String },

    #[error("qualifier '{0}' is its own supertype")]
    Cycle(String),
}

/// The merged qualifier DAG for one session. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct QualifierHierarchy {
    /// Direct supertypes, keyed by qualifier name.
    nodes: BTreeMap<String, Vec<String>>,
    /// Transitive supertypes (excluding the qualifier itself).
    ancestors: HashMap<String, BTreeSet<String>>,
}

impl QualifierHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: &[QualifierNode]) -> Result<Self, HierarchyError> {
        let mut hierarchy = Self::new();
        hierarchy.add_fragment(nodes)?;
        Ok(hierarchy)
    }

    /// Merge a plugin's fragment.
    ///
    /// Qualifiers are globally named: a name already present gains the new
    /// edges. A fragment that leaves a dangling supertype or closes a cycle
    /// is rejected and the hierarchy is left unchanged.
    pub fn add_fragment(&mut self, fragment: &[QualifierNode]) -> Result<(), HierarchyError> {
        let mut nodes = self.nodes.clone();
        for node in fragment {
            let supertypes = nodes.entry(node.name.clone()).or_default();
            for supertype in &node.supertypes {
                if !supertypes.contains(supertype) {
                    supertypes.push(supertype.clone());
                }
            }
        }

        for (name, supertypes) in &nodes {
            if let Some(missing) = supertypes.iter().find(|s| !nodes.contains_key(*s)) {
                return Err(HierarchyError::UnknownSupertype {
                    qualifier: name.clone(),
                    supertype: missing.clone(),
                });
            }
        }

        let ancestors = transitive_supertypes(&nodes)?;
        self.nodes = nodes;
        self.ancestors = ancestors;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All qualifier names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn supertypes(&self, name: &str) -> &[String] {
        self.nodes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `sub` is `sup` or reaches it through supertype edges.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        sub == sup
            || self
                .ancestors
                .get(sub)
                .is_some_and(|ancestors| ancestors.contains(sup))
    }

    /// Expected names not matched by any actual name (the residual).
    ///
    /// Each expected name is resolved independently; actual names are not
    /// consumed by a match.
    pub fn satisfies(&self, actual: &QualifierSet, expected: &QualifierSet) -> QualifierSet {
        expected
            .iter()
            .filter(|e| !actual.iter().any(|a| self.is_subtype(a, e)))
            .cloned()
            .collect()
    }

    /// Keep only names this hierarchy knows about.
    pub fn known(&self, names: &[String]) -> QualifierSet {
        names
            .iter()
            .filter(|n| self.contains(n))
            .cloned()
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn transitive_supertypes(
    nodes: &BTreeMap<String, Vec<String>>,
) -> Result<HashMap<String, BTreeSet<String>>, HierarchyError> {
    let mut marks = HashMap::new();
    let mut out = HashMap::new();
    for name in nodes.keys() {
        visit(name, nodes, &mut marks, &mut out)?;
    }
    Ok(out)
}

fn visit(
    name: &str,
    nodes: &BTreeMap<String, Vec<String>>,
    marks: &mut HashMap<String, Mark>,
    out: &mut HashMap<String, BTreeSet<String>>,
) -> Result<(), HierarchyError> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => return Err(HierarchyError::Cycle(name.to_string())),
        None => {}
    }
    marks.insert(name.to_string(), Mark::Visiting);

    let mut reachable = BTreeSet::new();
    for supertype in nodes.get(name).map(Vec::as_slice).unwrap_or(&[]) {
        visit(supertype, nodes, marks, out)?;
        reachable.insert(supertype.clone());
        if let Some(above) = out.get(supertype) {
            reachable.extend(above.iter().cloned());
        }
    }

    marks.insert(name.to_string(), Mark::Done);
    out.insert(name.to_string(), reachable);
    Ok(())
}
