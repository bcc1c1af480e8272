//! Resolved manifest: aliases currently bound to live instances.

use std::collections::BTreeMap;

use crate::domain::manifest::ROOT_ALIAS;

/// Alias → instance mapping for one root.
///
/// The map length is the completeness counter; it is compared against the
/// target precomputed from the manifest, so completeness checks are O(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest<I> {
    entries: BTreeMap<String, I>,
    target: usize,
}

impl<I> ResolvedManifest<I> {
    pub fn new(target: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            target,
        }
    }

    /// Record an alias, returning any instance it replaced.
    pub fn insert(&mut self, alias: impl Into<String>, instance: I) -> Option<I> {
        self.entries.insert(alias.into(), instance)
    }

    pub fn remove(&mut self, alias: &str) -> Option<I> {
        self.entries.remove(alias)
    }

    pub fn get(&self, alias: &str) -> Option<&I> {
        self.entries.get(alias)
    }

    /// The bound root, present for as long as the root is bound.
    pub fn root(&self) -> Option<&I> {
        self.get(ROOT_ALIAS)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// True when every alias, root included, is bound.
    pub fn is_complete(&self) -> bool {
        self.entries.len() == self.target
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &I)> {
        self.entries.iter().map(|(alias, i)| (alias.as_str(), i))
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}
