use std::collections::BTreeMap;
use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

/// Shape data for one path segment of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestNode {
    /// Child name this node matches; empty for the root
    pub segment: String,
    /// Manifest alias terminating at this node, if any
    pub alias: Option<String>,
    /// Child nodes by name; `None` marks a leaf
    pub children: Option<BTreeMap<String, Index>>,
}

impl ManifestNode {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_owned(),
            alias: None,
            children: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

impl fmt::Display for ManifestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segment = if self.segment.is_empty() {
            "<root>"
        } else {
            self.segment.as_str()
        };
        match &self.alias {
            Some(alias) => write!(f, "{} [{}]", segment, alias),
            None => write!(f, "{}", segment),
        }
    }
}

/// Arena-based manifest shape shared by every root of a binding.
///
/// Nodes own their children by name; there are no parent links. Indices stay
/// valid for the lifetime of the tree since nodes are never removed.
#[derive(Debug)]
pub struct ManifestTree {
    arena: Arena<ManifestNode>,
    root: Index,
    target: usize,
}

impl ManifestTree {
    /// Create a tree holding only the root node.
    pub(crate) fn with_root() -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(ManifestNode::new(""));
        Self {
            arena,
            root,
            target: 1,
        }
    }

    /// Return the child of `parent` named `segment`, creating it if needed.
    ///
    /// The parent becomes non-leaf as a side effect.
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn child_or_insert(&mut self, parent: Index, segment: &str) -> Index {
        if let Some(existing) = self.child(parent, segment) {
            return existing;
        }
        let idx = self.arena.insert(ManifestNode::new(segment));
        if let Some(node) = self.arena.get_mut(parent) {
            node.children
                .get_or_insert_with(BTreeMap::new)
                .insert(segment.to_owned(), idx);
        }
        idx
    }

    /// Attach `alias` to a node; returns the alias already present on conflict.
    pub(crate) fn assign_alias(&mut self, idx: Index, alias: &str) -> Result<(), String> {
        match self.arena.get_mut(idx) {
            Some(node) => match &node.alias {
                Some(existing) => Err(existing.clone()),
                None => {
                    node.alias = Some(alias.to_owned());
                    Ok(())
                }
            },
            None => Ok(()),
        }
    }

    pub(crate) fn set_target(&mut self, target: usize) {
        self.target = target;
    }

    pub fn root(&self) -> Index {
        self.root
    }

    /// Number of aliases (root included) a root must resolve to be complete.
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn node(&self, idx: Index) -> Option<&ManifestNode> {
        self.arena.get(idx)
    }

    pub fn child(&self, parent: Index, segment: &str) -> Option<Index> {
        self.arena
            .get(parent)
            .and_then(|node| node.children.as_ref())
            .and_then(|children| children.get(segment).copied())
    }

    /// Child indices of a node in name order; empty for leaves.
    pub fn children(&self, idx: Index) -> Vec<Index> {
        self.arena
            .get(idx)
            .and_then(|node| node.children.as_ref())
            .map(|children| children.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    pub fn depth(&self) -> usize {
        self.calculate_depth(self.root)
    }

    fn calculate_depth(&self, idx: Index) -> usize {
        if self.node(idx).is_none() {
            return 0;
        }
        1 + self
            .children(idx)
            .into_iter()
            .map(|child| self.calculate_depth(child))
            .max()
            .unwrap_or(0)
    }

    /// Aliases attached to leaf nodes.
    pub fn leaf_aliases(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, node)| node.is_leaf())
            .filter_map(|(_, node)| node.alias.clone())
            .collect()
    }
}

/// Pre-order walk over a [`ManifestTree`], children in name order.
pub struct TreeIterator<'a> {
    tree: &'a ManifestTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a ManifestTree) -> Self {
        Self {
            tree,
            stack: vec![tree.root],
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a ManifestNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.tree.node(current) {
                // Push children in reverse order for left-to-right traversal
                for child in self.tree.children(current).into_iter().rev() {
                    self.stack.push(child);
                }
                return Some((current, node));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_or_insert_marks_parent_non_leaf() {
        let mut tree = ManifestTree::with_root();
        let root = tree.root();
        assert!(tree.node(root).unwrap().is_leaf());

        let a = tree.child_or_insert(root, "A");
        assert!(!tree.node(root).unwrap().is_leaf());
        assert!(tree.node(a).unwrap().is_leaf());
        assert_eq!(tree.child_or_insert(root, "A"), a);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_assign_alias_reports_existing() {
        let mut tree = ManifestTree::with_root();
        let a = tree.child_or_insert(tree.root(), "A");
        assert!(tree.assign_alias(a, "x").is_ok());
        assert_eq!(tree.assign_alias(a, "y"), Err("x".to_string()));
    }

    #[test]
    fn test_iter_is_preorder_by_name() {
        let mut tree = ManifestTree::with_root();
        let root = tree.root();
        let b = tree.child_or_insert(root, "B");
        tree.child_or_insert(b, "C");
        tree.child_or_insert(root, "A");

        let segments: Vec<_> = tree.iter().map(|(_, n)| n.segment.clone()).collect();
        assert_eq!(segments, vec!["", "A", "B", "C"]);
        assert_eq!(tree.depth(), 3);
    }
}
