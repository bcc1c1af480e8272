//! Per-root binding tree: which shape nodes are bound to which instances.

use std::collections::HashMap;
use std::rc::Rc;

use generational_arena::Index;

use crate::domain::ManifestTree;
use crate::infrastructure::traits::Connection;

/// Runtime state of one resolved node.
struct BoundNode<I> {
    instance: I,
    /// Child listeners; `None` for leaves.
    connections: Option<Vec<Connection>>,
}

/// Resolution state of one root against the shared manifest shape.
///
/// A shape node is resolved iff it has an entry here. Dropping an entry drops
/// its connections, which disconnects the listeners.
pub(crate) struct BindingTree<I> {
    shape: Rc<ManifestTree>,
    bound: HashMap<Index, BoundNode<I>>,
}

impl<I> BindingTree<I> {
    pub(crate) fn new(shape: Rc<ManifestTree>) -> Self {
        Self {
            shape,
            bound: HashMap::new(),
        }
    }

    pub(crate) fn shape(&self) -> Rc<ManifestTree> {
        Rc::clone(&self.shape)
    }

    pub(crate) fn instance(&self, node: Index) -> Option<&I> {
        self.bound.get(&node).map(|bound| &bound.instance)
    }

    pub(crate) fn is_bound(&self, node: Index) -> bool {
        self.bound.contains_key(&node)
    }

    /// Bind `node` to `instance`; returns false if it was already bound.
    pub(crate) fn bind(&mut self, node: Index, instance: I) -> bool {
        if self.bound.contains_key(&node) {
            return false;
        }
        let connections = self
            .shape
            .node(node)
            .filter(|entry| !entry.is_leaf())
            .map(|_| Vec::new());
        self.bound.insert(
            node,
            BoundNode {
                instance,
                connections,
            },
        );
        true
    }

    /// Store the child listeners of a resolved non-leaf node.
    pub(crate) fn attach(&mut self, node: Index, connections: Vec<Connection>) {
        if let Some(slot) = self
            .bound
            .get_mut(&node)
            .and_then(|bound| bound.connections.as_mut())
        {
            slot.extend(connections);
        }
    }

    /// Clear `node`, disconnecting its listeners. Returns the released instance.
    pub(crate) fn unbind(&mut self, node: Index) -> Option<I> {
        self.bound.remove(&node).map(|bound| {
            drop(bound.connections);
            bound.instance
        })
    }

    pub(crate) fn bound_count(&self) -> usize {
        self.bound.len()
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.bound
            .values()
            .filter_map(|bound| bound.connections.as_ref())
            .map(Vec::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Manifest, TreeBuilder};
    use std::cell::Cell;

    fn shape() -> Rc<ManifestTree> {
        let manifest = Manifest::new().with("a", "A");
        Rc::new(TreeBuilder::new().build(&manifest).unwrap())
    }

    #[test]
    fn test_leaf_nodes_hold_no_connections() {
        let shape = shape();
        let a = shape.child(shape.root(), "A").unwrap();
        let mut tree = BindingTree::new(Rc::clone(&shape));

        assert!(tree.bind(a, "a-instance"));
        assert!(!tree.bind(a, "other"));
        tree.attach(a, vec![Connection::detached()]);
        assert_eq!(tree.connection_count(), 0);
        assert_eq!(tree.instance(a), Some(&"a-instance"));
    }

    #[test]
    fn test_unbind_disconnects() {
        let shape = shape();
        let root = shape.root();
        let mut tree = BindingTree::new(Rc::clone(&shape));
        let disconnected = Rc::new(Cell::new(false));
        let flag = Rc::clone(&disconnected);

        tree.bind(root, "root-instance");
        tree.attach(root, vec![Connection::new(move || flag.set(true))]);
        assert_eq!(tree.connection_count(), 1);

        assert_eq!(tree.unbind(root), Some("root-instance"));
        assert!(disconnected.get());
        assert_eq!(tree.unbind(root), None);
        assert_eq!(tree.bound_count(), 0);
    }
}
