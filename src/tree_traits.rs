//! Diagnostic rendering of manifest shapes and binding trees.

use generational_arena::Index;
use termtree::Tree;
use tracing::instrument;

use crate::application::lifecycle::RootBinding;
use crate::domain::ManifestTree;
use crate::infrastructure::traits::Instance;

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TreeNodeConvert for ManifestTree {
    #[instrument(level = "trace", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        fn build_tree(shape: &ManifestTree, idx: Index) -> Tree<String> {
            let label = shape
                .node(idx)
                .map(|node| node.to_string())
                .unwrap_or_default();
            let leaves: Vec<_> = shape
                .children(idx)
                .into_iter()
                .map(|child| build_tree(shape, child))
                .collect();
            Tree::new(label).with_leaves(leaves)
        }

        build_tree(self, self.root())
    }
}

/// Read-only view of one root's binding tree.
pub(crate) struct BindingView<'a, I> {
    binding: &'a RootBinding<I>,
}

impl<'a, I> BindingView<'a, I> {
    pub(crate) fn new(binding: &'a RootBinding<I>) -> Self {
        Self { binding }
    }
}

impl<I: Instance> TreeNodeConvert for BindingView<'_, I> {
    fn to_tree_string(&self) -> Tree<String> {
        let shape = self.binding.tree.shape();

        let build_label = |idx: Index| -> String {
            let entry = shape.node(idx).map(|node| node.to_string()).unwrap_or_default();
            match self.binding.tree.instance(idx) {
                Some(instance) => format!("{} = {:?}", entry, instance),
                None => format!("{} (unresolved)", entry),
            }
        };

        fn build_tree(
            shape: &ManifestTree,
            idx: Index,
            label: &dyn Fn(Index) -> String,
        ) -> Tree<String> {
            let leaves: Vec<_> = shape
                .children(idx)
                .into_iter()
                .map(|child| build_tree(shape, child, label))
                .collect();
            Tree::new(label(idx)).with_leaves(leaves)
        }

        build_tree(&shape, shape.root(), &build_label)
    }
}
