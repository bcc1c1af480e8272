//! Recursive resolution of a root's binding tree.
//!
//! The resolver mutates one [`RootBinding`] in response to a bind, a child
//! addition or a child removal. It never runs user code itself: callback
//! invocations and disposer releases are queued as [`Effect`]s, in order, and
//! executed by the binder once every borrow on the bookkeeping is released.

use generational_arena::Index;
use tracing::{debug, instrument, trace};

use crate::application::lifecycle::RootBinding;
use crate::domain::ResolvedManifest;
use crate::infrastructure::traits::{Connection, Disposer, Hierarchy, Instance};

/// Deferred side effect produced while resolving.
pub(crate) enum Effect<I> {
    /// Release a disposer that no longer guards a complete manifest.
    Dispose { root: I, disposer: Disposer },
    /// Run the callback for a manifest that just became complete.
    Invoke {
        root: I,
        epoch: u64,
        manifest: ResolvedManifest<I>,
    },
}

/// Registers child listeners on a freshly resolved non-leaf instance.
pub(crate) trait ChildWatcher<I: Instance> {
    fn watch(&self, root: &I, epoch: u64, node: Index, instance: &I) -> Vec<Connection>;
}

pub(crate) struct Resolver<'a, I: Instance> {
    hierarchy: &'a dyn Hierarchy<I>,
    watcher: &'a dyn ChildWatcher<I>,
    self_heal: bool,
    effects: Vec<Effect<I>>,
}

impl<'a, I: Instance> Resolver<'a, I> {
    pub(crate) fn new(
        hierarchy: &'a dyn Hierarchy<I>,
        watcher: &'a dyn ChildWatcher<I>,
        self_heal: bool,
    ) -> Self {
        Self {
            hierarchy,
            watcher,
            self_heal,
            effects: Vec::new(),
        }
    }

    pub(crate) fn into_effects(self) -> Vec<Effect<I>> {
        self.effects
    }

    /// Propagate the instance just set on `node`.
    ///
    /// Records the alias, fires on completion at a leaf, and for non-leaf
    /// nodes resolves the current children before listening for changes.
    /// Enumeration and subscription happen within one event turn, so no
    /// child mutation can slip between them.
    #[instrument(level = "trace", skip(self, binding), fields(root = ?binding.root))]
    pub(crate) fn process_node(&mut self, binding: &mut RootBinding<I>, node: Index) {
        let shape = binding.tree.shape();
        let Some(entry) = shape.node(node) else {
            return;
        };
        let Some(instance) = binding.tree.instance(node).cloned() else {
            trace!("node not bound, nothing to process");
            return;
        };

        if let Some(alias) = &entry.alias {
            binding.resolved.insert(alias.clone(), instance.clone());
        }

        if entry.is_leaf() {
            if binding.resolved.is_complete() {
                self.start_bound(binding);
            }
            return;
        }

        for child in self.hierarchy.children(&instance) {
            self.child_added(binding, node, &child);
        }
        let connections = self
            .watcher
            .watch(&binding.root, binding.epoch, node, &instance);
        binding.tree.attach(node, connections);
    }

    /// Try to resolve `child` of the instance bound at `parent`.
    pub(crate) fn child_added(&mut self, binding: &mut RootBinding<I>, parent: Index, child: &I) {
        let shape = binding.tree.shape();
        let name = child.name();
        let Some(slot) = shape.child(parent, &name) else {
            trace!(child = ?child, "no manifest node for child");
            return;
        };
        if !binding.tree.bind(slot, child.clone()) {
            trace!(child = ?child, "manifest node already bound");
            return;
        }
        self.process_node(binding, slot);
    }

    /// Handle removal of `child` from the instance bound at `parent`.
    ///
    /// Only a removal matching the bound node by name and identity has any
    /// effect: the active disposer is released, the subtree is unbound, and a
    /// same-named replacement is looked up when self-healing is enabled.
    #[instrument(level = "trace", skip(self, binding), fields(root = ?binding.root))]
    pub(crate) fn child_removed(&mut self, binding: &mut RootBinding<I>, parent: Index, child: &I) {
        let shape = binding.tree.shape();
        let name = child.name();
        let Some(slot) = shape.child(parent, &name) else {
            return;
        };
        if binding.tree.instance(slot) != Some(child) {
            trace!(child = ?child, "removed child is not the bound instance");
            return;
        }

        self.stop_bound(binding);
        self.unbind_node(binding, slot);

        if !self.self_heal {
            return;
        }
        let Some(parent_instance) = binding.tree.instance(parent).cloned() else {
            return;
        };
        if let Some(replacement) = self.hierarchy.find_child(&parent_instance, &name) {
            if &replacement != child {
                debug!(replacement = ?replacement, "re-resolving replacement child");
                self.child_added(binding, parent, &replacement);
            }
        }
    }

    /// Unbind `node` and its whole subtree, top-down.
    ///
    /// Unbinding a node that is not resolved is a no-op.
    pub(crate) fn unbind_node(&mut self, binding: &mut RootBinding<I>, node: Index) {
        if !binding.tree.is_bound(node) {
            return;
        }
        let shape = binding.tree.shape();
        for child in shape.children(node) {
            self.unbind_node(binding, child);
        }
        binding.tree.unbind(node);
        if let Some(alias) = shape.node(node).and_then(|entry| entry.alias.as_deref()) {
            binding.resolved.remove(alias);
        }
    }

    /// Queue the callback for a complete manifest, releasing any prior disposer.
    pub(crate) fn start_bound(&mut self, binding: &mut RootBinding<I>) {
        self.stop_bound(binding);
        debug!(root = ?binding.root, "manifest complete");
        self.effects.push(Effect::Invoke {
            root: binding.root.clone(),
            epoch: binding.epoch,
            manifest: binding.resolved.clone(),
        });
    }

    /// Queue release of the root's active disposer, if any.
    pub(crate) fn stop_bound(&mut self, binding: &mut RootBinding<I>) {
        if let Some(disposer) = binding.disposer.take() {
            self.effects.push(Effect::Dispose {
                root: binding.root.clone(),
                disposer,
            });
        }
    }
}
