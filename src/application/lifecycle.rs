//! Root lifecycle: one binding tree, resolved manifest and disposer per root.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use generational_arena::Index;
use tracing::{debug, instrument, trace};

use crate::application::error::{BindError, BindResult};
use crate::application::resolver::Resolver;
use crate::application::tree::BindingTree;
use crate::domain::{ManifestTree, ResolvedManifest};
use crate::infrastructure::traits::{Disposer, Instance};

/// Binding state of a root.
///
/// `Building` and `Resolving` only exist while a bind is in progress, and a
/// bind completes before any user code runs. [`BindingHandle::state`]
/// therefore reports `Unbound`, `Complete` or `PartiallyResolved`; the
/// transient states appear in `trace` logs.
///
/// [`BindingHandle::state`]: crate::BindingHandle::state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootState {
    /// Not tracked by the binding.
    Unbound,
    /// Tree allocated, root not yet resolved. Transient.
    Building,
    /// Initial descent in progress. Transient.
    Resolving,
    /// Every alias resolved; the callback has fired.
    Complete,
    /// Bound, but at least one alias is missing.
    PartiallyResolved,
}

impl fmt::Display for RootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RootState::Unbound => "unbound",
            RootState::Building => "building",
            RootState::Resolving => "resolving",
            RootState::Complete => "complete",
            RootState::PartiallyResolved => "partially resolved",
        };
        f.write_str(label)
    }
}

/// Everything tracked for one bound root.
pub(crate) struct RootBinding<I> {
    pub(crate) root: I,
    pub(crate) epoch: u64,
    pub(crate) tree: BindingTree<I>,
    pub(crate) resolved: ResolvedManifest<I>,
    pub(crate) disposer: Option<Disposer>,
    pub(crate) state: RootState,
}

impl<I: Instance> RootBinding<I> {
    fn new(root: I, epoch: u64, shape: Rc<ManifestTree>) -> Self {
        let target = shape.target();
        Self {
            root,
            epoch,
            tree: BindingTree::new(shape),
            resolved: ResolvedManifest::new(target),
            disposer: None,
            state: RootState::Building,
        }
    }

    /// Whether `child`, removed from the instance bound at `parent`, is the
    /// instance currently resolved for its manifest node.
    pub(crate) fn holds_child(&self, parent: Index, child: &I) -> bool {
        self.tree
            .shape()
            .child(parent, &child.name())
            .is_some_and(|slot| self.tree.instance(slot) == Some(child))
    }

    /// Recompute the steady state after an event.
    pub(crate) fn settle(&mut self) {
        self.state = if self.resolved.is_complete() {
            RootState::Complete
        } else {
            RootState::PartiallyResolved
        };
    }
}

/// Per-root tracking tables of one binding.
pub(crate) struct RootLifecycle<I> {
    shape: Rc<ManifestTree>,
    roots: HashMap<I, RootBinding<I>>,
    next_epoch: u64,
}

impl<I: Instance> RootLifecycle<I> {
    pub(crate) fn new(shape: Rc<ManifestTree>) -> Self {
        Self {
            shape,
            roots: HashMap::new(),
            next_epoch: 0,
        }
    }

    /// Build a fresh tree for `root` and resolve it.
    #[instrument(level = "debug", skip(self, resolver))]
    pub(crate) fn bind_root(&mut self, root: I, resolver: &mut Resolver<'_, I>) -> BindResult<()> {
        if self.roots.contains_key(&root) {
            return Err(BindError::AlreadyBound {
                root: format!("{:?}", root),
            });
        }

        self.next_epoch += 1;
        let mut binding = RootBinding::new(root.clone(), self.next_epoch, Rc::clone(&self.shape));
        trace!(state = %binding.state, "root tree allocated");
        let top = self.shape.root();
        binding.tree.bind(top, root.clone());
        binding.state = RootState::Resolving;
        trace!(state = %binding.state, "resolving root");
        resolver.process_node(&mut binding, top);
        binding.settle();

        debug!(
            epoch = binding.epoch,
            bound = binding.tree.bound_count(),
            resolved = binding.resolved.len(),
            target = binding.resolved.target(),
            "root bound"
        );
        self.roots.insert(root, binding);
        Ok(())
    }

    /// Release the disposer and unbind the whole tree of `root`.
    ///
    /// Returns false if the root was not bound.
    #[instrument(level = "debug", skip(self, resolver))]
    pub(crate) fn unbind_root(&mut self, root: &I, resolver: &mut Resolver<'_, I>) -> bool {
        let Some(mut binding) = self.roots.remove(root) else {
            return false;
        };
        resolver.stop_bound(&mut binding);
        resolver.unbind_node(&mut binding, self.shape.root());
        debug!(epoch = binding.epoch, "root unbound");
        true
    }

    /// Unbind every root.
    pub(crate) fn teardown(&mut self, resolver: &mut Resolver<'_, I>) {
        let root = self.shape.root();
        for (_, mut binding) in self.roots.drain() {
            resolver.stop_bound(&mut binding);
            resolver.unbind_node(&mut binding, root);
        }
    }

    /// The binding of `root`, if it is still the one registered under `epoch`.
    pub(crate) fn binding_mut(&mut self, root: &I, epoch: u64) -> Option<&mut RootBinding<I>> {
        self.roots
            .get_mut(root)
            .filter(|binding| binding.epoch == epoch)
    }

    /// The binding a child event was registered for.
    ///
    /// Matches only while `root` is still bound under `epoch` and `node` is
    /// still bound to the `parent` instance the listener was attached to.
    pub(crate) fn child_event_target(
        &mut self,
        root: &I,
        epoch: u64,
        node: Index,
        parent: &I,
    ) -> Option<&mut RootBinding<I>> {
        self.binding_mut(root, epoch)
            .filter(|binding| binding.tree.instance(node) == Some(parent))
    }

    /// Take the active disposer of `root` so it can run outside any borrow.
    pub(crate) fn take_disposer(&mut self, root: &I) -> Option<Disposer> {
        self.roots.get_mut(root)?.disposer.take()
    }

    /// Take every active disposer, leaving the bindings in place.
    pub(crate) fn take_disposers(&mut self) -> Vec<(I, Disposer)> {
        self.roots
            .values_mut()
            .filter_map(|binding| {
                let disposer = binding.disposer.take()?;
                Some((binding.root.clone(), disposer))
            })
            .collect()
    }

    pub(crate) fn get(&self, root: &I) -> Option<&RootBinding<I>> {
        self.roots.get(root)
    }

    pub(crate) fn state(&self, root: &I) -> RootState {
        self.roots
            .get(root)
            .map_or(RootState::Unbound, |binding| binding.state)
    }

    pub(crate) fn roots(&self) -> Vec<I> {
        self.roots.keys().cloned().collect()
    }

    pub(crate) fn shape(&self) -> &ManifestTree {
        &self.shape
    }

    pub(crate) fn len(&self) -> usize {
        self.roots.len()
    }
}
