//! Binder entry point and the handle owning one binding.
//!
//! Every handle drains its own FIFO event queue. Collaborator listeners only
//! enqueue; a re-entrancy flag keeps a single drain loop per handle, so an
//! event raised from inside a callback or disposer is processed after the
//! current one finishes.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use generational_arena::Index;
use tracing::{debug, error, instrument, trace};

use crate::application::error::{BindError, BindResult};
use crate::application::lifecycle::{RootLifecycle, RootState};
use crate::application::resolver::{ChildWatcher, Effect, Resolver};
use crate::config::{InvariantPolicy, Settings};
use crate::domain::{Manifest, ResolvedManifest, TreeBuilder};
use crate::infrastructure::traits::{
    Connection, Disposer, Hierarchy, Instance, Listener, TagRegistry,
};
use crate::tree_traits::{BindingView, TreeNodeConvert};

/// Callback run each time a root's manifest becomes complete.
pub type BindCallback<I> = Box<dyn FnMut(&ResolvedManifest<I>) -> Option<Disposer>>;

/// Creates bindings against a tag registry and a hierarchy.
pub struct Binder<I: Instance> {
    registry: Rc<dyn TagRegistry<I>>,
    hierarchy: Rc<dyn Hierarchy<I>>,
    settings: Settings,
}

impl<I: Instance> Binder<I> {
    pub fn new(registry: Rc<dyn TagRegistry<I>>, hierarchy: Rc<dyn Hierarchy<I>>) -> Self {
        Self {
            registry,
            hierarchy,
            settings: Settings::default(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Bind `callback` to `manifest` for every root carrying `tag`.
    ///
    /// The manifest is validated before any subscription is made. Roots
    /// already tagged are bound as independent queued tasks, one per root,
    /// drained before this returns.
    #[instrument(level = "debug", skip(self, manifest, callback), fields(entries = manifest.len()))]
    pub fn create<F>(
        &self,
        tag: &str,
        manifest: &Manifest,
        callback: F,
    ) -> BindResult<BindingHandle<I>>
    where
        F: FnMut(&ResolvedManifest<I>) -> Option<Disposer> + 'static,
    {
        let shape = Rc::new(TreeBuilder::new().build(manifest)?);

        let inner = Rc::new(Inner {
            tag: tag.to_owned(),
            hierarchy: Rc::clone(&self.hierarchy),
            settings: self.settings.clone(),
            lifecycle: RefCell::new(RootLifecycle::new(shape)),
            queue: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
            destroyed: Cell::new(false),
            callback: RefCell::new(Box::new(callback)),
            tag_connections: RefCell::new(Vec::new()),
        });

        let on_tagged: Listener<I> = {
            let weak = Rc::downgrade(&inner);
            Rc::new(move |root: &I| {
                if let Some(inner) = weak.upgrade() {
                    inner.submit(Event::Bind(root.clone()));
                }
            })
        };
        let on_untagged: Listener<I> = {
            let weak = Rc::downgrade(&inner);
            Rc::new(move |root: &I| {
                if let Some(inner) = weak.upgrade() {
                    inner.submit(Event::Unbind(root.clone()));
                }
            })
        };
        let connections = [
            self.registry.on_tagged(tag, on_tagged),
            self.registry.on_untagged(tag, on_untagged),
        ];
        inner.tag_connections.borrow_mut().extend(connections);

        let initial = self.registry.tagged(tag);
        debug!(roots = initial.len(), "scheduling initial binds");
        inner
            .queue
            .borrow_mut()
            .extend(initial.into_iter().map(Event::Bind));
        inner.pump();

        Ok(BindingHandle { inner })
    }
}

impl<I: Instance> fmt::Debug for Binder<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("settings", &self.settings)
            .finish()
    }
}

/// Structural event, processed in arrival order.
enum Event<I> {
    Bind(I),
    Unbind(I),
    ChildAdded {
        root: I,
        epoch: u64,
        node: Index,
        parent: I,
        child: I,
    },
    ChildRemoved {
        root: I,
        epoch: u64,
        node: Index,
        parent: I,
        child: I,
    },
}

struct Inner<I: Instance> {
    tag: String,
    hierarchy: Rc<dyn Hierarchy<I>>,
    settings: Settings,
    lifecycle: RefCell<RootLifecycle<I>>,
    queue: RefCell<VecDeque<Event<I>>>,
    draining: Cell<bool>,
    destroyed: Cell<bool>,
    callback: RefCell<BindCallback<I>>,
    tag_connections: RefCell<Vec<Connection>>,
}

/// Clears the drain flag even when a callback unwinds.
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<I: Instance> Inner<I> {
    fn submit(self: &Rc<Self>, event: Event<I>) {
        if self.destroyed.get() {
            return;
        }
        self.queue.borrow_mut().push_back(event);
        self.pump();
    }

    fn pump(self: &Rc<Self>) {
        if self.draining.replace(true) {
            return;
        }
        let _guard = DrainGuard(&self.draining);
        loop {
            if self.destroyed.get() {
                self.queue.borrow_mut().clear();
                break;
            }
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            self.release_before(&event);
            if self.destroyed.get() {
                continue;
            }
            let effects = self.dispatch(event);
            self.apply(effects);
        }
    }

    /// Release the disposer an event is about to invalidate, before the
    /// event touches any resolution state.
    fn release_before(&self, event: &Event<I>) {
        let disposer = {
            let mut lifecycle = self.lifecycle.borrow_mut();
            match event {
                Event::Unbind(root) => lifecycle.take_disposer(root),
                Event::ChildRemoved {
                    root,
                    epoch,
                    node,
                    parent,
                    child,
                } => lifecycle
                    .child_event_target(root, *epoch, *node, parent)
                    .filter(|binding| binding.holds_child(*node, child))
                    .and_then(|binding| binding.disposer.take()),
                Event::Bind(_) | Event::ChildAdded { .. } => None,
            }
        };
        if let Some(disposer) = disposer {
            debug!("releasing disposer ahead of removal");
            disposer.dispose();
        }
    }

    fn dispatch(self: &Rc<Self>, event: Event<I>) -> Vec<Effect<I>> {
        let watcher = Watcher {
            inner: Rc::downgrade(self),
            hierarchy: self.hierarchy.as_ref(),
        };
        let mut resolver = Resolver::new(
            self.hierarchy.as_ref(),
            &watcher,
            self.settings.self_heal,
        );
        let mut lifecycle = self.lifecycle.borrow_mut();

        match event {
            Event::Bind(root) => {
                if let Err(err) = lifecycle.bind_root(root, &mut resolver) {
                    self.violation(err);
                }
            }
            Event::Unbind(root) => {
                if !lifecycle.unbind_root(&root, &mut resolver) {
                    trace!(root = ?root, "untagged root was not bound");
                }
            }
            Event::ChildAdded {
                root,
                epoch,
                node,
                parent,
                child,
            } => match lifecycle.child_event_target(&root, epoch, node, &parent) {
                Some(binding) => {
                    resolver.child_added(binding, node, &child);
                    binding.settle();
                }
                _ => trace!(root = ?root, child = ?child, "stale child-added event"),
            },
            Event::ChildRemoved {
                root,
                epoch,
                node,
                parent,
                child,
            } => match lifecycle.child_event_target(&root, epoch, node, &parent) {
                Some(binding) => {
                    resolver.child_removed(binding, node, &child);
                    binding.settle();
                }
                _ => trace!(root = ?root, child = ?child, "stale child-removed event"),
            },
        }

        drop(lifecycle);
        resolver.into_effects()
    }

    fn apply(&self, effects: Vec<Effect<I>>) {
        for effect in effects {
            match effect {
                Effect::Dispose { root, disposer } => {
                    debug!(root = ?root, "releasing disposer");
                    disposer.dispose();
                }
                Effect::Invoke {
                    root,
                    epoch,
                    manifest,
                } => {
                    if self.destroyed.get() {
                        continue;
                    }
                    debug!(root = ?root, aliases = manifest.len(), "invoking callback");
                    let disposer = {
                        let mut callback = self.callback.borrow_mut();
                        (&mut **callback)(&manifest)
                    };
                    if let Some(disposer) = disposer {
                        self.adopt(&root, epoch, disposer);
                    }
                }
            }
        }
    }

    /// Hand a fresh disposer to its root, or release it if the root moved on.
    fn adopt(&self, root: &I, epoch: u64, disposer: Disposer) {
        let orphan = {
            let mut lifecycle = self.lifecycle.borrow_mut();
            match lifecycle.binding_mut(root, epoch) {
                Some(binding) if binding.resolved.is_complete() => {
                    binding.disposer.replace(disposer)
                }
                _ => Some(disposer),
            }
        };
        if let Some(orphan) = orphan {
            debug!(root = ?root, "releasing orphaned disposer");
            orphan.dispose();
        }
    }

    fn violation(&self, err: BindError) {
        match self.settings.invariant_policy {
            InvariantPolicy::Panic => panic!("tag '{}': invariant violation: {}", self.tag, err),
            InvariantPolicy::Log => {
                error!(tag = %self.tag, error = %err, "invariant violation ignored")
            }
        }
    }

    fn destroy(self: &Rc<Self>) {
        if self.destroyed.replace(true) {
            return;
        }
        debug!(tag = %self.tag, "destroying binding");

        let connections = std::mem::take(&mut *self.tag_connections.borrow_mut());
        drop(connections);
        self.queue.borrow_mut().clear();

        let active = self.lifecycle.borrow_mut().take_disposers();
        for (root, disposer) in active {
            debug!(root = ?root, "releasing disposer");
            disposer.dispose();
        }

        let watcher = Watcher {
            inner: Rc::downgrade(self),
            hierarchy: self.hierarchy.as_ref(),
        };
        let mut resolver = Resolver::new(self.hierarchy.as_ref(), &watcher, false);
        self.lifecycle.borrow_mut().teardown(&mut resolver);
        self.apply(resolver.into_effects());
    }
}

/// Subscribes child listeners that feed the owning handle's queue.
struct Watcher<'a, I: Instance> {
    inner: Weak<Inner<I>>,
    hierarchy: &'a dyn Hierarchy<I>,
}

impl<I: Instance> ChildWatcher<I> for Watcher<'_, I> {
    fn watch(&self, root: &I, epoch: u64, node: Index, instance: &I) -> Vec<Connection> {
        let on_added: Listener<I> = {
            let inner = Weak::clone(&self.inner);
            let root = root.clone();
            let parent = instance.clone();
            Rc::new(move |child: &I| {
                if let Some(inner) = inner.upgrade() {
                    inner.submit(Event::ChildAdded {
                        root: root.clone(),
                        epoch,
                        node,
                        parent: parent.clone(),
                        child: child.clone(),
                    });
                }
            })
        };
        let on_removed: Listener<I> = {
            let inner = Weak::clone(&self.inner);
            let root = root.clone();
            let parent = instance.clone();
            Rc::new(move |child: &I| {
                if let Some(inner) = inner.upgrade() {
                    inner.submit(Event::ChildRemoved {
                        root: root.clone(),
                        epoch,
                        node,
                        parent: parent.clone(),
                        child: child.clone(),
                    });
                }
            })
        };
        vec![
            self.hierarchy.on_child_added(instance, on_added),
            self.hierarchy.on_child_removed(instance, on_removed),
        ]
    }
}

/// Owner of one binding; destroying (or dropping) it tears everything down.
pub struct BindingHandle<I: Instance> {
    inner: Rc<Inner<I>>,
}

impl<I: Instance> BindingHandle<I> {
    /// Release every disposer and disconnect every listener.
    ///
    /// Safe to call more than once.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn state(&self, root: &I) -> RootState {
        self.inner.lifecycle.borrow().state(root)
    }

    /// Currently bound roots, in no particular order.
    pub fn roots(&self) -> Vec<I> {
        self.inner.lifecycle.borrow().roots()
    }

    /// Number of currently bound roots.
    pub fn len(&self) -> usize {
        self.inner.lifecycle.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of what `root` has resolved so far.
    pub fn resolved(&self, root: &I) -> Option<ResolvedManifest<I>> {
        self.inner
            .lifecycle
            .borrow()
            .get(root)
            .map(|binding| binding.resolved.clone())
    }

    /// Child listeners currently held for `root`.
    pub fn listener_count(&self, root: &I) -> usize {
        self.inner
            .lifecycle
            .borrow()
            .get(root)
            .map_or(0, |binding| binding.tree.connection_count())
    }

    /// Render the binding tree of `root`, marking unresolved nodes.
    pub fn render(&self, root: &I) -> Option<String> {
        let lifecycle = self.inner.lifecycle.borrow();
        let binding = lifecycle.get(root)?;
        Some(BindingView::new(binding).to_tree_string().to_string())
    }

    /// Render the manifest shape shared by every root.
    pub fn render_manifest(&self) -> String {
        self.inner
            .lifecycle
            .borrow()
            .shape()
            .to_tree_string()
            .to_string()
    }
}

impl<I: Instance> Drop for BindingHandle<I> {
    fn drop(&mut self) {
        self.inner.destroy();
    }
}

impl<I: Instance> fmt::Debug for BindingHandle<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingHandle")
            .field("tag", &self.inner.tag)
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}
