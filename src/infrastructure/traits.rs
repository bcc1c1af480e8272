//! Collaborator boundary traits
//!
//! The binding engine never owns the hierarchy or the tag registry. These
//! traits describe the little it needs from them, so any scene graph can be
//! plugged in (see [`MemoryScene`](super::scene::MemoryScene) for the bundled one).

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// A concrete hierarchy object.
///
/// Equality is identity: two handles are equal iff they denote the same
/// object. The name must be stable while the object is observed.
pub trait Instance: Clone + Eq + Hash + fmt::Debug + 'static {
    fn name(&self) -> String;
}

/// Listener invoked with the child (or root) an event concerns.
pub type Listener<I> = Rc<dyn Fn(&I)>;

/// Tree-mutation source.
pub trait Hierarchy<I: Instance> {
    /// Current children of `parent`, in hierarchy order.
    fn children(&self, parent: &I) -> Vec<I>;

    /// First current child of `parent` named `name`.
    fn find_child(&self, parent: &I, name: &str) -> Option<I>;

    /// Listen for children added to `parent`.
    fn on_child_added(&self, parent: &I, listener: Listener<I>) -> Connection;

    /// Listen for children removed from `parent`.
    fn on_child_removed(&self, parent: &I, listener: Listener<I>) -> Connection;
}

/// Tag registry enumerating and announcing tagged roots.
pub trait TagRegistry<I: Instance> {
    /// Snapshot of the instances currently carrying `tag`.
    fn tagged(&self, tag: &str) -> Vec<I>;

    /// Listen for instances gaining `tag`.
    fn on_tagged(&self, tag: &str, listener: Listener<I>) -> Connection;

    /// Listen for instances losing `tag`.
    fn on_untagged(&self, tag: &str, listener: Listener<I>) -> Connection;
}

/// Disconnect handle for a collaborator subscription.
///
/// Disconnects on [`Connection::disconnect`] or when dropped.
#[must_use = "dropping a Connection disconnects it"]
pub struct Connection {
    disconnect: Option<Box<dyn FnOnce()>>,
}

impl Connection {
    pub fn new(disconnect: impl FnOnce() + 'static) -> Self {
        Self {
            disconnect: Some(Box::new(disconnect)),
        }
    }

    /// A connection with nothing to disconnect.
    pub fn detached() -> Self {
        Self { disconnect: None }
    }

    pub fn is_connected(&self) -> bool {
        self.disconnect.is_some()
    }

    pub fn disconnect(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// A resource released when its binding stops being valid.
pub trait Disposable {
    fn dispose(self: Box<Self>);
}

impl<F: FnOnce()> Disposable for F {
    fn dispose(self: Box<Self>) {
        (*self)()
    }
}

/// Cleanup handle returned by a binding callback.
///
/// Owned by the binding from the moment the callback returns; released by the
/// engine, never by the caller.
pub struct Disposer {
    inner: Box<dyn Disposable>,
}

impl Disposer {
    pub fn new(disposable: impl Disposable + 'static) -> Self {
        Self {
            inner: Box::new(disposable),
        }
    }

    pub(crate) fn dispose(self) {
        self.inner.dispose();
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Disposer")
    }
}
