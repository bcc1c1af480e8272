//! In-memory scene graph implementing both collaborators.
//!
//! `MemoryScene` is a single-threaded hierarchy of named nodes with string
//! tags. Mutations are applied first and announced afterwards, to a snapshot
//! of the listeners registered at that moment. A listener disconnected while
//! an announcement is in flight is skipped.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use tracing::{instrument, trace};

use crate::application::Binder;
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::{Connection, Hierarchy, Instance, Listener, TagRegistry};

/// Handle to a node of a [`MemoryScene`].
///
/// Identity is the node id; the name is carried along for matching.
#[derive(Clone)]
pub struct SceneNode {
    id: u64,
    name: Rc<str>,
}

impl SceneNode {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name_str(&self) -> &str {
        &self.name
    }
}

impl PartialEq for SceneNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SceneNode {}

impl Hash for SceneNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

impl fmt::Display for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Instance for SceneNode {
    fn name(&self) -> String {
        self.name.to_string()
    }
}

struct NodeRecord {
    node: SceneNode,
    parent: Option<u64>,
    children: Vec<u64>,
    tags: BTreeSet<String>,
}

struct ListenerSlot {
    id: u64,
    alive: Rc<Cell<bool>>,
    listener: Listener<SceneNode>,
}

/// Listener lists keyed by node id or tag name.
struct SignalTable<K> {
    slots: HashMap<K, Vec<ListenerSlot>>,
}

impl<K: Eq + Hash> Default for SignalTable<K> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> SignalTable<K> {
    fn snapshot(&self, key: &K) -> Vec<(Rc<Cell<bool>>, Listener<SceneNode>)> {
        self.slots
            .get(key)
            .map(|slots| {
                slots
                    .iter()
                    .map(|slot| (Rc::clone(&slot.alive), Rc::clone(&slot.listener)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remove(&mut self, key: &K, id: u64) {
        if let Some(slots) = self.slots.get_mut(key) {
            slots.retain(|slot| slot.id != id);
            if slots.is_empty() {
                self.slots.remove(key);
            }
        }
    }

    fn count(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }
}

#[derive(Default)]
struct SceneState {
    next_id: u64,
    next_listener: u64,
    nodes: HashMap<u64, NodeRecord>,
    tagged: HashMap<String, Vec<u64>>,
    child_added: SignalTable<u64>,
    child_removed: SignalTable<u64>,
    tag_added: SignalTable<String>,
    tag_removed: SignalTable<String>,
}

type TableSelector<K> = fn(&mut SceneState) -> &mut SignalTable<K>;

fn child_added_table(state: &mut SceneState) -> &mut SignalTable<u64> {
    &mut state.child_added
}

fn child_removed_table(state: &mut SceneState) -> &mut SignalTable<u64> {
    &mut state.child_removed
}

fn tag_added_table(state: &mut SceneState) -> &mut SignalTable<String> {
    &mut state.tag_added
}

fn tag_removed_table(state: &mut SceneState) -> &mut SignalTable<String> {
    &mut state.tag_removed
}

/// Shared, cheaply cloneable in-memory scene.
#[derive(Clone, Default)]
pub struct MemoryScene {
    state: Rc<RefCell<SceneState>>,
}

impl fmt::Debug for MemoryScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryScene")
            .field("nodes", &state.nodes.len())
            .field("tags", &state.tagged.len())
            .finish()
    }
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`Binder`] using this scene as both hierarchy and tag registry.
    pub fn binder(&self) -> Binder<SceneNode> {
        Binder::new(Rc::new(self.clone()), Rc::new(self.clone()))
    }

    /// Create a detached node.
    pub fn create(&self, name: &str) -> SceneNode {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let node = SceneNode {
            id: state.next_id,
            name: Rc::from(name),
        };
        state.nodes.insert(
            node.id,
            NodeRecord {
                node: node.clone(),
                parent: None,
                children: Vec::new(),
                tags: BTreeSet::new(),
            },
        );
        node
    }

    /// Create a node and parent it under `parent`.
    pub fn insert(&self, parent: &SceneNode, name: &str) -> InfraResult<SceneNode> {
        let node = self.create(name);
        self.set_parent(&node, Some(parent))?;
        Ok(node)
    }

    /// Move `node` under `parent` (or detach it with `None`).
    ///
    /// The old parent announces the removal before the new parent announces
    /// the addition.
    #[instrument(level = "trace", skip(self))]
    pub fn set_parent(&self, node: &SceneNode, parent: Option<&SceneNode>) -> InfraResult<()> {
        let old_parent = {
            let mut state = self.state.borrow_mut();
            let current = state
                .nodes
                .get(&node.id)
                .ok_or_else(|| InfraError::UnknownNode(format!("{:?}", node)))?
                .parent;
            if let Some(parent) = parent {
                if !state.nodes.contains_key(&parent.id) {
                    return Err(InfraError::UnknownNode(format!("{:?}", parent)));
                }
                if Self::is_ancestor_or_self(&state, node.id, parent.id) {
                    return Err(InfraError::CyclicParent {
                        node: format!("{:?}", node),
                        parent: format!("{:?}", parent),
                    });
                }
            }
            if current == parent.map(|p| p.id) {
                return Ok(());
            }
            if let Some(old) = current {
                if let Some(record) = state.nodes.get_mut(&old) {
                    record.children.retain(|&child| child != node.id);
                }
            }
            if let Some(parent) = parent {
                if let Some(record) = state.nodes.get_mut(&parent.id) {
                    record.children.push(node.id);
                }
            }
            if let Some(record) = state.nodes.get_mut(&node.id) {
                record.parent = parent.map(|p| p.id);
            }
            current
        };

        if let Some(old) = old_parent {
            self.emit(child_removed_table, &old, node);
        }
        if let Some(parent) = parent {
            self.emit(child_added_table, &parent.id, node);
        }
        Ok(())
    }

    /// Detach `node` from its parent.
    pub fn detach(&self, node: &SceneNode) -> InfraResult<()> {
        self.set_parent(node, None)
    }

    /// Detach `node`, strip every tag in its subtree and forget the subtree.
    #[instrument(level = "trace", skip(self))]
    pub fn destroy(&self, node: &SceneNode) -> InfraResult<()> {
        self.detach(node)?;
        for member in self.subtree(node) {
            let tags: Vec<String> = self
                .state
                .borrow()
                .nodes
                .get(&member.id)
                .map(|record| record.tags.iter().cloned().collect())
                .unwrap_or_default();
            for tag in tags {
                self.remove_tag(&member, &tag)?;
            }
        }
        let mut state = self.state.borrow_mut();
        for member in self.subtree_ids(&state, node.id) {
            state.nodes.remove(&member);
            state.child_added.slots.remove(&member);
            state.child_removed.slots.remove(&member);
        }
        Ok(())
    }

    /// Tag a node; announces only if the tag is new.
    #[instrument(level = "trace", skip(self))]
    pub fn add_tag(&self, node: &SceneNode, tag: &str) -> InfraResult<()> {
        let added = {
            let mut state = self.state.borrow_mut();
            let record = state
                .nodes
                .get_mut(&node.id)
                .ok_or_else(|| InfraError::UnknownNode(format!("{:?}", node)))?;
            let added = record.tags.insert(tag.to_owned());
            if added {
                state.tagged.entry(tag.to_owned()).or_default().push(node.id);
            }
            added
        };
        if added {
            self.emit(tag_added_table, &tag.to_owned(), node);
        }
        Ok(())
    }

    /// Untag a node; announces only if the tag was present.
    #[instrument(level = "trace", skip(self))]
    pub fn remove_tag(&self, node: &SceneNode, tag: &str) -> InfraResult<()> {
        let removed = {
            let mut state = self.state.borrow_mut();
            let record = state
                .nodes
                .get_mut(&node.id)
                .ok_or_else(|| InfraError::UnknownNode(format!("{:?}", node)))?;
            let removed = record.tags.remove(tag);
            if removed {
                if let Some(ids) = state.tagged.get_mut(tag) {
                    ids.retain(|&id| id != node.id);
                }
            }
            removed
        };
        if removed {
            self.emit(tag_removed_table, &tag.to_owned(), node);
        }
        Ok(())
    }

    pub fn has_tag(&self, node: &SceneNode, tag: &str) -> bool {
        self.state
            .borrow()
            .nodes
            .get(&node.id)
            .is_some_and(|record| record.tags.contains(tag))
    }

    pub fn parent(&self, node: &SceneNode) -> Option<SceneNode> {
        let state = self.state.borrow();
        let parent = state.nodes.get(&node.id)?.parent?;
        state.nodes.get(&parent).map(|record| record.node.clone())
    }

    /// Total live listeners across every signal.
    pub fn listener_count(&self) -> usize {
        let state = self.state.borrow();
        state.child_added.count()
            + state.child_removed.count()
            + state.tag_added.count()
            + state.tag_removed.count()
    }

    /// Live child listeners registered on `node`.
    pub fn child_listener_count(&self, node: &SceneNode) -> usize {
        let state = self.state.borrow();
        let added = state.child_added.slots.get(&node.id).map_or(0, Vec::len);
        let removed = state.child_removed.slots.get(&node.id).map_or(0, Vec::len);
        added + removed
    }

    fn subtree(&self, node: &SceneNode) -> Vec<SceneNode> {
        let state = self.state.borrow();
        self.subtree_ids(&state, node.id)
            .into_iter()
            .filter_map(|id| state.nodes.get(&id).map(|record| record.node.clone()))
            .collect()
    }

    fn subtree_ids(&self, state: &SceneState, root: u64) -> Vec<u64> {
        let mut ids = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if let Some(record) = state.nodes.get(&current) {
                ids.push(current);
                stack.extend(record.children.iter().rev().copied());
            }
        }
        ids
    }

    fn is_ancestor_or_self(state: &SceneState, ancestor: u64, mut node: u64) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match state.nodes.get(&node).and_then(|record| record.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn connect<K>(&self, select: TableSelector<K>, key: K, listener: Listener<SceneNode>) -> Connection
    where
        K: Eq + Hash + Clone + 'static,
    {
        let alive = Rc::new(Cell::new(true));
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_listener += 1;
            let id = state.next_listener;
            select(&mut state)
                .slots
                .entry(key.clone())
                .or_default()
                .push(ListenerSlot {
                    id,
                    alive: Rc::clone(&alive),
                    listener,
                });
            id
        };

        let weak: Weak<RefCell<SceneState>> = Rc::downgrade(&self.state);
        Connection::new(move || {
            alive.set(false);
            if let Some(state) = weak.upgrade() {
                if let Ok(mut state) = state.try_borrow_mut() {
                    select(&mut state).remove(&key, id);
                }
            }
        })
    }

    fn emit<K>(&self, select: TableSelector<K>, key: &K, subject: &SceneNode)
    where
        K: Eq + Hash,
    {
        let listeners = {
            let mut state = self.state.borrow_mut();
            select(&mut state).snapshot(key)
        };
        trace!(subject = ?subject, listeners = listeners.len(), "emit");
        for (alive, listener) in listeners {
            if alive.get() {
                listener(subject);
            }
        }
    }
}

impl Hierarchy<SceneNode> for MemoryScene {
    fn children(&self, parent: &SceneNode) -> Vec<SceneNode> {
        let state = self.state.borrow();
        state
            .nodes
            .get(&parent.id)
            .map(|record| {
                record
                    .children
                    .iter()
                    .filter_map(|id| state.nodes.get(id).map(|child| child.node.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn find_child(&self, parent: &SceneNode, name: &str) -> Option<SceneNode> {
        self.children(parent)
            .into_iter()
            .find(|child| child.name_str() == name)
    }

    fn on_child_added(&self, parent: &SceneNode, listener: Listener<SceneNode>) -> Connection {
        self.connect(child_added_table, parent.id, listener)
    }

    fn on_child_removed(&self, parent: &SceneNode, listener: Listener<SceneNode>) -> Connection {
        self.connect(child_removed_table, parent.id, listener)
    }
}

impl TagRegistry<SceneNode> for MemoryScene {
    fn tagged(&self, tag: &str) -> Vec<SceneNode> {
        let state = self.state.borrow();
        state
            .tagged
            .get(tag)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.nodes.get(id).map(|record| record.node.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn on_tagged(&self, tag: &str, listener: Listener<SceneNode>) -> Connection {
        self.connect(tag_added_table, tag.to_owned(), listener)
    }

    fn on_untagged(&self, tag: &str, listener: Listener<SceneNode>) -> Connection {
        self.connect(tag_removed_table, tag.to_owned(), listener)
    }
}
