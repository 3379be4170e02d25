//! Graph Nodes
//!
//! This module defines the node type that lives in the dataflow graph and
//! the arena that owns every node.
//!
//! # Design Decisions
//!
//! 1. Nodes are owned by a centralized, thread-local arena and addressed by
//!    stable `NodeId`s rather than by reference. User callbacks are allowed
//!    to grow the graph mid-activation (a watcher may build a derived store),
//!    so the kernel never holds a borrow of the arena while running them.
//!
//! 2. Topology is append-only: new child edges may be attached to a live
//!    node at any time, and unsubscription removes a single edge. Nodes are
//!    never deleted; the graph lives for the lifetime of the thread.
//!
//! 3. A node's command sequence is fixed at construction.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::command::Cmd;
use super::state::StateRef;

/// Unique identifier for a node in the dataflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Scheduling lane for a node's visits.
///
/// Within one activation the kernel drains every pure-lane entry before the
/// first effect-lane entry runs, so observers see a fully settled graph
/// before any external effect handler is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lane {
    /// Synchronous derived computation and watchers.
    #[default]
    Pure,
    /// Scheduled external callback invocations (effect runners).
    Effect,
}

/// Data closed over by a node's commands.
///
/// Rust closures capture their own environment, so the only slot that must
/// be shared through the node itself is the state cell a watcher reads at
/// fire time.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// The state cell of the store this node belongs to or observes.
    pub state: Option<StateRef>,
}

impl Scope {
    /// Scope carrying a state cell.
    pub fn with_state(state: StateRef) -> Self {
        Self { state: Some(state) }
    }
}

/// One addressable point in the dataflow graph.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    /// Parent edges. Informational only; traversal never walks backwards.
    from: SmallVec<[NodeId; 4]>,
    /// Ordered child edges, the traversal targets when this node emits.
    next: SmallVec<[NodeId; 4]>,
    /// Fixed command sequence executed on each visit.
    seq: SmallVec<[Cmd; 4]>,
    scope: Scope,
    lane: Lane,
    /// Diagnostic tags; not load-bearing for execution.
    meta: IndexMap<String, String>,
}

impl Node {
    /// Create a node with the given command sequence.
    pub fn new(seq: impl IntoIterator<Item = Cmd>) -> Self {
        Self {
            id: NodeId::new(),
            from: SmallVec::new(),
            next: SmallVec::new(),
            seq: seq.into_iter().collect(),
            scope: Scope::default(),
            lane: Lane::Pure,
            meta: IndexMap::new(),
        }
    }

    /// Attach a scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Place the node's visits in `lane`.
    pub fn with_lane(mut self, lane: Lane) -> Self {
        self.lane = lane;
        self
    }

    /// Add a diagnostic tag.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Get the node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's scheduling lane.
    pub fn lane(&self) -> Lane {
        self.lane
    }
}

thread_local! {
    /// All nodes created on this thread, indexed by id.
    static ARENA: RefCell<HashMap<NodeId, Node>> = RefCell::new(HashMap::new());
}

/// Insert a node into the arena, returning its id.
pub fn insert(node: Node) -> NodeId {
    let id = node.id();
    ARENA.with(|arena| arena.borrow_mut().insert(id, node));
    id
}

/// Append a child edge `parent -> child`.
pub fn connect(parent: NodeId, child: NodeId) {
    ARENA.with(|arena| {
        let mut arena = arena.borrow_mut();
        if let Some(node) = arena.get_mut(&parent) {
            node.next.push(child);
        }
        if let Some(node) = arena.get_mut(&child) {
            node.from.push(parent);
        }
    });
}

/// Remove one occurrence of the child edge `parent -> child`.
///
/// No-op when the edge is absent.
pub fn disconnect(parent: NodeId, child: NodeId) {
    ARENA.with(|arena| {
        let mut arena = arena.borrow_mut();
        if let Some(node) = arena.get_mut(&parent) {
            if let Some(pos) = node.next.iter().position(|&n| n == child) {
                node.next.remove(pos);
            }
        }
        if let Some(node) = arena.get_mut(&child) {
            if let Some(pos) = node.from.iter().position(|&n| n == parent) {
                node.from.remove(pos);
            }
        }
    });
}

/// Whether `id` names a node in the arena.
pub fn contains(id: NodeId) -> bool {
    ARENA.with(|arena| arena.borrow().contains_key(&id))
}

/// Number of nodes in the arena.
pub fn count() -> usize {
    ARENA.with(|arena| arena.borrow().len())
}

/// Cloned snapshot of a node's command sequence.
///
/// The kernel works on snapshots so user callbacks may mutate the arena
/// while a visit is in flight. Commands are `Rc`-backed, so this is cheap.
pub fn seq_of(id: NodeId) -> Option<SmallVec<[Cmd; 4]>> {
    ARENA.with(|arena| arena.borrow().get(&id).map(|node| node.seq.clone()))
}

/// Cloned snapshot of a node's child edges.
pub fn next_of(id: NodeId) -> Option<SmallVec<[NodeId; 4]>> {
    ARENA.with(|arena| arena.borrow().get(&id).map(|node| node.next.clone()))
}

/// Cloned snapshot of a node's parent edges.
pub fn parents_of(id: NodeId) -> Option<SmallVec<[NodeId; 4]>> {
    ARENA.with(|arena| arena.borrow().get(&id).map(|node| node.from.clone()))
}

/// The node's scope.
pub fn scope_of(id: NodeId) -> Option<Scope> {
    ARENA.with(|arena| arena.borrow().get(&id).map(|node| node.scope.clone()))
}

/// The node's scheduling lane.
pub fn lane_of(id: NodeId) -> Option<Lane> {
    ARENA.with(|arena| arena.borrow().get(&id).map(|node| node.lane))
}

/// Look up a diagnostic tag.
pub fn meta_of(id: NodeId, key: &str) -> Option<String> {
    ARENA.with(|arena| arena.borrow().get(&id).and_then(|node| node.meta.get(key).cloned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let a = NodeId::new();
        let b = NodeId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn insert_and_lookup() {
        let id = insert(Node::new([]).with_meta("kind", "test"));
        assert!(contains(id));
        assert_eq!(meta_of(id, "kind").as_deref(), Some("test"));
        assert_eq!(meta_of(id, "missing"), None);
    }

    #[test]
    fn connect_maintains_both_edge_lists() {
        let parent = insert(Node::new([]));
        let child = insert(Node::new([]));

        connect(parent, child);

        assert_eq!(next_of(parent).unwrap().as_slice(), &[child]);
        assert_eq!(parents_of(child).unwrap().as_slice(), &[parent]);
    }

    #[test]
    fn disconnect_removes_one_edge() {
        let parent = insert(Node::new([]));
        let a = insert(Node::new([]));
        let b = insert(Node::new([]));

        connect(parent, a);
        connect(parent, b);
        disconnect(parent, a);

        assert_eq!(next_of(parent).unwrap().as_slice(), &[b]);
        assert!(parents_of(a).unwrap().is_empty());
    }

    #[test]
    fn disconnect_absent_edge_is_noop() {
        let parent = insert(Node::new([]));
        let stranger = insert(Node::new([]));

        disconnect(parent, stranger);

        assert!(next_of(parent).unwrap().is_empty());
    }

    #[test]
    fn children_keep_attachment_order() {
        let parent = insert(Node::new([]));
        let first = insert(Node::new([]));
        let second = insert(Node::new([]));
        let third = insert(Node::new([]));

        connect(parent, first);
        connect(parent, second);
        connect(parent, third);

        assert_eq!(next_of(parent).unwrap().as_slice(), &[first, second, third]);
    }

    #[test]
    fn lane_defaults_to_pure() {
        let pure = insert(Node::new([]));
        let effect = insert(Node::new([]).with_lane(Lane::Effect));

        assert_eq!(lane_of(pure), Some(Lane::Pure));
        assert_eq!(lane_of(effect), Some(Lane::Effect));
    }
}
