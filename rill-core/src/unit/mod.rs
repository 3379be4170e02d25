//! Unit Wrappers
//!
//! Stores, events, and effects are thin composition layers over the graph
//! and kernel: each constructs nodes with a conventional command sequence
//! and exposes the public subscription API (`watch`, `on`, `off`, `map`).
//!
//! Anything implementing [`Unit`] resolves to a graph node, which is what
//! lets stores, events, and effects be used interchangeably as watch and
//! trigger targets.

mod effect;
mod event;
mod store;

pub use effect::{create_effect, Effect, Handler};
pub use event::{create_event, Event};
pub use store::{combine, create_store, Store};

use crate::graph::node::{self, NodeId};

/// A kernel-traversable entity: anything that resolves to a graph node.
pub trait Unit {
    /// The graph node this unit is backed by.
    fn node(&self) -> NodeId;
}

/// Handle to one attached watcher.
///
/// Dropping the handle does nothing: an ignored subscription keeps
/// watching. Only [`Subscription::unsubscribe`] detaches the watcher.
#[derive(Debug)]
pub struct Subscription {
    owner: NodeId,
    watcher: NodeId,
}

impl Subscription {
    pub(crate) fn new(owner: NodeId, watcher: NodeId) -> Self {
        Self { owner, watcher }
    }

    /// Remove exactly this watcher. Other watchers on the same node and
    /// the node's own graph edges are unaffected.
    pub fn unsubscribe(self) {
        node::disconnect(self.owner, self.watcher);
    }
}
