//! Rill Core
//!
//! This crate provides the core of the Rill reactive dataflow engine:
//!
//! - The graph model: nodes with fixed command sequences, state cells, and
//!   append-only topology (`graph`)
//! - The execution kernel: single-threaded activations with priority
//!   lanes, per-activation deduplication, and FIFO re-entrancy (`kernel`)
//! - Unit wrappers: stores, events, and effects composed from the two
//!   layers above (`unit`)
//!
//! # How propagation works
//!
//! An external trigger (calling an event, or an effect handler settling)
//! injects a value at one node. The kernel walks outward along child
//! edges, running each visited node's command sequence against the value,
//! and forwards the result to children unless a command suppresses it:
//! a failed filter, an unchanged store update, or the compute "no value"
//! sentinel. Every reachable node runs at most once per activation.
//!
//! # Example
//!
//! ```
//! use rill_core::{create_event, create_store};
//! use serde_json::json;
//!
//! let clicked = create_event();
//! let count = create_store(json!(0)).on(&clicked, |n, _| {
//!     json!(n.and_then(|v| v.as_i64()).unwrap_or(0) + 1)
//! });
//! let label = count.map(|n, _| Some(json!(format!("clicks: {n}"))));
//!
//! clicked.call(json!(null)).unwrap();
//! assert_eq!(label.get(), Some(json!("clicks: 1")));
//! ```

pub mod error;
pub mod graph;
pub mod kernel;
pub mod unit;

pub use error::{BoxError, KernelError};
pub use graph::{BarrierId, Cmd, Lane, Node, NodeId, Scope, StateRef};
pub use unit::{
    combine, create_effect, create_event, create_store, Effect, Event, Store, Subscription, Unit,
};

/// Dynamically typed payload carried through the graph.
pub use serde_json::Value;
