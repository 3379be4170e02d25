//! Dataflow Graph
//!
//! This module implements the static structure of the engine: nodes, the
//! command vocabulary their sequences are built from, and the state cells
//! that store nodes write into.
//!
//! # Overview
//!
//! The graph is a directed, acyclic-per-activation structure:
//!
//! - Nodes carry a fixed command sequence and ordered child edges.
//! - Values flow forward along `next` edges; `from` edges are informational.
//! - New nodes may be appended as children of a live node at any time
//!   (derived stores built after the engine has started).
//!
//! Execution lives in [`crate::kernel`]; the unit wrappers that assemble
//! conventional node shapes live in [`crate::unit`].

pub mod command;
pub mod node;
pub mod state;

pub use command::{BarrierId, Cmd, CmdId, Comparator, ComputeFn, FilterFn, RunFn};
pub use node::{Lane, Node, NodeId, Scope};
pub use state::{StateId, StateRef};
