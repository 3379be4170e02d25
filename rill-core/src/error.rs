//! Error taxonomy for the kernel.
//!
//! User callbacks inside `Run`/`Filter`/`Compute` commands are fallible;
//! their opaque errors are wrapped with the failing node's identity and
//! surface from the outermost [`crate::kernel::activate`] call. A failing
//! command aborts only its own node's remaining sequence and that branch's
//! descendants; sibling work already enqueued for the activation still
//! runs.
//!
//! The `Compute` no-value sentinel is a control path, never an error.

use thiserror::Error;

use crate::graph::node::NodeId;

/// Opaque error produced by a user callback.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Errors surfaced by the kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    /// An effect was called with no handler installed.
    #[error("no handler attached to effect `{0}`")]
    NoHandler(String),

    /// A command callback failed while visiting `node`.
    #[error("command failed at {node}: {source}")]
    Command {
        node: NodeId,
        #[source]
        source: BoxError,
    },
}
