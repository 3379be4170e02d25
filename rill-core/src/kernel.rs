//! Execution Kernel
//!
//! The kernel is the single execution engine: given a start node and an
//! incoming value, it performs one **activation**: a synchronous traversal
//! that visits every node transitively reachable via successful
//! propagation, exactly once each, in an order consistent with topological
//! dependency.
//!
//! # Algorithm
//!
//! 1. Seed a work queue with the start node and its input value.
//! 2. Dequeue `(node, value)` entries and execute the node's command
//!    sequence as a straight-line pipeline with early exit: a failed
//!    filter, an unchanged update, or the compute no-value sentinel stops
//!    the visit and nothing is forwarded.
//! 3. On full success, enqueue every child with the final value.
//!
//! Two refinements give the engine its ordering guarantees:
//!
//! - **Priority lanes.** Entries for pure-lane nodes (derived computation,
//!   watchers) drain completely before any effect-lane entry (a scheduled
//!   effect-handler invocation) runs, so observers see a fully settled
//!   graph before external effects fire.
//!
//! - **Whole-activation FIFO.** An `activate` call made from inside a
//!   running activation (a watcher firing an event) is queued and run to
//!   completion after the current activation's queues are empty, never
//!   interleaved. This keeps the stack flat and prevents a watcher from
//!   observing a half-updated graph.
//!
//! Diamond-shaped fan-in is handled by `Barrier` commands: the first
//! arrival at a barrier-guarded node is deferred into a queue that drains
//! after the pure lane is empty (but before effects), and every later
//! arrival within the activation is dropped. The guarded node therefore
//! runs exactly once, after all pure fan-in has settled, regardless of
//! how deep its individual source branches are.
//!
//! # Errors
//!
//! A command callback returning `Err` aborts that node's remaining
//! sequence; its children are not enqueued, but sibling entries already in
//! the queue still run. The first error is returned from the outermost
//! `activate` call. No cycle detection is performed: the barrier set only
//! bounds re-visits of a single barrier-guarded node, and true cross-node
//! cycles are unsupported.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};

use serde_json::Value;
use tracing::{trace, trace_span};

use crate::error::KernelError;
use crate::graph::command::{BarrierId, Cmd};
use crate::graph::node::{self, Lane, NodeId};

thread_local! {
    static KERNEL: RefCell<Kernel> = RefCell::new(Kernel::default());
}

#[derive(Default)]
struct Kernel {
    /// Whether an activation is currently draining on this thread.
    running: bool,
    /// Whole activations waiting to run, in FIFO order.
    pending: VecDeque<(NodeId, Value)>,
}

/// Clears the running flag when the outermost `activate` call unwinds.
struct RunningGuard;

impl Drop for RunningGuard {
    fn drop(&mut self) {
        KERNEL.with(|kernel| {
            let mut kernel = kernel.borrow_mut();
            kernel.running = false;
            kernel.pending.clear();
        });
    }
}

/// Inject `value` at `node` and run the resulting activation to completion.
///
/// When called from inside a running activation (e.g. a watcher firing an
/// event), the new activation is queued and runs after the current one
/// drains; the call itself returns immediately. Errors from queued
/// activations surface from the outermost call.
pub fn activate(node: NodeId, value: Value) -> Result<(), KernelError> {
    let already_running = KERNEL.with(|kernel| {
        let mut kernel = kernel.borrow_mut();
        kernel.pending.push_back((node, value));
        std::mem::replace(&mut kernel.running, true)
    });
    if already_running {
        return Ok(());
    }

    let _guard = RunningGuard;
    let mut first_err = None;
    while let Some((start, value)) = KERNEL.with(|kernel| kernel.borrow_mut().pending.pop_front())
    {
        if let Err(err) = run_activation(start, value) {
            first_err.get_or_insert(err);
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Per-activation scheduling state.
struct Activation {
    pure: VecDeque<(NodeId, Value)>,
    /// Deferred barrier entries, drained only once the pure lane is empty.
    deferred: VecDeque<(NodeId, Value)>,
    effects: VecDeque<(NodeId, Value)>,
    /// Barrier keys already encountered within this activation.
    seen: HashSet<(BarrierId, NodeId)>,
    /// Nodes whose deferred entry is now draining: their barrier passes.
    released: HashSet<NodeId>,
}

impl Activation {
    fn new() -> Self {
        Self {
            pure: VecDeque::new(),
            deferred: VecDeque::new(),
            effects: VecDeque::new(),
            seen: HashSet::new(),
            released: HashSet::new(),
        }
    }

    fn enqueue(&mut self, id: NodeId, value: Value) {
        match node::lane_of(id) {
            Some(Lane::Pure) => self.pure.push_back((id, value)),
            Some(Lane::Effect) => self.effects.push_back((id, value)),
            None => {}
        }
    }

    /// Next entry: pure lane, then deferred barriers, then effects.
    ///
    /// A draining barrier entry may enqueue fresh pure work (the guarded
    /// node's children), which again drains before the next deferred
    /// entry, so cascaded barrier nodes settle in dependency order.
    fn dequeue(&mut self) -> Option<(NodeId, Value)> {
        if let Some(entry) = self.pure.pop_front() {
            return Some(entry);
        }
        if let Some(entry) = self.deferred.pop_front() {
            self.released.insert(entry.0);
            return Some(entry);
        }
        self.effects.pop_front()
    }
}

fn run_activation(start: NodeId, value: Value) -> Result<(), KernelError> {
    let span = trace_span!("activation", start = %start);
    let _enter = span.enter();

    let mut activation = Activation::new();
    activation.enqueue(start, value);

    let mut first_err = None;
    while let Some((id, value)) = activation.dequeue() {
        match visit(&mut activation, id, value) {
            Ok(Some(forwarded)) => {
                if let Some(children) = node::next_of(id) {
                    for child in children {
                        activation.enqueue(child, forwarded.clone());
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                // The failing branch is abandoned; entries already queued
                // for sibling branches still run.
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Execute one node's command sequence against `value`.
///
/// `Ok(Some(v))` means the sequence ran to completion and `v` should be
/// forwarded to every child; `Ok(None)` means a command suppressed the
/// rest of the visit.
fn visit(activation: &mut Activation, id: NodeId, mut value: Value) -> Result<Option<Value>, KernelError> {
    let Some(seq) = node::seq_of(id) else {
        return Ok(None);
    };
    let scope = node::scope_of(id).unwrap_or_default();

    for cmd in seq {
        match cmd {
            Cmd::Update { store, compare, .. } => {
                let unchanged = store.with(|current| match current {
                    Some(current) => match &compare {
                        Some(compare) => compare(current, &value),
                        None => current == &value,
                    },
                    None => false,
                });
                if unchanged {
                    trace!(node = %id, "update unchanged, propagation suppressed");
                    return Ok(None);
                }
                store.set(value.clone());
            }
            Cmd::Run { f, .. } => {
                f(&value, &scope).map_err(|source| KernelError::Command { node: id, source })?;
            }
            Cmd::Filter { f, .. } => {
                let keep =
                    f(&value, &scope).map_err(|source| KernelError::Command { node: id, source })?;
                if !keep {
                    return Ok(None);
                }
            }
            Cmd::Compute { f, .. } => {
                let next =
                    f(&value, &scope).map_err(|source| KernelError::Command { node: id, source })?;
                match next {
                    Some(next) => value = next,
                    // The no-value sentinel: skip this update.
                    None => return Ok(None),
                }
            }
            Cmd::Emit { full_name, .. } => {
                trace!(node = %id, name = %full_name, "emit");
            }
            Cmd::Barrier { barrier, .. } => {
                if activation.released.contains(&id) {
                    // The deferred entry is draining now; fall through to
                    // the rest of the sequence.
                } else if activation.seen.insert((barrier, id)) {
                    trace!(node = %id, "barrier deferred until pure fan-in settles");
                    activation.deferred.push_back((id, value));
                    return Ok(None);
                } else {
                    trace!(node = %id, "barrier already passed this activation");
                    return Ok(None);
                }
            }
        }
    }
    Ok(Some(value))
}
