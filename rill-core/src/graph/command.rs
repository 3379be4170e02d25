//! Command Set
//!
//! Each graph node carries a fixed, ordered sequence of commands that the
//! kernel executes when the node is activated. The vocabulary is small:
//!
//! - `Update` writes the traversal value into a state cell, suppressing
//!   propagation when the value is unchanged under the active comparator.
//! - `Run` invokes a side-effecting callback; it never alters the value.
//! - `Filter` keeps or drops the traversal based on a predicate.
//! - `Compute` replaces the traversal value, or returns `None` to signal
//!   "skip this update" (the no-value sentinel, not an error).
//! - `Emit` is a diagnostic marker consumed by tracing only.
//! - `Barrier` marks a per-activation deduplication boundary.
//!
//! Commands are pure data: the only coupling to the kernel is the closure
//! or cell reference they carry. Callbacks are fallible; an `Err` aborts
//! the node's remaining sequence and surfaces from the activation.

use std::fmt::Debug;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use super::node::Scope;
use super::state::StateRef;
use crate::error::BoxError;

/// Unique identifier for a command instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CmdId(u64);

impl CmdId {
    /// Generate a new unique command id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CmdId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier for a deduplication barrier.
///
/// Each barrier-guarded node owns one id; the kernel tracks which barriers
/// have already been passed within the current activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BarrierId(u64);

impl BarrierId {
    /// Generate a new unique barrier id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for BarrierId {
    fn default() -> Self {
        Self::new()
    }
}

/// Side-effecting callback: `(value, scope)`, no result value.
pub type RunFn = Rc<dyn Fn(&Value, &Scope) -> Result<(), BoxError>>;

/// Predicate callback: `false` suppresses the rest of the sequence.
pub type FilterFn = Rc<dyn Fn(&Value, &Scope) -> Result<bool, BoxError>>;

/// Transforming callback: `None` is the skip sentinel.
pub type ComputeFn = Rc<dyn Fn(&Value, &Scope) -> Result<Option<Value>, BoxError>>;

/// Equality comparator used by `Update` deduplication.
pub type Comparator = Rc<dyn Fn(&Value, &Value) -> bool>;

/// One instruction in a node's command sequence.
#[derive(Clone)]
pub enum Cmd {
    /// Write the traversal value into `store`; unchanged values (under
    /// `compare`, defaulting to value equality) suppress propagation.
    Update {
        id: CmdId,
        store: StateRef,
        compare: Option<Comparator>,
    },
    /// Invoke a side-effecting callback.
    Run { id: CmdId, f: RunFn },
    /// Keep the traversal only when the predicate holds.
    Filter { id: CmdId, f: FilterFn },
    /// Replace the traversal value; `None` stops propagation here.
    Compute { id: CmdId, f: ComputeFn },
    /// Diagnostic marker; no control effect.
    Emit { id: CmdId, full_name: String },
    /// Per-activation deduplication boundary.
    Barrier { id: CmdId, barrier: BarrierId },
}

impl Cmd {
    /// `Update` with the default comparator (value equality).
    pub fn update(store: StateRef) -> Self {
        Cmd::Update {
            id: CmdId::new(),
            store,
            compare: None,
        }
    }

    /// `Update` with a user-supplied comparator.
    pub fn update_with(store: StateRef, compare: Comparator) -> Self {
        Cmd::Update {
            id: CmdId::new(),
            store,
            compare: Some(compare),
        }
    }

    /// Side-effecting `Run` command.
    pub fn run<F>(f: F) -> Self
    where
        F: Fn(&Value, &Scope) -> Result<(), BoxError> + 'static,
    {
        Cmd::Run {
            id: CmdId::new(),
            f: Rc::new(f),
        }
    }

    /// Predicate `Filter` command.
    pub fn filter<F>(f: F) -> Self
    where
        F: Fn(&Value, &Scope) -> Result<bool, BoxError> + 'static,
    {
        Cmd::Filter {
            id: CmdId::new(),
            f: Rc::new(f),
        }
    }

    /// Transforming `Compute` command.
    pub fn compute<F>(f: F) -> Self
    where
        F: Fn(&Value, &Scope) -> Result<Option<Value>, BoxError> + 'static,
    {
        Cmd::Compute {
            id: CmdId::new(),
            f: Rc::new(f),
        }
    }

    /// Diagnostic `Emit` marker.
    pub fn emit(full_name: impl Into<String>) -> Self {
        Cmd::Emit {
            id: CmdId::new(),
            full_name: full_name.into(),
        }
    }

    /// Deduplication `Barrier` boundary.
    pub fn barrier(barrier: BarrierId) -> Self {
        Cmd::Barrier {
            id: CmdId::new(),
            barrier,
        }
    }

    /// Get the command's id.
    pub fn id(&self) -> CmdId {
        match self {
            Cmd::Update { id, .. }
            | Cmd::Run { id, .. }
            | Cmd::Filter { id, .. }
            | Cmd::Compute { id, .. }
            | Cmd::Emit { id, .. }
            | Cmd::Barrier { id, .. } => *id,
        }
    }
}

impl Debug for Cmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cmd::Update { id, store, .. } => f
                .debug_struct("Update")
                .field("id", id)
                .field("store", &store.id())
                .finish(),
            Cmd::Run { id, .. } => f.debug_struct("Run").field("id", id).finish(),
            Cmd::Filter { id, .. } => f.debug_struct("Filter").field("id", id).finish(),
            Cmd::Compute { id, .. } => f.debug_struct("Compute").field("id", id).finish(),
            Cmd::Emit { id, full_name } => f
                .debug_struct("Emit")
                .field("id", id)
                .field("full_name", full_name)
                .finish(),
            Cmd::Barrier { id, barrier } => f
                .debug_struct("Barrier")
                .field("id", id)
                .field("barrier", barrier)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_ids_are_unique() {
        let a = Cmd::emit("a");
        let b = Cmd::emit("b");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn constructors_produce_expected_variants() {
        let cell = StateRef::new(json!(0));

        assert!(matches!(Cmd::update(cell.clone()), Cmd::Update { compare: None, .. }));
        assert!(matches!(
            Cmd::update_with(cell, Rc::new(|a, b| a == b)),
            Cmd::Update { compare: Some(_), .. }
        ));
        assert!(matches!(Cmd::run(|_, _| Ok(())), Cmd::Run { .. }));
        assert!(matches!(Cmd::filter(|_, _| Ok(true)), Cmd::Filter { .. }));
        assert!(matches!(Cmd::compute(|_, _| Ok(None)), Cmd::Compute { .. }));
        assert!(matches!(Cmd::barrier(BarrierId::new()), Cmd::Barrier { .. }));
    }

    #[test]
    fn commands_are_cheaply_cloneable() {
        let cmd = Cmd::compute(|value, _| Ok(Some(value.clone())));
        let copy = cmd.clone();
        assert_eq!(cmd.id(), copy.id());
    }
}
