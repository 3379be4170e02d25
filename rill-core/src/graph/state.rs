//! State Cells
//!
//! A `StateRef` is a mutable, identity-bearing box holding a store node's
//! current value. Cells are created together with their owning store node
//! and are mutated only by `Update` commands executed by the kernel, never
//! directly by user code.
//!
//! # The uninitialized sentinel
//!
//! A cell's content is `Option<Value>`. `None` means the cell has never
//! received a value: a derived store whose eager seed was suppressed stays
//! in this state until a live activation establishes a real value. This is
//! distinct from `Value::Null`, which is an ordinary value a store can hold.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

/// Unique identifier for a state cell.
///
/// Stable for the cell's lifetime; used as part of diagnostic output and
/// as a deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(u64);

impl StateId {
    /// Generate a new unique state id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for StateId {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared, identity-bearing value cell.
///
/// Cloning a `StateRef` shares the underlying cell: all clones observe the
/// same current value.
#[derive(Clone)]
pub struct StateRef {
    id: StateId,
    current: Rc<RefCell<Option<Value>>>,
}

impl StateRef {
    /// Create a cell holding `value`.
    pub fn new(value: Value) -> Self {
        Self {
            id: StateId::new(),
            current: Rc::new(RefCell::new(Some(value))),
        }
    }

    /// Create an uninitialized cell.
    pub fn empty() -> Self {
        Self {
            id: StateId::new(),
            current: Rc::new(RefCell::new(None)),
        }
    }

    /// Get the cell's id.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Clone out the current value; `None` when uninitialized.
    pub fn get(&self) -> Option<Value> {
        self.current.borrow().clone()
    }

    /// Whether the cell has ever received a value.
    pub fn is_initialized(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Run `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(Option<&Value>) -> R) -> R {
        f(self.current.borrow().as_ref())
    }

    /// Replace the current value.
    pub fn set(&self, value: Value) {
        *self.current.borrow_mut() = Some(value);
    }
}

impl Debug for StateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRef")
            .field("id", &self.id)
            .field("current", &self.current.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_ids_are_unique() {
        let a = StateRef::new(json!(0));
        let b = StateRef::new(json!(0));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn cell_holds_and_replaces_value() {
        let cell = StateRef::new(json!("word"));
        assert_eq!(cell.get(), Some(json!("word")));

        cell.set(json!(42));
        assert_eq!(cell.get(), Some(json!(42)));
    }

    #[test]
    fn empty_cell_is_uninitialized() {
        let cell = StateRef::empty();
        assert!(!cell.is_initialized());
        assert_eq!(cell.get(), None);

        cell.set(json!(1));
        assert!(cell.is_initialized());
    }

    #[test]
    fn null_is_a_value_not_the_sentinel() {
        let cell = StateRef::new(Value::Null);
        assert!(cell.is_initialized());
        assert_eq!(cell.get(), Some(Value::Null));
    }

    #[test]
    fn clone_shares_the_cell() {
        let a = StateRef::new(json!(1));
        let b = a.clone();

        a.set(json!(2));
        assert_eq!(b.get(), Some(json!(2)));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn with_reads_without_cloning() {
        let cell = StateRef::new(json!([1, 2, 3]));
        let len = cell.with(|v| v.and_then(Value::as_array).map_or(0, Vec::len));
        assert_eq!(len, 3);
    }
}
