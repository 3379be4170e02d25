//! Stores
//!
//! A store wraps a state cell behind an `Update` command: its value changes
//! only through graph activations, never by direct external mutation.
//! Reducers are attached with [`Store::on`], derived stores are built with
//! [`Store::map`] / [`Store::map_with`] and [`combine`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use super::{Subscription, Unit};
use crate::graph::command::{BarrierId, Cmd};
use crate::graph::node::{self, Node, NodeId, Scope};
use crate::graph::state::StateRef;

/// A unit holding a current value, updated only by the kernel.
///
/// Cloning a `Store` yields another handle to the same node and cell.
#[derive(Debug, Clone)]
pub struct Store {
    node: NodeId,
    state: StateRef,
    /// Reducer link node per trigger, for `off`.
    links: Rc<RefCell<HashMap<NodeId, NodeId>>>,
}

/// Create a store holding `value`.
pub fn create_store(value: Value) -> Store {
    Store::new(value)
}

impl Store {
    /// Create a store holding `value`.
    pub fn new(value: Value) -> Self {
        Self::from_cell(StateRef::new(value), "store")
    }

    fn from_cell(state: StateRef, kind: &str) -> Self {
        let id = node::insert(
            Node::new([Cmd::update(state.clone())])
                .with_scope(Scope::with_state(state.clone()))
                .with_meta("kind", kind),
        );
        Self {
            node: id,
            state,
            links: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Current value; `None` while the store is uninitialized (a derived
    /// store whose eager seed was suppressed).
    pub fn get(&self) -> Option<Value> {
        self.state.get()
    }

    /// Attach a reducer: on every activation of `trigger`, fold the
    /// trigger payload into the store with `reducer(current, payload)`.
    ///
    /// Attaching a second reducer for the same trigger replaces the first.
    /// Returns a handle to the same store for chaining.
    pub fn on<F>(&self, trigger: &impl Unit, reducer: F) -> Store
    where
        F: Fn(Option<&Value>, &Value) -> Value + 'static,
    {
        let cell = self.state.clone();
        let link = node::insert(
            Node::new([Cmd::compute(move |payload, _| {
                Ok(Some(cell.with(|current| reducer(current, payload))))
            })])
            .with_meta("kind", "on"),
        );
        node::connect(trigger.node(), link);
        node::connect(link, self.node);

        if let Some(previous) = self.links.borrow_mut().insert(trigger.node(), link) {
            node::disconnect(trigger.node(), previous);
        }
        self.clone()
    }

    /// Detach the reducer attached for `trigger`.
    ///
    /// No-op when nothing is attached; returns the store itself.
    pub fn off(&self, trigger: &impl Unit) -> &Store {
        if let Some(link) = self.links.borrow_mut().remove(&trigger.node()) {
            node::disconnect(trigger.node(), link);
        }
        self
    }

    /// Derived store computed from this store's updates.
    ///
    /// `f` receives the new source value and the derived store's own
    /// current value, and returns `None` to skip an update. The transformer
    /// is also invoked once eagerly at construction, but only when the
    /// source is initialized; a suppressed seed leaves the derived store
    /// uninitialized and nothing propagates to its own children until a
    /// live activation establishes a value.
    pub fn map<F>(&self, f: F) -> Store
    where
        F: Fn(&Value, Option<&Value>) -> Option<Value> + 'static,
    {
        self.map_impl(None, f)
    }

    /// Like [`Store::map`], with `initial` passed as the previous value to
    /// the eager seed call. Live updates always see the derived store's
    /// current value instead.
    pub fn map_with<F>(&self, initial: Value, f: F) -> Store
    where
        F: Fn(&Value, Option<&Value>) -> Option<Value> + 'static,
    {
        self.map_impl(Some(initial), f)
    }

    fn map_impl<F>(&self, initial: Option<Value>, f: F) -> Store
    where
        F: Fn(&Value, Option<&Value>) -> Option<Value> + 'static,
    {
        let state = StateRef::empty();

        // Eager seed, outside the kernel. The outer `None` means the
        // source itself is uninitialized and `f` must not run at all.
        let seed = self
            .state
            .with(|current| current.map(|current| f(current, initial.as_ref())));
        if let Some(Some(seed)) = seed {
            state.set(seed);
        }

        let prev = state.clone();
        let id = node::insert(
            Node::new([
                Cmd::compute(move |value, _| Ok(prev.with(|prev| f(value, prev)))),
                Cmd::update(state.clone()),
            ])
            .with_scope(Scope::with_state(state.clone()))
            .with_meta("kind", "map"),
        );
        node::connect(self.node, id);

        Store {
            node: id,
            state,
            links: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Invoke `f` with the current value immediately (when initialized)
    /// and again on every future successful activation reaching the store.
    pub fn watch<F>(&self, f: F) -> Subscription
    where
        F: Fn(&Value) + 'static,
    {
        if let Some(current) = self.state.get() {
            f(&current);
        }
        let watcher = node::insert(
            Node::new([Cmd::run(move |value, _| {
                f(value);
                Ok(())
            })])
            .with_meta("kind", "watch"),
        );
        node::connect(self.node, watcher);
        Subscription::new(self.node, watcher)
    }

    /// Invoke `f` with `(this store's current value, trigger payload)` on
    /// every activation of `trigger`.
    ///
    /// The callback does not fire on this store's own value changes; it
    /// reads whatever the store's value happens to be when the trigger
    /// fires.
    pub fn watch_on<F>(&self, trigger: &impl Unit, f: F) -> Subscription
    where
        F: Fn(Option<&Value>, &Value) + 'static,
    {
        let watcher = node::insert(
            Node::new([Cmd::run(move |payload, scope| {
                match &scope.state {
                    Some(cell) => cell.with(|current| f(current, payload)),
                    None => f(None, payload),
                }
                Ok(())
            })])
            .with_scope(Scope::with_state(self.state.clone()))
            .with_meta("kind", "watch"),
        );
        node::connect(trigger.node(), watcher);
        Subscription::new(trigger.node(), watcher)
    }
}

impl Unit for Store {
    fn node(&self) -> NodeId {
        self.node
    }
}

/// Derived store recomputed from the current values of all `sources`
/// whenever any of them updates.
///
/// The joiner node is guarded by a barrier, so diamond fan-in (several
/// sources updated within one activation) recomputes exactly once per
/// activation, and only after every source branch has settled, however
/// deep. The derived store stays uninitialized until every source has a
/// value.
pub fn combine<F>(sources: &[Store], f: F) -> Store
where
    F: Fn(&[Value]) -> Value + 'static,
{
    let state = StateRef::empty();
    let cells: Vec<StateRef> = sources.iter().map(|s| s.state.clone()).collect();

    // Eager seed when every source is initialized.
    let snapshot: Option<Vec<Value>> = cells.iter().map(StateRef::get).collect();
    if let Some(values) = snapshot {
        state.set(f(&values));
    }

    let joiner = node::insert(
        Node::new([
            Cmd::barrier(BarrierId::new()),
            Cmd::compute(move |_, _| {
                let values: Option<Vec<Value>> = cells.iter().map(StateRef::get).collect();
                Ok(values.map(|values| f(&values)))
            }),
            Cmd::update(state.clone()),
        ])
        .with_scope(Scope::with_state(state.clone()))
        .with_meta("kind", "combine"),
    );
    for source in sources {
        node::connect(source.node, joiner);
    }

    Store {
        node: joiner,
        state,
        links: Rc::new(RefCell::new(HashMap::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::create_event;
    use serde_json::json;
    use std::cell::Cell;

    fn int(value: Option<&Value>) -> i64 {
        value.and_then(Value::as_i64).unwrap_or(0)
    }

    #[test]
    fn reducers_fold_in_attachment_then_trigger_order() {
        let add = create_event();
        let reset = create_event();
        let counter = create_store(json!(0))
            .on(&add, |n, amount| json!(int(n) + amount.as_i64().unwrap()))
            .on(&reset, |_, _| json!(0));

        add.call(json!(2)).unwrap();
        add.call(json!(3)).unwrap();
        assert_eq!(counter.get(), Some(json!(5)));

        reset.call(json!(null)).unwrap();
        assert_eq!(counter.get(), Some(json!(0)));
    }

    #[test]
    fn off_detaches_and_is_idempotent() {
        let bump = create_event();
        let counter = create_store(json!(0)).on(&bump, |n, _| json!(int(n) + 1));

        bump.call(json!(null)).unwrap();
        assert_eq!(counter.get(), Some(json!(1)));

        counter.off(&bump);
        bump.call(json!(null)).unwrap();
        assert_eq!(counter.get(), Some(json!(1)));

        // Detaching again is a no-op and still hands the store back.
        let same = counter.off(&bump);
        assert_eq!(same.node(), counter.node());
    }

    #[test]
    fn reattaching_same_trigger_replaces_reducer() {
        let bump = create_event();
        let counter = create_store(json!(0)).on(&bump, |n, _| json!(int(n) + 1));
        counter.on(&bump, |n, _| json!(int(n) + 10));

        bump.call(json!(null)).unwrap();
        assert_eq!(counter.get(), Some(json!(10)));
    }

    #[test]
    fn map_seeds_eagerly_and_tracks_updates() {
        let set = create_event();
        let word = create_store(json!("word")).on(&set, |_, w| w.clone());
        let length = word.map(|w, _| Some(json!(w.as_str().unwrap().len())));

        assert_eq!(length.get(), Some(json!(4)));

        set.call(json!("lol")).unwrap();
        assert_eq!(length.get(), Some(json!(3)));
    }

    #[test]
    fn suppressed_seed_leaves_grandchild_untouched() {
        let a = create_store(Value::Null);

        let b = a.map(|x, _| {
            if x.is_null() {
                None
            } else {
                Some(x["id"].clone())
            }
        });

        let g_calls = Rc::new(Cell::new(0));
        let counted = g_calls.clone();
        let c = b.map(move |y, _| {
            counted.set(counted.get() + 1);
            Some(y["nice"].clone())
        });

        assert_eq!(c.get(), None);
        assert_eq!(g_calls.get(), 0);
    }

    #[test]
    fn watch_fires_immediately_and_per_change() {
        let set = create_event();
        let store = create_store(json!(1)).on(&set, |_, v| v.clone());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        store.watch(move |v| sink.borrow_mut().push(v.clone()));

        set.call(json!(2)).unwrap();
        set.call(json!(2)).unwrap(); // unchanged, suppressed
        set.call(json!(3)).unwrap();

        assert_eq!(*seen.borrow(), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn watch_on_reads_current_value_at_trigger_time() {
        let set = create_event();
        let probe = create_event();
        let store = create_store(json!(10)).on(&set, |_, v| v.clone());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        store.watch_on(&probe, move |current, payload| {
            sink.borrow_mut()
                .push((current.cloned(), payload.clone()));
        });

        // Own value changes do not fire the watcher.
        set.call(json!(11)).unwrap();
        assert!(seen.borrow().is_empty());

        probe.call(json!("a")).unwrap();
        set.call(json!(12)).unwrap();
        probe.call(json!("b")).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (Some(json!(11)), json!("a")),
                (Some(json!(12)), json!("b")),
            ]
        );
    }

    #[test]
    fn combine_recomputes_once_per_diamond_activation() {
        let set = create_event();
        let base = create_store(json!(1)).on(&set, |_, v| v.clone());
        let inc = base.map(|v, _| Some(json!(v.as_i64().unwrap() + 1)));
        let dbl = base.map(|v, _| Some(json!(v.as_i64().unwrap() * 2)));

        let sum = combine(&[inc, dbl], |values| {
            json!(values.iter().map(|v| v.as_i64().unwrap()).sum::<i64>())
        });
        // Seeded from (1+1) + (1*2).
        assert_eq!(sum.get(), Some(json!(4)));

        let calls = Rc::new(Cell::new(0));
        let counted = calls.clone();
        sum.watch(move |_| counted.set(counted.get() + 1));
        assert_eq!(calls.get(), 1); // immediate

        set.call(json!(5)).unwrap();
        assert_eq!(sum.get(), Some(json!(16)));
        // Both branches updated within one activation, one recompute.
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn combine_stays_uninitialized_until_all_sources_have_values() {
        let a = create_store(Value::Null);
        let gated = a.map(|x, _| if x.is_null() { None } else { Some(x.clone()) });
        let whole = create_store(json!(1));

        let joined = combine(&[gated, whole], |values| json!(values.to_vec()));
        assert_eq!(joined.get(), None);
    }
}
