//! Events
//!
//! An event is the simplest callable unit: calling it starts an activation
//! at its node with the given payload, and every attached child (watchers,
//! reducer links, derived events) sees that payload.

use std::rc::Rc;

use serde_json::Value;

use super::{Subscription, Unit};
use crate::error::KernelError;
use crate::graph::command::Cmd;
use crate::graph::node::{self, Node, NodeId};
use crate::kernel;

/// A callable trigger carrying a payload into the graph.
///
/// Cloning an `Event` yields another handle to the same node.
#[derive(Debug, Clone)]
pub struct Event {
    node: NodeId,
    name: Rc<String>,
}

/// Create an anonymous event.
pub fn create_event() -> Event {
    Event::new()
}

impl Event {
    /// Create an anonymous event.
    pub fn new() -> Self {
        Self::named("event")
    }

    /// Create an event with a diagnostic name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = node::insert(
            Node::new([Cmd::emit(name.clone())])
                .with_meta("kind", "event")
                .with_meta("name", name.clone()),
        );
        Self {
            node: id,
            name: Rc::new(name),
        }
    }

    /// The event's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fire the event: start an activation with `payload`.
    pub fn call(&self, payload: Value) -> Result<(), KernelError> {
        kernel::activate(self.node, payload)
    }

    /// Invoke `f` with the payload of every future call.
    pub fn watch<F>(&self, f: F) -> Subscription
    where
        F: Fn(&Value) + 'static,
    {
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

    /// Derived event whose payload is `f` applied to this event's payload.
    pub fn map<F>(&self, f: F) -> Event
    where
        F: Fn(&Value) -> Value + 'static,
    {
        let mapped = Event::named(format!("{}.map", self.name));
        let link = node::insert(
            Node::new([Cmd::compute(move |value, _| Ok(Some(f(value))))]).with_meta("kind", "map"),
        );
        node::connect(self.node, link);
        node::connect(link, mapped.node);
        mapped
    }

    /// Derived event that fires only when `pred` holds, with the payload
    /// unchanged.
    pub fn filter<F>(&self, pred: F) -> Event
    where
        F: Fn(&Value) -> bool + 'static,
    {
        let filtered = Event::named(format!("{}.filter", self.name));
        let link = node::insert(
            Node::new([Cmd::filter(move |value, _| Ok(pred(value)))]).with_meta("kind", "filter"),
        );
        node::connect(self.node, link);
        node::connect(link, filtered.node);
        filtered
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for Event {
    fn node(&self) -> NodeId {
        self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<Value>>>;

    fn collect(event: &Event) -> Log {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        event.watch(move |value| sink.borrow_mut().push(value.clone()));
        log
    }

    #[test]
    fn watch_receives_every_payload() {
        let event = create_event();
        let log = collect(&event);

        event.call(json!(1)).unwrap();
        event.call(json!("two")).unwrap();

        assert_eq!(*log.borrow(), vec![json!(1), json!("two")]);
    }

    #[test]
    fn unsubscribed_watcher_stops_firing() {
        let event = create_event();
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let sub = event.watch(move |value| sink.borrow_mut().push(value.clone()));

        event.call(json!(1)).unwrap();
        sub.unsubscribe();
        event.call(json!(2)).unwrap();

        assert_eq!(*log.borrow(), vec![json!(1)]);
    }

    #[test]
    fn map_transforms_payloads() {
        let event = create_event();
        let doubled = event.map(|v| json!(v.as_i64().unwrap() * 2));
        let log = collect(&doubled);

        event.call(json!(3)).unwrap();
        event.call(json!(5)).unwrap();

        assert_eq!(*log.borrow(), vec![json!(6), json!(10)]);
    }

    #[test]
    fn filter_keeps_matching_payloads_unchanged() {
        let event = create_event();
        let positive = event.filter(|v| v.as_i64().unwrap() > 0);
        let log = collect(&positive);

        event.call(json!(-2)).unwrap();
        event.call(json!(4)).unwrap();
        event.call(json!(0)).unwrap();

        assert_eq!(*log.borrow(), vec![json!(4)]);
    }

    #[test]
    fn named_event_exposes_its_name() {
        let event = Event::named("new word");
        assert_eq!(event.name(), "new word");
        assert_eq!(
            node::meta_of(event.node(), "name").as_deref(),
            Some("new word")
        );
    }
}
