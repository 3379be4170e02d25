//! Effects
//!
//! An effect wraps an opaque user handler. Calling the effect starts an
//! ordinary activation at its node, where watchers see the parameters in
//! the pure lane, and a runner node in the effect lane invokes the handler
//! once the pure lane has drained. The handler's completion is modeled as
//! a fresh activation of the `done` or `fail` event, queued behind the
//! current activation; the kernel never blocks on the handler itself.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};

use super::{Event, Subscription, Unit};
use crate::error::{BoxError, KernelError};
use crate::graph::command::Cmd;
use crate::graph::node::{self, Lane, Node, NodeId};
use crate::kernel;

/// The opaque callback attached to an effect.
pub type Handler = Rc<dyn Fn(&Value) -> Result<Value, Value>>;

/// A callable unit wrapping an external, possibly failing computation.
///
/// Cloning an `Effect` yields another handle to the same node and handler
/// slot.
#[derive(Clone)]
pub struct Effect {
    node: NodeId,
    name: Rc<String>,
    handler: Rc<RefCell<Option<Handler>>>,
    done: Event,
    fail: Event,
}

/// Create an anonymous effect.
pub fn create_effect() -> Effect {
    Effect::new()
}

impl Effect {
    /// Create an anonymous effect.
    pub fn new() -> Self {
        Self::named("effect")
    }

    /// Create an effect with a diagnostic name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let handler: Rc<RefCell<Option<Handler>>> = Rc::new(RefCell::new(None));
        let done = Event::named(format!("{name}.done"));
        let fail = Event::named(format!("{name}.fail"));

        let main = node::insert(
            Node::new([Cmd::emit(name.clone())])
                .with_meta("kind", "effect")
                .with_meta("name", name.clone()),
        );

        let slot = handler.clone();
        let effect_name = name.clone();
        let done_node = done.node();
        let fail_node = fail.node();
        let runner = node::insert(
            Node::new([Cmd::run(move |params, _| {
                let handler = slot.borrow().clone();
                let Some(handler) = handler else {
                    return Err(Box::new(KernelError::NoHandler(effect_name.clone())) as BoxError);
                };
                // Completion re-enters the kernel as a new activation,
                // queued behind the one currently draining.
                match handler(params) {
                    Ok(result) => {
                        kernel::activate(done_node, json!({"params": params, "result": result}))?;
                    }
                    Err(error) => {
                        kernel::activate(fail_node, json!({"params": params, "error": error}))?;
                    }
                }
                Ok(())
            })])
            .with_lane(Lane::Effect)
            .with_meta("kind", "effect.runner"),
        );
        node::connect(main, runner);

        Self {
            node: main,
            name: Rc::new(name),
            handler,
            done,
            fail,
        }
    }

    /// The effect's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install the handler invoked for each call, replacing any previous
    /// one.
    pub fn use_handler<F>(&self, f: F) -> &Effect
    where
        F: Fn(&Value) -> Result<Value, Value> + 'static,
    {
        *self.handler.borrow_mut() = Some(Rc::new(f));
        self
    }

    /// Call the effect with `params`.
    ///
    /// Watchers fire with `params` in the pure lane; the handler runs in
    /// the effect lane afterwards. Calling an effect with no handler
    /// installed surfaces [`KernelError::NoHandler`] through the command
    /// error of the runner node.
    pub fn call(&self, params: Value) -> Result<(), KernelError> {
        kernel::activate(self.node, params)
    }

    /// Completion event; payload `{"params": .., "result": ..}`.
    pub fn done(&self) -> &Event {
        &self.done
    }

    /// Failure event; payload `{"params": .., "error": ..}`.
    pub fn fail(&self) -> &Event {
        &self.fail
    }

    /// Invoke `f` with the parameters of every call.
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
}

impl Default for Effect {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for Effect {
    fn node(&self) -> NodeId {
        self.node
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("node", &self.node)
            .field("name", &self.name)
            .field("has_handler", &self.handler.borrow().is_some())
            .finish()
    }
}
