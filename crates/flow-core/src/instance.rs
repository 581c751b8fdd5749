//! Running instances of callback nodes
//!
//! A [`CallbackInstance`] owns one node and its state for the lifetime of a
//! run: the initial-state hook runs on start, each delivered event is
//! reduced in turn, and teardown runs when the instance is stopped. Taking
//! `&mut self` for delivery keeps events serialized per instance.

use tracing::debug;

use crate::node::{CallbackNode, Emitter, NodeEvent, NodeResult};

/// Type-erased handle to a running callback node
pub trait CallbackRuntime: Send {
    /// Type of the node being driven
    fn node_type(&self) -> String;

    /// Deliver one event and return what the node emitted for it
    fn deliver(&mut self, event: NodeEvent) -> Vec<NodeResult>;

    /// Tear the instance down
    fn stop(self: Box<Self>);
}

/// A callback node together with its current state
pub struct CallbackInstance<N: CallbackNode> {
    node: N,
    state: N::State,
    events: u64,
}

impl<N: CallbackNode> CallbackInstance<N> {
    /// Start an instance, running the node's initial-state hook
    pub fn start(node: N) -> Self {
        let state = node.initialize_state();
        Self {
            node,
            state,
            events: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> &N::State {
        &self.state
    }

    /// Number of events delivered so far
    pub fn events_delivered(&self) -> u64 {
        self.events
    }

    /// Deliver one event
    pub fn deliver(&mut self, event: &NodeEvent) -> Vec<NodeResult> {
        let mut emitter = Emitter::new();
        let state = std::mem::take(&mut self.state);
        self.state = self.node.handle_event(event, state, &mut emitter);
        self.events += 1;

        debug!(
            node_type = %self.node.definition().node_type,
            event_type = %event.event_type,
            emitted = emitter.len(),
            "Event delivered"
        );
        emitter.into_emitted()
    }

    /// Run teardown and hand back the final state
    pub fn stop(self) -> N::State {
        self.node.cleanup(&self.state);
        self.state
    }
}

impl<N> CallbackRuntime for CallbackInstance<N>
where
    N: CallbackNode + 'static,
{
    fn node_type(&self) -> String {
        self.node.definition().node_type
    }

    fn deliver(&mut self, event: NodeEvent) -> Vec<NodeResult> {
        CallbackInstance::deliver(self, &event)
    }

    fn stop(self: Box<Self>) {
        CallbackInstance::stop(*self);
    }
}
