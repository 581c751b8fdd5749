//! Loop node - emits array items one at a time, advancing on each `next` signal

mod state;

pub use state::{step, Ignored, LoopEmission, LoopInput, LoopPhase, LoopState, StepOutcome};

use serde_json::{json, Value};

use flow_core::prelude::*;

pub const NODE_TYPE: &str = "Loop";

pub fn definition() -> NodeDefinition {
    NodeDefinition::new(NODE_TYPE, "Loop", "Iterate through array items one by one")
        .with_version("1.1.0")
        .with_logo("https://res.cloudinary.com/sonik/image/upload/v1749961542/gravity/icons/loop.png")
        .with_input(NodePort::new("items", PortType::Spawn).with_description("Loop me"))
        .with_input(
            NodePort::new("next", PortType::Object)
                .with_description("Signal to advance to next iteration"),
        )
        .with_output(NodePort::new("item", PortType::Object).with_description("Current item"))
        .with_output(NodePort::new("index", PortType::Number).with_description("Current index"))
        .with_output(
            NodePort::new("finished", PortType::Object)
                .with_description("Signal sent when loop completes"),
        )
        .with_config_schema(json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "title": "Items",
                    "description": "Array of items to loop through",
                    "default": [],
                    "ui:field": "template",
                    "items": { "type": "object" }
                }
            },
            "required": []
        }))
}

/// Loop callback node
pub struct LoopNode {
    logger: NodeLogger,
}

impl LoopNode {
    pub fn new(logger: NodeLogger) -> Self {
        Self { logger }
    }
}

impl CallbackNode for LoopNode {
    type State = LoopState;

    fn definition(&self) -> NodeDefinition {
        definition()
    }

    fn validate_config(&self, config: &Value) -> ValidationResult {
        match config.get("items") {
            None | Some(Value::Null) | Some(Value::Array(_)) => ValidationResult::ok(),
            Some(_) => ValidationResult::fail("items must be an array"),
        }
    }

    fn initialize_state(&self) -> LoopState {
        self.logger.debug("Loop state initialized");
        LoopState::new()
    }

    fn handle_event(&self, event: &NodeEvent, state: LoopState, emit: &mut Emitter) -> LoopState {
        let input = LoopInput::from_event(event);
        let (next, outcome) = step(state, &input);

        match outcome {
            StepOutcome::Emitted(emission) => {
                let total = next.items().len();
                match &emission {
                    LoopEmission::Item { index, .. } => {
                        tracing::info!(parent: self.logger.span(), index, total, "Outputting item")
                    }
                    LoopEmission::Finished => {
                        tracing::info!(parent: self.logger.span(), total, "Loop finished")
                    }
                }
                emit.emit(emission.to_result());
            }
            StepOutcome::Ignored(Ignored::AdvanceWithoutItems) => {
                self.logger.warn("Received 'next' but no items in state");
            }
            StepOutcome::Ignored(reason) => {
                tracing::debug!(
                    parent: self.logger.span(),
                    event_type = %event.event_type,
                    reason = ?reason,
                    "Event ignored"
                );
            }
        }
        next
    }

    fn cleanup(&self, state: &LoopState) {
        tracing::info!(
            parent: self.logger.span(),
            processed = state.current_index(),
            total = state.items().len(),
            "Cleanup"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::CallbackInstance;
    use std::sync::Arc;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn start() -> CallbackInstance<LoopNode> {
        CallbackInstance::start(LoopNode::new(NodeLogger::new(NODE_TYPE, "loop-test")))
    }

    fn spawn(items: Value) -> NodeEvent {
        NodeEvent::new("SPAWN").with_config(json!({ "items": items }))
    }

    fn next() -> NodeEvent {
        NodeEvent::new("SIGNAL").with_input("next", json!({}))
    }

    #[test]
    fn test_emits_through_emitter() {
        let mut instance = start();
        let out = instance.deliver(&spawn(json!(["A", "B"])));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].output("item"), Some(&json!("A")));
        assert_eq!(out[0].output("index"), Some(&json!(0)));

        let out = instance.deliver(&next());
        assert_eq!(out[0].output("item"), Some(&json!("B")));

        let out = instance.deliver(&next());
        assert_eq!(out[0].to_value(), json!({"__outputs": {"finished": true}}));
        assert!(instance.deliver(&next()).is_empty());

        let final_state = instance.stop();
        assert_eq!(final_state.phase(), LoopPhase::Done);
    }

    #[test]
    fn test_null_next_still_advances() {
        let mut instance = start();
        instance.deliver(&spawn(json!([1, 2])));
        let out = instance.deliver(&NodeEvent::new("SIGNAL").with_input("next", Value::Null));
        assert_eq!(out[0].output("index"), Some(&json!(1)));
    }

    /// Collects the field names of every recorded event
    #[derive(Clone, Default)]
    struct FieldNames(Arc<std::sync::Mutex<Vec<String>>>);

    impl Visit for FieldNames {
        fn record_debug(&mut self, field: &Field, _value: &dyn std::fmt::Debug) {
            self.0.lock().unwrap().push(field.name().to_string());
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for FieldNames {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            event.record(&mut self.clone());
        }
    }

    #[test]
    fn test_progress_is_logged_as_fields() {
        let fields = FieldNames::default();
        let subscriber = tracing_subscriber::registry().with(fields.clone());
        tracing::subscriber::with_default(subscriber, || {
            let mut instance = start();
            instance.deliver(&spawn(json!(["A", "B"])));
            instance.stop();
        });

        let names = fields.0.lock().unwrap();
        for name in ["index", "total", "processed"] {
            assert!(names.iter().any(|n| n == name), "missing field {}", name);
        }
    }

    #[test]
    fn test_validate_config() {
        let node = LoopNode::new(NodeLogger::new(NODE_TYPE, "v"));
        assert!(node.validate_config(&json!({ "items": [1] })).success);
        assert!(node.validate_config(&json!({})).success);
        assert!(!node.validate_config(&json!({ "items": "x" })).success);
    }

    #[test]
    fn test_definition_ports() {
        let def = definition();
        assert_eq!(def.package_version, "1.1.0");
        assert_eq!(def.inputs[0].port_type, PortType::Spawn);
        assert!(def.output("finished").is_some());
    }
}
