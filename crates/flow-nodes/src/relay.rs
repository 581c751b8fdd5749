//! Relay node - forwards a signal as soon as it arrives
//!
//! Upstream data arrives nested as `{signal: {sourceNode: {outputHandle: data}}}`.
//! The relay unwraps that nesting so downstream nodes see the data itself.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use flow_core::prelude::*;

use crate::value::is_truthy;

pub const NODE_TYPE: &str = "Relay";

pub fn definition() -> NodeDefinition {
    NodeDefinition::new(
        NODE_TYPE,
        "Relay",
        "Instantly forwards any signal without waiting for dependencies",
    )
    .with_version("1.1.1")
    .with_color("#10B981")
    .with_logo("https://res.cloudinary.com/sonik/image/upload/v1749961542/gravity/icons/arrow-right.png")
    .with_input(
        NodePort::new("signal", PortType::Any).with_description("Signal to relay to downstream nodes"),
    )
    .with_output(NodePort::new("signal", PortType::Any).with_description("Relayed signal"))
    .with_config_schema(json!({ "type": "object", "properties": {}, "required": [] }))
}

/// First entry of an object, or first element of an array
fn first_entry(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => map.values().next(),
        Value::Array(items) => items.first(),
        _ => None,
    }
}

/// Number of entries of an object or array
fn entry_count(value: &Value) -> Option<usize> {
    match value {
        Value::Object(map) => Some(map.len()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Data forwarded for the given inputs
pub fn relay_payload(inputs: &Map<String, Value>) -> Value {
    let signal = match inputs.get("signal") {
        Some(signal) if is_truthy(signal) => signal,
        _ => return Value::Object(inputs.clone()),
    };

    let Some(source) = first_entry(signal) else {
        return json!({});
    };

    match entry_count(source) {
        Some(1) => first_entry(source).cloned().unwrap_or_else(|| json!({})),
        Some(_) => source.clone(),
        None => json!({}),
    }
}

pub struct RelayNode {
    logger: NodeLogger,
}

impl RelayNode {
    pub fn new(logger: NodeLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl PromiseNode for RelayNode {
    fn definition(&self) -> NodeDefinition {
        definition()
    }

    async fn execute(
        &self,
        inputs: &Map<String, Value>,
        _config: &Value,
        _ctx: &NodeExecutionContext,
    ) -> Result<NodeResult> {
        let payload = relay_payload(inputs);
        tracing::debug!(
            parent: self.logger.span(),
            inputs = inputs.len(),
            forwarded_object = payload.is_object(),
            "Relaying inputs"
        );
        Ok(NodeResult::new().with_output("signal", payload))
    }
}
