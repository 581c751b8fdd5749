//! Node contract between the host runtime and flow nodes
//!
//! A node is described by a [`NodeDefinition`] (ports, config schema, UI
//! metadata) and implemented either as a [`PromiseNode`] (one call, one
//! result) or as a [`CallbackNode`] (a state reducer fed a stream of events).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::context::NodeExecutionContext;
use crate::error::{Error, Result};

/// Data type carried by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortType {
    Any,
    Object,
    Array,
    String,
    Number,
    Boolean,
    /// Starts a new run of the receiving node
    Spawn,
}

/// A port on a node (input or output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePort {
    /// Port name, also the key in input and output maps
    pub name: String,
    /// Data type
    #[serde(rename = "type")]
    pub port_type: PortType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl NodePort {
    pub fn new(name: &str, port_type: PortType) -> Self {
        Self {
            name: name.to_string(),
            port_type,
            description: None,
            required: None,
        }
    }

    /// Add description
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Mark the port as optional
    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self
    }
}

/// Service offered by a service node to other nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConnector {
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub methods: Vec<String>,
    pub is_service: bool,
}

/// Node capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCapabilities {
    pub is_trigger: bool,
}

/// Everything the host needs to list, render and wire a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub package_version: String,
    #[serde(default)]
    pub is_service: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub inputs: Vec<NodePort>,
    pub outputs: Vec<NodePort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_connectors: Vec<ServiceConnector>,
    pub config_schema: Value,
    #[serde(default)]
    pub capabilities: NodeCapabilities,
}

impl NodeDefinition {
    /// Create a definition in the "Flow" category with no ports
    pub fn new(node_type: &str, name: &str, description: &str) -> Self {
        Self {
            node_type: node_type.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            category: "Flow".to_string(),
            color: "#4A90E2".to_string(),
            logo_url: None,
            package_version: "1.0.0".to_string(),
            is_service: false,
            template: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            service_connectors: Vec::new(),
            config_schema: serde_json::json!({ "type": "object", "properties": {} }),
            capabilities: NodeCapabilities::default(),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.package_version = version.to_string();
        self
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = color.to_string();
        self
    }

    pub fn with_logo(mut self, url: &str) -> Self {
        self.logo_url = Some(url.to_string());
        self
    }

    pub fn with_input(mut self, port: NodePort) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: NodePort) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_config_schema(mut self, schema: Value) -> Self {
        self.config_schema = schema;
        self
    }

    /// Mark this node as a service provider
    pub fn with_service(mut self, connector: ServiceConnector) -> Self {
        self.is_service = true;
        self.template = Some("service".to_string());
        self.service_connectors.push(connector);
        self
    }

    /// Look up an output port by name
    pub fn output(&self, name: &str) -> Option<&NodePort> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Outcome of config validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    /// Convert into a `Result`, mapping failure to [`Error::InvalidConfig`]
    pub fn into_result(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(Error::invalid_config(self.error.unwrap_or_default()))
        }
    }
}

/// Tagged output of a node, keyed by output port name.
///
/// Serializes as `{"__outputs": {...}}`; a result with no outputs
/// serializes as `{}` and routes nothing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeResult {
    #[serde(
        rename = "__outputs",
        default,
        skip_serializing_if = "Map::is_empty"
    )]
    outputs: Map<String, Value>,
}

impl NodeResult {
    /// Create a result with no outputs
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value routed to `port`
    pub fn with_output(mut self, port: &str, value: impl Into<Value>) -> Self {
        self.outputs.insert(port.to_string(), value.into());
        self
    }

    /// Value routed to `port`, if any
    pub fn output(&self, port: &str) -> Option<&Value> {
        self.outputs.get(port)
    }

    pub fn outputs(&self) -> &Map<String, Value> {
        &self.outputs
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Wire form handed back to the host
    pub fn to_value(&self) -> Value {
        if self.outputs.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::json!({ "__outputs": self.outputs })
        }
    }
}

/// Sink for outputs produced outside a node's return value
pub type OutputSink = tokio::sync::mpsc::UnboundedSender<NodeResult>;

/// A node executed once per signal, returning a single result
#[async_trait]
pub trait PromiseNode: Send + Sync {
    /// Static definition of this node type
    fn definition(&self) -> NodeDefinition;

    /// Validate resolved configuration before execution
    fn validate_config(&self, _config: &Value) -> ValidationResult {
        ValidationResult::ok()
    }

    /// Execute with upstream inputs and resolved configuration
    async fn execute(
        &self,
        inputs: &Map<String, Value>,
        config: &Value,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeResult>;

    /// Answer a service call from another node. Only service nodes override this.
    async fn handle_service_call(
        &self,
        method: &str,
        _params: &Value,
        _config: &Value,
        _ctx: &NodeExecutionContext,
        _outputs: &OutputSink,
    ) -> Result<Value> {
        Err(Error::service(format!(
            "Service call '{}' not supported by node '{}'",
            method,
            self.definition().node_type
        )))
    }
}

/// One event delivered to a callback node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    /// Signals received on input ports, keyed by port name
    #[serde(default)]
    pub inputs: Map<String, Value>,
    /// Configuration resolved for this event
    #[serde(default)]
    pub config: Value,
}

impl NodeEvent {
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            inputs: Map::new(),
            config: Value::Null,
        }
    }

    pub fn with_input(mut self, port: &str, value: Value) -> Self {
        self.inputs.insert(port.to_string(), value);
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Whether a signal is present on `port`, regardless of its value
    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.contains_key(port)
    }
}

/// Collects outputs emitted while a callback node handles one event
#[derive(Debug, Default)]
pub struct Emitter {
    emitted: Vec<NodeResult>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, output: NodeResult) {
        self.emitted.push(output);
    }

    pub fn len(&self) -> usize {
        self.emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }

    pub fn into_emitted(self) -> Vec<NodeResult> {
        self.emitted
    }
}

/// A stateful node driven by a stream of events.
///
/// The host calls [`initialize_state`](CallbackNode::initialize_state) once,
/// then [`handle_event`](CallbackNode::handle_event) once per event, never
/// concurrently, and finally [`cleanup`](CallbackNode::cleanup).
pub trait CallbackNode: Send + Sync {
    type State: Clone + Default + fmt::Debug + Send;

    fn definition(&self) -> NodeDefinition;

    fn validate_config(&self, _config: &Value) -> ValidationResult {
        ValidationResult::ok()
    }

    fn initialize_state(&self) -> Self::State;

    fn handle_event(&self, event: &NodeEvent, state: Self::State, emit: &mut Emitter)
        -> Self::State;

    fn cleanup(&self, _state: &Self::State) {}
}
