//! IfElse node - routes its inputs to `true` or `false`

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use flow_core::prelude::*;

use crate::value::is_truthy;

pub const NODE_TYPE: &str = "IfElse";

pub fn definition() -> NodeDefinition {
    NodeDefinition::new(
        NODE_TYPE,
        "If/Else",
        "Evaluate a condition and route to true or false output",
    )
    .with_version("1.0.17")
    .with_logo("https://res.cloudinary.com/sonik/image/upload/v1749961542/gravity/icons/loop.png")
    .with_input(NodePort::new("signal", PortType::Any))
    .with_output(NodePort::new("true", PortType::Any))
    .with_output(NodePort::new("false", PortType::Any))
    .with_config_schema(json!({
        "type": "object",
        "properties": {
            "condition": {
                "type": "object",
                "title": "Condition",
                "description": "true/false expression",
                "default": "",
                "ui:field": "template"
            }
        },
        "required": ["condition"]
    }))
}

pub struct IfElseNode {
    logger: NodeLogger,
}

impl IfElseNode {
    pub fn new(logger: NodeLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl PromiseNode for IfElseNode {
    fn definition(&self) -> NodeDefinition {
        definition()
    }

    async fn execute(
        &self,
        inputs: &Map<String, Value>,
        config: &Value,
        _ctx: &NodeExecutionContext,
    ) -> Result<NodeResult> {
        // The condition arrives already evaluated by the template resolver
        let condition = config.get("condition").unwrap_or(&Value::Null);
        let is_true = is_truthy(condition);

        tracing::info!(parent: self.logger.span(), condition = is_true, "Condition evaluated");
        tracing::debug!(
            parent: self.logger.span(),
            inputs = ?inputs.keys().collect::<Vec<_>>(),
            port = is_true,
            "Routing inputs"
        );

        let port = if is_true { "true" } else { "false" };
        Ok(NodeResult::new().with_output(port, Value::Object(inputs.clone())))
    }
}
