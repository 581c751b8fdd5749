//! Context node - exposes the run's identity to downstream nodes

use async_trait::async_trait;
use serde_json::{Map, Value};

use flow_core::prelude::*;

pub const NODE_TYPE: &str = "Context";

pub fn definition() -> NodeDefinition {
    NodeDefinition::new(
        NODE_TYPE,
        "Context",
        "Extract workflow context (userId, conversationId, chatId, etc.)",
    )
    .with_color("#f59e0b")
    .with_logo("https://res.cloudinary.com/sonik/image/upload/v1750052178/gravity/icons/6359572-200.png")
    .with_input(NodePort::new("signal", PortType::Any))
    .with_output(NodePort::new("context", PortType::Object))
}

pub struct ContextNode {
    logger: NodeLogger,
}

impl ContextNode {
    pub fn new(logger: NodeLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl PromiseNode for ContextNode {
    fn definition(&self) -> NodeDefinition {
        definition()
    }

    async fn execute(
        &self,
        _inputs: &Map<String, Value>,
        _config: &Value,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeResult> {
        let mut context = Map::new();
        for key in ["userId", "conversationId", "chatId"] {
            if let Some(value) = ctx.variable(key).filter(|v| !v.is_null()) {
                context.insert(key.to_string(), value.clone());
            }
        }
        if let Some(id) = ctx.workflow_id() {
            context.insert("workflowId".to_string(), Value::String(id.to_string()));
        }
        context.insert(
            "executionId".to_string(),
            Value::String(ctx.execution_id.clone()),
        );

        tracing::info!(
            parent: self.logger.span(),
            keys = ?context.keys().collect::<Vec<_>>(),
            "Context extracted"
        );
        Ok(NodeResult::new().with_output("context", Value::Object(context)))
    }
}
