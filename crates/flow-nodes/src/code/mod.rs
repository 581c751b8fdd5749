//! Code node - passes through a template-resolved value, optionally with generated ids

mod hash;

pub use hash::{content_hash, universal_id};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use flow_core::prelude::*;

use crate::config::parse_config;
use crate::value::is_truthy;

pub const NODE_TYPE: &str = "Code";

pub fn definition() -> NodeDefinition {
    NodeDefinition::new(NODE_TYPE, "Code", "Execute custom code to transform data")
        .with_version("1.0.12")
        .with_color("#f59e0b")
        .with_logo("https://res.cloudinary.com/sonik/image/upload/v1750052178/gravity/icons/6359572-200.png")
        .with_input(NodePort::new("signal", PortType::Any))
        .with_output(NodePort::new("output", PortType::Any))
        .with_output(NodePort::new("ids", PortType::Object))
        .with_config_schema(json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "object",
                    "title": "Code",
                    "description": "JS Code to transform data",
                    "default": "",
                    "ui:field": "template"
                },
                "generateIds": {
                    "type": "boolean",
                    "title": "Generate IDs",
                    "description": "Generate content IDs",
                    "default": false,
                    "ui:widget": "toggle"
                }
            },
            "required": ["code"]
        }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeConfig {
    /// Already evaluated by the host's template resolver
    #[serde(default)]
    code: Value,
    /// Any truthy value turns id generation on
    #[serde(default)]
    generate_ids: Value,
}

pub struct CodeNode {
    logger: NodeLogger,
}

impl CodeNode {
    pub fn new(logger: NodeLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl PromiseNode for CodeNode {
    fn definition(&self) -> NodeDefinition {
        definition()
    }

    async fn execute(
        &self,
        _inputs: &Map<String, Value>,
        config: &Value,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeResult> {
        let config: CodeConfig =
            parse_config(NODE_TYPE, config).map_err(|e| e.context("Code execution"))?;
        let result = NodeResult::new().with_output("output", config.code.clone());

        if !is_truthy(&config.generate_ids) {
            return Ok(result);
        }

        let workflow_id = ctx.workflow_id().unwrap_or("unknown");
        let node_id = if ctx.node_id.is_empty() {
            "code"
        } else {
            ctx.node_id.as_str()
        };
        let universal_id = universal_id(workflow_id, node_id);
        let content_id = content_hash(&config.code);

        tracing::info!(
            parent: self.logger.span(),
            universal_id = %universal_id,
            content_id = %content_id,
            "Generated IDs for output"
        );

        Ok(result.with_output(
            "ids",
            json!({ "universalId": universal_id, "contentId": content_id }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::WorkflowInfo;

    fn node() -> CodeNode {
        CodeNode::new(NodeLogger::new(NODE_TYPE, "code-1"))
    }

    #[tokio::test]
    async fn test_passes_code_through() {
        let out = node()
            .execute(&Map::new(), &json!({ "code": { "a": 1 } }), &NodeExecutionContext::new("code-1"))
            .await
            .unwrap();
        assert_eq!(out.to_value(), json!({"__outputs": {"output": {"a": 1}}}));
        assert!(out.output("ids").is_none());
    }

    #[tokio::test]
    async fn test_generates_ids() {
        let ctx = NodeExecutionContext::new("code-1").with_workflow(WorkflowInfo {
            id: "wf-1".to_string(),
            variables: Map::new(),
        });
        let out = node()
            .execute(&Map::new(), &json!({ "code": "hello", "generateIds": true }), &ctx)
            .await
            .unwrap();

        let ids = out.output("ids").unwrap();
        assert_eq!(ids["universalId"], json!(universal_id("wf-1", "code-1")));
        assert_eq!(ids["contentId"], json!(content_hash(&json!("hello"))));
        assert_eq!(out.output("output"), Some(&json!("hello")));
    }

    #[tokio::test]
    async fn test_unknown_workflow_defaults() {
        let out = node()
            .execute(&Map::new(), &json!({ "code": 1, "generateIds": true }), &NodeExecutionContext::new(""))
            .await
            .unwrap();
        assert_eq!(
            out.output("ids").unwrap()["universalId"],
            json!(universal_id("unknown", "code"))
        );
    }

    #[tokio::test]
    async fn test_generate_ids_uses_truthiness() {
        let ctx = NodeExecutionContext::new("c");
        for flag in [json!("yes"), json!("true"), json!(1)] {
            let out = node()
                .execute(&Map::new(), &json!({ "code": "x", "generateIds": flag.clone() }), &ctx)
                .await
                .unwrap();
            assert!(out.output("ids").is_some(), "{} should enable ids", flag);
        }
        for flag in [json!(""), json!(0), json!(null), json!(false)] {
            let out = node()
                .execute(&Map::new(), &json!({ "code": "x", "generateIds": flag.clone() }), &ctx)
                .await
                .unwrap();
            assert!(out.output("ids").is_none(), "{} should not enable ids", flag);
        }
    }

    #[tokio::test]
    async fn test_bad_config_is_prefixed() {
        let err = node()
            .execute(&Map::new(), &json!("not an object"), &NodeExecutionContext::new("c"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Code execution failed:"));
    }
}
