//! MCP service node - forwards schema-described method calls into the workflow
//!
//! Other nodes reach this node through service calls rather than edges. A
//! `callMethod` call is emitted on the `request` port with a fresh request
//! id; the workflow answers by sending `{requestId, result | error}` to the
//! `response` input, which completes the waiting call.

mod pending;
mod types;

pub use pending::{PendingRequests, PendingTables, PendingTicket};
pub use types::{MethodSchema, ServiceRequest, ServiceResponse, ServiceSchema};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use flow_core::prelude::*;
use flow_core::{OutputSink, ServiceConnector};

use crate::value::is_truthy;

pub const NODE_TYPE: &str = "MCP";

/// Service methods answered by [`McpNode::handle_service_call`]
pub const SERVICE_METHODS: [&str; 2] = ["getSchema", "callMethod"];

pub fn definition() -> NodeDefinition {
    NodeDefinition::new(
        NODE_TYPE,
        "MCP Service",
        "Model Context Protocol service node that handles schema-based service requests",
    )
    .with_version("1.0.20")
    .with_color("#8B5CF6")
    .with_input(
        NodePort::new("response", PortType::Object)
            .with_description("Response from the connected node handling the service request")
            .optional(),
    )
    .with_output(
        NodePort::new("request", PortType::Object)
            .with_description("Service request forwarded to connected node"),
    )
    .with_service(ServiceConnector {
        name: "mcpService".to_string(),
        description: "Provides Model Context Protocol services".to_string(),
        service_type: "mcp".to_string(),
        methods: vec!["getSchema".to_string(), "getChunksByQuery".to_string()],
        is_service: true,
    })
    .with_config_schema(json!({
        "type": "object",
        "properties": {
            "serviceSchema": {
                "type": "object",
                "title": "Service Schema",
                "description": "JSON schema defining the service methods and their input/output formats",
                "default": {},
                "ui:field": "JSON"
            }
        },
        "required": ["serviceSchema"]
    }))
}

/// Service configuration, which the host may hand over nested under `config`
fn service_schema(config: &Value) -> Option<&Value> {
    let config = match config.get("config") {
        Some(nested) if is_truthy(nested) => nested,
        _ => config,
    };
    config.get("serviceSchema").filter(|s| is_truthy(s))
}

/// MCP service node.
///
/// Responses complete calls through the node's pending table. Instances
/// built with [`McpNode::new`] own their table, so the host must route a
/// `response` to the instance that made the call; [`McpNode::with_pending`]
/// lets instances of one node id share a table instead.
pub struct McpNode {
    logger: NodeLogger,
    pending: Arc<PendingRequests>,
}

impl McpNode {
    /// Create a node whose calls expire after `timeout`
    pub fn new(logger: NodeLogger, timeout: Duration) -> Self {
        Self::with_pending(logger, Arc::new(PendingRequests::new(timeout)))
    }

    /// Create a node completing calls through a shared pending table
    pub fn with_pending(logger: NodeLogger, pending: Arc<PendingRequests>) -> Self {
        Self { logger, pending }
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    /// Complete the pending call `response` answers.
    ///
    /// Returns `Ok(false)` for responses nobody is waiting on.
    pub async fn handle_response(&self, response: &Value) -> Result<bool> {
        let response: ServiceResponse = serde_json::from_value(response.clone())
            .map_err(|e| Error::invalid_input(format!("Malformed service response: {}", e)))?;

        let outcome = match response.error_message() {
            Some(message) => Err(Error::service(message)),
            None => Ok(response.result.clone()),
        };

        let completed = self.pending.complete(&response.request_id, outcome).await;
        if !completed {
            tracing::warn!(
                parent: self.logger.span(),
                request_id = %response.request_id,
                "Dropping response for unknown or expired request"
            );
        }
        Ok(completed)
    }

    /// Purge expired pending calls
    pub async fn expire_pending(&self) -> usize {
        let expired = self.pending.expire().await;
        if expired > 0 {
            tracing::warn!(parent: self.logger.span(), expired, "Expired pending service requests");
        }
        expired
    }

    fn next_request_id(&self, ctx: &NodeExecutionContext) -> String {
        let seq = self.pending.next_sequence();
        format!(
            "{}-{}-{}",
            ctx.execution_id,
            chrono::Utc::now().timestamp_millis(),
            seq
        )
    }

    async fn call_method(
        &self,
        schema: &ServiceSchema,
        params: &Value,
        ctx: &NodeExecutionContext,
        outputs: &OutputSink,
    ) -> Result<Value> {
        let method_name = params
            .get("methodName")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| Error::invalid_input("methodName is required in params"))?;

        let method = schema.method(method_name).ok_or_else(|| {
            Error::not_found(format!("Method '{}' not found in service schema", method_name))
        })?;

        let request = ServiceRequest {
            method: method_name.to_string(),
            params: params.get("methodParams").cloned().unwrap_or(Value::Null),
            request_id: self.next_request_id(ctx),
            schema: method.clone(),
        };

        let ticket = self.pending.register(&request.request_id, method_name).await;
        tracing::info!(
            parent: self.logger.span(),
            request_id = %request.request_id,
            method = %method_name,
            "Forwarding service request"
        );

        let emitted = NodeResult::new().with_output("request", serde_json::to_value(&request)?);
        if outputs.send(emitted).is_err() {
            self.pending.cancel(&request.request_id).await;
            return Err(Error::service("Output channel closed"));
        }

        self.pending.wait(ticket).await
    }
}

#[async_trait]
impl PromiseNode for McpNode {
    fn definition(&self) -> NodeDefinition {
        definition()
    }

    fn validate_config(&self, config: &Value) -> ValidationResult {
        match service_schema(config) {
            Some(schema) if schema.is_object() => ValidationResult::ok(),
            Some(_) => ValidationResult::fail("serviceSchema must be an object"),
            None => ValidationResult::fail("Service schema not configured"),
        }
    }

    /// Only responses to forwarded requests flow through the graph
    async fn execute(
        &self,
        inputs: &Map<String, Value>,
        _config: &Value,
        _ctx: &NodeExecutionContext,
    ) -> Result<NodeResult> {
        match inputs.get("response") {
            Some(response) => {
                self.handle_response(response).await?;
                Ok(NodeResult::new())
            }
            None => Err(Error::execution(
                "MCP is a service node - it responds to SERVICE_CALL signals only",
            )),
        }
    }

    async fn handle_service_call(
        &self,
        method: &str,
        params: &Value,
        config: &Value,
        ctx: &NodeExecutionContext,
        outputs: &OutputSink,
    ) -> Result<Value> {
        tracing::info!(parent: self.logger.span(), method = %method, "Handling SERVICE_CALL");

        let raw_schema =
            service_schema(config).ok_or_else(|| Error::service("Service schema not configured"))?;

        let result = match method {
            "getSchema" => Ok(raw_schema.clone()),
            "callMethod" => match serde_json::from_value::<ServiceSchema>(raw_schema.clone()) {
                Ok(schema) => self.call_method(&schema, params, ctx, outputs).await,
                Err(e) => Err(Error::invalid_config(format!("serviceSchema: {}", e))),
            },
            other => Err(Error::service(format!(
                "Unknown service method: {}. Available methods: {}",
                other,
                SERVICE_METHODS.join(", ")
            ))),
        };

        if let Err(e) = &result {
            tracing::error!(
                parent: self.logger.span(),
                method = %method,
                error = %e,
                "SERVICE_CALL failed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn config() -> Value {
        json!({
            "serviceSchema": {
                "name": "docs",
                "version": "1.0.0",
                "description": "Document search",
                "methods": {
                    "getChunksByQuery": {
                        "input": { "type": "object", "properties": { "query": { "type": "string" } } },
                        "output": { "type": "object", "properties": {} }
                    }
                }
            }
        })
    }

    fn node(timeout: Duration) -> Arc<McpNode> {
        Arc::new(McpNode::new(NodeLogger::new(NODE_TYPE, "mcp-1"), timeout))
    }

    #[tokio::test]
    async fn test_get_schema_accepts_nested_config() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = NodeExecutionContext::new("mcp-1");
        let nested = json!({ "config": config() });

        let schema = node(Duration::from_secs(30))
            .handle_service_call("getSchema", &Value::Null, &nested, &ctx, &tx)
            .await
            .unwrap();
        assert_eq!(schema["name"], "docs");
    }

    #[tokio::test]
    async fn test_call_method_round_trip() {
        let mcp = node(Duration::from_secs(30));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let call = {
            let mcp = mcp.clone();
            tokio::spawn(async move {
                let ctx = NodeExecutionContext::new("mcp-1").with_execution_id("exec-1");
                let params = json!({ "methodName": "getChunksByQuery", "methodParams": { "query": "rust" } });
                mcp.handle_service_call("callMethod", &params, &config(), &ctx, &tx)
                    .await
            })
        };

        let emitted = rx.recv().await.unwrap();
        let request = emitted.output("request").unwrap().clone();
        assert_eq!(request["method"], "getChunksByQuery");
        assert_eq!(request["params"]["query"], "rust");
        let request_id = request["requestId"].as_str().unwrap().to_string();
        assert!(request_id.starts_with("exec-1-"));

        let mut inputs = Map::new();
        inputs.insert(
            "response".to_string(),
            json!({ "requestId": request_id, "result": { "chunks": ["a"] } }),
        );
        let routed = mcp
            .execute(&inputs, &config(), &NodeExecutionContext::new("mcp-1"))
            .await
            .unwrap();
        assert!(routed.is_empty());

        assert_eq!(call.await.unwrap().unwrap(), json!({ "chunks": ["a"] }));
        assert!(mcp.pending().is_empty().await);
    }

    #[tokio::test]
    async fn test_error_response_fails_call() {
        let mcp = node(Duration::from_secs(30));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let call = {
            let mcp = mcp.clone();
            tokio::spawn(async move {
                let ctx = NodeExecutionContext::new("mcp-1");
                let params = json!({ "methodName": "getChunksByQuery" });
                mcp.handle_service_call("callMethod", &params, &config(), &ctx, &tx)
                    .await
            })
        };

        let request = rx.recv().await.unwrap().output("request").unwrap().clone();
        let completed = mcp
            .handle_response(&json!({ "requestId": request["requestId"], "error": "index offline" }))
            .await
            .unwrap();
        assert!(completed);

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Service error: index offline");
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_times_out() {
        let mcp = node(Duration::from_millis(30_000));
        let (tx, _rx) = mpsc::unbounded_channel();
        let params = json!({ "methodName": "getChunksByQuery" });

        let err = mcp
            .handle_service_call("callMethod", &params, &config(), &NodeExecutionContext::new("m"), &tx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Timeout: Timeout waiting for response to getChunksByQuery");
        assert_eq!(mcp.expire_pending().await, 0);
    }

    #[tokio::test]
    async fn test_rejections() {
        let mcp = node(Duration::from_secs(30));
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = NodeExecutionContext::new("m");

        let err = mcp
            .handle_service_call("listTools", &Value::Null, &config(), &ctx, &tx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Available methods: getSchema, callMethod"));

        let err = mcp
            .handle_service_call("callMethod", &json!({ "methodName": "nope" }), &config(), &ctx, &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = mcp
            .handle_service_call("getSchema", &Value::Null, &json!({}), &ctx, &tx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Service error: Service schema not configured");

        let err = mcp.execute(&Map::new(), &config(), &ctx).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "MCP is a service node - it responds to SERVICE_CALL signals only"
        );
    }

    #[tokio::test]
    async fn test_unknown_response_is_dropped() {
        let mcp = node(Duration::from_secs(30));
        assert!(!mcp
            .handle_response(&json!({ "requestId": "stale", "result": 1 }))
            .await
            .unwrap());
        assert!(mcp.handle_response(&json!({ "result": 1 })).await.is_err());
    }
}
