//! Execution context handed to a node by the host
//!
//! Provides access to:
//! - Node, execution and workflow identity
//! - Workflow variables
//! - The client publishing target, when the run belongs to a chat session

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Workflow the node runs in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub id: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

/// Identifies the client session results are published to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishingContext {
    pub user_id: String,
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

/// Host-side channel to connected clients
#[async_trait]
pub trait ClientPublisher: Send + Sync {
    /// Send `message` to the connection of `user_id` in `conversation_id`.
    ///
    /// Returns `Ok(false)` when no such connection exists.
    async fn send(&self, user_id: &str, conversation_id: &str, message: Value) -> Result<bool>;
}

/// Node execution context
#[derive(Clone)]
pub struct NodeExecutionContext {
    /// Node ID within the workflow
    pub node_id: String,
    /// Execution ID (unique per run)
    pub execution_id: String,
    pub workflow: Option<WorkflowInfo>,
    pub publishing: Option<PublishingContext>,
    publisher: Option<Arc<dyn ClientPublisher>>,
}

impl NodeExecutionContext {
    /// Create a context for `node_id` with a fresh execution id
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            execution_id: uuid::Uuid::new_v4().to_string(),
            workflow: None,
            publishing: None,
            publisher: None,
        }
    }

    pub fn with_execution_id(mut self, execution_id: &str) -> Self {
        self.execution_id = execution_id.to_string();
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowInfo) -> Self {
        self.workflow = Some(workflow);
        self
    }

    pub fn with_publishing(mut self, publishing: PublishingContext) -> Self {
        self.publishing = Some(publishing);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ClientPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow.as_ref().map(|w| w.id.as_str())
    }

    /// Get a workflow variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.workflow.as_ref().and_then(|w| w.variables.get(name))
    }

    pub fn publisher(&self) -> Option<&Arc<dyn ClientPublisher>> {
        self.publisher.as_ref()
    }
}

impl fmt::Debug for NodeExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeExecutionContext")
            .field("node_id", &self.node_id)
            .field("execution_id", &self.execution_id)
            .field("workflow", &self.workflow)
            .field("publishing", &self.publishing)
            .field("has_publisher", &self.publisher.is_some())
            .finish()
    }
}

impl Default for NodeExecutionContext {
    fn default() -> Self {
        Self::new("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_variable_lookup() {
        let mut variables = Map::new();
        variables.insert("userId".to_string(), json!("u-1"));
        let ctx = NodeExecutionContext::new("ctx")
            .with_workflow(WorkflowInfo {
                id: "wf-1".to_string(),
                variables,
            });

        assert_eq!(ctx.workflow_id(), Some("wf-1"));
        assert_eq!(ctx.variable("userId"), Some(&json!("u-1")));
        assert!(ctx.variable("chatId").is_none());
    }

    #[test]
    fn test_fresh_execution_ids() {
        let a = NodeExecutionContext::new("n");
        let b = NodeExecutionContext::new("n");
        assert_ne!(a.execution_id, b.execution_id);
        assert!(a.publisher().is_none());
    }
}
