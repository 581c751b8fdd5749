//! Node registry - node types a plugin makes available to the host

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::instance::CallbackRuntime;
use crate::logging::NodeLogger;
use crate::node::{NodeDefinition, PromiseNode};

/// Builds a promise node instance around its logger
pub type PromiseFactory = Arc<dyn Fn(NodeLogger) -> Arc<dyn PromiseNode> + Send + Sync>;

/// Starts a callback node instance around its logger
pub type CallbackFactory = Arc<dyn Fn(NodeLogger) -> Box<dyn CallbackRuntime> + Send + Sync>;

/// How instances of a registered node type are created
#[derive(Clone)]
pub enum NodeFactory {
    Promise(PromiseFactory),
    Callback(CallbackFactory),
}

/// Registered node type
#[derive(Clone)]
pub struct RegisteredNode {
    pub definition: NodeDefinition,
    pub factory: NodeFactory,
}

/// Registry of node types, keyed by node type
#[derive(Clone, Default)]
pub struct NodeRegistry {
    nodes: Arc<RwLock<HashMap<String, RegisteredNode>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type. Fails if the type is already registered.
    pub async fn register(&self, definition: NodeDefinition, factory: NodeFactory) -> Result<()> {
        let node_type = definition.node_type.clone();
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node_type) {
            return Err(Error::internal(format!(
                "Node type '{}' is already registered",
                node_type
            )));
        }
        nodes.insert(
            node_type.clone(),
            RegisteredNode {
                definition,
                factory,
            },
        );
        info!(node_type = %node_type, "Registered node type");
        Ok(())
    }

    /// Register a promise node type
    pub async fn register_promise(
        &self,
        definition: NodeDefinition,
        factory: PromiseFactory,
    ) -> Result<()> {
        self.register(definition, NodeFactory::Promise(factory)).await
    }

    /// Register a callback node type
    pub async fn register_callback(
        &self,
        definition: NodeDefinition,
        factory: CallbackFactory,
    ) -> Result<()> {
        self.register(definition, NodeFactory::Callback(factory)).await
    }

    /// Remove a node type
    pub async fn unregister(&self, node_type: &str) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        nodes
            .remove(node_type)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("Node type '{}'", node_type)))
    }

    /// Get the definition of a node type
    pub async fn definition(&self, node_type: &str) -> Option<NodeDefinition> {
        let nodes = self.nodes.read().await;
        nodes.get(node_type).map(|n| n.definition.clone())
    }

    /// All definitions, sorted by node type
    pub async fn list_definitions(&self) -> Vec<NodeDefinition> {
        let nodes = self.nodes.read().await;
        let mut defs: Vec<_> = nodes.values().map(|n| n.definition.clone()).collect();
        defs.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        defs
    }

    /// Create a promise node instance for `node_id`
    pub async fn create_promise(&self, node_type: &str, node_id: &str) -> Result<Arc<dyn PromiseNode>> {
        let factory = self.factory(node_type).await?;
        match factory {
            NodeFactory::Promise(create) => {
                debug!(node_type = %node_type, node_id = %node_id, "Creating node instance");
                Ok(create(NodeLogger::new(node_type, node_id)))
            }
            NodeFactory::Callback(_) => Err(Error::invalid_input(format!(
                "Node type '{}' is event driven, start it as a callback instance",
                node_type
            ))),
        }
    }

    /// Start a callback node instance for `node_id`
    pub async fn start_callback(&self, node_type: &str, node_id: &str) -> Result<Box<dyn CallbackRuntime>> {
        let factory = self.factory(node_type).await?;
        match factory {
            NodeFactory::Callback(start) => {
                debug!(node_type = %node_type, node_id = %node_id, "Starting node instance");
                Ok(start(NodeLogger::new(node_type, node_id)))
            }
            NodeFactory::Promise(_) => Err(Error::invalid_input(format!(
                "Node type '{}' is not event driven",
                node_type
            ))),
        }
    }

    /// Number of registered node types
    pub async fn count(&self) -> usize {
        let nodes = self.nodes.read().await;
        nodes.len()
    }

    async fn factory(&self, node_type: &str) -> Result<NodeFactory> {
        let nodes = self.nodes.read().await;
        nodes
            .get(node_type)
            .map(|n| n.factory.clone())
            .ok_or_else(|| Error::not_found(format!("Node type '{}'", node_type)))
    }
}
