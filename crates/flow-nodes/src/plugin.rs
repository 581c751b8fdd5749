//! Plugin entry point - registers every flow node type with the host registry

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use flow_core::logging::init_tracing;
use flow_core::registry::{CallbackFactory, PromiseFactory};
use flow_core::{
    CallbackInstance, CallbackNode, CallbackRuntime, FlowSettings, NodeLogger, NodeRegistry,
    PromiseNode, Result,
};

use crate::code::{self, CodeNode};
use crate::context_node::{self, ContextNode};
use crate::field_validator::{self, FieldValidatorNode};
use crate::if_else::{self, IfElseNode};
use crate::loop_node::{self, LoopNode};
use crate::mcp::{self, McpNode, PendingTables};
use crate::note::{self, NoteNode};
use crate::relay::{self, RelayNode};
use crate::suggestions::{self, SuggestionsNode};
use crate::umap::{self, UmapNode};

/// Plugin metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowPlugin {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl Default for FlowPlugin {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: env!("CARGO_PKG_DESCRIPTION").to_string(),
        }
    }
}

fn promise<N, F>(build: F) -> PromiseFactory
where
    N: PromiseNode + 'static,
    F: Fn(NodeLogger) -> N + Send + Sync + 'static,
{
    Arc::new(move |logger: NodeLogger| Arc::new(build(logger)) as Arc<dyn PromiseNode>)
}

fn callback<N, F>(build: F) -> CallbackFactory
where
    N: CallbackNode + 'static,
    F: Fn(NodeLogger) -> N + Send + Sync + 'static,
{
    Arc::new(move |logger: NodeLogger| {
        Box::new(CallbackInstance::start(build(logger))) as Box<dyn CallbackRuntime>
    })
}

impl FlowPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the environment, install the log subscriber and
    /// register every node type. Returns the settings in effect.
    pub async fn install(&self, registry: &NodeRegistry) -> Result<FlowSettings> {
        let settings = FlowSettings::from_env();
        init_tracing(&settings);
        self.setup(registry, &settings).await?;
        Ok(settings)
    }

    /// Register all flow node types
    pub async fn setup(&self, registry: &NodeRegistry, settings: &FlowSettings) -> Result<()> {
        registry
            .register_promise(code::definition(), promise(CodeNode::new))
            .await?;
        registry
            .register_promise(if_else::definition(), promise(IfElseNode::new))
            .await?;
        registry
            .register_callback(loop_node::definition(), callback(LoopNode::new))
            .await?;
        registry
            .register_promise(context_node::definition(), promise(ContextNode::new))
            .await?;
        registry
            .register_promise(relay::definition(), promise(RelayNode::new))
            .await?;
        registry
            .register_promise(note::definition(), promise(NoteNode::new))
            .await?;
        registry
            .register_promise(umap::definition(), promise(UmapNode::new))
            .await?;

        let tables = Arc::new(PendingTables::new(settings.service_timeout));
        registry
            .register_promise(
                mcp::definition(),
                promise(move |logger: NodeLogger| {
                    let pending = tables.for_node(logger.node_id());
                    McpNode::with_pending(logger, pending)
                }),
            )
            .await?;

        registry
            .register_promise(field_validator::definition(), promise(FieldValidatorNode::new))
            .await?;
        registry
            .register_promise(suggestions::definition(), promise(SuggestionsNode::new))
            .await?;

        let node_types = registry.count().await;
        info!(
            plugin = %self.name,
            version = %self.version,
            node_types,
            "Flow plugin registered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_from_package() {
        let plugin = FlowPlugin::new();
        assert_eq!(plugin.name, "flow-nodes");
        assert!(!plugin.description.is_empty());
    }

    #[tokio::test]
    async fn test_install_registers_with_env_settings() {
        let registry = NodeRegistry::new();
        let settings = FlowPlugin::new().install(&registry).await.unwrap();
        assert!(!settings.service_timeout.is_zero());
        assert_eq!(registry.count().await, 10);
    }

    #[tokio::test]
    async fn test_setup_twice_fails() {
        let registry = NodeRegistry::new();
        let plugin = FlowPlugin::new();
        plugin.setup(&registry, &FlowSettings::default()).await.unwrap();
        assert!(plugin.setup(&registry, &FlowSettings::default()).await.is_err());
    }
}
