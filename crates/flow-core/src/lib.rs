//! Core types for flow control nodes
//!
//! # Modules
//!
//! - `config`: Environment configuration and plugin settings
//! - `context`: Execution context handed to nodes by the host
//! - `error`: Error types and Result alias
//! - `instance`: Running callback node instances
//! - `logging`: Subscriber setup and per-instance node loggers
//! - `node`: Node definitions, results and node traits
//! - `registry`: Node type registry

pub mod config;
pub mod context;
pub mod error;
pub mod instance;
pub mod logging;
pub mod node;
pub mod registry;

// Re-exports
pub use config::FlowSettings;
pub use context::{ClientPublisher, NodeExecutionContext, PublishingContext, WorkflowInfo};
pub use error::{Error, Result};
pub use instance::{CallbackInstance, CallbackRuntime};
pub use logging::NodeLogger;
pub use node::{
    CallbackNode, Emitter, NodeCapabilities, NodeDefinition, NodeEvent, NodePort, NodeResult,
    OutputSink, PortType, PromiseNode, ServiceConnector, ValidationResult,
};
pub use registry::{NodeFactory, NodeRegistry};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::context::{NodeExecutionContext, PublishingContext, WorkflowInfo};
    pub use super::error::{Error, Result};
    pub use super::logging::NodeLogger;
    pub use super::node::{
        CallbackNode, Emitter, NodeDefinition, NodeEvent, NodePort, NodeResult, PortType,
        PromiseNode, ValidationResult,
    };
}
