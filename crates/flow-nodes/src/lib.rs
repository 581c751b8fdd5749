//! Flow control nodes for workflow runtimes
//!
//! # Node types
//!
//! - `Code`: pass through a resolved value, optionally with content ids
//! - `IfElse`: route inputs by a resolved condition
//! - `Loop`: emit array items one at a time (callback node)
//! - `Context`: expose user, conversation and run identity
//! - `Relay`: forward a signal without waiting
//! - `Note`: canvas documentation
//! - `UMAP`: reduce an embedding to display coordinates
//! - `MCP`: schema-described service node
//! - `FieldValidator`: report missing fields against a schema
//! - `Suggestions`: publish FAQs, actions and recommendations to the client
//!
//! [`FlowPlugin::setup`] registers all of them with a [`flow_core::NodeRegistry`].

pub mod code;
pub mod config;
pub mod context_node;
pub mod field_validator;
pub mod if_else;
pub mod loop_node;
pub mod mcp;
pub mod note;
pub mod plugin;
pub mod relay;
pub mod suggestions;
pub mod umap;
pub mod value;

pub use code::CodeNode;
pub use context_node::ContextNode;
pub use field_validator::FieldValidatorNode;
pub use if_else::IfElseNode;
pub use loop_node::{LoopNode, LoopPhase, LoopState};
pub use mcp::McpNode;
pub use note::NoteNode;
pub use plugin::FlowPlugin;
pub use relay::RelayNode;
pub use suggestions::SuggestionsNode;
pub use umap::UmapNode;
