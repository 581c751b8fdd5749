//! Logging setup and per-instance node loggers
//!
//! Every node instance gets its own [`NodeLogger`] at construction. The
//! logger owns a span tagged with the node type and id, so events recorded
//! through it can be told apart without a shared logger table. Events with
//! structured fields use the span directly:
//! `tracing::info!(parent: logger.span(), index, "Outputting item")`.

use std::fmt;

use tracing::Span;
use tracing_subscriber::EnvFilter;

use crate::config::{FlowSettings, LogFormat};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `settings.log_filter`. Calling this more
/// than once is harmless: later calls leave the first subscriber in place
/// and return `false`.
pub fn init_tracing(settings: &FlowSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match settings.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    installed.is_ok()
}

/// Logger bound to a single node instance
#[derive(Clone)]
pub struct NodeLogger {
    node_type: String,
    node_id: String,
    span: Span,
}

impl NodeLogger {
    /// Create a logger for the node instance `node_id` of type `node_type`
    pub fn new(node_type: impl Into<String>, node_id: impl Into<String>) -> Self {
        let node_type = node_type.into();
        let node_id = node_id.into();
        let span = tracing::info_span!("node", node_type = %node_type, node_id = %node_id);
        Self {
            node_type,
            node_id,
            span,
        }
    }

    /// Node type this logger reports for
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// Node instance id this logger reports for
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Span that parents every event of this instance
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn debug(&self, message: impl fmt::Display) {
        tracing::debug!(parent: &self.span, "{}", message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        tracing::info!(parent: &self.span, "{}", message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        tracing::warn!(parent: &self.span, "{}", message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        tracing::error!(parent: &self.span, "{}", message);
    }
}

impl fmt::Debug for NodeLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeLogger")
            .field("node_type", &self.node_type)
            .field("node_id", &self.node_id)
            .finish()
    }
}
