//! Suggestions node - publishes FAQs, actions and recommendations to the client

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use flow_core::prelude::*;
use flow_core::PublishingContext;

use crate::value::is_truthy;

pub const NODE_TYPE: &str = "Suggestions";

/// Client message type for suggestion updates
pub const SUGGESTIONS_UPDATE: &str = "SUGGESTIONS_UPDATE";

const LISTS: [&str; 3] = ["faqs", "actions", "recommendations"];

pub fn definition() -> NodeDefinition {
    NodeDefinition::new(
        NODE_TYPE,
        "Suggestions",
        "Publish FAQs, Actions, and Recommendations to the client UI",
    )
    .with_version("1.1.1")
    .with_color("#8B5CF6")
    .with_logo("https://res.cloudinary.com/sonik/image/upload/v1751366180/gravity/icons/gravityIcon.png")
    .with_input(
        NodePort::new("signal", PortType::Any).with_description("Signal containing suggestions data"),
    )
    .with_output(
        NodePort::new("suggestions", PortType::Object)
            .with_description("The suggestions object that was published"),
    )
    .with_config_schema(json!({
        "type": "object",
        "properties": {
            "faqs": {
                "type": "object",
                "title": "FAQs",
                "description": "Static FAQs (can be overridden by input)",
                "ui:field": "template"
            },
            "actions": {
                "type": "object",
                "title": "Actions",
                "description": "Static Actions (can be overridden by input)",
                "ui:field": "template"
            },
            "recommendations": {
                "type": "object",
                "title": "Recommendations",
                "description": "Static Recommendations (can be overridden by input)",
                "ui:field": "template"
            }
        },
        "required": []
    }))
}

/// The published suggestion lists.
///
/// Each list is forwarded exactly as the signal or config carried it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub faqs: Value,
    pub actions: Value,
    pub recommendations: Value,
}

impl Default for Suggestions {
    fn default() -> Self {
        Self {
            faqs: json!([]),
            actions: json!([]),
            recommendations: json!([]),
        }
    }
}

impl Suggestions {
    /// Pick each list from the first source carrying a truthy value for it
    pub fn resolve(signal: Option<&Value>, config: &Value) -> Self {
        let pick = |key: &str| {
            [signal, Some(config)]
                .into_iter()
                .flatten()
                .filter_map(|source| source.get(key))
                .find(|list| is_truthy(list))
                .cloned()
                .unwrap_or_else(|| json!([]))
        };
        Self {
            faqs: pick("faqs"),
            actions: pick("actions"),
            recommendations: pick("recommendations"),
        }
    }
}

fn count(list: &Value) -> usize {
    list.as_array().map(Vec::len).unwrap_or(0)
}

/// Message sent to the client connection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionsUpdate<'a> {
    #[serde(rename = "type")]
    message_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_id: Option<&'a str>,
    conversation_id: &'a str,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow_id: Option<&'a str>,
    workflow_run_id: &'a str,
    suggestions: &'a Suggestions,
    timestamp: String,
}

fn has_suggestion_lists(value: &Value) -> bool {
    LISTS
        .iter()
        .any(|key| value.get(key).map(is_truthy).unwrap_or(false))
}

/// Locate suggestion data in the `signal` input.
///
/// Accepts the lists directly on the signal, on its first source entry, or on
/// that entry's first output handle.
pub fn extract_signal_data(inputs: &Map<String, Value>) -> Option<&Value> {
    let signal = inputs.get("signal").filter(|s| s.is_object())?;
    if has_suggestion_lists(signal) {
        return Some(signal);
    }

    let source = signal.as_object()?.values().next()?;
    if has_suggestion_lists(source) {
        return Some(source);
    }

    let handle = source.as_object()?.values().next()?;
    has_suggestion_lists(handle).then_some(handle)
}

pub struct SuggestionsNode {
    logger: NodeLogger,
}

impl SuggestionsNode {
    pub fn new(logger: NodeLogger) -> Self {
        Self { logger }
    }

    async fn publish(
        &self,
        suggestions: &Suggestions,
        publishing: &PublishingContext,
        ctx: &NodeExecutionContext,
    ) {
        let Some(publisher) = ctx.publisher() else {
            self.logger.debug("Client publisher not available");
            return;
        };

        let message = SuggestionsUpdate {
            message_type: SUGGESTIONS_UPDATE,
            chat_id: publishing.chat_id.as_deref(),
            conversation_id: &publishing.conversation_id,
            user_id: &publishing.user_id,
            workflow_id: ctx.workflow_id(),
            workflow_run_id: &ctx.execution_id,
            suggestions,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let message = match serde_json::to_value(&message) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(parent: self.logger.span(), error = %e, "Failed to encode suggestions update");
                return;
            }
        };

        match publisher
            .send(&publishing.user_id, &publishing.conversation_id, message)
            .await
        {
            Ok(true) => tracing::info!(
                parent: self.logger.span(),
                user_id = %publishing.user_id,
                conversation_id = %publishing.conversation_id,
                "Suggestions sent to client"
            ),
            Ok(false) => self.logger.debug("No client connection found for suggestions"),
            Err(e) => tracing::warn!(
                parent: self.logger.span(),
                error = %e,
                "Failed to publish suggestions (non-blocking)"
            ),
        }
    }
}

#[async_trait]
impl PromiseNode for SuggestionsNode {
    fn definition(&self) -> NodeDefinition {
        definition()
    }

    async fn execute(
        &self,
        inputs: &Map<String, Value>,
        config: &Value,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeResult> {
        let suggestions = Suggestions::resolve(extract_signal_data(inputs), config);

        tracing::info!(
            parent: self.logger.span(),
            faqs = count(&suggestions.faqs),
            actions = count(&suggestions.actions),
            recommendations = count(&suggestions.recommendations),
            "Suggestions resolved"
        );

        match &ctx.publishing {
            Some(publishing) => self.publish(&suggestions, publishing, ctx).await,
            None => self
                .logger
                .warn("Publishing context not available - suggestions not sent to client"),
        }

        Ok(NodeResult::new().with_output("suggestions", serde_json::to_value(&suggestions)?))
    }
}
