//! Note node - canvas documentation, routes nothing

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use flow_core::prelude::*;

use crate::config::parse_config;

pub const NODE_TYPE: &str = "Note";

pub fn definition() -> NodeDefinition {
    NodeDefinition::new(
        NODE_TYPE,
        "Note",
        "Add notes, documentation, and comments to your workflow",
    )
    .with_version("1.0.17")
    .with_color("#fbbf24")
    .with_logo("/icons/note-icon.svg")
    .with_config_schema(json!({
        "type": "object",
        "properties": {
            "content": {
                "type": "string",
                "title": "Note Content",
                "description": "Markdown content for the note. Supports full markdown syntax including headers, lists, code blocks, etc.",
                "default": "# Note\n\nAdd your documentation here...\n\n- Use markdown syntax\n- Create lists\n- Add **bold** or *italic* text\n- Include `code` snippets",
                "ui:widget": "textarea",
                "ui:options": { "rows": 10 }
            },
            "backgroundColor": {
                "type": "string",
                "title": "Background Color",
                "description": "Background color for the note",
                "default": "#fffbeb",
                "ui:widget": "color"
            },
            "fontSize": {
                "type": "number",
                "title": "Font Size",
                "description": "Base font size for the note content",
                "default": 14,
                "minimum": 10,
                "maximum": 24
            },
            "locked": {
                "type": "boolean",
                "title": "Lock Note",
                "description": "Lock the note to prevent moving or resizing",
                "default": false
            }
        },
        "required": ["content"]
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteConfig {
    #[serde(default)]
    content: String,
}

pub struct NoteNode {
    logger: NodeLogger,
}

impl NoteNode {
    pub fn new(logger: NodeLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl PromiseNode for NoteNode {
    fn definition(&self) -> NodeDefinition {
        definition()
    }

    async fn execute(
        &self,
        _inputs: &Map<String, Value>,
        config: &Value,
        _ctx: &NodeExecutionContext,
    ) -> Result<NodeResult> {
        // Styling fields are for the canvas only; a malformed note still routes nothing
        let content_len = parse_config::<NoteConfig>(NODE_TYPE, config)
            .map(|c| c.content.len())
            .unwrap_or(0);
        tracing::debug!(parent: self.logger.span(), content_len, "Note node executing");
        Ok(NodeResult::new())
    }
}
