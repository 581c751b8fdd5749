//! FieldValidator node - reports which schema fields the incoming data still lacks
//!
//! Three schema shapes are understood:
//! 1. Tool schema: `{inputSchema: {json: {properties, required}}}`
//! 2. JSON Schema: `{properties, required}`
//! 3. A plain object whose keys are the fields

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use flow_core::prelude::*;

use crate::config::parse_config;
use crate::value::is_missing;

pub const NODE_TYPE: &str = "FieldValidator";

pub fn definition() -> NodeDefinition {
    NodeDefinition::new(
        NODE_TYPE,
        "Field Validator",
        "Validate data against schema and output next missing field",
    )
    .with_version("1.0.20")
    .with_color("#8b5cf6")
    .with_logo("https://res.cloudinary.com/sonik/image/upload/v1750052178/gravity/icons/6359572-200.png")
    .with_input(
        NodePort::new("signal", PortType::Object).with_description("Incoming data object to validate"),
    )
    .with_output(NodePort::new("nextField", PortType::String).with_description("Next missing field name"))
    .with_output(
        NodePort::new("nextFieldSchema", PortType::Object)
            .with_description("Schema definition for next field"),
    )
    .with_output(NodePort::new("missingFields", PortType::Array).with_description("All missing fields"))
    .with_output(NodePort::new("isComplete", PortType::Boolean).with_description("All fields present"))
    .with_output(
        NodePort::new("completionPercentage", PortType::Number).with_description("Data coverage %"),
    )
    .with_config_schema(json!({
        "type": "object",
        "properties": {
            "requiredSchema": {
                "type": "object",
                "title": "Required Schema",
                "description": "Schema defining required fields. Supports: 1) Tool schema format (inputSchema.json.properties), 2) JSON Schema (properties), 3) Direct object. Example: return signal.toolSchema",
                "default": "",
                "ui:field": "template"
            },
            "incomingData": {
                "type": "object",
                "title": "Incoming Data",
                "description": "Data object to validate. Use: return signal.data or return input.formData",
                "default": "",
                "ui:field": "template"
            }
        },
        "required": ["requiredSchema", "incomingData"]
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValidatorConfig {
    #[serde(default)]
    required_schema: Value,
    #[serde(default)]
    incoming_data: Value,
}

/// Fields extracted from a schema, in schema order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaInfo {
    pub field_names: Vec<String>,
    pub required: Vec<String>,
    pub properties: Map<String, Value>,
}

impl SchemaInfo {
    fn from_properties(properties: &Map<String, Value>, required: Option<&Value>) -> Self {
        let required = required
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            field_names: properties.keys().cloned().collect(),
            required,
            properties: properties.clone(),
        }
    }

    /// Read field information from any of the supported schema shapes
    pub fn extract(schema: &Value) -> Self {
        let Some(schema) = schema.as_object() else {
            return Self::default();
        };

        let tool = schema.get("inputSchema").and_then(|s| s.get("json"));
        if let Some(properties) = tool.and_then(|t| t.get("properties")).and_then(Value::as_object) {
            return Self::from_properties(properties, tool.and_then(|t| t.get("required")));
        }

        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            return Self::from_properties(properties, schema.get("required"));
        }

        Self::from_properties(schema, None)
    }
}

/// Validation outcome for one data object
#[derive(Debug, Clone, PartialEq)]
pub struct FieldReport {
    pub next_field: Option<String>,
    pub next_field_schema: Option<Value>,
    pub missing_fields: Vec<String>,
    pub is_complete: bool,
    pub completion_percentage: u32,
}

impl FieldReport {
    pub fn evaluate(schema: &SchemaInfo, data: &Value) -> Self {
        let missing_fields: Vec<String> = match data.as_object() {
            Some(data) => schema
                .field_names
                .iter()
                .filter(|f| is_missing(data.get(f.as_str())))
                .cloned()
                .collect(),
            None => schema.field_names.clone(),
        };

        // Required fields first, then schema order
        let next_field = missing_fields
            .iter()
            .find(|f| schema.required.contains(f))
            .or_else(|| missing_fields.first())
            .cloned();
        let next_field_schema = next_field
            .as_ref()
            .and_then(|f| schema.properties.get(f))
            .cloned();

        let total = schema.field_names.len();
        let completion_percentage = if total == 0 {
            100
        } else {
            let filled = (total - missing_fields.len()) as f64;
            (filled / total as f64 * 100.0).round() as u32
        };

        Self {
            next_field,
            next_field_schema,
            is_complete: missing_fields.is_empty(),
            missing_fields,
            completion_percentage,
        }
    }

    pub fn to_result(&self) -> NodeResult {
        let mut result = NodeResult::new();
        if let Some(field) = &self.next_field {
            result = result.with_output("nextField", field.as_str());
        }
        if let Some(schema) = &self.next_field_schema {
            result = result.with_output("nextFieldSchema", schema.clone());
        }
        result
            .with_output("missingFields", self.missing_fields.clone())
            .with_output("isComplete", self.is_complete)
            .with_output("completionPercentage", self.completion_percentage)
    }
}

pub struct FieldValidatorNode {
    logger: NodeLogger,
}

impl FieldValidatorNode {
    pub fn new(logger: NodeLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl PromiseNode for FieldValidatorNode {
    fn definition(&self) -> NodeDefinition {
        definition()
    }

    async fn execute(
        &self,
        _inputs: &Map<String, Value>,
        config: &Value,
        _ctx: &NodeExecutionContext,
    ) -> Result<NodeResult> {
        let config: FieldValidatorConfig = parse_config(NODE_TYPE, config)
            .map_err(|e| e.context("FieldValidator execution"))?;

        if !config.required_schema.is_object() {
            self.logger.warn("Invalid schema provided, no fields to validate");
        }
        let schema = SchemaInfo::extract(&config.required_schema);
        let report = FieldReport::evaluate(&schema, &config.incoming_data);

        tracing::info!(
            parent: self.logger.span(),
            missing = report.missing_fields.len(),
            fields = schema.field_names.len(),
            next_field = report.next_field.as_deref().unwrap_or("none"),
            "Fields validated"
        );
        Ok(report.to_result())
    }
}
