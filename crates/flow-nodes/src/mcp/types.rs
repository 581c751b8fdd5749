//! MCP service schema and request/response messages

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input and output schema of one service method
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodSchema {
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Value,
}

/// Service schema held in the node configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSchema {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub methods: BTreeMap<String, MethodSchema>,
}

impl ServiceSchema {
    pub fn method(&self, name: &str) -> Option<&MethodSchema> {
        self.methods.get(name)
    }
}

/// Request emitted on the `request` port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub request_id: String,
    pub schema: MethodSchema,
}

/// Response arriving on the `response` input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub request_id: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Value,
}

impl ServiceResponse {
    /// Error message carried by the response, if it reports a failure
    pub fn error_message(&self) -> Option<String> {
        match &self.error {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_parses_partial_definitions() {
        let schema: ServiceSchema = serde_json::from_value(json!({
            "name": "docs",
            "methods": {
                "getChunksByQuery": { "input": { "type": "object", "properties": {} } }
            }
        }))
        .unwrap();
        assert_eq!(schema.name, "docs");
        assert!(schema.method("getChunksByQuery").is_some());
        assert_eq!(schema.method("getChunksByQuery").unwrap().output, Value::Null);
    }

    #[test]
    fn test_response_error_message() {
        let ok: ServiceResponse =
            serde_json::from_value(json!({ "requestId": "r", "result": [1] })).unwrap();
        assert_eq!(ok.error_message(), None);

        let failed: ServiceResponse =
            serde_json::from_value(json!({ "requestId": "r", "error": "no index" })).unwrap();
        assert_eq!(failed.error_message().as_deref(), Some("no index"));
    }

    #[test]
    fn test_request_wire_shape() {
        let request = ServiceRequest {
            method: "search".to_string(),
            params: json!({ "q": "rust" }),
            request_id: "exec-1-1-0".to_string(),
            schema: MethodSchema::default(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["requestId"], "exec-1-1-0");
        assert_eq!(value["params"]["q"], "rust");
    }
}
