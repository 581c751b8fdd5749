//! Per-node configuration parsing

use serde::de::DeserializeOwned;
use serde_json::Value;

use flow_core::{Error, Result};

/// Deserialize a node's resolved configuration.
///
/// A missing (`null`) configuration yields the config type's default.
pub fn parse_config<T>(node_type: &str, config: &Value) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if config.is_null() {
        return Ok(T::default());
    }
    T::deserialize(config)
        .map_err(|e| Error::invalid_config(format!("{} config: {}", node_type, e)))
}
