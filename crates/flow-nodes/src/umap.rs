//! UMAP node - reduces one embedding to display coordinates
//!
//! A single vector has no neighbourhood to fit, so the reduction is a
//! fixed random projection seeded by the input dimension: the same
//! embedding always lands on the same point, and embeddings of the same
//! model share one projection. Cluster assignment happens later over the
//! whole dataset.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use flow_core::prelude::*;

use crate::config::parse_config;

pub const NODE_TYPE: &str = "UMAP";

const DEFAULT_COMPONENTS: usize = 3;
const DEFAULT_NEIGHBORS: f64 = 15.0;
const DEFAULT_MIN_DIST: f64 = 0.1;
const UNCLUSTERED_COLOR: &str = "#999999";
const PROJECTION_SEED: u64 = 0x554d_4150;

pub fn definition() -> NodeDefinition {
    NodeDefinition::new(
        NODE_TYPE,
        "UMAP",
        "Reduce high-dimensional vectors to 3D coordinates using UMAP",
    )
    .with_version("1.0.19")
    .with_color("#8b5cf6")
    .with_logo("https://res.cloudinary.com/sonik/image/upload/v1753958030/gravity/icons/uMapIcon.png")
    .with_input(
        NodePort::new("embedding", PortType::Array).with_description("High-dimensional vector array"),
    )
    .with_output(NodePort::new("result", PortType::Object).with_description(
        "UMAP result with 3D coordinates, cluster ID, and color (properties: coordinates[x,y,z], clusterId, color)",
    ))
    .with_config_schema(json!({
        "type": "object",
        "properties": {
            "vector": {
                "type": "object",
                "title": "Vector",
                "description": "Vector array to embed",
                "default": "",
                "ui:field": "template"
            },
            "nComponents": {
                "type": "number",
                "title": "Components",
                "description": "Number of dimensions to reduce to",
                "default": 3,
                "minimum": 1,
                "maximum": 3
            },
            "nNeighbors": {
                "type": "number",
                "title": "Neighbors",
                "description": "Number of neighbors for UMAP",
                "default": 15,
                "minimum": 2,
                "maximum": 100
            },
            "minDist": {
                "type": "number",
                "title": "Min Distance",
                "description": "Minimum distance between points in low-dimensional space",
                "default": 0.1,
                "minimum": 0,
                "maximum": 1
            }
        }
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UmapConfig {
    #[serde(default)]
    vector: Value,
    n_components: Option<f64>,
    n_neighbors: Option<f64>,
    min_dist: Option<f64>,
}

/// A zero setting counts as unset and falls back to its default
fn given(setting: Option<f64>) -> Option<f64> {
    setting.filter(|v| *v != 0.0 && !v.is_nan())
}

impl UmapConfig {
    fn validate(&self) -> ValidationResult {
        if let Some(n) = given(self.n_components) {
            if !(1.0..=3.0).contains(&n) {
                return ValidationResult::fail("nComponents must be between 1 and 3");
            }
        }
        if let Some(n) = given(self.n_neighbors) {
            if n < 2.0 {
                return ValidationResult::fail("nNeighbors must be at least 2");
            }
        }
        if let Some(d) = given(self.min_dist) {
            if !(0.0..=1.0).contains(&d) {
                return ValidationResult::fail("minDist must be between 0 and 1");
            }
        }
        ValidationResult::ok()
    }

    fn components(&self) -> usize {
        given(self.n_components)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_COMPONENTS)
    }

    fn neighbors(&self) -> f64 {
        given(self.n_neighbors).unwrap_or(DEFAULT_NEIGHBORS)
    }

    fn min_dist(&self) -> f64 {
        given(self.min_dist).unwrap_or(DEFAULT_MIN_DIST)
    }
}

/// Read the embedding out of the `vector` config value
fn embedding(vector: &Value) -> Result<Vec<f64>> {
    let values = vector
        .as_array()
        .ok_or_else(|| Error::invalid_input("Config 'vector' must be an array of numbers"))?;
    if values.is_empty() {
        return Err(Error::invalid_input("Embedding array cannot be empty"));
    }
    values
        .iter()
        .map(|v| v.as_f64().filter(|f| f.is_finite()))
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| Error::invalid_input("All embedding values must be valid numbers"))
}

/// Project `embedding` onto `components` axes (at most 3)
pub fn project(embedding: &[f64], components: usize) -> [f64; 3] {
    let dim = embedding.len();
    let scale = 1.0 / (dim as f64).sqrt();
    let mut rng = StdRng::seed_from_u64(PROJECTION_SEED ^ dim as u64);

    let mut coords = [0.0; 3];
    for coord in coords.iter_mut().take(components.min(3)) {
        *coord = embedding
            .iter()
            .map(|x| x * rng.gen_range(-1.0_f64..1.0) * scale)
            .sum();
    }
    coords
}

pub struct UmapNode {
    logger: NodeLogger,
}

impl UmapNode {
    pub fn new(logger: NodeLogger) -> Self {
        Self { logger }
    }

    fn reduce(&self, config: &Value) -> Result<Value> {
        let config: UmapConfig = parse_config(NODE_TYPE, config)?;
        config.validate().into_result()?;

        let embedding = embedding(&config.vector)?;
        let components = config.components();
        tracing::info!(
            parent: self.logger.span(),
            dimension = embedding.len(),
            n_neighbors = config.neighbors(),
            min_dist = config.min_dist(),
            "Processing embedding"
        );

        let coordinates = project(&embedding, components);
        tracing::info!(
            parent: self.logger.span(),
            from = embedding.len(),
            to = components,
            "UMAP reduction complete"
        );

        Ok(json!({
            "coordinates": coordinates,
            "clusterId": null,
            "color": UNCLUSTERED_COLOR
        }))
    }
}

#[async_trait]
impl PromiseNode for UmapNode {
    fn definition(&self) -> NodeDefinition {
        definition()
    }

    fn validate_config(&self, config: &Value) -> ValidationResult {
        match parse_config::<UmapConfig>(NODE_TYPE, config) {
            Ok(config) => config.validate(),
            Err(e) => ValidationResult::fail(e.to_string()),
        }
    }

    async fn execute(
        &self,
        _inputs: &Map<String, Value>,
        config: &Value,
        _ctx: &NodeExecutionContext,
    ) -> Result<NodeResult> {
        match self.reduce(config) {
            Ok(result) => Ok(NodeResult::new().with_output("result", result)),
            Err(e) => {
                tracing::error!(parent: self.logger.span(), error = %e, "UMAP reduction failed");
                Err(e.context("UMAP reduction"))
            }
        }
    }
}
