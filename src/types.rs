//! Data model shared by the adapter contract, the adapters and the hybrid scorer.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// String-keyed metadata stored alongside a vector.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Distance metric a collection is created with. Fixed for the collection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine distance (1 - cosine similarity)
    Cosine,
    /// Euclidean (L2) distance
    Euclidean,
    /// Inner product
    Dot,
}

impl DistanceMetric {
    pub const ALL: [DistanceMetric; 3] = [
        DistanceMetric::Cosine,
        DistanceMetric::Euclidean,
        DistanceMetric::Dot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Dot => "dot",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = StoreError;

    /// Unknown names are rejected rather than defaulted to cosine.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "dot" | "ip" | "inner_product" => Ok(DistanceMetric::Dot),
            other => Err(StoreError::config(
                "distance_metric",
                format!(
                    "unknown distance metric '{}'; expected one of: cosine, euclidean, dot",
                    other
                ),
            )),
        }
    }
}

/// A record to write into a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub payload: Payload,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            payload: Payload::new(),
        }
    }

    /// Replace the payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Add a single payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// A single similarity search hit. `score` is normalized to [0, 1], higher is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchResult {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Schema and size of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub distance_metric: DistanceMetric,
    /// Snapshot at the time of the call; not authoritative afterwards.
    pub vector_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_parse_aliases() {
        assert_eq!("Cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert_eq!("IP".parse::<DistanceMetric>().unwrap(), DistanceMetric::Dot);
    }

    #[test]
    fn test_metric_parse_unknown_is_configuration_error() {
        let err = "manhattan".parse::<DistanceMetric>().unwrap_err();
        assert!(matches!(err, StoreError::Configuration { ref setting, .. } if setting == "distance_metric"));
    }

    #[test]
    fn test_metric_display_roundtrip() {
        for metric in DistanceMetric::ALL {
            assert_eq!(metric.to_string().parse::<DistanceMetric>().unwrap(), metric);
        }
    }

    #[test]
    fn test_record_builder() {
        let record = VectorRecord::new("a", vec![1.0, 2.0])
            .with_field("source", "react")
            .with_field("version", 18);
        assert_eq!(record.dimension(), 2);
        assert_eq!(record.payload["source"], "react");
        assert_eq!(record.payload["version"], 18);
    }

    #[test]
    fn test_search_result_omits_vector_when_absent() {
        let hit = VectorSearchResult {
            id: "a".into(),
            score: 0.5,
            payload: Payload::new(),
            vector: None,
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert!(json.get("vector").is_none());
    }
}
