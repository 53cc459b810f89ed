//! Raw distance functions for the engine's similarity spaces

use crate::engine::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Similarity space a collection is indexed in. Distances are "lower is closer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Space {
    /// 1 - cosine similarity, in [0, 2]
    Cosine,
    /// Euclidean (L2) distance
    L2,
    /// Negated inner product
    Ip,
}

impl Space {
    pub fn as_str(&self) -> &'static str {
        match self {
            Space::Cosine => "cosine",
            Space::L2 => "l2",
            Space::Ip => "ip",
        }
    }

    /// Compute the distance between two vectors in this space
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(EngineError::DimensionMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }

        Ok(match self {
            Space::Cosine => cosine_distance(a, b),
            Space::L2 => euclidean_distance(a, b),
            Space::Ip => -dot_product(a, b),
        })
    }
}

/// Compute Euclidean (L2) distance between two vectors
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Compute cosine distance between two vectors (1 - cosine similarity).
/// A zero vector has similarity 0 with everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    let similarity = dot_product(a, b) / (norm_a * norm_b);

    // Clamp to [-1, 1] to handle floating point errors
    1.0 - similarity.clamp(-1.0, 1.0)
}

/// Compute dot product of two vectors
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
