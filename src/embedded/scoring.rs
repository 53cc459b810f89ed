//! Conversion from raw engine distances to normalized similarity scores.

use crate::types::DistanceMetric;

/// Map a raw distance (lower is closer) to a score in [0, 1] (higher is closer).
///
/// - cosine: `1 - d/2`, since cosine distance spans [0, 2]
/// - euclidean: `1 / (1 + d)`
/// - dot: the engine reports `-dot`, so the score is `-d` clamped to [0, 1]
pub fn distance_to_score(metric: DistanceMetric, distance: f32) -> f32 {
    let score = match metric {
        DistanceMetric::Cosine => 1.0 - distance / 2.0,
        DistanceMetric::Euclidean => 1.0 / (1.0 + distance.max(0.0)),
        DistanceMetric::Dot => -distance,
    };
    score.clamp(0.0, 1.0)
}
