//! Hybrid retrieval: weighted fusion of vector and keyword rankings.
//!
//! ```text
//! combined(id) = vector_weight * vector_score(id) + keyword_weight * keyword_score(id)
//! ```
//!
//! A term missing from one list contributes zero. Vector retrieval is the
//! primary channel and its failure fails the search; a keyword failure only
//! degrades the response to vector-only ranking.

use crate::error::{Result, StoreError};
use crate::filter::Filter;
use crate::store::{SearchRequest, VectorStore};
use crate::types::{Payload, VectorSearchResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fusion weights and limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub vector_weight: f32,
    pub keyword_weight: f32,
    /// Fused results scoring below this are dropped.
    pub min_score: f32,
    /// Each channel is asked for `limit * candidate_multiplier` candidates.
    pub candidate_multiplier: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            vector_weight: 0.7,
            keyword_weight: 0.3,
            min_score: 0.0,
            candidate_multiplier: 2,
        }
    }
}

/// One keyword-index match. `score` is expected in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

/// External lexical index whose ids align with vector-store record ids.
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    async fn search(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<KeywordHit>>;
}

/// A fused result with both component scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridHit {
    pub id: String,
    pub score: f32,
    pub vector_score: Option<f32>,
    pub keyword_score: Option<f32>,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridResponse {
    pub hits: Vec<HybridHit>,
    /// Set when the keyword channel failed and ranking is vector-only.
    pub degraded: bool,
}

/// A query for both channels.
#[derive(Debug, Clone)]
pub struct HybridQuery {
    pub collection: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub limit: usize,
    pub filter: Option<Filter>,
}

pub struct HybridScorer {
    config: HybridConfig,
}

impl HybridScorer {
    pub fn new(config: HybridConfig) -> Result<Self> {
        for (name, weight) in [
            ("vector_weight", config.vector_weight),
            ("keyword_weight", config.keyword_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(StoreError::invalid(format!(
                    "{} must be finite and non-negative, got {}",
                    name, weight
                )));
            }
        }
        if !config.min_score.is_finite() {
            return Err(StoreError::invalid("min_score must be finite"));
        }
        if config.candidate_multiplier == 0 {
            return Err(StoreError::invalid("candidate_multiplier must be at least 1"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    /// Merge two ranked lists into one, keyed by id.
    pub fn fuse(
        &self,
        vector: &[VectorSearchResult],
        keyword: &[KeywordHit],
        limit: usize,
    ) -> Vec<HybridHit> {
        let mut merged: HashMap<&str, HybridHit> = HashMap::new();

        for hit in vector {
            merged.entry(hit.id.as_str()).or_insert_with(|| HybridHit {
                id: hit.id.clone(),
                score: 0.0,
                vector_score: Some(hit.score),
                keyword_score: None,
                payload: hit.payload.clone(),
            });
        }
        for hit in keyword {
            let entry = merged.entry(hit.id.as_str()).or_insert_with(|| HybridHit {
                id: hit.id.clone(),
                score: 0.0,
                vector_score: None,
                keyword_score: None,
                payload: hit.payload.clone(),
            });
            // First occurrence wins; the vector payload is never replaced.
            if entry.keyword_score.is_none() {
                entry.keyword_score = Some(hit.score);
            }
        }

        let mut hits: Vec<HybridHit> = merged
            .into_values()
            .map(|mut hit| {
                hit.score = self.config.vector_weight * hit.vector_score.unwrap_or(0.0)
                    + self.config.keyword_weight * hit.keyword_score.unwrap_or(0.0);
                hit
            })
            .filter(|hit| hit.score >= self.config.min_score)
            .collect();
        sort_and_truncate(&mut hits, limit);
        hits
    }

    /// Query both channels concurrently and fuse the results.
    pub async fn search(
        &self,
        store: &dyn VectorStore,
        keywords: &dyn KeywordIndex,
        query: HybridQuery,
    ) -> Result<HybridResponse> {
        if query.limit == 0 {
            return Err(StoreError::invalid("limit must be at least 1"));
        }
        let candidates = query.limit.saturating_mul(self.config.candidate_multiplier);

        let mut request = SearchRequest::new(query.vector.clone(), candidates);
        if let Some(filter) = &query.filter {
            request = request.with_filter(filter.clone());
        }

        let (vector, keyword) = tokio::join!(
            store.search(&query.collection, request),
            keywords.search(
                &query.collection,
                &query.text,
                candidates,
                query.filter.as_ref()
            ),
        );
        let vector = vector?;

        match keyword {
            Ok(keyword) => Ok(HybridResponse {
                hits: self.fuse(&vector, &keyword, query.limit),
                degraded: false,
            }),
            Err(e) => {
                tracing::warn!(
                    collection = %query.collection,
                    error = %e,
                    "keyword search failed; falling back to vector-only ranking"
                );
                Ok(HybridResponse {
                    hits: self.vector_only(vector, query.limit),
                    degraded: true,
                })
            }
        }
    }

    /// Degraded ranking: raw vector scores, still floored by `min_score`.
    fn vector_only(&self, vector: Vec<VectorSearchResult>, limit: usize) -> Vec<HybridHit> {
        let mut hits: Vec<HybridHit> = vector
            .into_iter()
            .filter(|r| r.score >= self.config.min_score)
            .map(|r| HybridHit {
                id: r.id,
                score: r.score,
                vector_score: Some(r.score),
                keyword_score: None,
                payload: r.payload,
            })
            .collect();
        sort_and_truncate(&mut hits, limit);
        hits
    }
}

fn sort_and_truncate(hits: &mut Vec<HybridHit>, limit: usize) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(limit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn vhit(id: &str, score: f32) -> VectorSearchResult {
        VectorSearchResult {
            id: id.to_string(),
            score,
            payload: Payload::new(),
            vector: None,
        }
    }

    fn khit(id: &str, score: f32) -> KeywordHit {
        KeywordHit {
            id: id.to_string(),
            score,
            payload: Payload::new(),
        }
    }

    fn scorer() -> HybridScorer {
        HybridScorer::new(HybridConfig::default()).unwrap()
    }

    #[test]
    fn test_weighted_fusion() {
        let hits = scorer().fuse(&[vhit("a", 0.9)], &[khit("a", 0.5), khit("b", 0.8)], 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_relative_eq!(hits[0].score, 0.78, epsilon = 1e-6);
        assert_eq!(hits[0].keyword_score, Some(0.5));
        assert_eq!(hits[1].id, "b");
        assert_relative_eq!(hits[1].score, 0.24, epsilon = 1e-6);
        assert_eq!(hits[1].vector_score, None);
    }

    #[test]
    fn test_vector_payload_wins() {
        let mut v = vhit("a", 0.5);
        v.payload = json!({"source": "vector"}).as_object().cloned().unwrap();
        let mut k = khit("a", 0.5);
        k.payload = json!({"source": "keyword"}).as_object().cloned().unwrap();

        let hits = scorer().fuse(&[v], &[k], 10);
        assert_eq!(hits[0].payload["source"], "vector");
    }

    #[test]
    fn test_min_score_and_limit() {
        let config = HybridConfig {
            min_score: 0.3,
            ..HybridConfig::default()
        };
        let scorer = HybridScorer::new(config).unwrap();
        let hits = scorer.fuse(
            &[vhit("a", 0.9), vhit("b", 0.8), vhit("c", 0.1)],
            &[],
            1,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn test_first_keyword_occurrence_used() {
        let hits = scorer().fuse(&[], &[khit("a", 1.0), khit("a", 0.1)], 10);
        assert_relative_eq!(hits[0].score, 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_rejects_bad_weights() {
        let negative = HybridConfig {
            keyword_weight: -0.1,
            ..HybridConfig::default()
        };
        assert!(HybridScorer::new(negative).is_err());
        let nan = HybridConfig {
            vector_weight: f32::NAN,
            ..HybridConfig::default()
        };
        assert!(HybridScorer::new(nan).is_err());
    }

    proptest! {
        #[test]
        fn prop_fused_output_is_ordered(
            vscores in proptest::collection::vec(0.0f32..=1.0, 0..20),
            kscores in proptest::collection::vec(0.0f32..=1.0, 0..20),
            limit in 1usize..30,
        ) {
            let vector: Vec<_> = vscores.iter().enumerate().map(|(i, s)| vhit(&format!("d{}", i), *s)).collect();
            let keyword: Vec<_> = kscores.iter().enumerate().map(|(i, s)| khit(&format!("d{}", i * 2), *s)).collect();
            let hits = scorer().fuse(&vector, &keyword, limit);

            prop_assert!(hits.len() <= limit);
            for pair in hits.windows(2) {
                prop_assert!(
                    pair[0].score > pair[1].score
                        || (pair[0].score == pair[1].score && pair[0].id < pair[1].id)
                );
            }
        }
    }
}
