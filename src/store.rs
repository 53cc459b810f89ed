//! The backend adapter contract.
//!
//! [`VectorStore`] is implemented once per backend. Callers hold a
//! `Box<dyn VectorStore>` produced by the factory and never learn which
//! engine sits behind it.

use crate::error::{Result, StoreError};
use crate::filter::Filter;
use crate::types::{CollectionInfo, DistanceMetric, VectorRecord, VectorSearchResult};
use async_trait::async_trait;
use std::fmt;

/// Which kind of backend an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Embedded,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Embedded => write!(f, "embedded"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

/// A similarity query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub limit: usize,
    pub filter: Option<Filter>,
    /// Results scoring below this (after normalization) are dropped.
    pub score_threshold: Option<f32>,
    pub with_vectors: bool,
}

impl SearchRequest {
    pub fn new(vector: Vec<f32>, limit: usize) -> Self {
        Self {
            vector,
            limit,
            filter: None,
            score_threshold: None,
            with_vectors: false,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    pub fn with_vectors(mut self, with_vectors: bool) -> Self {
        self.with_vectors = with_vectors;
        self
    }
}

/// Uniform asynchronous contract over every vector backend.
///
/// Data operations fail with [`StoreError::NotInitialized`] outside the
/// `initialize()`/`close()` bracket. Both lifecycle calls are idempotent.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend(&self) -> BackendKind;

    async fn initialize(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    async fn delete_collection(&self, name: &str) -> Result<()>;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo>;

    /// Collection names, ascending.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Insert or overwrite records by id. Returns the number submitted.
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<usize>;

    async fn search(
        &self,
        collection: &str,
        request: SearchRequest,
    ) -> Result<Vec<VectorSearchResult>>;

    /// Records for the ids that exist, in request order.
    async fn get(&self, collection: &str, ids: &[String]) -> Result<Vec<VectorRecord>>;

    /// Delete by ids, by filter, or the deduplicated union of both.
    /// Returns the number of records removed.
    async fn delete(
        &self,
        collection: &str,
        ids: Option<&[String]>,
        filter: Option<&Filter>,
    ) -> Result<usize>;

    async fn count(&self, collection: &str) -> Result<usize>;
}

pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::invalid("collection name must not be empty"));
    }
    Ok(())
}

pub fn validate_dimension(dimension: usize) -> Result<()> {
    if dimension == 0 {
        return Err(StoreError::invalid("dimension must be greater than zero"));
    }
    Ok(())
}

/// Check a vector's length and that every component is finite.
pub fn validate_vector(vector: &[f32], dimension: usize) -> Result<()> {
    if vector.len() != dimension {
        return Err(StoreError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    if let Some(i) = vector.iter().position(|x| !x.is_finite()) {
        return Err(StoreError::invalid(format!(
            "vector component {} is not finite",
            i
        )));
    }
    Ok(())
}

/// Validate a whole batch before anything is written.
pub fn validate_records(records: &[VectorRecord], dimension: usize) -> Result<()> {
    for record in records {
        if record.id.is_empty() {
            return Err(StoreError::invalid("record id must not be empty"));
        }
        validate_vector(&record.vector, dimension)?;
    }
    Ok(())
}

pub fn validate_search(request: &SearchRequest, dimension: usize) -> Result<()> {
    if request.limit == 0 {
        return Err(StoreError::invalid("limit must be at least 1"));
    }
    if let Some(threshold) = request.score_threshold {
        if !threshold.is_finite() {
            return Err(StoreError::invalid("score_threshold must be finite"));
        }
    }
    validate_vector(&request.vector, dimension)?;
    if let Some(filter) = &request.filter {
        filter.validate()?;
    }
    Ok(())
}

/// At least one selector is required; a supplied filter must be well formed.
pub fn validate_delete(ids: Option<&[String]>, filter: Option<&Filter>) -> Result<()> {
    if ids.is_none() && filter.is_none() {
        return Err(StoreError::invalid("delete requires ids, a filter, or both"));
    }
    if let Some(filter) = filter {
        filter.validate()?;
    }
    Ok(())
}

/// Canonical result order: score descending, then id ascending, then
/// truncate to `limit`. Results under `threshold` are dropped first.
pub fn rank_results(
    mut results: Vec<VectorSearchResult>,
    limit: usize,
    threshold: Option<f32>,
) -> Vec<VectorSearchResult> {
    if let Some(threshold) = threshold {
        results.retain(|r| r.score >= threshold);
    }
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payload;

    fn hit(id: &str, score: f32) -> VectorSearchResult {
        VectorSearchResult {
            id: id.to_string(),
            score,
            payload: Payload::new(),
            vector: None,
        }
    }

    #[test]
    fn test_rank_results_orders_and_truncates() {
        let ranked = rank_results(
            vec![hit("c", 0.5), hit("b", 0.9), hit("a", 0.5), hit("d", 0.1)],
            3,
            Some(0.2),
        );
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_validate_vector() {
        assert!(validate_vector(&[1.0, 2.0], 2).is_ok());
        assert!(matches!(
            validate_vector(&[1.0], 2),
            Err(StoreError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            validate_vector(&[1.0, f32::NAN], 2),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_search_rejects_zero_limit() {
        let request = SearchRequest::new(vec![1.0, 0.0], 0);
        assert!(matches!(
            validate_search(&request, 2),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_delete_requires_selector() {
        assert!(validate_delete(None, None).is_err());
        let ids = vec!["a".to_string()];
        assert!(validate_delete(Some(&ids), None).is_ok());
        assert!(validate_delete(None, Some(&Filter::eq("source", "react"))).is_ok());
    }

    #[test]
    fn test_validate_names() {
        assert!(validate_collection_name("  ").is_err());
        assert!(validate_collection_name("docs").is_ok());
        assert!(validate_dimension(0).is_err());
    }
}
