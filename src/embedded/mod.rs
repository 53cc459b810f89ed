//! Embedded backend: the in-process engine behind the async contract.
//!
//! The engine is synchronous, so every call is dispatched to tokio's blocking
//! pool. The engine handle is shared as `Arc<std::sync::RwLock<Engine>>`:
//! writes hold the write lock for their whole duration, reads share it.

pub mod scoring;

use crate::engine::{Engine, EngineError, EngineSettings, Space, Where};
use crate::error::{Result, StoreError};
use crate::filter::{Filter, Range};
use crate::store::{self, BackendKind, SearchRequest, VectorStore};
use crate::types::{CollectionInfo, DistanceMetric, VectorRecord, VectorSearchResult};
use async_trait::async_trait;
use scoring::distance_to_score;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::RwLock;

const BACKEND: &str = "embedded";
const DIMENSION_KEY: &str = "dimension";
const METRIC_KEY: &str = "metric";

type SharedEngine = Arc<StdRwLock<Engine>>;

impl From<EngineError> for StoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::CollectionMissing { name } => StoreError::NotFound { name },
            EngineError::CollectionExists { name } => StoreError::AlreadyExists { name },
            EngineError::DimensionMismatch { expected, actual } => {
                StoreError::DimensionMismatch { expected, actual }
            }
            other => StoreError::unavailable(BACKEND, other.to_string()),
        }
    }
}

/// Vector store backed by an on-disk embedded engine.
pub struct EmbeddedStore {
    persist_path: PathBuf,
    settings: EngineSettings,
    engine: RwLock<Option<SharedEngine>>,
}

impl EmbeddedStore {
    /// Construct without touching the filesystem. Telemetry is always off.
    pub fn new(persist_path: impl Into<PathBuf>, checkpoint_interval: usize) -> Self {
        Self {
            persist_path: persist_path.into(),
            settings: EngineSettings {
                checkpoint_interval,
                anonymized_telemetry: false,
            },
            engine: RwLock::new(None),
        }
    }

    async fn handle(&self) -> Result<SharedEngine> {
        self.engine
            .read()
            .await
            .clone()
            .ok_or(StoreError::NotInitialized)
    }

    /// Run `f` on the blocking pool under the shared read lock.
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Engine) -> Result<T> + Send + 'static,
    {
        let engine = self.handle().await?;
        tokio::task::spawn_blocking(move || {
            let guard = engine.read().map_err(|_| poisoned())?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::unavailable(BACKEND, e.to_string()))?
    }

    /// Run `f` on the blocking pool under the exclusive write lock.
    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Engine) -> Result<T> + Send + 'static,
    {
        let engine = self.handle().await?;
        tokio::task::spawn_blocking(move || {
            let mut guard = engine.write().map_err(|_| poisoned())?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::unavailable(BACKEND, e.to_string()))?
    }
}

fn poisoned() -> StoreError {
    StoreError::unavailable(BACKEND, "engine lock poisoned")
}

fn space_for(metric: DistanceMetric) -> Space {
    match metric {
        DistanceMetric::Cosine => Space::Cosine,
        DistanceMetric::Euclidean => Space::L2,
        DistanceMetric::Dot => Space::Ip,
    }
}

fn metric_for(space: Space) -> DistanceMetric {
    match space {
        Space::Cosine => DistanceMetric::Cosine,
        Space::L2 => DistanceMetric::Euclidean,
        Space::Ip => DistanceMetric::Dot,
    }
}

/// Dimension and metric of a collection. Collections created through this
/// adapter carry both as metadata; older ones fall back to the engine space
/// and the length of any stored vector.
struct Schema {
    dimension: Option<usize>,
    metric: DistanceMetric,
}

fn schema(engine: &Engine, name: &str) -> Result<Schema> {
    let collection = engine.collection(name)?;
    let metadata = collection.metadata();
    let dimension = metadata
        .get(DIMENSION_KEY)
        .and_then(|d| d.parse().ok())
        .or_else(|| collection.peek().map(|r| r.vector.len()));
    let metric = match metadata.get(METRIC_KEY) {
        Some(m) => m.parse()?,
        None => metric_for(collection.space()),
    };
    Ok(Schema { dimension, metric })
}

/// Translate a backend-neutral filter into the engine's `where` clause.
fn to_where(filter: &Filter) -> Where {
    match filter {
        Filter::Eq { field, value } => Where::Eq(field.clone(), value.clone()),
        Filter::Ne { field, value } => Where::Ne(field.clone(), value.clone()),
        Filter::In { field, values } => Where::In(field.clone(), values.clone()),
        Filter::Range { field, range } => range_clause(field, range),
        Filter::And(children) => Where::And(children.iter().map(to_where).collect()),
        Filter::Or(children) => Where::Or(children.iter().map(to_where).collect()),
    }
}

fn range_clause(field: &str, range: &Range) -> Where {
    let bounds: [(Option<f64>, fn(String, f64) -> Where); 4] = [
        (range.gt, Where::Gt),
        (range.gte, Where::Gte),
        (range.lt, Where::Lt),
        (range.lte, Where::Lte),
    ];
    let mut clauses: Vec<Where> = bounds
        .into_iter()
        .filter_map(|(bound, make)| bound.map(|b| make(field.to_string(), b)))
        .collect();
    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        Where::And(clauses)
    }
}

#[async_trait]
impl VectorStore for EmbeddedStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Embedded
    }

    async fn initialize(&self) -> Result<()> {
        let mut slot = self.engine.write().await;
        if slot.is_some() {
            return Ok(());
        }

        let path = self.persist_path.clone();
        let settings = self.settings.clone();
        let engine = tokio::task::spawn_blocking(move || Engine::open(&path, settings))
            .await
            .map_err(|e| StoreError::unavailable(BACKEND, e.to_string()))?
            .map_err(|e| {
                tracing::error!(error = %e, "failed to open embedded engine");
                StoreError::from(e)
            })?;

        tracing::info!(path = %self.persist_path.display(), "embedded store initialized");
        *slot = Some(Arc::new(StdRwLock::new(engine)));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let Some(engine) = self.engine.write().await.take() else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || {
            let mut guard = engine.write().map_err(|_| poisoned())?;
            guard.checkpoint().map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::unavailable(BACKEND, e.to_string()))??;

        tracing::info!(path = %self.persist_path.display(), "embedded store closed");
        Ok(())
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        store::validate_collection_name(name)?;
        store::validate_dimension(dimension)?;

        let mut metadata = BTreeMap::new();
        metadata.insert(DIMENSION_KEY.to_string(), dimension.to_string());
        metadata.insert(METRIC_KEY.to_string(), metric.as_str().to_string());

        let owned = name.to_string();
        self.write(move |e| Ok(e.create_collection(&owned, space_for(metric), metadata)?))
            .await?;
        tracing::info!(collection = name, dimension, metric = %metric, "collection created");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let owned = name.to_string();
        self.write(move |e| Ok(e.delete_collection(&owned)?)).await?;
        tracing::info!(collection = name, "collection deleted");
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let owned = name.to_string();
        self.read(move |e| Ok(e.has_collection(&owned))).await
    }

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let owned = name.to_string();
        self.read(move |e| {
            let schema = schema(e, &owned)?;
            Ok(CollectionInfo {
                vector_count: e.count(&owned)?,
                name: owned,
                dimension: schema.dimension.unwrap_or(0),
                distance_metric: schema.metric,
            })
        })
        .await
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.read(|e| Ok(e.list_collections())).await
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<usize> {
        self.handle().await?;
        if records.is_empty() {
            return Ok(0);
        }

        let owned = collection.to_string();
        let count = self
            .write(move |e| {
                if let Some(dimension) = schema(e, &owned)?.dimension {
                    store::validate_records(&records, dimension)?;
                }
                let batch = records
                    .into_iter()
                    .map(|r| (r.id, r.vector, r.payload))
                    .collect();
                Ok(e.upsert(&owned, batch)?)
            })
            .await?;
        tracing::debug!(collection, count, "records upserted");
        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        request: SearchRequest,
    ) -> Result<Vec<VectorSearchResult>> {
        let owned = collection.to_string();
        let results = self
            .read(move |e| {
                let schema = schema(e, &owned)?;
                if let Some(dimension) = schema.dimension {
                    store::validate_search(&request, dimension)?;
                } else {
                    // Nothing stored and no recorded dimension: nothing can match.
                    store::validate_search(&request, request.vector.len())?;
                }
                let clause = request.filter.as_ref().map(to_where);
                // Dot scores saturate at 1.0, so the nearest `limit` by raw
                // distance may not be the head of the score ranking.
                let candidates = match schema.metric {
                    DistanceMetric::Dot => e.count(&owned)?.max(request.limit),
                    _ => request.limit,
                };
                let hits = e.query(
                    &owned,
                    &request.vector,
                    candidates,
                    clause.as_ref(),
                    request.with_vectors,
                )?;
                let results = hits
                    .into_iter()
                    .map(|hit| VectorSearchResult {
                        score: distance_to_score(schema.metric, hit.distance),
                        id: hit.id,
                        payload: hit.payload,
                        vector: hit.vector,
                    })
                    .collect();
                Ok(store::rank_results(
                    results,
                    request.limit,
                    request.score_threshold,
                ))
            })
            .await?;
        tracing::debug!(collection, hits = results.len(), "search completed");
        Ok(results)
    }

    async fn get(&self, collection: &str, ids: &[String]) -> Result<Vec<VectorRecord>> {
        let owned = collection.to_string();
        let ids = ids.to_vec();
        self.read(move |e| {
            Ok(e.get(&owned, &ids)?
                .into_iter()
                .map(|(id, r)| VectorRecord {
                    id,
                    vector: r.vector,
                    payload: r.payload,
                })
                .collect())
        })
        .await
    }

    async fn delete(
        &self,
        collection: &str,
        ids: Option<&[String]>,
        filter: Option<&Filter>,
    ) -> Result<usize> {
        store::validate_delete(ids, filter)?;

        let owned = collection.to_string();
        let ids = ids.map(<[String]>::to_vec).unwrap_or_default();
        let clause = filter.map(to_where);
        let removed = self
            .write(move |e| Ok(e.delete(&owned, &ids, clause.as_ref())?))
            .await?;
        tracing::debug!(collection, removed, "records deleted");
        Ok(removed)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let owned = collection.to_string();
        self.read(move |e| Ok(e.count(&owned)?)).await
    }
}
