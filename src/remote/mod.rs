//! Remote backend: a Qdrant service reached over gRPC.
//!
//! The client keeps its own channel pool; in-flight requests are bounded by a
//! semaphore. Collection schema is always read live from the server.

pub mod convert;

use crate::error::{Result, StoreError};
use crate::filter::Filter;
use crate::store::{self, BackendKind, SearchRequest, VectorStore};
use crate::types::{CollectionInfo, DistanceMetric, VectorRecord, VectorSearchResult};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    vectors_config, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder,
    GetPointsBuilder, HnswConfigDiffBuilder, OptimizersConfigDiffBuilder, PointStruct,
    QueryPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};

const BACKEND: &str = "remote";
/// Default gRPC port of a self-hosted server.
pub const DEFAULT_GRPC_PORT: u16 = 6334;

/// Where the remote service lives.
#[derive(Clone, PartialEq, Eq)]
pub enum RemoteEndpoint {
    /// Hosted service: URL plus API key.
    Managed { url: String, api_key: String },
    /// Operator-run server: host plus gRPC port, no key.
    SelfHosted { host: String, port: u16 },
}

impl RemoteEndpoint {
    pub fn url(&self) -> String {
        match self {
            RemoteEndpoint::Managed { url, .. } => url.clone(),
            RemoteEndpoint::SelfHosted { host, port } => format!("http://{}:{}", host, port),
        }
    }
}

impl fmt::Debug for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteEndpoint::Managed { url, .. } => f
                .debug_struct("Managed")
                .field("url", url)
                .field("api_key", &"<redacted>")
                .finish(),
            RemoteEndpoint::SelfHosted { host, port } => f
                .debug_struct("SelfHosted")
                .field("host", host)
                .field("port", port)
                .finish(),
        }
    }
}

/// Connection settings for [`RemoteStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSettings {
    pub endpoint: RemoteEndpoint,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Upper bound on concurrent in-flight requests.
    pub max_concurrent_requests: usize,
}

impl RemoteSettings {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            max_concurrent_requests: 32,
        }
    }
}

struct Schema {
    dimension: usize,
    metric: DistanceMetric,
    points: usize,
}

/// Vector store backed by a Qdrant server.
pub struct RemoteStore {
    settings: RemoteSettings,
    client: RwLock<Option<Arc<Qdrant>>>,
    permits: Arc<Semaphore>,
}

impl RemoteStore {
    /// Construct without any network I/O.
    pub fn new(settings: RemoteSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1)));
        Self {
            settings,
            client: RwLock::new(None),
            permits,
        }
    }

    /// The live client plus a request permit held for the caller's request.
    async fn client(&self) -> Result<(Arc<Qdrant>, OwnedSemaphorePermit)> {
        let client = self
            .client
            .read()
            .await
            .clone()
            .ok_or(StoreError::NotInitialized)?;
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| StoreError::unavailable(BACKEND, e.to_string()))?;
        Ok((client, permit))
    }

    async fn schema(&self, client: &Qdrant, name: &str) -> Result<Schema> {
        let info = client
            .collection_info(name)
            .await
            .map_err(|e| convert::classify(e, name))?
            .result
            .ok_or_else(|| StoreError::not_found(name))?;

        let params = info
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        let (dimension, metric) = match params {
            Some(vectors_config::Config::Params(p)) => (p.size as usize, convert::from_distance(p.distance)?),
            _ => {
                return Err(StoreError::unavailable(
                    BACKEND,
                    format!("collection {} has no single dense vector config", name),
                ))
            }
        };

        Ok(Schema {
            dimension,
            metric,
            points: info.points_count.unwrap_or(0) as usize,
        })
    }

    async fn exact_count(&self, client: &Qdrant, name: &str) -> Result<usize> {
        let response = client
            .count(CountPointsBuilder::new(name).exact(true))
            .await
            .map_err(|e| convert::classify(e, name))?;
        Ok(response.result.map_or(0, |r| r.count as usize))
    }
}

#[async_trait]
impl VectorStore for RemoteStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn initialize(&self) -> Result<()> {
        let mut slot = self.client.write().await;
        if slot.is_some() {
            return Ok(());
        }

        let url = self.settings.endpoint.url();
        let mut builder = Qdrant::from_url(&url)
            .timeout(self.settings.timeout)
            .connect_timeout(self.settings.connect_timeout);
        if let RemoteEndpoint::Managed { api_key, .. } = &self.settings.endpoint {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::unavailable(BACKEND, e.to_string()))?;

        client.health_check().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "remote health check failed");
            StoreError::unavailable(BACKEND, e.to_string())
        })?;

        tracing::info!(url = %url, "remote store initialized");
        *slot = Some(Arc::new(client));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.client.write().await.take().is_some() {
            tracing::info!(url = %self.settings.endpoint.url(), "remote store closed");
        }
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
        let (client, _permit) = self.client().await?;

        if client
            .collection_exists(name)
            .await
            .map_err(|e| convert::classify(e, name))?
        {
            return Err(StoreError::already_exists(name));
        }

        client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(
                        dimension as u64,
                        convert::to_distance(metric),
                    ))
                    .hnsw_config(HnswConfigDiffBuilder::default().m(16).ef_construct(100))
                    .optimizers_config(OptimizersConfigDiffBuilder::default().indexing_threshold(100)),
            )
            .await
            .map_err(|e| convert::classify(e, name))?;

        tracing::info!(collection = name, dimension, metric = %metric, "collection created");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let (client, _permit) = self.client().await?;
        if !client
            .collection_exists(name)
            .await
            .map_err(|e| convert::classify(e, name))?
        {
            return Err(StoreError::not_found(name));
        }
        client
            .delete_collection(name)
            .await
            .map_err(|e| convert::classify(e, name))?;
        tracing::info!(collection = name, "collection deleted");
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let (client, _permit) = self.client().await?;
        client
            .collection_exists(name)
            .await
            .map_err(|e| convert::classify(e, name))
    }

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let (client, _permit) = self.client().await?;
        let schema = self.schema(&client, name).await?;
        Ok(CollectionInfo {
            name: name.to_string(),
            dimension: schema.dimension,
            distance_metric: schema.metric,
            vector_count: schema.points,
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let (client, _permit) = self.client().await?;
        let response = client
            .list_collections()
            .await
            .map_err(|e| StoreError::unavailable(BACKEND, e.to_string()))?;
        let mut names: Vec<String> = response.collections.into_iter().map(|c| c.name).collect();
        names.sort();
        Ok(names)
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<usize> {
        let (client, _permit) = self.client().await?;
        if records.is_empty() {
            return Ok(0);
        }

        let schema = self.schema(&client, collection).await?;
        store::validate_records(&records, schema.dimension)?;

        // Last occurrence of a repeated id wins, as with sequential writes.
        let mut order: Vec<String> = Vec::with_capacity(records.len());
        let mut latest: HashMap<String, VectorRecord> = HashMap::with_capacity(records.len());
        for record in records.iter() {
            if !latest.contains_key(&record.id) {
                order.push(record.id.clone());
            }
            latest.insert(record.id.clone(), record.clone());
        }
        let points: Vec<PointStruct> = order
            .iter()
            .filter_map(|id| latest.remove(id))
            .map(|r| {
                PointStruct::new(
                    convert::point_id(&r.id),
                    r.vector,
                    convert::to_point_payload(&r.id, &r.payload),
                )
            })
            .collect();

        client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| {
                tracing::error!(collection, error = %e, "upsert failed");
                convert::classify(e, collection)
            })?;

        tracing::debug!(collection, count = records.len(), "records upserted");
        Ok(records.len())
    }

    async fn search(
        &self,
        collection: &str,
        request: SearchRequest,
    ) -> Result<Vec<VectorSearchResult>> {
        let (client, _permit) = self.client().await?;
        let schema = self.schema(&client, collection).await?;
        store::validate_search(&request, schema.dimension)?;

        let mut query = QueryPointsBuilder::new(collection)
            .query(request.vector.clone())
            .limit(request.limit as u64)
            .with_payload(true)
            .with_vectors(request.with_vectors);
        if let Some(filter) = &request.filter {
            query = query.filter(convert::to_qdrant_filter(filter)?);
        }
        if let Some(bound) = request
            .score_threshold
            .and_then(|t| convert::native_threshold(schema.metric, t))
        {
            query = query.score_threshold(bound);
        }

        let response = client
            .query(query)
            .await
            .map_err(|e| convert::classify(e, collection))?;

        let results = convert::to_results(schema.metric, response.result, &request);
        tracing::debug!(collection, hits = results.len(), "search completed");
        Ok(results)
    }

    async fn get(&self, collection: &str, ids: &[String]) -> Result<Vec<VectorRecord>> {
        let (client, _permit) = self.client().await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let point_ids = ids.iter().map(|id| convert::point_id(id)).collect::<Vec<_>>();
        let response = client
            .get_points(
                GetPointsBuilder::new(collection, point_ids)
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| convert::classify(e, collection))?;

        let found: HashMap<String, VectorRecord> = response
            .result
            .into_iter()
            .map(|point| {
                let (id, payload) = convert::from_point_payload(point.id.as_ref(), point.payload);
                let vector = convert::dense_vector(point.vectors).unwrap_or_default();
                (id.clone(), VectorRecord { id, vector, payload })
            })
            .collect();

        Ok(ids.iter().filter_map(|id| found.get(id).cloned()).collect())
    }

    async fn delete(
        &self,
        collection: &str,
        ids: Option<&[String]>,
        filter: Option<&Filter>,
    ) -> Result<usize> {
        store::validate_delete(ids, filter)?;
        let (client, _permit) = self.client().await?;

        let Some(selector) = convert::delete_selector(ids, filter)?
            .and_then(|s| s.points_selector_one_of)
        else {
            return Ok(0);
        };

        let before = self.exact_count(&client, collection).await?;
        let builder = DeletePointsBuilder::new(collection)
            .points(selector)
            .wait(true);
        client
            .delete_points(builder)
            .await
            .map_err(|e| convert::classify(e, collection))?;
        let after = self.exact_count(&client, collection).await?;

        // Concurrent writers can skew this; it is a best-effort figure.
        let removed = before.saturating_sub(after);
        if after > before {
            tracing::warn!(
                collection,
                before,
                after,
                "point count grew during delete; reported count is approximate"
            );
        }
        tracing::debug!(collection, removed, "records deleted");
        Ok(removed)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let (client, _permit) = self.client().await?;
        self.exact_count(&client, collection).await
    }
}
