//! # Hybrid Vector Store
//!
//! One asynchronous contract over two vector backends, plus hybrid ranking.
//!
//! This library provides:
//! - The [`VectorStore`] trait, implemented by an embedded on-disk engine
//!   ([`EmbeddedStore`]) and a Qdrant-backed remote store ([`RemoteStore`])
//! - Scores normalized to [0, 1] regardless of backend or distance metric
//! - Backend-neutral metadata filters ([`Filter`])
//! - Fail-fast configuration validation and a backend factory
//! - Weighted fusion of vector and keyword results ([`HybridScorer`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use hybrid_vectorstore::{create_store, DistanceMetric, SearchRequest, StoreConfig, VectorRecord};
//!
//! # async fn run() -> hybrid_vectorstore::Result<()> {
//! let store = create_store(&StoreConfig::embedded("./data"))?;
//! store.initialize().await?;
//!
//! store.create_collection("docs", 3, DistanceMetric::Cosine).await?;
//! store
//!     .upsert("docs", vec![VectorRecord::new("a", vec![1.0, 0.0, 0.0]).with_field("source", "react")])
//!     .await?;
//!
//! let hits = store.search("docs", SearchRequest::new(vec![1.0, 0.0, 0.0], 5)).await?;
//! assert_eq!(hits[0].id, "a");
//!
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod embedded;
pub mod engine;
pub mod error;
pub mod factory;
pub mod filter;
pub mod hybrid;
pub mod remote;
pub mod store;
pub mod types;

pub use config::{DeploymentMode, EmbeddedConfig, RemoteConfig, StoreConfig};
pub use embedded::EmbeddedStore;
pub use error::{Result, StoreError};
pub use factory::{create_store, validate, ValidatedBackend};
pub use filter::{Filter, Range};
pub use hybrid::{
    HybridConfig, HybridHit, HybridQuery, HybridResponse, HybridScorer, KeywordHit, KeywordIndex,
};
pub use remote::{RemoteEndpoint, RemoteSettings, RemoteStore};
pub use store::{BackendKind, SearchRequest, VectorStore};
pub use types::{CollectionInfo, DistanceMetric, Payload, VectorRecord, VectorSearchResult};
