//! Integration tests for the embedded backend through the store contract

use approx::assert_relative_eq;
use hybrid_vectorstore::{
    create_store, BackendKind, DistanceMetric, EmbeddedStore, Filter, Range, SearchRequest,
    StoreConfig, StoreError, VectorRecord, VectorStore,
};
use tempfile::TempDir;

async fn open_store(dir: &TempDir) -> EmbeddedStore {
    let store = EmbeddedStore::new(dir.path().join("db"), 1000);
    store.initialize().await.unwrap();
    store
}

#[tokio::test]
async fn test_cosine_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    store
        .create_collection("docs", 3, DistanceMetric::Cosine)
        .await
        .unwrap();
    store
        .upsert(
            "docs",
            vec![
                VectorRecord::new("a", vec![1.0, 0.0, 0.0]),
                VectorRecord::new("b", vec![0.0, 1.0, 0.0]),
            ],
        )
        .await
        .unwrap();

    let results = store
        .search("docs", SearchRequest::new(vec![1.0, 0.0, 0.0], 2))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "a");
    assert_relative_eq!(results[0].score, 1.0, epsilon = 1e-5);
    assert_eq!(results[1].id, "b");
    assert_relative_eq!(results[1].score, 0.5, epsilon = 1e-5);
    assert!(results[0].vector.is_none());
}

#[tokio::test]
async fn test_round_trip_every_metric() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    for metric in DistanceMetric::ALL {
        let name = format!("docs-{}", metric);
        store.create_collection(&name, 2, metric).await.unwrap();
        store
            .upsert(
                &name,
                vec![
                    VectorRecord::new("near", vec![0.6, 0.8]),
                    VectorRecord::new("far", vec![-0.6, -0.8]),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search(&name, SearchRequest::new(vec![0.6, 0.8], 1))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "near");
        assert_relative_eq!(results[0].score, 1.0, epsilon = 1e-5);
    }
}

#[tokio::test]
async fn test_upsert_is_idempotent_per_id() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store
        .create_collection("docs", 2, DistanceMetric::Euclidean)
        .await
        .unwrap();

    store
        .upsert("docs", vec![VectorRecord::new("a", vec![1.0, 0.0])])
        .await
        .unwrap();
    store
        .upsert("docs", vec![VectorRecord::new("a", vec![0.0, 1.0]).with_field("v", 2)])
        .await
        .unwrap();
    assert_eq!(store.count("docs").await.unwrap(), 1);

    store
        .upsert("docs", vec![VectorRecord::new("b", vec![1.0, 1.0])])
        .await
        .unwrap();
    assert_eq!(store.count("docs").await.unwrap(), 2);

    let got = store.get("docs", &["a".to_string()]).await.unwrap();
    assert_eq!(got[0].vector, vec![0.0, 1.0]);
    assert_eq!(got[0].payload["v"], 2);
}

#[tokio::test]
async fn test_dimension_mismatch_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store
        .create_collection("docs", 3, DistanceMetric::Cosine)
        .await
        .unwrap();

    let err = store
        .upsert(
            "docs",
            vec![
                VectorRecord::new("ok", vec![1.0, 0.0, 0.0]),
                VectorRecord::new("short", vec![1.0, 0.0]),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DimensionMismatch { expected: 3, actual: 2 }));
    assert_eq!(store.count("docs").await.unwrap(), 0);

    let err = store
        .search("docs", SearchRequest::new(vec![1.0], 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DimensionMismatch { .. }));

    assert_eq!(store.upsert("docs", Vec::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_collection_errors() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    assert!(matches!(
        store.create_collection("docs", 0, DistanceMetric::Cosine).await,
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.create_collection("", 3, DistanceMetric::Cosine).await,
        Err(StoreError::InvalidArgument(_))
    ));

    store
        .create_collection("docs", 3, DistanceMetric::Dot)
        .await
        .unwrap();
    assert!(matches!(
        store.create_collection("docs", 3, DistanceMetric::Dot).await,
        Err(StoreError::AlreadyExists { .. })
    ));

    let info = store.get_collection_info("docs").await.unwrap();
    assert_eq!(info.dimension, 3);
    assert_eq!(info.distance_metric, DistanceMetric::Dot);
    assert_eq!(info.vector_count, 0);

    store
        .create_collection("api", 8, DistanceMetric::Euclidean)
        .await
        .unwrap();
    assert_eq!(store.list_collections().await.unwrap(), vec!["api", "docs"]);

    store.delete_collection("docs").await.unwrap();
    assert!(!store.collection_exists("docs").await.unwrap());
    assert!(matches!(
        store.delete_collection("docs").await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.get_collection_info("missing").await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.search("missing", SearchRequest::new(vec![1.0], 1)).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_search_ordering_threshold_and_limit() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store
        .create_collection("docs", 2, DistanceMetric::Euclidean)
        .await
        .unwrap();

    let records = (0..10)
        .map(|i| VectorRecord::new(format!("r{}", i), vec![i as f32, 0.0]))
        .collect();
    store.upsert("docs", records).await.unwrap();

    let results = store
        .search("docs", SearchRequest::new(vec![0.0, 0.0], 4))
        .await
        .unwrap();
    assert_eq!(results.len(), 4);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // 1 / (1 + d) >= 0.4 keeps d <= 1.5
    let results = store
        .search(
            "docs",
            SearchRequest::new(vec![0.0, 0.0], 10).with_threshold(0.4),
        )
        .await
        .unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r0", "r1"]);

    assert!(matches!(
        store.search("docs", SearchRequest::new(vec![0.0, 0.0], 0)).await,
        Err(StoreError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_search_ties_break_by_id() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store
        .create_collection("docs", 2, DistanceMetric::Cosine)
        .await
        .unwrap();
    store
        .upsert(
            "docs",
            vec![
                VectorRecord::new("z", vec![0.0, 1.0]),
                VectorRecord::new("m", vec![0.0, 3.0]),
                VectorRecord::new("a", vec![0.0, 2.0]),
            ],
        )
        .await
        .unwrap();

    let results = store
        .search("docs", SearchRequest::new(vec![0.0, 1.0], 3))
        .await
        .unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "m", "z"]);
}

#[tokio::test]
async fn test_filtered_search_and_vectors() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store
        .create_collection("docs", 2, DistanceMetric::Cosine)
        .await
        .unwrap();
    store
        .upsert(
            "docs",
            vec![
                VectorRecord::new("r18", vec![1.0, 0.0])
                    .with_field("source", "react")
                    .with_field("version", 18),
                VectorRecord::new("r17", vec![1.0, 0.1])
                    .with_field("source", "react")
                    .with_field("version", 17),
                VectorRecord::new("v3", vec![1.0, 0.0]).with_field("source", "vue"),
            ],
        )
        .await
        .unwrap();

    let filter = Filter::and(vec![
        Filter::eq("source", "react"),
        Filter::range("version", Range::default().gte(18.0)),
    ]);
    let results = store
        .search(
            "docs",
            SearchRequest::new(vec![1.0, 0.0], 10)
                .with_filter(filter)
                .with_vectors(true),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "r18");
    assert_eq!(results[0].vector.as_deref(), Some(&[1.0, 0.0][..]));
    assert_eq!(results[0].payload["source"], "react");
}

#[tokio::test]
async fn test_delete_by_ids_filter_and_union() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store
        .create_collection("docs", 1, DistanceMetric::Euclidean)
        .await
        .unwrap();
    let records = ["a", "b", "c", "d", "e"]
        .iter()
        .enumerate()
        .map(|(i, id)| {
            VectorRecord::new(*id, vec![i as f32]).with_field("even", i % 2 == 0)
        })
        .collect();
    store.upsert("docs", records).await.unwrap();

    let removed = store
        .delete("docs", Some(&["a".to_string(), "nope".to_string()]), None)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(store.get("docs", &["a".to_string()]).await.unwrap().is_empty());

    // "c" is both listed and matched; it counts once.
    let removed = store
        .delete(
            "docs",
            Some(&["b".to_string(), "c".to_string()]),
            Some(&Filter::eq("even", true)),
        )
        .await
        .unwrap();
    assert_eq!(removed, 3);
    assert_eq!(store.count("docs").await.unwrap(), 1);

    let results = store
        .search("docs", SearchRequest::new(vec![0.0], 10))
        .await
        .unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["d"]);

    assert!(matches!(
        store.delete("docs", None, None).await,
        Err(StoreError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_lifecycle_bracket() {
    let dir = TempDir::new().unwrap();
    let store = EmbeddedStore::new(dir.path().join("db"), 1000);
    assert_eq!(store.backend(), BackendKind::Embedded);

    assert!(matches!(
        store.list_collections().await,
        Err(StoreError::NotInitialized)
    ));
    store.close().await.unwrap();

    store.initialize().await.unwrap();
    store.initialize().await.unwrap();
    assert!(store.list_collections().await.unwrap().is_empty());

    store.close().await.unwrap();
    store.close().await.unwrap();
    assert!(matches!(
        store.count("docs").await,
        Err(StoreError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::embedded(dir.path().join("db"));

    {
        let store = create_store(&config).unwrap();
        store.initialize().await.unwrap();
        store
            .create_collection("docs", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        store
            .upsert(
                "docs",
                vec![VectorRecord::new("chunk-1", vec![0.0, 1.0]).with_field("title", "Hooks")],
            )
            .await
            .unwrap();
        store.close().await.unwrap();
    }

    let store = create_store(&config).unwrap();
    store.initialize().await.unwrap();
    let info = store.get_collection_info("docs").await.unwrap();
    assert_eq!(info.dimension, 2);
    assert_eq!(info.distance_metric, DistanceMetric::Cosine);
    assert_eq!(info.vector_count, 1);

    let got = store.get("docs", &["chunk-1".to_string()]).await.unwrap();
    assert_eq!(got[0].payload["title"], "Hooks");
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_readers_and_writer() {
    let dir = TempDir::new().unwrap();
    let store = std::sync::Arc::new(open_store(&dir).await);
    store
        .create_collection("docs", 2, DistanceMetric::Euclidean)
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .upsert(
                    "docs",
                    vec![VectorRecord::new(format!("r{}", i), vec![i as f32, 0.0])],
                )
                .await
                .unwrap();
            store
                .search("docs", SearchRequest::new(vec![0.0, 0.0], 3))
                .await
                .unwrap()
        }));
    }
    for task in tasks {
        let results = task.await.unwrap();
        assert!(!results.is_empty() && results.len() <= 3);
    }
    assert_eq!(store.count("docs").await.unwrap(), 8);
}

#[tokio::test]
async fn test_dot_saturated_scores_rank_by_id_at_any_limit() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    store
        .create_collection("dot", 2, DistanceMetric::Dot)
        .await
        .unwrap();
    store
        .upsert(
            "dot",
            vec![
                VectorRecord::new("z", vec![5.0, 0.0]),
                VectorRecord::new("a", vec![2.0, 0.0]),
                VectorRecord::new("m", vec![0.5, 0.0]),
            ],
        )
        .await
        .unwrap();

    let top1 = store
        .search("dot", SearchRequest::new(vec![1.0, 0.0], 1))
        .await
        .unwrap();
    let top3 = store
        .search("dot", SearchRequest::new(vec![1.0, 0.0], 3))
        .await
        .unwrap();

    assert_eq!(top1[0].id, "a");
    let ids: Vec<&str> = top3.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "z", "m"]);
    assert_relative_eq!(top3[1].score, 1.0, epsilon = 1e-5);
    assert_relative_eq!(top3[2].score, 0.5, epsilon = 1e-5);
}
