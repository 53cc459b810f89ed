//! Benchmarks for embedded search

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hybrid_vectorstore::engine::{Engine, EngineSettings, RecordInput, Space};
use hybrid_vectorstore::{DistanceMetric, EmbeddedStore, Payload, SearchRequest, VectorRecord, VectorStore};
use std::collections::BTreeMap;

fn random_vector(dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rand::random::<f32>()).collect()
}

fn benchmark_engine_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_query");

    for size in [100, 1000, 10000].iter() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = EngineSettings {
            checkpoint_interval: usize::MAX,
            anonymized_telemetry: false,
        };
        let mut engine = Engine::open(dir.path(), settings).unwrap();
        engine
            .create_collection("bench", Space::L2, BTreeMap::new())
            .unwrap();

        let batch: Vec<RecordInput> = (0..*size)
            .map(|i| (format!("v{}", i), random_vector(128), Payload::new()))
            .collect();
        engine.upsert("bench", batch).unwrap();

        let query = vec![0.5; 128];
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                engine
                    .query("bench", black_box(&query), black_box(10), None, false)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn benchmark_store_search(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::TempDir::new().unwrap();
    let store = EmbeddedStore::new(dir.path().join("db"), 100_000);

    runtime.block_on(async {
        store.initialize().await.unwrap();
        store
            .create_collection("bench", 128, DistanceMetric::Cosine)
            .await
            .unwrap();
        let records = (0..5000)
            .map(|i| VectorRecord::new(format!("v{}", i), random_vector(128)))
            .collect();
        store.upsert("bench", records).await.unwrap();
    });

    let query = random_vector(128);
    c.bench_function("store_search_5000", |b| {
        b.to_async(&runtime).iter(|| async {
            store
                .search("bench", SearchRequest::new(black_box(query.clone()), 10))
                .await
                .unwrap()
        });
    });
}

criterion_group!(benches, benchmark_engine_query, benchmark_store_search);
criterion_main!(benches);
