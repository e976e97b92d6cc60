//! Benchmarks for the retrieval path.
//!
//! Measures similarity search and graph-expanded queries over corpora of
//! increasing size, plus the embedding cost that fronts every ingestion.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use mnemo::embedding::HashEmbedder;
use mnemo::{
    Embedder, IngestConfig, IngestRequest, IngestService, InMemoryGraph, InMemoryIndex,
    InMemoryRepository, Modality, RetrievalConfig, RetrievalService, TenantId, TenantLocks,
};

/// Builds a tenant corpus of `size` distinct units and returns the
/// retrieval service plus a representative query embedding.
fn seeded_retrieval(size: usize) -> (RetrievalService, TenantId, Vec<f32>) {
    let embedder = Arc::new(HashEmbedder::new(128));
    let repository = Arc::new(InMemoryRepository::new());
    let index = Arc::new(InMemoryIndex::new());
    let graph = Arc::new(InMemoryGraph::new());
    let locks = Arc::new(TenantLocks::new());
    let tenant = TenantId::new("bench");

    let ingest = IngestService::new(
        embedder.clone(),
        repository.clone(),
        index.clone(),
        graph.clone(),
        locks.clone(),
        IngestConfig::default(),
    );
    for i in 0..size {
        ingest
            .ingest(IngestRequest::text(
                tenant.clone(),
                format!("note number {i} about topic {}", i % 17),
            ))
            .expect("ingest should succeed");
    }

    let retrieval = RetrievalService::new(repository, index, graph, locks, RetrievalConfig::default());
    let query = embedder
        .embed("note number 3 about topic 3", &Modality::Text)
        .expect("embed should succeed");
    (retrieval, tenant, query)
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    for size in [100_usize, 1_000, 5_000] {
        let (retrieval, tenant, query) = seeded_retrieval(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("direct", size), &size, |b, _| {
            b.iter(|| {
                retrieval
                    .query(&tenant, black_box(&query), 10, false)
                    .expect("query should succeed")
            });
        });
        group.bench_with_input(BenchmarkId::new("expanded", size), &size, |b, _| {
            b.iter(|| {
                retrieval
                    .query(&tenant, black_box(&query), 10, true)
                    .expect("query should succeed")
            });
        });
    }
    group.finish();
}

fn bench_embedding(c: &mut Criterion) {
    let embedder = HashEmbedder::new(384);
    let content = "met the contractor about the kitchen renovation quote";
    c.bench_function("embed_text", |b| {
        b.iter(|| {
            embedder
                .embed(black_box(content), &Modality::Text)
                .expect("embed should succeed")
        });
    });
}

criterion_group!(benches, bench_query, bench_embedding);
criterion_main!(benches);
