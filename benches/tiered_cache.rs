//! Benchmarks for the tiered cache hot paths
//!
//! Target: memory hits well under 10µs

use async_trait::async_trait;
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use stac_cache::cache::compression::{CompressionAlgorithm, CompressionConfig, CompressionManager};
use stac_cache::cache::entry::{CacheData, CacheEntry, DataType, EntryMetadata};
use stac_cache::cache::{generate_cache_key, EvictionPolicy, MemoryTier};
use stac_cache::durable::dictionary;
use stac_cache::{
    FetchResult, NetworkError, NetworkFetcher, RequestOptions, ResponseMetadata, TieredCache,
    TieredCacheConfig,
};
use std::sync::Arc;

struct StaticFetcher;

#[async_trait]
impl NetworkFetcher for StaticFetcher {
    async fn fetch(
        &self,
        url: &str,
        _options: &RequestOptions,
    ) -> Result<FetchResult, NetworkError> {
        Ok(FetchResult::json(url, sample_collection(10)))
    }
}

fn sample_collection(links: usize) -> serde_json::Value {
    let links: Vec<_> = (0..links)
        .map(|i| json!({"rel": "item", "href": format!("./items/{}.json", i), "type": "application/geo+json"}))
        .collect();
    json!({
        "type": "Collection",
        "id": "sentinel-2-l2a",
        "stac_version": "1.0.0",
        "description": "Sentinel-2 Level-2A surface reflectance",
        "extent": {"spatial": {"bbox": [[-180, -90, 180, 90]]}, "temporal": {"interval": [["2015-06-27T10:25:31Z", null]]}},
        "links": links,
    })
}

fn bench_cache_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiered_cache");
    group.throughput(Throughput::Elements(1));

    let params: Vec<(String, String)> = vec![
        ("limit".into(), "100".into()),
        ("bbox".into(), "-122.5,37.7,-122.3,37.9".into()),
        ("datetime".into(), "2024-01-01T00:00:00Z/..".into()),
        ("collections".into(), "sentinel-2-l2a".into()),
        ("sortby".into(), "-properties.datetime".into()),
    ];

    group.bench_function("generate_cache_key", |b| {
        b.iter(|| generate_cache_key(black_box("https://stac.example/search"), black_box(&params)));
    });

    group.finish();
}

fn bench_memory_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiered_cache");
    group.throughput(Throughput::Elements(1));

    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = rt.block_on(async {
        let cache = TieredCache::new(TieredCacheConfig::default(), Arc::new(StaticFetcher), None).unwrap();
        cache.init().await.unwrap();
        cache
    });
    let options = RequestOptions::new();
    rt.block_on(cache.get("https://stac.example/collections/s2", &options)).unwrap();

    group.bench_function("get_memory_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { cache.get(black_box("https://stac.example/collections/s2"), &options).await.unwrap() });
    });

    group.finish();
    cache.dispose();
}

fn bench_memory_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiered_cache");
    group.throughput(Throughput::Elements(1));

    for policy in [EvictionPolicy::Lru, EvictionPolicy::Lfu, EvictionPolicy::Fifo] {
        group.bench_with_input(
            BenchmarkId::new("insert_full_tier", format!("{:?}", policy)),
            &policy,
            |b, &policy| {
                // 1000 entries of 1KB
                let mut tier = MemoryTier::new(1000 * 1024, policy);
                let body = Bytes::from(vec![0u8; 1024]);
                let mut counter = 0u64;
                b.iter(|| {
                    counter += 1;
                    let key = format!("key-{}", counter);
                    let data = CacheData::uncompressed(body.clone());
                    let metadata = EntryMetadata::new(
                        &ResponseMetadata::ok(&key),
                        &data,
                        DataType::Binary,
                        counter,
                        60_000,
                    );
                    black_box(tier.insert(CacheEntry::new(&key, data, metadata), counter));
                });
            },
        );
    }

    group.finish();
}

fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");
    let payload = Bytes::from(serde_json::to_vec(&sample_collection(200)).unwrap());
    group.throughput(Throughput::Bytes(payload.len() as u64));

    for algorithm in [
        CompressionAlgorithm::Lz4,
        CompressionAlgorithm::Zstd,
        CompressionAlgorithm::Snappy,
    ] {
        let manager = CompressionManager::with_config(CompressionConfig {
            algorithm,
            ..Default::default()
        });
        group.bench_with_input(BenchmarkId::new("encode", algorithm), &payload, |b, payload| {
            b.iter(|| manager.encode(black_box(payload.clone())));
        });
    }

    let text = serde_json::to_string(&sample_collection(200)).unwrap();
    group.bench_function("dictionary_compress", |b| {
        b.iter(|| dictionary::compress(black_box(&text)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_cache_key,
    bench_memory_hit,
    bench_memory_eviction,
    bench_compression,
);
criterion_main!(benches);
