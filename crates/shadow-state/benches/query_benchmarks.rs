//! Query materialization and ingest throughput.
//!
//! Run with: `cargo bench --bench query_benchmarks`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use shadow_state::prelude::*;

fn npc_events(count: i64, seed: u64) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut events: Vec<Value> = (0..count)
        .map(|id| {
            json!({"type": "update", "kind": "npc", "key": id, "revision": 1,
                   "attributes": {
                       "id": rng.gen_range(0..5000),
                       "x": rng.gen_range(3000..3400),
                       "y": rng.gen_range(3000..3400),
                       "plane": rng.gen_range(0..4),
                       "combat_level": rng.gen_range(1..127)
                   }})
        })
        .collect();
    events.push(json!({"type": "snapshot_complete"}));
    events
}

fn populated(count: i64) -> Arc<EventCache> {
    let cache = Arc::new(EventCache::new(
        EventCacheConfig::default(),
        Arc::new(GameConstants::default()),
    ));
    let consumer = cache
        .subscribe(IterSource::new(npc_events(count, 7)))
        .expect("subscribe");
    consumer.join().expect("consumer");
    cache
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    for count in [100i64, 1_000, 10_000] {
        let cache = populated(count);
        let query = cache
            .query(EntityKind::Npc)
            .filter_range("x", 3100..3300)
            .unwrap()
            .filter_eq("plane", 0)
            .unwrap();

        group.bench_with_input(BenchmarkId::new("to_list", count), &query, |b, q| {
            b.iter(|| black_box(q.to_list()))
        });
        group.bench_with_input(BenchmarkId::new("count", count), &query, |b, q| {
            b.iter(|| black_box(q.count()))
        });
    }
    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let events = npc_events(1_000, 11);
    c.bench_function("ingest_1000_updates", |b| {
        b.iter(|| {
            let cache = Arc::new(EventCache::new(
                EventCacheConfig::default(),
                Arc::new(GameConstants::default()),
            ));
            let consumer = cache.subscribe(IterSource::new(events.clone())).unwrap();
            black_box(consumer.join().unwrap())
        })
    });
}

criterion_group!(benches, bench_queries, bench_ingest);
criterion_main!(benches);
