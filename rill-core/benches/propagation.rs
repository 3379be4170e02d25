//! Propagation throughput through a chain of derived stores.

use criterion::{criterion_group, criterion_main, Criterion};
use rill_core::{create_event, create_store};
use serde_json::json;

fn chain_propagation(c: &mut Criterion) {
    let step = create_event();
    let base = create_store(json!(0)).on(&step, |n, _| {
        json!(n.and_then(|v| v.as_i64()).unwrap_or(0) + 1)
    });

    let mut tail = base;
    for _ in 0..32 {
        tail = tail.map(|v, _| Some(json!(v.as_i64().unwrap_or(0) + 1)));
    }

    c.bench_function("chain_32_maps", |b| {
        b.iter(|| step.call(json!(null)).unwrap());
    });

    let _ = tail;
}

criterion_group!(benches, chain_propagation);
criterion_main!(benches);
