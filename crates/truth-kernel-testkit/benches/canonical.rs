use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use truth_kernel_core::{build_chain, canonicalize_json, encode_with_hash, Rail};
use truth_kernel_testkit::tx_from_parts;

fn document(width: usize) -> Value {
    let fields: serde_json::Map<String, Value> = (0..width)
        .rev()
        .map(|i| {
            (
                format!("field_{i:04}"),
                json!({"n": i, "f": i as f64 + 0.5, "tags": ["a", "b", "c"], "ok": i % 2 == 0}),
            )
        })
        .collect();
    Value::Object(fields)
}

fn bench_canonicalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonicalize");
    for width in [10, 100, 1000] {
        let doc = document(width);
        group.bench_with_input(BenchmarkId::from_parameter(width), &doc, |b, doc| {
            b.iter(|| canonicalize_json(black_box(doc)))
        });
    }
    group.finish();
}

fn bench_encode_with_hash(c: &mut Criterion) {
    let doc = document(100);
    c.bench_function("encode_with_hash/100", |b| {
        b.iter(|| encode_with_hash(black_box(&doc)))
    });
}

fn bench_build_chain(c: &mut Criterion) {
    let txs: Vec<_> = (0..100)
        .map(|n| tx_from_parts("bench", Rail::Truth, "bench", n, json!(n)))
        .collect();
    c.bench_function("build_chain/100", |b| b.iter(|| build_chain(black_box(&txs))));
}

criterion_group!(benches, bench_canonicalize, bench_encode_with_hash, bench_build_chain);
criterion_main!(benches);
