//! Throughput Benchmark for TypedKV
//!
//! This benchmark measures the typed store, the frame codec and full
//! request dispatch under various workloads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use typedkv::commands::CommandHandler;
use typedkv::protocol::{encode_masked_text, encode_text, FrameDecoder};
use typedkv::storage::{DataType, TypedStore};

/// Benchmark namespace writes
fn bench_add(c: &mut Criterion) {
    let mut store = TypedStore::new();

    let mut group = c.benchmark_group("add");
    group.throughput(Throughput::Elements(1));

    group.bench_function("string_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store
                .strings_mut()
                .add(format!("key:{}", i), "small_value".to_string(), None);
            i += 1;
        });
    });

    group.bench_function("number_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store
                .numbers_mut()
                .add(format!("key:{}", i), i as f64, Some(Duration::from_secs(3600)));
            i += 1;
        });
    });

    group.bench_function("object", |b| {
        let mut i = 0u64;
        let value = json!({"name": "Ariz", "tags": ["a", "b", "c"], "nested": {"n": 1}});
        b.iter(|| {
            store.objects_mut().add(format!("key:{}", i), value.clone(), None);
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark namespace reads
fn bench_get(c: &mut Criterion) {
    let mut store = TypedStore::new();

    // Pre-populate with data
    for i in 0..100_000 {
        store
            .strings_mut()
            .add(format!("key:{}", i), format!("value:{}", i), None);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(store.strings_mut().get(&key));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(store.strings_mut().get(&key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark INCR and TTL lookups
fn bench_counters(c: &mut Criterion) {
    let mut store = TypedStore::new();
    for i in 0..1_000 {
        store
            .numbers_mut()
            .add(format!("counter:{}", i), 0.0, Some(Duration::from_secs(3600)));
    }

    let mut group = c.benchmark_group("counters");
    group.throughput(Throughput::Elements(1));

    group.bench_function("increment", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("counter:{}", i % 1_000);
            black_box(store.numbers_mut().increment(&key, 1.0));
            i += 1;
        });
    });

    group.bench_function("ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("counter:{}", i % 1_000);
            black_box(store.ttl(DataType::Num, &key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark frame encode and decode across the three length tiers
fn bench_frames(c: &mut Criterion) {
    let decoder = FrameDecoder::default();

    let mut group = c.benchmark_group("frames");

    for size in [64usize, 1024, 70_000] {
        let payload = vec![b'x'; size];
        let wire = encode_masked_text(&payload, [0x12, 0x34, 0x56, 0x78]);

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &payload, |b, payload| {
            b.iter(|| black_box(encode_text(payload)));
        });

        group.bench_with_input(BenchmarkId::new("decode_masked", size), &wire, |b, wire| {
            b.iter(|| black_box(decoder.decode(wire).ok()));
        });
    }

    group.finish();
}

/// Benchmark full request dispatch (JSON in, JSON out)
fn bench_dispatch(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(Mutex::new(TypedStore::new())));

    handler.execute(r#"{"event":"nset","key":"hits","value":"0"}"#);

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("sset", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let request = format!(r#"{{"event":"sset","key":"k{}","value":["a","b"]}}"#, i);
            black_box(handler.execute(&request));
            i += 1;
        });
    });

    group.bench_function("incr", |b| {
        b.iter(|| black_box(handler.execute(r#"{"event":"incr","key":"hits","value":"1"}"#)));
    });

    group.bench_function("malformed", |b| {
        b.iter(|| black_box(handler.execute("{bad")));
    });

    group.finish();
}

/// Benchmark dispatch from several threads sharing one store
fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let store = Arc::new(Mutex::new(TypedStore::new()));
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let handler = CommandHandler::new(Arc::clone(&store));
                    thread::spawn(move || {
                        for i in 0..2_000 {
                            let set = format!(r#"{{"event":"sset","key":"{}:{}","value":"v"}}"#, t, i);
                            let get = format!(r#"{{"event":"sget","key":"{}:{}"}}"#, t, i);
                            handler.execute(&set);
                            handler.execute(&get);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(store.lock().unwrap().len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_add,
    bench_get,
    bench_counters,
    bench_frames,
    bench_dispatch,
    bench_concurrent,
);

criterion_main!(benches);
