//! Recorder throughput benchmarks
//!
//! ## Benchmark Path Types
//!
//! - `memory_*`: recorder dispatch against the in-memory store (no I/O)
//! - `wal_*`: recorder dispatch into the on-disk trace log
//!
//! ## Durability Modes
//!
//! - `dur_standard`: fsync every batch of records (default)
//! - `dur_always`: fsync every record
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench recorder_throughput
//! cargo bench --bench recorder_throughput -- "memory_"
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use tempfile::TempDir;
use tracerec::{
    DurabilityMode, MemoryTraceStore, Message, Recorder, StoreConfig, WalTraceStore,
};

const EVENTS_PER_RUN: usize = 1_000;

fn run_messages(run: usize, events: usize) -> Vec<Message> {
    let mut messages = Vec::with_capacity(events + 2);
    messages.push(
        Message::from_value("start_run", json!({"run_id": run, "cwd": "/bench"})).unwrap(),
    );
    for i in 0..events {
        messages.push(
            Message::from_value(
                "line",
                json!({
                    "run_id": run,
                    "call_id": i / 16,
                    "func_name": "work",
                    "line_no": i % 200,
                    "local_vars": {"i": i, "name": "bench"},
                }),
            )
            .unwrap(),
        );
    }
    messages.push(Message::from_value("end_run", json!({"run_id": run})).unwrap());
    messages
}

fn memory_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_dispatch");
    let messages = run_messages(1, EVENTS_PER_RUN);
    group.throughput(Throughput::Elements(messages.len() as u64));

    group.bench_function("full_run", |b| {
        b.iter(|| {
            let mut recorder = Recorder::new(MemoryTraceStore::new());
            for message in &messages {
                black_box(recorder.process(message).unwrap());
            }
        })
    });
    group.finish();
}

fn wal_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_dispatch");
    group.sample_size(10);
    let messages = run_messages(1, EVENTS_PER_RUN);
    group.throughput(Throughput::Elements(messages.len() as u64));

    for (label, mode) in [
        ("dur_standard", DurabilityMode::standard_default()),
        ("dur_always", DurabilityMode::Always),
    ] {
        group.bench_with_input(BenchmarkId::new("full_run", label), &mode, |b, mode| {
            b.iter_with_setup(
                || {
                    let dir = TempDir::new().unwrap();
                    let store = WalTraceStore::open(
                        dir.path(),
                        StoreConfig::default().with_durability(*mode),
                    )
                    .unwrap();
                    (dir, Recorder::new(store))
                },
                |(_dir, mut recorder)| {
                    for message in &messages {
                        black_box(recorder.process(message).unwrap());
                    }
                    recorder.flush().unwrap();
                },
            )
        });
    }
    group.finish();
}

criterion_group!(benches, memory_dispatch, wal_dispatch);
criterion_main!(benches);
