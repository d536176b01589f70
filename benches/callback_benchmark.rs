//! Performance benchmarks for the assertive callback.
//!
//! 1. **Filing**: cost of folding one assert result into the report
//! 2. **Report size**: snapshot and YAML serialization as the report grows
//! 3. **Contention**: many hosts delivering results concurrently

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

use assertive::callback::{AssertiveCallback, TaskEvent};
use assertive::output::Display;
use assertive::traits::EventSink;

/// Display discarding every line.
struct NullDisplay;

impl Display for NullDisplay {
    fn display(&self, line: &str) {
        black_box(line);
    }
}

fn callback() -> AssertiveCallback {
    AssertiveCallback::new()
        .with_display(Arc::new(NullDisplay))
        .with_no_color(true)
}

fn assert_event(host: &str, passed: bool) -> TaskEvent {
    TaskEvent::new(host, "assert")
        .with_task_name("check")
        .with_field(
            "assertions",
            json!([
                {"assertion": "port == 8080", "evaluated_to": true},
                {"assertion": "workers > 4", "evaluated_to": passed}
            ]),
        )
        .with_field("msg", json!("Assertion failed"))
        .with_field("changed", json!(!passed))
}

fn bench_filing(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("filing");

    group.bench_function("passed_result", |b| {
        let cb = callback();
        let event = assert_event("web1", true);
        b.to_async(&rt).iter(|| cb.on_ok(black_box(&event)));
    });

    group.bench_function("failed_result", |b| {
        let cb = callback();
        let event = assert_event("web1", false);
        b.to_async(&rt).iter(|| cb.on_ok(black_box(&event)));
    });

    group.finish();
}

fn bench_report_size(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("report_size");

    for entries in [10usize, 100, 1000] {
        let cb = callback();
        rt.block_on(async {
            cb.on_group_start("play").await;
            for i in 0..entries {
                cb.on_ok(&assert_event(&format!("host{}", i % 10), i % 3 != 0))
                    .await;
            }
        });

        group.throughput(Throughput::Elements(entries as u64));
        group.bench_with_input(BenchmarkId::new("snapshot", entries), &cb, |b, cb| {
            b.iter(|| black_box(cb.report()));
        });
        group.bench_with_input(BenchmarkId::new("to_yaml", entries), &cb, |b, cb| {
            let report = cb.report();
            b.iter(|| black_box(report.to_yaml().unwrap()));
        });
    }

    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("contention");

    for hosts in [4usize, 16, 64] {
        group.throughput(Throughput::Elements(hosts as u64));
        group.bench_with_input(BenchmarkId::new("concurrent_hosts", hosts), &hosts, |b, &hosts| {
            b.to_async(&rt).iter(|| async move {
                let cb = Arc::new(callback());
                let tasks: Vec<_> = (0..hosts)
                    .map(|i| {
                        let cb = Arc::clone(&cb);
                        tokio::spawn(async move {
                            cb.on_ok(&assert_event(&format!("host{}", i), i % 2 == 0)).await;
                        })
                    })
                    .collect();
                for task in tasks {
                    task.await.unwrap();
                }
                black_box(cb.stats())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filing, bench_report_size, bench_contention);
criterion_main!(benches);
