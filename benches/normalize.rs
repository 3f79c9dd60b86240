use std::hint::black_box;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use reqkit::prelude::{Backoff, RequestDescriptor, RetryPolicy};
use reqkit::{RequestDefaults, build_wire_request};

fn descriptor_with_query(items: usize) -> RequestDescriptor {
    let mut builder = RequestDescriptor::get("https://api.example.com", "/v1/search")
        .header("Accept", "application/json")
        .bearer_token("bench-token");
    for index in 0..items {
        builder = builder.query_item(format!("key{index}"), format!("value {index}&more"));
    }
    builder.build()
}

fn bench_build_wire_request(c: &mut Criterion) {
    let defaults = RequestDefaults::default();
    let mut group = c.benchmark_group("build_wire_request");
    for items in [0_usize, 4, 32] {
        let descriptor = descriptor_with_query(items);
        group.bench_with_input(BenchmarkId::from_parameter(items), &descriptor, |b, descriptor| {
            b.iter(|| build_wire_request(black_box(descriptor), black_box(&defaults)))
        });
    }
    group.finish();
}

fn bench_backoff(c: &mut Criterion) {
    let exponential = RetryPolicy::exponential(
        8,
        Duration::from_millis(100),
        2.0,
        Duration::from_secs(30),
    );
    let jittered = Backoff::JitteredExponential {
        base: Duration::from_millis(100),
        multiplier: 2.0,
        max: Duration::from_secs(30),
        jitter: 0.2,
    };

    c.bench_function("backoff_exponential", |b| {
        b.iter(|| {
            (0..8).fold(Duration::ZERO, |total, attempt| {
                total + exponential.delay(black_box(attempt))
            })
        })
    });
    c.bench_function("backoff_jittered_exponential", |b| {
        b.iter(|| {
            (0..8).fold(Duration::ZERO, |total, attempt| {
                total + jittered.delay(black_box(attempt))
            })
        })
    });
}

criterion_group!(benches, bench_build_wire_request, bench_backoff);
criterion_main!(benches);
