//! End-to-end publisher benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use diffcast_bench::transaction_diff;
use diffcast_broker::{AckLevel, ProducerClient, ProducerConfig};
use diffcast_testkit::fixtures;
use std::time::Duration;

/// Benchmark publishing diffs of growing size.
fn bench_publish_changes(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_changes");

    for changes in [1, 8, 32].iter() {
        group.throughput(Throughput::Elements(*changes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(changes), changes, |b, &changes| {
            let broker = fixtures::broker();
            let publisher = fixtures::running_publisher(&broker, ProducerConfig::new());
            let nodes = changes / 2 + changes % 2;
            let diff = transaction_diff(1, nodes, changes / 2);

            b.iter(|| {
                let report = publisher.publish(black_box(&diff)).unwrap();
                black_box(report);
            });
        });
    }

    group.finish();
}

/// Benchmark the two ack levels.
///
/// The buffered case flushes every iteration so the send buffer never
/// fills; it measures the full append-then-drain cycle.
fn bench_ack_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_ack");

    group.bench_function("acknowledged", |b| {
        let broker = fixtures::broker();
        let config = ProducerConfig::new().with_ack_level(AckLevel::Acknowledged);
        let publisher = fixtures::running_publisher(&broker, config);
        let diff = transaction_diff(1, 4, 2);

        b.iter(|| {
            let report = publisher.publish(black_box(&diff)).unwrap();
            black_box(report);
        });
    });

    group.bench_function("buffered_flush", |b| {
        let broker = fixtures::broker();
        let config = ProducerConfig::new().with_ack_level(AckLevel::Buffered);
        let publisher = fixtures::running_publisher(&broker, config);
        let diff = transaction_diff(1, 4, 2);

        b.iter(|| {
            let report = publisher.publish(black_box(&diff)).unwrap();
            let outcome = publisher
                .producer()
                .flush(Duration::from_secs(1))
                .unwrap();
            black_box((report, outcome));
        });
    });

    group.finish();
}

/// Benchmark the transport paths: direct appends against the full
/// frame protocol loopback.
fn bench_transport(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_transport");

    group.bench_function("direct", |b| {
        let broker = fixtures::broker();
        let publisher = fixtures::running_publisher(&broker, ProducerConfig::new());
        let diff = transaction_diff(1, 4, 2);

        b.iter(|| {
            let report = publisher.publish(black_box(&diff)).unwrap();
            black_box(report);
        });
    });

    group.bench_function("loopback_frames", |b| {
        let broker = fixtures::broker();
        let publisher = fixtures::running_loopback_publisher(&broker, ProducerConfig::new());
        let diff = transaction_diff(1, 4, 2);

        b.iter(|| {
            let report = publisher.publish(black_box(&diff)).unwrap();
            black_box(report);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_publish_changes,
    bench_ack_levels,
    bench_transport,
);
criterion_main!(benches);
