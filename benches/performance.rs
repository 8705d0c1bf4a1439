//! Performance benchmarks for the relay.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shift_relay::{OfferEvent, RecipientId, Relay, RelayConfig};

/// Benchmark queueing offers for offline recipients
fn bench_submit_offline(c: &mut Criterion) {
    let relay = Relay::new(RelayConfig::default());
    let mut shift = 0u64;

    c.bench_function("submit_offline", |b| {
        b.iter(|| {
            shift += 1;
            black_box(relay.submit_offer(RecipientId(shift % 1000), OfferEvent::sample(shift)));
        });
    });
}

/// Benchmark pushing to a connected recipient whose transport keeps up
fn bench_submit_live(c: &mut Criterion) {
    let relay = Relay::new(RelayConfig::default());
    let session = relay.connect(RecipientId(1));

    c.bench_function("submit_live", |b| {
        b.iter(|| {
            black_box(relay.submit_offer(RecipientId(1), OfferEvent::sample(1)));
            black_box(session.try_recv().ok());
        });
    });
}

/// Benchmark connect with varying queue depths
fn bench_connect_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("connect_drain");

    for depth in [1usize, 10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("queue_depth", depth), &depth, |b, &depth| {
            let relay = Relay::new(RelayConfig {
                channel_capacity: depth,
                ..Default::default()
            });

            b.iter(|| {
                for shift in 0..depth as u64 {
                    relay.submit_offer(RecipientId(7), OfferEvent::sample(shift));
                }
                let session = relay.connect(RecipientId(7));
                while session.try_recv().is_ok() {}
                black_box(session.drained().delivered);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_submit_offline, bench_submit_live, bench_connect_drain);

criterion_main!(benches);
