//! Throughput of the two per-call hot paths: drawing a size and running one
//! rainbow tick over a populated tracker.
//!
//! Run with: `cargo bench --bench core_benchmarks`

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use poop_core::config::RainbowConfig;
use poop_core::prelude::*;

fn bench_generate(c: &mut Criterion) {
    let mut sizes = SizeGenerator::seeded(SizeTable::default(), 1);
    c.bench_function("size_generate_default_table", |b| {
        b.iter(|| black_box(sizes.generate()))
    });
}

fn bench_rainbow_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("rainbow_tick");
    for &count in &[10usize, 100, 1_000] {
        let mut host = SimHost::new();
        let mut timers = TimerQueue::new();
        let mut rainbow = RainbowTracker::new(&RainbowConfig {
            enabled: true,
            base_speed: 3.0,
        });
        for _ in 0..count {
            let e = host.spawn_prop(ActorId(0), 1.0).unwrap();
            rainbow.track(e, Duration::ZERO, &mut timers);
        }
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                black_box(rainbow.tick(Duration::from_secs(1), &mut host, &mut timers))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_generate, bench_rainbow_tick);
criterion_main!(benches);
