//! Road operation benchmarks
//!
//! - State machine throughput for a full car lifecycle
//! - Monitor overhead for the same lifecycle, uncontended
//! - Tick cost with a full road

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use roadway_core::{CarId, RoadConfig, RoadState};
use roadway_monitor::{Road, RoadMonitor};

fn lifecycle_ids(n: usize) -> Vec<CarId> {
    (0..n).map(|i| CarId::new(format!("car-{}", i))).collect()
}

fn bench_state_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_lifecycle");

    for segments in [5u32, 20, 100] {
        let config = RoadConfig::new(segments, 3).unwrap();
        let id = CarId::from("bench");

        group.bench_with_input(BenchmarkId::from_parameter(segments), &config, |b, config| {
            b.iter(|| {
                let mut road = RoadState::new(*config).unwrap();
                road.try_enter(&id, 0).unwrap();
                for _ in 1..config.segments {
                    road.try_advance(&id, 0).unwrap();
                }
                black_box(road.exit(&id).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_monitor_lifecycle(c: &mut Criterion) {
    let config = RoadConfig::new(20, 3).unwrap();
    let road = RoadMonitor::new(config).unwrap();
    let id = CarId::from("bench");

    c.bench_function("monitor_lifecycle_20", |b| {
        b.iter(|| {
            road.enter(&id, 0).unwrap();
            for _ in 1..config.segments {
                road.advance(&id, 0).unwrap();
            }
            road.exit(&id).unwrap();
        });
    });
}

fn bench_tick_full_road(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_full_road");

    for lanes in [4u32, 16, 64] {
        let config = RoadConfig::new(1, lanes).unwrap();
        let mut road = RoadState::new(config).unwrap();
        for id in lifecycle_ids(lanes as usize) {
            road.try_enter(&id, u32::MAX).unwrap();
        }

        group.bench_function(BenchmarkId::from_parameter(lanes), |b| {
            b.iter(|| black_box(road.tick()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_state_lifecycle,
    bench_monitor_lifecycle,
    bench_tick_full_road
);
criterion_main!(benches);
