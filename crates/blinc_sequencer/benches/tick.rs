//! Tick Benchmarks
//!
//! Frame cost of advancing many concurrent calls, and of finishing a long
//! queue lane in one sweep.
//!
//! Run with: `cargo bench -p blinc_sequencer --bench tick`

#![allow(clippy::unwrap_used)]

use blinc_sequencer::{
    AnimationOptions, AnimationScheduler, ElementId, NullSink, SchedulerConfig, Selection, Tween,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn populated(elements: usize) -> (AnimationScheduler, Vec<ElementId>) {
    let config = SchedulerConfig::testing().with_duration(1_000_000.0);
    let mut scheduler = AnimationScheduler::with_config(config).with_sink(NullSink);
    let ids: Vec<ElementId> = (0..elements)
        .map(|i| scheduler.add_element(format!("el{i}")))
        .collect();
    scheduler
        .animate(
            &ids,
            &[
                Tween::from_to("left", 0.0, 100.0, "px"),
                Tween::from_to("opacity", 0.0, 1.0, ""),
            ],
            AnimationOptions::new(),
        )
        .unwrap();
    (scheduler, ids)
}

fn bench_tick_active_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_active_calls");

    for count in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |bench, &count| {
            let (mut scheduler, _) = populated(count);
            let mut now = 0.0;
            bench.iter(|| {
                now += 16.0;
                black_box(scheduler.tick_at(black_box(now)));
            });
        });
    }

    group.finish();
}

fn bench_finish_queue_lane(c: &mut Criterion) {
    let mut group = c.benchmark_group("finish_queue_lane");

    for depth in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |bench, &depth| {
            bench.iter(|| {
                let mut scheduler = AnimationScheduler::with_config(SchedulerConfig::testing());
                let card = scheduler.add_element("card");
                for step in 0..depth {
                    scheduler
                        .animate(
                            &[card],
                            &[Tween::from_to("left", 0.0, step as f64, "px")],
                            AnimationOptions::new(),
                        )
                        .unwrap();
                }
                black_box(scheduler.finish(Selection::All, true, false));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick_active_calls, bench_finish_queue_lane);
criterion_main!(benches);
