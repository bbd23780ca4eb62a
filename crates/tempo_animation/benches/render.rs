//! Frame rendering benchmarks
//!
//! Measures the per-frame cost of rendering many concurrent tweens on the
//! root and a deep timeline tree being scrubbed.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempo_animation::{EngineConfig, ManualClock, Scheduler, TimelineVars, TweenVars};
use tempo_core::{PropertyBag, Target};

fn scheduler(clock: &ManualClock) -> Scheduler {
    let config = EngineConfig {
        lag_threshold: 0.0,
        ..EngineConfig::default()
    };
    Scheduler::with_clock(config, clock.clone())
}

fn targets(count: usize) -> Vec<Target> {
    (0..count)
        .map(|_| {
            Target::new(
                PropertyBag::new()
                    .with("x", 0.0)
                    .with("opacity", 1.0)
                    .with("width", "0px"),
            )
        })
        .collect()
}

fn bench_root_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("root_tick");
    for count in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let clock = ManualClock::new();
            let mut s = scheduler(&clock);
            for target in targets(count) {
                s.to(
                    &target,
                    TweenVars::new()
                        .prop("x", 100.0)
                        .prop("opacity", 0.0)
                        .prop("width", "200px")
                        .duration(1.0)
                        .repeat(-1)
                        .yoyo(true),
                );
            }
            b.iter(|| {
                clock.advance(1.0 / 60.0);
                black_box(s.tick(true))
            });
        });
    }
    group.finish();
}

fn bench_timeline_scrub(c: &mut Criterion) {
    let clock = ManualClock::new();
    let mut s = scheduler(&clock);
    let outer = s.timeline(TimelineVars::new().default_duration(0.25));
    for chunk in targets(200).chunks(20) {
        let inner = s.timeline_nested(outer, TimelineVars::new()).unwrap();
        for target in chunk {
            s.timeline_to(inner, target, TweenVars::new().prop("x", 10.0).at("<0.05"))
                .unwrap();
        }
    }
    let duration = s.duration(outer);

    c.bench_function("timeline_scrub", |b| {
        let mut step = 0u32;
        b.iter(|| {
            step = (step + 1) % 100;
            s.seek(outer, duration * f64::from(step) / 100.0);
            black_box(s.time(outer))
        });
    });
}

criterion_group!(benches, bench_root_tick, bench_timeline_scrub);
criterion_main!(benches);
