//! Benchmarks the look-ahead planner's submission/replanning cost: the
//! per-move cost of `submit_accel_line` and the tail-reshaping cost of
//! `replan_from` as the queue fills.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use motion::{Planner, PlannerConfig};

type BenchPlanner = Planner<3, 3, 32>;

fn config() -> PlannerConfig<3> {
    let mut cfg = PlannerConfig::default();
    cfg.axis_limits.jerk_max = [5.0e7; 3];
    cfg.axis_limits.junction_deviation = [0.05; 3];
    cfg.junction_acceleration = 2.0e5;
    cfg
}

fn bench_submit_straight_run(c: &mut Criterion) {
    c.bench_function("submit_accel_line_straight_run", |b| {
        b.iter(|| {
            let mut planner = BenchPlanner::new(config());
            for i in 0..31 {
                let x = (i + 1) as f64 * 10.0;
                let _ = planner.submit_accel_line(black_box([x, 0.0, 0.0]), black_box(0.01));
            }
        })
    });
}

fn bench_submit_zigzag(c: &mut Criterion) {
    c.bench_function("submit_accel_line_zigzag", |b| {
        b.iter(|| {
            let mut planner = BenchPlanner::new(config());
            for i in 0..31 {
                let x = (i + 1) as f64 * 10.0;
                let y = if i % 2 == 0 { 0.0 } else { 10.0 };
                let _ = planner.submit_accel_line(black_box([x, y, 0.0]), black_box(0.01));
            }
        })
    });
}

criterion_group!(benches, bench_submit_straight_run, bench_submit_zigzag);
criterion_main!(benches);
