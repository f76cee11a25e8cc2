//! Benchmarks one `Planner::exec` tick, the WCET-sensitive call invoked from
//! the stepper interrupt. Isolates the interrupt-context function with mock
//! hardware so the measured cost is the planner's, not the mock's.

use criterion::{criterion_group, criterion_main, Criterion};
use motion::{ExecOutcome, InverseKinematics, MachineCallbacks, Planner, PlannerConfig, SinkError, SpindleDirection, StepperSink};

type BenchPlanner = Planner<3, 3, 32>;

struct NullSink;
impl StepperSink<3> for NullSink {
    fn prep_line(&mut self, _steps: &[i32; 3], _duration_us: u32) -> Result<(), SinkError> {
        Ok(())
    }
    fn prep_dwell(&mut self, _duration_us: u32) -> Result<(), SinkError> {
        Ok(())
    }
    fn prep_null(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
    fn request_exec(&mut self) {}
    fn is_busy(&self) -> bool {
        false
    }
}

struct NullKinematics;
impl InverseKinematics<3, 3> for NullKinematics {
    fn steps_for_travel(&self, travel_mm: &[f64; 3], _duration_us: u32) -> [i32; 3] {
        [
            (travel_mm[0] * 80.0) as i32,
            (travel_mm[1] * 80.0) as i32,
            (travel_mm[2] * 400.0) as i32,
        ]
    }
}

struct NullMachine;
impl MachineCallbacks for NullMachine {
    fn exec_program_stop(&mut self) {}
    fn exec_program_end(&mut self) {}
    fn exec_spindle_control(&mut self, _dir: SpindleDirection) {}
    fn exec_mist_coolant(&mut self, _on: bool) {}
    fn exec_flood_coolant(&mut self, _on: bool) {}
    fn exec_feed_override_enable(&mut self, _enable: bool) {}
}

fn config() -> PlannerConfig<3> {
    let mut cfg = PlannerConfig::default();
    cfg.axis_limits.jerk_max = [5.0e7; 3];
    cfg.axis_limits.junction_deviation = [0.05; 3];
    cfg.junction_acceleration = 2.0e5;
    cfg
}

fn bench_single_exec_tick(c: &mut Criterion) {
    let mut planner = BenchPlanner::new(config());
    for i in 0..31 {
        let x = (i + 1) as f64 * 10.0;
        planner.submit_accel_line([x, 0.0, 0.0], 0.01).unwrap();
    }
    let mut sink = NullSink;
    let ik = NullKinematics;
    let mut machine = NullMachine;

    c.bench_function("exec_single_tick", |b| {
        b.iter(|| match planner.exec(&mut sink, &ik, &mut machine) {
            Ok(ExecOutcome::NoOp) => {
                for i in 0..31 {
                    let x = (i + 1) as f64 * 10.0;
                    let _ = planner.submit_accel_line([x, 0.0, 0.0], 0.01);
                }
            }
            _ => {}
        })
    });
}

criterion_group!(benches, bench_single_exec_tick);
criterion_main!(benches);
