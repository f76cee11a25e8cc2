//! # End-to-End Trajectory Integration Test
//!
//! Drives a [`motion::Planner`] through submission, look-ahead planning, and
//! execution against mock `StepperSink`/`InverseKinematics`/`MachineCallbacks`
//! collaborators, verifying the pipeline end to end against mock hardware.

use motion::{
    ExecOutcome, InverseKinematics, MachineCallbacks, Planner, PlannerConfig, SinkError,
    SpindleDirection, StepperSink,
};

type TestPlanner = Planner<2, 2, 8>;

#[derive(Default)]
struct RecordingSink {
    lines: Vec<([i32; 2], u32)>,
    dwells: Vec<u32>,
    nulls: u32,
}

impl StepperSink<2> for RecordingSink {
    fn prep_line(&mut self, steps: &[i32; 2], duration_us: u32) -> Result<(), SinkError> {
        self.lines.push((*steps, duration_us));
        Ok(())
    }
    fn prep_dwell(&mut self, duration_us: u32) -> Result<(), SinkError> {
        self.dwells.push(duration_us);
        Ok(())
    }
    fn prep_null(&mut self) -> Result<(), SinkError> {
        self.nulls += 1;
        Ok(())
    }
    fn request_exec(&mut self) {}
    fn is_busy(&self) -> bool {
        false
    }
}

struct IdentityKinematics {
    steps_per_mm: f64,
}

impl InverseKinematics<2, 2> for IdentityKinematics {
    fn steps_for_travel(&self, travel_mm: &[f64; 2], _duration_us: u32) -> [i32; 2] {
        [
            (travel_mm[0] * self.steps_per_mm).round() as i32,
            (travel_mm[1] * self.steps_per_mm).round() as i32,
        ]
    }
}

#[derive(Default)]
struct RecordingMachine {
    program_stopped: bool,
    spindle: Option<SpindleDirection>,
    mist_on: bool,
}

impl MachineCallbacks for RecordingMachine {
    fn exec_program_stop(&mut self) {
        self.program_stopped = true;
    }
    fn exec_program_end(&mut self) {}
    fn exec_spindle_control(&mut self, dir: SpindleDirection) {
        self.spindle = Some(dir);
    }
    fn exec_mist_coolant(&mut self, on: bool) {
        self.mist_on = on;
    }
    fn exec_flood_coolant(&mut self, _on: bool) {}
    fn exec_feed_override_enable(&mut self, _enable: bool) {}
}

fn config() -> PlannerConfig<2> {
    let mut cfg = PlannerConfig::default();
    cfg.axis_limits.jerk_max = [5.0e7, 5.0e7];
    cfg.axis_limits.junction_deviation = [0.05, 0.05];
    cfg.junction_acceleration = 2.0e5;
    cfg.segment_target_us = 5_000;
    cfg
}

fn drain(planner: &mut TestPlanner, sink: &mut RecordingSink, ik: &IdentityKinematics, machine: &mut RecordingMachine) {
    loop {
        match planner.exec(sink, ik, machine) {
            Ok(ExecOutcome::NoOp) => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }
}

#[test]
fn single_straight_move_reaches_target_exactly() {
    let mut planner = TestPlanner::new(config());
    let mut sink = RecordingSink::default();
    let ik = IdentityKinematics { steps_per_mm: 80.0 };
    let mut machine = RecordingMachine::default();

    planner.submit_accel_line([10.0, 0.0], 0.01).unwrap();
    drain(&mut planner, &mut sink, &ik, &mut machine);

    assert!(!sink.lines.is_empty());
    assert_eq!(planner.get_runtime_position(0), Some(10.0));
    assert_eq!(planner.get_runtime_position(1), Some(0.0));
    assert!(!planner.is_busy());
}

#[test]
fn two_collinear_moves_drain_without_stalling() {
    let mut planner = TestPlanner::new(config());
    let mut sink = RecordingSink::default();
    let ik = IdentityKinematics { steps_per_mm: 80.0 };
    let mut machine = RecordingMachine::default();

    planner.submit_accel_line([10.0, 0.0], 0.01).unwrap();
    planner.submit_accel_line([20.0, 0.0], 0.01).unwrap();
    drain(&mut planner, &mut sink, &ik, &mut machine);

    assert_eq!(planner.get_runtime_position(0), Some(20.0));
    assert!(!planner.is_busy());
}

#[test]
fn queue_saturates_then_drains() {
    let mut planner = TestPlanner::new(config());
    let mut sink = RecordingSink::default();
    let ik = IdentityKinematics { steps_per_mm: 80.0 };
    let mut machine = RecordingMachine::default();

    for i in 0..8 {
        let x = (i + 1) as f64 * 10.0;
        planner.submit_accel_line([x, 0.0], 0.01).unwrap();
    }
    assert!(!planner.queue_has_space());
    assert!(planner.submit_accel_line([1000.0, 0.0], 0.01).is_err());

    drain(&mut planner, &mut sink, &ik, &mut machine);
    assert!(planner.queue_has_space());
    assert!(!planner.is_busy());
}

#[test]
fn mcode_dispatches_through_machine_callbacks() {
    let mut planner = TestPlanner::new(config());
    let mut sink = RecordingSink::default();
    let ik = IdentityKinematics { steps_per_mm: 80.0 };
    let mut machine = RecordingMachine::default();

    planner.submit_mcode(3).unwrap(); // spindle on, clockwise
    drain(&mut planner, &mut sink, &ik, &mut machine);

    assert_eq!(machine.spindle, Some(SpindleDirection::Clockwise));
    assert_eq!(sink.nulls, 1);
}

#[test]
fn unaccelerated_line_emits_single_segment() {
    let mut planner = TestPlanner::new(config());
    let mut sink = RecordingSink::default();
    let ik = IdentityKinematics { steps_per_mm: 80.0 };
    let mut machine = RecordingMachine::default();

    planner.submit_line([5.0, 0.0], 0.005).unwrap();
    drain(&mut planner, &mut sink, &ik, &mut machine);

    assert_eq!(sink.lines.len(), 1);
    assert_eq!(planner.get_runtime_position(0), Some(5.0));
}

#[test]
fn flush_clears_queue_but_planner_reports_idle_after_running_block_finishes() {
    let mut planner = TestPlanner::new(config());
    let mut sink = RecordingSink::default();
    let ik = IdentityKinematics { steps_per_mm: 80.0 };
    let mut machine = RecordingMachine::default();

    planner.submit_accel_line([10.0, 0.0], 0.01).unwrap();
    planner.submit_accel_line([20.0, 0.0], 0.01).unwrap();
    planner.submit_accel_line([30.0, 0.0], 0.01).unwrap();

    // Execute one segment to promote the first block to Running, then flush.
    let _ = planner.exec(&mut sink, &ik, &mut machine);
    planner.flush();
    assert!(planner.queue_has_space());

    drain(&mut planner, &mut sink, &ik, &mut machine);
    assert!(!planner.is_busy());
}

#[test]
fn set_axis_position_relocates_runtime_for_homing() {
    let mut planner = TestPlanner::new(config());
    planner.set_axis_position([3.0, 4.0]);
    assert_eq!(planner.get_runtime_position(0), Some(3.0));
    assert_eq!(planner.get_runtime_position(1), Some(4.0));
}

#[test]
fn short_segment_degrades_to_single_section() {
    let mut planner = TestPlanner::new(config());
    let mut sink = RecordingSink::default();
    let ik = IdentityKinematics { steps_per_mm: 80.0 };
    let mut machine = RecordingMachine::default();

    // Sub-micron move: too short for any ramp to meet the requested cruise
    // velocity, so the trapezoid generator takes the degraded H'/T' branch.
    planner.submit_accel_line([1e-4, 0.0], 1e-7).unwrap();
    drain(&mut planner, &mut sink, &ik, &mut machine);

    assert!(!sink.lines.is_empty());
    assert!((planner.get_runtime_position(0).unwrap() - 1e-4).abs() < 1e-9);
    assert!(!planner.is_busy());
}

#[test]
fn feedhold_mid_move_decelerates_then_resumes_to_exact_target() {
    let mut planner = TestPlanner::new(config());
    let mut sink = RecordingSink::default();
    let ik = IdentityKinematics { steps_per_mm: 80.0 };
    let mut machine = RecordingMachine::default();

    planner.submit_accel_line([100.0, 0.0], 0.1).unwrap();

    // Run a couple of segments so the hold takes effect mid-ramp rather than
    // on the very first tick.
    let _ = planner.exec(&mut sink, &ik, &mut machine);
    let _ = planner.exec(&mut sink, &ik, &mut machine);

    planner.request_feedhold();

    // Keep ticking until the executor reports the hold has taken effect
    // (i.e. it stops driving new segments without the queue being empty).
    for _ in 0..10_000 {
        match planner.exec(&mut sink, &ik, &mut machine) {
            Ok(ExecOutcome::NoOp) => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }

    planner.end_feedhold();
    drain(&mut planner, &mut sink, &ik, &mut machine);

    // The remaining travel to (100, 0) must complete exactly once resumed.
    assert!((planner.get_runtime_position(0).unwrap() - 100.0).abs() < 1e-6);
    assert!((planner.get_runtime_position(1).unwrap() - 0.0).abs() < 1e-6);
    assert!(!planner.is_busy());
}

#[test]
fn queue_drains_and_accepts_fresh_submissions() {
    let mut planner = TestPlanner::new(config());
    let mut sink = RecordingSink::default();
    let ik = IdentityKinematics { steps_per_mm: 80.0 };
    let mut machine = RecordingMachine::default();

    for i in 0..8 {
        let x = (i + 1) as f64 * 10.0;
        planner.submit_accel_line([x, 0.0], 0.01).unwrap();
    }
    assert_eq!(
        planner.submit_accel_line([1000.0, 0.0], 0.01).unwrap_err(),
        motion::SubmitError::BufferFullFatal
    );

    drain(&mut planner, &mut sink, &ik, &mut machine);

    assert!(planner.queue_has_space());
    planner.submit_accel_line([1000.0, 0.0], 0.01).unwrap();
}
