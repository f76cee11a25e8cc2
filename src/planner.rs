//! Look-ahead planner and public submission API.
//!
//! `Planner` is the single owning structure for both the planner singleton
//! (`position`, the planning-time end-of-queue position) and the buffer
//! pool. `exec()` takes `&mut self` and is documented as the
//! interrupt-context entry point; every other method here is documented
//! as main-loop-only. This crate does not model true interrupt preemption
//! — the synchronization story is carried in documentation and in the
//! single-writer-per-cursor discipline of [`crate::pool::BufferPool`], not
//! in atomics, matching a test suite that drives the planner from one
//! thread.

use crate::block::{Block, BlockKind, BlockState, McodeCommand};
use crate::config::PlannerConfig;
use crate::errors::SubmitError;
use crate::feedhold::FeedholdController;
use crate::geometry::{cbrt, junction_vmax, target_velocity, unit_vector};
use crate::log;
use crate::pool::BufferPool;
use crate::runtime::RuntimeState;
use crate::trapezoid::plan_trapezoid;

/// The trajectory planner: buffer pool, planning-time position, tolerances,
/// runtime state, and feedhold controller, generic over axis count, motor
/// count, and pool capacity.
pub struct Planner<const AXES: usize, const MOTORS: usize, const POOL_SIZE: usize> {
    pub(crate) pool: BufferPool<AXES, POOL_SIZE>,
    /// Planning-time end-of-queue position. Updated immediately on
    /// successful submission, not on execution, so it leads the physical
    /// tool position.
    position: [f64; AXES],
    config: PlannerConfig<AXES>,
    pub(crate) runtime: RuntimeState<AXES>,
    pub(crate) feedhold: FeedholdController,
    next_line_number: u32,
    /// Mirrors G61.1 (exact stop) vs G64 (path blending) path control,
    /// applied to the next `submit_accel_line` call. Set via
    /// [`Planner::set_exact_stop`].
    exact_stop: bool,
}

impl<const AXES: usize, const MOTORS: usize, const POOL_SIZE: usize> Planner<AXES, MOTORS, POOL_SIZE> {
    pub fn new(config: PlannerConfig<AXES>) -> Self {
        let exact_stop = config.exact_stop_default;
        Self {
            pool: BufferPool::new(),
            position: [0.0; AXES],
            config,
            runtime: RuntimeState::new(),
            feedhold: FeedholdController::new(),
            next_line_number: 0,
            exact_stop,
        }
    }

    pub fn config(&self) -> &PlannerConfig<AXES> {
        &self.config
    }

    /// Mirrors G61.1/G64 path control mode for subsequent jerk-limited
    /// submissions.
    pub fn set_exact_stop(&mut self, exact_stop: bool) {
        self.exact_stop = exact_stop;
    }

    pub fn queue_has_space(&self) -> bool {
        self.pool.has_space()
    }

    pub fn is_busy(&self) -> bool {
        !self.pool.is_empty()
    }

    pub fn get_runtime_position(&self, axis: usize) -> Option<f64> {
        self.runtime.position.get(axis).copied()
    }

    pub fn get_runtime_velocity(&self) -> f64 {
        self.runtime.current_velocity
    }

    pub fn get_runtime_line_number(&self) -> u32 {
        self.runtime.current_line_number
    }

    /// Resets the planning-time position only (G92-style).
    pub fn set_plan_position(&mut self, position: [f64; AXES]) {
        self.position = position;
    }

    /// Resets both the planning-time and runtime positions (homing /
    /// `set_axis_position` helpers).
    pub fn set_axis_position(&mut self, position: [f64; AXES]) {
        self.position = position;
        self.runtime.position = position;
    }

    /// Clears every `Queued`/`Pending` slot (not the `Running` one) and
    /// cancels any in-progress feedhold plan.
    pub fn flush(&mut self) {
        self.pool.flush();
        self.feedhold.reset();
    }

    /// Canonical-machine assertion: begins a feedhold. The executor picks
    /// this up at the next segment boundary (`src/exec.rs`).
    pub fn request_feedhold(&mut self) {
        self.feedhold.request();
    }

    /// Resume after a feedhold reaches `Hold`.
    pub fn end_feedhold(&mut self) {
        self.feedhold.end();
    }

    fn next_line_number(&mut self) -> u32 {
        self.next_line_number += 1;
        self.next_line_number
    }

    /// Unaccelerated move: the executor emits a single `prep_line` for the
    /// whole block, bypassing look-ahead planning entirely.
    pub fn submit_line(&mut self, target: [f64; AXES], minutes: f64) -> Result<(), SubmitError> {
        if minutes < self.config.tolerances.epsilon {
            return Err(SubmitError::ZeroLengthMove);
        }
        let idx = self
            .pool
            .try_acquire_write()
            .ok_or(SubmitError::BufferFullFatal)?;

        let Some((unit, length)) = unit_vector(&self.position, &target, self.config.tolerances.epsilon) else {
            self.pool.release_write();
            return Err(SubmitError::ZeroLengthMove);
        };

        let velocity = length / minutes;
        let line_number = self.next_line_number();
        {
            let block = self.pool.block_mut(idx);
            block.target = target;
            block.unit = unit;
            block.length = length;
            block.time = minutes;
            block.line_number = line_number;
            block.entry_velocity = velocity;
            block.cruise_velocity = velocity;
            block.exit_velocity = velocity;
            block.body_length = length;
            block.replannable = false;
        }
        self.pool.commit(idx, BlockKind::Line);
        self.position = target;
        log::trace!("planner: submitted unaccelerated line");
        Ok(())
    }

    /// Jerk-limited move: the main look-ahead planner entry point.
    pub fn submit_accel_line(&mut self, target: [f64; AXES], minutes: f64) -> Result<(), SubmitError> {
        if minutes < self.config.tolerances.epsilon {
            return Err(SubmitError::ZeroLengthMove);
        }
        let idx = self
            .pool
            .try_acquire_write()
            .ok_or(SubmitError::BufferFullFatal)?;

        let Some((unit, length)) = unit_vector(&self.position, &target, self.config.tolerances.epsilon) else {
            self.pool.release_write();
            return Err(SubmitError::ZeroLengthMove);
        };

        let jerk = {
            let mut sum_sq = 0.0;
            for i in 0..AXES {
                let term = unit[i] * self.config.axis_limits.jerk_max[i];
                sum_sq += term * term;
            }
            #[cfg(feature = "std")]
            {
                sum_sq.sqrt()
            }
            #[cfg(not(feature = "std"))]
            {
                libm::sqrt(sum_sq)
            }
        };
        let recip_jerk = if jerk > 0.0 { 1.0 / jerk } else { 0.0 };
        let cubert_jerk = cbrt(jerk);

        let cruise_vmax = length / minutes;
        let exact_stop_cap = if self.exact_stop { 0.0 } else { f64::INFINITY };

        let prev_idx = self.pool.last_index();
        let junction = match prev_idx {
            Some(prev) => junction_vmax(
                &self.pool.block(prev).unit,
                &unit,
                &self.config.axis_limits.junction_deviation,
                self.config.junction_acceleration,
            ),
            None => 0.0, // nothing precedes this block: must start from rest
        };
        let entry_vmax = cruise_vmax.min(junction).min(exact_stop_cap);
        let delta_vmax = target_velocity(0.0, length, jerk) - 0.0;
        let exit_vmax = cruise_vmax.min(entry_vmax + delta_vmax).min(exact_stop_cap);

        let line_number = self.next_line_number();
        {
            let block = self.pool.block_mut(idx);
            block.target = target;
            block.unit = unit;
            block.length = length;
            block.time = minutes;
            block.line_number = line_number;
            block.jerk = jerk;
            block.recip_jerk = recip_jerk;
            block.cubert_jerk = cubert_jerk;
            block.cruise_vmax = cruise_vmax;
            block.entry_vmax = entry_vmax;
            block.delta_vmax = delta_vmax;
            block.exit_vmax = exit_vmax;
            block.braking_velocity = delta_vmax;
            block.replannable = !self.exact_stop;
        }
        self.pool.commit(idx, BlockKind::AccelLine);
        self.position = target;
        log::trace!("planner: submitted jerk-limited line, replanning tail");
        self.replan_from(idx);
        Ok(())
    }

    pub fn submit_dwell(&mut self, seconds: f64) -> Result<(), SubmitError> {
        if seconds < self.config.tolerances.epsilon {
            return Err(SubmitError::ZeroLengthMove);
        }
        let duration_us = (seconds * 1_000_000.0) as u32;
        self.submit_auxiliary(BlockKind::Dwell { duration_us })
    }

    pub fn submit_mcode(&mut self, code: u32) -> Result<(), SubmitError> {
        self.submit_auxiliary(BlockKind::MCode(McodeCommand::from_numeric(code)))
    }

    pub fn submit_tool(&mut self, id: u32) -> Result<(), SubmitError> {
        self.submit_auxiliary(BlockKind::Tool(id))
    }

    pub fn submit_spindle_speed(&mut self, rpm: f64) -> Result<(), SubmitError> {
        self.submit_auxiliary(BlockKind::SpindleSpeed(rpm))
    }

    fn submit_auxiliary(&mut self, kind: BlockKind) -> Result<(), SubmitError> {
        let idx = self
            .pool
            .try_acquire_write()
            .ok_or(SubmitError::BufferFullFatal)?;
        let line_number = self.next_line_number();
        self.pool.block_mut(idx).line_number = line_number;
        self.pool.commit(idx, kind);
        Ok(())
    }

    /// Re-plans the tail of the queue ending at `bf_idx`: a reverse
    /// braking-velocity pass followed by a forward cruising pass.
    pub(crate) fn replan_from(&mut self, bf_idx: usize) {
        let anchor = self.reverse_pass(bf_idx);
        let start = if anchor == bf_idx {
            anchor
        } else {
            BufferPool::<AXES, POOL_SIZE>::next_index(anchor)
        };
        self.forward_pass(start, bf_idx);
    }

    /// Walks backward from `bf_idx` while predecessors are `replannable`,
    /// tightening each one's `braking_velocity`. Returns the index of the
    /// block that anchors the plan: either the first non-replannable
    /// predecessor found, or `bf_idx` itself if none precedes it.
    fn reverse_pass(&mut self, bf_idx: usize) -> usize {
        let mut anchor = bf_idx;
        for _ in 0..POOL_SIZE {
            let prev_idx = BufferPool::<AXES, POOL_SIZE>::prev_index(anchor);
            if prev_idx == anchor || self.pool.block(prev_idx).state == BlockState::Empty {
                break; // nothing precedes `anchor` in the committed chain
            }
            if !self.pool.block(prev_idx).replannable {
                anchor = prev_idx;
                break;
            }
            let next_entry_vmax = self.pool.block(anchor).entry_vmax;
            let next_braking = self.pool.block(anchor).braking_velocity;
            let prev_delta_vmax = self.pool.block(prev_idx).delta_vmax;
            let prev_cruise_vmax = self.pool.block(prev_idx).cruise_vmax;
            // Nothing bounds this sum against cruise_vmax by construction;
            // clamped here (see DESIGN.md, OQ-1) so braking velocity never
            // exceeds what the predecessor could physically cruise at.
            let new_braking = (next_entry_vmax.min(next_braking) + prev_delta_vmax).min(prev_cruise_vmax);
            self.pool.block_mut(prev_idx).braking_velocity = new_braking;
            anchor = prev_idx;
        }
        anchor
    }

    /// Walks forward from `start` to `bf_idx` inclusive, assigning
    /// consistent entry/cruise/exit velocities and invoking the trapezoid
    /// generator for each block.
    fn forward_pass(&mut self, start: usize, bf_idx: usize) {
        let mut idx = start;
        let mut previous_exit_velocity = 0.0;
        let mut first = true;
        let tol = self.config.tolerances;
        loop {
            let block = self.pool.block(idx);
            let entry_velocity = if first {
                block.entry_vmax
            } else {
                previous_exit_velocity
            };
            let cruise_velocity = block.cruise_vmax;
            let is_last = idx == bf_idx;
            let exit_velocity = if is_last {
                0.0
            } else {
                let next_idx = BufferPool::<AXES, POOL_SIZE>::next_index(idx);
                let next = self.pool.block(next_idx);
                block
                    .exit_vmax
                    .min(next.braking_velocity)
                    .min(next.entry_vmax)
                    .min(entry_velocity + block.delta_vmax)
            };
            let length = block.length;
            let jerk = block.jerk;

            let plan = plan_trapezoid(entry_velocity, cruise_velocity, exit_velocity, length, jerk, &tol);

            let optimally_planned = (plan.exit_velocity - block.exit_vmax).abs() < tol.velocity_tolerance;

            let block = self.pool.block_mut(idx);
            block.head_length = plan.head_length;
            block.body_length = plan.body_length;
            block.tail_length = plan.tail_length;
            block.entry_velocity = plan.entry_velocity;
            block.cruise_velocity = plan.cruise_velocity;
            block.exit_velocity = plan.exit_velocity;
            if optimally_planned {
                block.replannable = false;
            }

            previous_exit_velocity = plan.exit_velocity;
            if is_last {
                break;
            }
            idx = BufferPool::<AXES, POOL_SIZE>::next_index(idx);
            first = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AxisLimits, Tolerances};

    type TestPlanner = Planner<2, 2, 8>;

    fn config() -> PlannerConfig<2> {
        PlannerConfig {
            axis_limits: AxisLimits {
                jerk_max: [5.0e7, 5.0e7],
                junction_deviation: [0.05, 0.05],
            },
            junction_acceleration: 2.0e5,
            segment_target_us: 5_000,
            tolerances: Tolerances::default(),
            exact_stop_default: false,
        }
    }

    #[test]
    fn s1_single_straight_move() {
        let mut planner = TestPlanner::new(config());
        planner.submit_accel_line([10.0, 0.0], 0.01).unwrap();
        let idx = planner.pool.first_index().unwrap();
        let block = planner.pool.block(idx);
        assert!((block.length - 10.0).abs() < 1e-9);
        assert!((block.cruise_vmax - 1000.0).abs() < 1e-6);
        assert_eq!(block.entry_velocity, 0.0);
        assert_eq!(block.exit_velocity, 0.0);
        assert!((block.head_length - block.tail_length).abs() < 1e-6);
        assert!(block.body_length >= 0.0);
    }

    #[test]
    fn s2_two_collinear_moves_share_junction_velocity() {
        let mut planner = TestPlanner::new(config());
        planner.submit_accel_line([10.0, 0.0], 0.01).unwrap();
        planner.submit_accel_line([20.0, 0.0], 0.01).unwrap();
        let first_idx = planner.pool.first_index().unwrap();
        let second_idx = BufferPool::<2, 8>::next_index(first_idx);
        let first = *planner.pool.block(first_idx);
        let second = *planner.pool.block(second_idx);
        assert!((first.exit_velocity - 1000.0).abs() < 1.0);
        assert!((first.exit_velocity - second.entry_velocity).abs() < config().tolerances.velocity_tolerance + 1e-6);
    }

    #[test]
    fn s3_right_angle_corner_limits_junction_velocity() {
        let mut planner = TestPlanner::new(config());
        planner.submit_accel_line([10.0, 0.0], 0.01).unwrap();
        planner.submit_accel_line([10.0, 10.0], 0.01).unwrap();
        let first_idx = planner.pool.first_index().unwrap();
        let second_idx = BufferPool::<2, 8>::next_index(first_idx);
        let first = *planner.pool.block(first_idx);
        let second = *planner.pool.block(second_idx);
        assert!(first.exit_velocity < first.cruise_vmax - 1.0);
        assert!((first.exit_velocity - second.entry_velocity).abs() < config().tolerances.velocity_tolerance + 1e-6);
        assert!(first.head_length > 0.0 && first.tail_length > 0.0);
        assert!(second.head_length > 0.0 && second.tail_length > 0.0);
    }

    #[test]
    fn s6_queue_saturation_then_drain() {
        let mut planner = TestPlanner::new(config());
        for i in 0..8 {
            let x = (i + 1) as f64 * 10.0;
            planner.submit_accel_line([x, 0.0], 0.01).unwrap();
        }
        let err = planner.submit_accel_line([1000.0, 0.0], 0.01).unwrap_err();
        assert_eq!(err, SubmitError::BufferFullFatal);
    }

    #[test]
    fn set_plan_position_does_not_move_runtime() {
        let mut planner = TestPlanner::new(config());
        planner.set_plan_position([5.0, 5.0]);
        assert_eq!(planner.get_runtime_position(0), Some(0.0));
    }

    #[test]
    fn set_axis_position_moves_both() {
        let mut planner = TestPlanner::new(config());
        planner.set_axis_position([5.0, 5.0]);
        assert_eq!(planner.get_runtime_position(0), Some(5.0));
    }
}
