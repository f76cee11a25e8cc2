//! Runtime executor: `Planner::exec`, one prepared segment per call.
//!
//! Folds the main-loop hold-reshaping callback directly into the
//! `Sync → Plan` handling below rather than exposing it as a second entry
//! point: this crate drives `exec()` synchronously from a single thread
//! (no real interrupt preemption), so there is no separable main-loop
//! context to hand the reshaping work to.

use crate::block::{Block, BlockKind, MoveState};
use crate::errors::{ExecError, ExecOutcome};
use crate::feedhold::HoldState;
use crate::geometry::{sqrt, target_length, vector_length};
use crate::log;
use crate::planner::Planner;
use crate::runtime::{RampRun, Section};
use crate::stepper::{InverseKinematics, MachineCallbacks, StepperSink};
use crate::trapezoid::plan_trapezoid;

/// Minutes-to-microseconds, matching the feed-rate convention (`time` in
/// `Block` is minutes) the canonical-machine layer feeds this planner.
const US_PER_MINUTE: f64 = 60_000_000.0;

impl<const AXES: usize, const MOTORS: usize, const POOL_SIZE: usize> Planner<AXES, MOTORS, POOL_SIZE> {
    /// Prepares exactly one downstream segment and returns the outcome.
    /// Must be called again (`Again`) until `Ok`/`NoOp`/an error is
    /// returned; never blocks or allocates.
    pub fn exec<S, K, M>(&mut self, sink: &mut S, ik: &K, machine: &mut M) -> Result<ExecOutcome, ExecError>
    where
        S: StepperSink<MOTORS>,
        K: InverseKinematics<AXES, MOTORS>,
        M: MachineCallbacks,
    {
        if self.runtime.awaiting_resume {
            if self.feedhold.state() != HoldState::EndHold {
                return Ok(ExecOutcome::NoOp);
            }
            self.resume_from_hold();
            self.begin_resume_phase();
            if self.runtime.section == Section::Off {
                let idx = self.runtime.block_idx;
                self.finish_block(idx);
                return Ok(ExecOutcome::Ok);
            }
        } else if self.feedhold.state() == HoldState::EndHold {
            self.resume_from_hold();
        }

        if self.runtime.move_state == MoveState::Off {
            let Some(idx) = self.pool.current_run() else {
                return Ok(ExecOutcome::NoOp);
            };
            if self.pool.block(idx).hold_point && self.feedhold.state() == HoldState::Decel {
                self.feedhold.set(HoldState::Hold);
                return Ok(ExecOutcome::NoOp);
            }
            self.start_block(idx);
        }

        let idx = self.runtime.block_idx;
        let kind = self.pool.block(idx).kind;
        match kind {
            Some(BlockKind::Line) => self.exec_line(idx, sink, ik),
            Some(BlockKind::Dwell { duration_us }) => self.exec_dwell(duration_us, sink),
            Some(BlockKind::MCode(cmd)) => self.exec_mcode(cmd, sink, machine),
            Some(BlockKind::Tool(_)) | Some(BlockKind::SpindleSpeed(_)) => self.exec_passthrough(sink),
            Some(BlockKind::AccelLine) => self.exec_accel_segment(idx, sink, ik),
            None => Err(ExecError::InternalError),
        }
    }

    fn start_block(&mut self, idx: usize) {
        let block = *self.pool.block(idx);
        self.runtime.block_idx = idx;
        self.runtime.unit = block.unit;
        self.runtime.endpoint = block.target;
        self.runtime.move_state = MoveState::Run;
        self.runtime.current_line_number = block.line_number;

        if matches!(block.kind, Some(BlockKind::AccelLine)) {
            let section = Self::first_nonzero_section(&block);
            self.runtime.section = section;
            if section != Section::Off {
                self.start_section(&block, section);
            }
        }
    }

    fn first_nonzero_section(block: &Block<AXES>) -> Section {
        if block.head_length > 0.0 {
            Section::Head
        } else if block.body_length > 0.0 {
            Section::Body
        } else if block.tail_length > 0.0 {
            Section::Tail
        } else {
            Section::Off
        }
    }

    fn next_section(block: &Block<AXES>, current: Section) -> Section {
        match current {
            Section::Head => {
                if block.body_length > 0.0 {
                    Section::Body
                } else if block.tail_length > 0.0 {
                    Section::Tail
                } else {
                    Section::Off
                }
            }
            Section::Body => {
                if block.tail_length > 0.0 {
                    Section::Tail
                } else {
                    Section::Off
                }
            }
            Section::Tail | Section::Off => Section::Off,
        }
    }

    fn start_section(&mut self, block: &Block<AXES>, section: Section) {
        let (length, v_entry, v_exit) = match section {
            Section::Head => (block.head_length, block.entry_velocity, block.cruise_velocity),
            Section::Body => (block.body_length, block.cruise_velocity, block.cruise_velocity),
            Section::Tail => (block.tail_length, block.cruise_velocity, block.exit_velocity),
            Section::Off => unreachable!("start_section called on a zero-length section"),
        };

        if section == Section::Body {
            let duration_us = if v_entry > 0.0 {
                ((length / v_entry) * US_PER_MINUTE) as u32
            } else {
                0
            };
            self.runtime.ramp_run = RampRun::New;
            self.start_half(v_entry, v_entry, duration_us.max(1));
            return;
        }

        let dv = (v_exit - v_entry).abs();
        let jerk = block.jerk;
        let t_accel_minutes = if jerk > 0.0 {
            2.0 * sqrt(dv / jerk)
        } else {
            0.0
        };
        self.runtime.ramp_accel_time_us = (t_accel_minutes * US_PER_MINUTE) as u32;
        let half_minutes = t_accel_minutes / 2.0;
        let half_us = (half_minutes * US_PER_MINUTE) as u32;

        self.runtime.midpoint_velocity = (v_entry + v_exit) / 2.0;
        self.runtime.midpoint_acceleration = if t_accel_minutes > 0.0 {
            2.0 * (v_exit - v_entry) / t_accel_minutes
        } else {
            0.0
        };
        self.runtime.ramp_run = RampRun::Run1;
        self.start_half(v_entry, self.runtime.midpoint_velocity, half_us.max(1));
        let _ = length; // segmentation is driven by duration, not re-derived from length
    }

    fn start_half(&mut self, entry_velocity: f64, target_velocity: f64, half_duration_us: u32) {
        self.runtime.ramp_entry_velocity = entry_velocity;
        self.runtime.ramp_target_velocity = target_velocity;
        self.runtime.half_duration_us = half_duration_us;
        self.runtime.elapsed_us = 0;
        let segment_target_us = self.config().segment_target_us.max(1);
        let num_segments = half_duration_us.div_ceil(segment_target_us).max(1);
        self.runtime.segments_remaining = num_segments;
        self.runtime.segment_duration_us = half_duration_us / num_segments;
    }

    /// Velocity at the start of the current segment (time measured from
    /// the start of each ramp half).
    fn current_velocity(&self, block: &Block<AXES>) -> f64 {
        let t_minutes = self.runtime.elapsed_us as f64 / US_PER_MINUTE;
        let jerk = block.jerk;
        match (self.runtime.section, self.runtime.ramp_run) {
            (Section::Head, RampRun::Run1) => self.runtime.ramp_entry_velocity + 0.5 * jerk * t_minutes * t_minutes,
            (Section::Head, RampRun::Run2) => {
                self.runtime.midpoint_velocity + self.runtime.midpoint_acceleration * t_minutes
                    - 0.5 * jerk * t_minutes * t_minutes
            }
            (Section::Tail, RampRun::Run1) => self.runtime.ramp_entry_velocity - 0.5 * jerk * t_minutes * t_minutes,
            (Section::Tail, RampRun::Run2) => {
                self.runtime.midpoint_velocity - self.runtime.midpoint_acceleration * t_minutes
                    + 0.5 * jerk * t_minutes * t_minutes
            }
            (Section::Body, _) => block.cruise_velocity,
            (Section::Off, _) => 0.0,
        }
    }

    fn exec_accel_segment<S, K>(&mut self, idx: usize, sink: &mut S, ik: &K) -> Result<ExecOutcome, ExecError>
    where
        S: StepperSink<MOTORS>,
        K: InverseKinematics<AXES, MOTORS>,
    {
        let block = *self.pool.block(idx);
        let v = self.current_velocity(&block);
        let dt_minutes = self.runtime.segment_duration_us as f64 / US_PER_MINUTE;
        let segment_length = v * dt_minutes;

        let mut target = [0.0; AXES];
        for i in 0..AXES {
            target[i] = self.runtime.position[i] + self.runtime.unit[i] * segment_length;
        }

        let is_last_segment_of_block = self.runtime.segments_remaining == 1
            && self.runtime.ramp_run != RampRun::Run1
            && Self::next_section(&block, self.runtime.section) == Section::Off;
        if is_last_segment_of_block
            && !self.runtime.in_feedhold_replan
            && !self.runtime.decel_tail_pending
        {
            target = self.runtime.endpoint;
        }

        let mut travel = [0.0; AXES];
        for i in 0..AXES {
            travel[i] = target[i] - self.runtime.position[i];
        }
        let duration_us = self.runtime.segment_duration_us;
        let steps = ik.steps_for_travel(&travel, duration_us);
        sink.prep_line(&steps, duration_us).map_err(ExecError::from)?;

        self.runtime.position = target;
        self.runtime.current_velocity = v;
        self.runtime.elapsed_us += self.runtime.segment_duration_us;
        self.runtime.segments_remaining -= 1;

        // The hold takes effect as soon as a segment finishes, not only
        // once the whole block completes: `plan_hold` must run here, while
        // `idx`'s slot still holds the real block data, not after
        // `finish_block` has already reset it to `Empty`.
        if self.feedhold.state() == HoldState::Sync {
            self.plan_hold(idx);
            return Ok(ExecOutcome::Again);
        }

        if self.runtime.segments_remaining > 0 {
            return Ok(ExecOutcome::Again);
        }

        if self.runtime.ramp_run == RampRun::Run1 && self.runtime.section != Section::Body {
            self.runtime.ramp_run = RampRun::Run2;
            let entry = self.runtime.midpoint_velocity;
            let target_v = self.runtime.ramp_target_velocity;
            let half_us = self.runtime.ramp_accel_time_us - self.runtime.half_duration_us;
            self.start_half(entry, target_v, half_us.max(1));
            return Ok(ExecOutcome::Again);
        }

        let next_section = Self::next_section(&block, self.runtime.section);
        self.runtime.section = next_section;
        if next_section == Section::Off {
            if self.runtime.decel_tail_pending {
                // The decel tail `plan_hold`'s Case A started just finished:
                // pause at `Hold` (whether or not there is leftover travel
                // to resume) instead of finalising the slot and continuing.
                self.runtime.decel_tail_pending = false;
                self.runtime.awaiting_resume = true;
                self.feedhold.set(HoldState::Hold);
                return Ok(ExecOutcome::NoOp);
            }
            self.finish_block(idx);
            return Ok(ExecOutcome::Ok);
        }
        self.runtime.ramp_run = RampRun::New;
        self.start_section(&block, next_section);
        Ok(ExecOutcome::Again)
    }

    /// Reconfigures the block at `runtime.block_idx` in place for the
    /// leftover travel `plan_hold`'s Case A deferred past the decel tail,
    /// starting from rest, and kicks off its first section. Leaves
    /// `runtime.section == Section::Off` if there is nothing left to run.
    fn begin_resume_phase(&mut self) {
        let idx = self.runtime.block_idx;
        let tol = self.config().tolerances;
        let jerk = self.pool.block(idx).jerk;
        let length = self.runtime.resume_length;
        let exit_velocity = self.runtime.resume_exit_velocity;
        let cruise_vmax = self.runtime.resume_cruise_vmax;

        let plan = plan_trapezoid(0.0, cruise_vmax, exit_velocity, length, jerk, &tol);
        {
            let b = self.pool.block_mut(idx);
            b.head_length = plan.head_length;
            b.body_length = plan.body_length;
            b.tail_length = plan.tail_length;
            b.entry_velocity = plan.entry_velocity;
            b.cruise_velocity = plan.cruise_velocity;
            b.exit_velocity = plan.exit_velocity;
            b.length = length;
            b.hold_point = false;
        }
        self.runtime.resume_length = 0.0;
        self.runtime.resume_exit_velocity = 0.0;
        self.runtime.resume_cruise_vmax = 0.0;
        self.runtime.awaiting_resume = false;

        let block = *self.pool.block(idx);
        let section = Self::first_nonzero_section(&block);
        self.runtime.section = section;
        self.runtime.ramp_run = RampRun::New;
        if section != Section::Off {
            self.start_section(&block, section);
        }
    }

    fn exec_line<S, K>(&mut self, idx: usize, sink: &mut S, ik: &K) -> Result<ExecOutcome, ExecError>
    where
        S: StepperSink<MOTORS>,
        K: InverseKinematics<AXES, MOTORS>,
    {
        let block = *self.pool.block(idx);
        let duration_us = (block.time * US_PER_MINUTE) as u32;
        let mut travel = [0.0; AXES];
        for i in 0..AXES {
            travel[i] = block.target[i] - self.runtime.position[i];
        }
        let steps = ik.steps_for_travel(&travel, duration_us);
        sink.prep_line(&steps, duration_us).map_err(ExecError::from)?;
        self.runtime.position = block.target;
        self.runtime.current_velocity = if block.time > 0.0 { block.length / block.time } else { 0.0 };
        if self.feedhold.state() == HoldState::Sync {
            self.plan_hold(idx);
            return Ok(ExecOutcome::Again);
        }
        self.finish_block(idx);
        Ok(ExecOutcome::Ok)
    }

    /// These block kinds carry no travel, so there is nothing for
    /// `plan_hold`'s braking math to act on: a `Sync` request observed here
    /// marks the next queued block (if any) as the release point, exactly
    /// like `plan_hold`'s Case B release marking, so the existing
    /// `hold_point`/`Decel` gate at the top of `exec` pauses before that
    /// block starts rather than mid-command.
    fn sync_to_hold_if_requested(&mut self) {
        if self.feedhold.state() != HoldState::Sync {
            return;
        }
        self.feedhold.set(HoldState::Plan);
        let idx = self.runtime.block_idx;
        let next_idx = crate::pool::BufferPool::<AXES, POOL_SIZE>::next_index(idx);
        let next_state = self.pool.block(next_idx).state;
        if next_state == crate::block::BlockState::Queued || next_state == crate::block::BlockState::Pending {
            self.pool.block_mut(next_idx).hold_point = true;
            self.feedhold.set(HoldState::Decel);
        } else {
            self.feedhold.set(HoldState::Hold);
        }
    }

    fn exec_dwell<S>(&mut self, duration_us: u32, sink: &mut S) -> Result<ExecOutcome, ExecError>
    where
        S: StepperSink<MOTORS>,
    {
        sink.prep_dwell(duration_us).map_err(ExecError::from)?;
        self.sync_to_hold_if_requested();
        let idx = self.runtime.block_idx;
        self.finish_block(idx);
        Ok(ExecOutcome::Ok)
    }

    fn exec_mcode<S, M>(&mut self, cmd: crate::block::McodeCommand, sink: &mut S, machine: &mut M) -> Result<ExecOutcome, ExecError>
    where
        S: StepperSink<MOTORS>,
        M: MachineCallbacks,
    {
        use crate::block::McodeCommand;
        match cmd {
            McodeCommand::ProgramStop => machine.exec_program_stop(),
            McodeCommand::ProgramEnd => machine.exec_program_end(),
            McodeCommand::SpindleControl(dir) => machine.exec_spindle_control(dir),
            McodeCommand::MistCoolant(on) => machine.exec_mist_coolant(on),
            McodeCommand::FloodCoolant(on) => machine.exec_flood_coolant(on),
            McodeCommand::FeedOverrideEnable(on) => machine.exec_feed_override_enable(on),
            McodeCommand::Unknown(code) => {
                let idx = self.runtime.block_idx;
                self.pool.finalise_run();
                self.runtime.move_state = MoveState::Off;
                let _ = idx;
                log::error!("exec: unknown MCode, dropping block");
                return Err(ExecError::UnknownMCode(code));
            }
        }
        sink.prep_null().map_err(ExecError::from)?;
        self.sync_to_hold_if_requested();
        let idx = self.runtime.block_idx;
        self.finish_block(idx);
        Ok(ExecOutcome::Ok)
    }

    /// `Tool`/`SpindleSpeed` blocks have no executor-level side effect in
    /// this crate (the canonical-machine layer that would read the
    /// requested tool id or RPM is out of scope); they still flow through
    /// `prep_null` to preserve stepper loader ordering.
    fn exec_passthrough<S>(&mut self, sink: &mut S) -> Result<ExecOutcome, ExecError>
    where
        S: StepperSink<MOTORS>,
    {
        sink.prep_null().map_err(ExecError::from)?;
        self.sync_to_hold_if_requested();
        let idx = self.runtime.block_idx;
        self.finish_block(idx);
        Ok(ExecOutcome::Ok)
    }

    fn finish_block(&mut self, idx: usize) {
        self.pool.finalise_run();
        self.runtime.move_state = MoveState::Off;
        self.runtime.section = Section::Off;
        let _ = idx;
    }

    /// `Sync → Plan → Decel`: reshapes the in-flight block (Case A) or
    /// walks forward consuming queued blocks (Case B) until the runtime can
    /// reach zero velocity, marks the release block, and re-runs look-ahead
    /// over the reshaped tail.
    fn plan_hold(&mut self, current_idx: usize) {
        self.feedhold.set(HoldState::Plan);

        let block = *self.pool.block(current_idx);
        let braking_length = target_length(self.runtime.current_velocity, 0.0, block.jerk);
        let remaining_length = vector_length(&block.target, &self.runtime.position);

        if braking_length <= remaining_length {
            // Case A: braking fits inside what is left of this block. Turn
            // the remainder into a pure decel tail that runs now; whatever
            // length is left over after that becomes a fresh post-hold
            // block, deferred (`runtime.resume_*`) until `end_feedhold`
            // (`begin_resume_phase`, below) rather than inflated into this
            // slot's own `length` — that slot gets finalised like any other
            // once its decel tail finishes.
            let post_hold_length = remaining_length - braking_length;
            let original_exit_velocity = block.exit_velocity;
            let original_cruise_vmax = block.cruise_vmax;
            self.runtime.in_feedhold_replan = true;
            {
                let b = self.pool.block_mut(current_idx);
                b.head_length = 0.0;
                b.body_length = 0.0;
                b.tail_length = braking_length;
                // The new tail starts from wherever the runtime actually is
                // mid-ramp, not from the block's originally planned cruise.
                b.cruise_velocity = self.runtime.current_velocity;
                b.exit_velocity = 0.0;
                b.hold_point = true;
                b.length = braking_length;
                b.entry_vmax = 0.0;
            }
            self.runtime.section = Section::Tail;
            self.runtime.ramp_run = RampRun::New;
            self.runtime.decel_tail_pending = true;
            let b = *self.pool.block(current_idx);
            self.start_section(&b, Section::Tail);
            self.runtime.in_feedhold_replan = false;
            if post_hold_length > self.config().tolerances.epsilon {
                self.runtime.resume_length = post_hold_length;
                self.runtime.resume_exit_velocity = original_exit_velocity;
                self.runtime.resume_cruise_vmax = original_cruise_vmax;
            }
        } else {
            // Case B: not enough room left in this block. Walk forward,
            // consuming queued blocks into this one's remaining length
            // budget, until the accumulated length can absorb the braking
            // distance; the last block folded in becomes the release point.
            let mut accumulated = remaining_length;
            let mut walk_idx = current_idx;
            let mut release_idx = current_idx;
            for _ in 0..POOL_SIZE {
                if accumulated >= braking_length {
                    release_idx = walk_idx;
                    break;
                }
                let next_idx = crate::pool::BufferPool::<AXES, POOL_SIZE>::next_index(walk_idx);
                if self.pool.block(next_idx).state != crate::block::BlockState::Queued
                    && self.pool.block(next_idx).state != crate::block::BlockState::Pending
                {
                    release_idx = walk_idx;
                    break;
                }
                accumulated += self.pool.block(next_idx).length;
                release_idx = next_idx;
                walk_idx = next_idx;
            }
            self.pool.block_mut(release_idx).hold_point = true;
            self.pool.block_mut(release_idx).exit_velocity = 0.0;
            self.pool.block_mut(release_idx).exit_vmax = 0.0;
            // `current_idx` is mid-execution: its trapezoid shape must not be
            // rewritten out from under the runtime's ramp state machine, so
            // it is excluded from the replannable chain `replan_from` walks.
            self.pool.block_mut(current_idx).replannable = false;
            if release_idx != current_idx {
                let mut idx = crate::pool::BufferPool::<AXES, POOL_SIZE>::next_index(current_idx);
                loop {
                    self.pool.block_mut(idx).replannable = true;
                    if idx == release_idx {
                        break;
                    }
                    idx = crate::pool::BufferPool::<AXES, POOL_SIZE>::next_index(idx);
                }
            }
            self.replan_from(release_idx);
        }

        self.feedhold.set(HoldState::Decel);
    }

    fn resume_from_hold(&mut self) {
        let run_idx = self.pool.run_index();
        self.pool.block_mut(run_idx).hold_point = false;
        self.feedhold.reset();
    }
}
