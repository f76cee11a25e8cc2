//! Executor-owned runtime state ("Runtime singleton").
//!
//! Split from `Planner` itself so `exec()` can borrow it independently of
//! the buffer pool and configuration, and so tests can inspect it without
//! reaching into planner internals.

use crate::block::MoveState;

/// Which third of a block's trapezoid the executor is currently stepping
/// through. `Off` means no block is loaded (block-level state `Off`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Off,
    Head,
    Body,
    Tail,
}

/// Sub-phase within a jerk-limited ramp section: `Run1` is the concave half
/// (accelerating away from the entry velocity), `Run2` the convex half
/// (settling into the target velocity). Body sections only ever use
/// `Run1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampRun {
    New,
    Run1,
    Run2,
}

/// Per-tick executor state, generic over axis count so it can be embedded
/// directly in [`crate::planner::Planner`].
#[derive(Debug, Clone, Copy)]
pub struct RuntimeState<const AXES: usize> {
    pub move_state: MoveState,
    pub section: Section,
    pub ramp_run: RampRun,

    /// Index into the buffer pool of the block currently loaded, valid
    /// whenever `move_state != Off`.
    pub block_idx: usize,

    /// Elapsed time within the current ramp half or body, in microseconds.
    /// Reset to 0 at the start of each section/half.
    pub elapsed_us: u32,
    /// Total duration of the current ramp half (or body), in microseconds.
    pub half_duration_us: u32,
    /// Segments remaining in the current section or half.
    pub segments_remaining: u32,
    /// Duration of one segment within the current section, in microseconds.
    pub segment_duration_us: u32,

    /// Entry/target velocity pair for the ramp half currently executing.
    pub ramp_entry_velocity: f64,
    pub ramp_target_velocity: f64,
    /// Midpoint velocity/acceleration for the Run2 half of the current ramp.
    pub midpoint_velocity: f64,
    pub midpoint_acceleration: f64,
    pub ramp_accel_time_us: u32,

    /// Physical tool position, trailing [`crate::planner::Planner`]'s
    /// planning-time position by whatever has not yet executed.
    pub position: [f64; AXES],
    /// Target position of the block currently executing, snapped to exactly
    /// on the final segment to cancel accumulated floating-point error.
    pub endpoint: [f64; AXES],
    pub unit: [f64; AXES],

    pub current_velocity: f64,
    pub current_line_number: u32,

    /// Set by `plan_hold_callback` (folded into `exec`'s `Sync`→`Plan`
    /// handling, see `src/feedhold.rs`) while reshaping the in-flight
    /// block; suppresses the endpoint snap so the reshaped tail is not
    /// overwritten.
    pub in_feedhold_replan: bool,

    /// Set by `plan_hold`'s Case A (`src/exec.rs`) when the decel tail it
    /// just started must pause at `Hold` once it finishes, rather than
    /// finalising the block and continuing to the next one. Cleared when
    /// that pause is reached and `awaiting_resume` takes over.
    pub decel_tail_pending: bool,
    /// `true` between the decel tail finishing and `end_feedhold` releasing
    /// it; the leftover travel's parameters live in the `resume_*` fields
    /// below (possibly all-zero, if braking consumed the whole remainder).
    pub awaiting_resume: bool,
    pub resume_length: f64,
    pub resume_exit_velocity: f64,
    pub resume_cruise_vmax: f64,
}

impl<const AXES: usize> RuntimeState<AXES> {
    pub fn new() -> Self {
        Self {
            move_state: MoveState::Off,
            section: Section::Off,
            ramp_run: RampRun::New,
            block_idx: 0,
            elapsed_us: 0,
            half_duration_us: 0,
            segments_remaining: 0,
            segment_duration_us: 0,
            ramp_entry_velocity: 0.0,
            ramp_target_velocity: 0.0,
            midpoint_velocity: 0.0,
            midpoint_acceleration: 0.0,
            ramp_accel_time_us: 0,
            position: [0.0; AXES],
            endpoint: [0.0; AXES],
            unit: [0.0; AXES],
            current_velocity: 0.0,
            current_line_number: 0,
            in_feedhold_replan: false,
            decel_tail_pending: false,
            awaiting_resume: false,
            resume_length: 0.0,
            resume_exit_velocity: 0.0,
            resume_cruise_vmax: 0.0,
        }
    }
}

impl<const AXES: usize> Default for RuntimeState<AXES> {
    fn default() -> Self {
        Self::new()
    }
}
