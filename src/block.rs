//! Planning block and its lifecycle/kind/move-state enums.

/// What a block actually does once it reaches the executor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockKind {
    /// Unaccelerated move: the executor emits a single `prep_line`.
    Line,
    /// Jerk-limited move: subject to look-ahead planning and trapezoid
    /// segmentation.
    AccelLine,
    /// Pure time delay, in microseconds.
    Dwell { duration_us: u32 },
    /// Auxiliary command dispatched through [`crate::stepper::MachineCallbacks`].
    MCode(McodeCommand),
    /// Tool-change request; carries the requested tool id.
    Tool(u32),
    /// Spindle speed request, in RPM.
    SpindleSpeed(f64),
}

/// Auxiliary machine commands, modeled as a tagged variant with a handler
/// table (the executor's `MachineCallbacks`) rather than a `switch` over
/// numeric M-codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum McodeCommand {
    ProgramStop,
    ProgramEnd,
    SpindleControl(SpindleDirection),
    MistCoolant(bool),
    FloodCoolant(bool),
    FeedOverrideEnable(bool),
    /// Any other M-code, carried by numeric value for [`crate::errors::ExecError::UnknownMCode`].
    Unknown(u32),
}

impl McodeCommand {
    /// Maps a numeric M-code to its handler-table variant. Covers the
    /// commonly implemented subset (program control, spindle, coolant, feed
    /// override); anything else comes back as `Unknown` and is rejected by
    /// the executor at run time.
    pub fn from_numeric(code: u32) -> Self {
        match code {
            0 | 1 => McodeCommand::ProgramStop,
            2 | 30 => McodeCommand::ProgramEnd,
            3 => McodeCommand::SpindleControl(SpindleDirection::Clockwise),
            4 => McodeCommand::SpindleControl(SpindleDirection::CounterClockwise),
            5 => McodeCommand::SpindleControl(SpindleDirection::Off),
            7 => McodeCommand::MistCoolant(true),
            8 => McodeCommand::FloodCoolant(true),
            9 => McodeCommand::MistCoolant(false),
            48 => McodeCommand::FeedOverrideEnable(true),
            49 => McodeCommand::FeedOverrideEnable(false),
            other => McodeCommand::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum SpindleDirection {
    Off,
    Clockwise,
    CounterClockwise,
}

/// Lifecycle state of a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockState {
    Empty,
    Loading,
    Queued,
    Pending,
    Running,
}

/// Execution sub-state within a `Running` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum MoveState {
    Off,
    New,
    Run,
}

/// One queued unit of planned motion or auxiliary command.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct Block<const AXES: usize> {
    pub kind: Option<BlockKind>,
    pub state: BlockState,
    pub line_number: u32,
    pub move_state: MoveState,
    pub replannable: bool,
    pub hold_point: bool,

    pub target: [f64; AXES],
    pub unit: [f64; AXES],
    pub length: f64,
    /// Requested duration, in minutes (matches the feed-rate convention of
    /// the canonical-machine layer this planner is fed by).
    pub time: f64,

    pub head_length: f64,
    pub body_length: f64,
    pub tail_length: f64,

    pub entry_velocity: f64,
    pub cruise_velocity: f64,
    pub exit_velocity: f64,

    pub entry_vmax: f64,
    pub cruise_vmax: f64,
    pub exit_vmax: f64,
    pub delta_vmax: f64,

    pub braking_velocity: f64,

    pub jerk: f64,
    pub recip_jerk: f64,
    pub cubert_jerk: f64,
}

impl<const AXES: usize> Block<AXES> {
    /// A slot in its `Empty` resting state, zeroed except for link-irrelevant
    /// defaults (this planner uses index cursors rather than linked pointers,
    /// see `src/pool.rs`, so there is nothing to preserve across a zeroing).
    pub const fn empty() -> Self {
        Self {
            kind: None,
            state: BlockState::Empty,
            line_number: 0,
            move_state: MoveState::Off,
            replannable: false,
            hold_point: false,
            target: [0.0; AXES],
            unit: [0.0; AXES],
            length: 0.0,
            time: 0.0,
            head_length: 0.0,
            body_length: 0.0,
            tail_length: 0.0,
            entry_velocity: 0.0,
            cruise_velocity: 0.0,
            exit_velocity: 0.0,
            entry_vmax: 0.0,
            cruise_vmax: 0.0,
            exit_vmax: 0.0,
            delta_vmax: 0.0,
            braking_velocity: 0.0,
            jerk: 0.0,
            recip_jerk: 0.0,
            cubert_jerk: 0.0,
        }
    }

    /// Resets every field except `state`/`move_state` to their `Empty`
    /// defaults. Used by `try_acquire_write`; there are no link pointers to
    /// preserve in this array-with-indices pool, so this is a full reset.
    pub fn reset(&mut self) {
        let state = self.state;
        let move_state = self.move_state;
        *self = Self::empty();
        self.state = state;
        self.move_state = move_state;
    }
}
