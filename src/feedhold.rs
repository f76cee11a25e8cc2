//! Feedhold state machine.
//!
//! The reshaping logic itself (`plan_hold`'s Case A/Case B split) lives in
//! `src/exec.rs`, folded into `Planner::exec`'s handling of the
//! `Sync → Plan` transition: this crate models `exec()` as a synchronous
//! `&mut self` call driven from a single thread, so there is no separate
//! main-loop callback to dispatch to. This module
//! only owns the state field and the transitions a caller drives directly
//! (`request_feedhold`/`end_feedhold`) versus the ones the executor drives
//! internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Off,
    Sync,
    Plan,
    Decel,
    Hold,
    EndHold,
}

pub struct FeedholdController {
    state: HoldState,
}

impl FeedholdController {
    pub fn new() -> Self {
        Self { state: HoldState::Off }
    }

    pub fn state(&self) -> HoldState {
        self.state
    }

    /// Canonical-machine assertion: `Off → Sync`. No-op if a hold is
    /// already in progress.
    pub fn request(&mut self) {
        if self.state == HoldState::Off {
            self.state = HoldState::Sync;
        }
    }

    /// Resume: any non-`Off` state moves to `EndHold`, which the executor
    /// observes and clears `hold_point` from.
    pub fn end(&mut self) {
        if self.state != HoldState::Off {
            self.state = HoldState::EndHold;
        }
    }

    pub(crate) fn set(&mut self, state: HoldState) {
        self.state = state;
    }

    pub fn reset(&mut self) {
        self.state = HoldState::Off;
    }

    pub fn is_holding(&self) -> bool {
        matches!(self.state, HoldState::Hold)
    }
}

impl Default for FeedholdController {
    fn default() -> Self {
        Self::new()
    }
}
