//! Error types for the trajectory planner.
//!
//! Plain enums rather than `thiserror`: this crate is `no_std`-first and
//! `thiserror`'s derive assumes `std::error::Error`. `core::fmt::Display`
//! is hand-written; `std::error::Error` is implemented only under the
//! `std` feature.

use core::fmt;

/// Errors returned by the submission API (`Planner::submit_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The requested move has sub-`EPSILON` length or a sub-`EPSILON` duration.
    ZeroLengthMove,
    /// No `Empty` slot was available in the buffer pool.
    ///
    /// Treated as fatal: every caller is required to gate submission on
    /// [`crate::Planner::queue_has_space`].
    BufferFullFatal,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::ZeroLengthMove => {
                write!(f, "move rejected: length or duration below epsilon")
            }
            SubmitError::BufferFullFatal => write!(f, "buffer pool has no free slot"),
        }
    }
}

/// Outcome of a single [`crate::Planner::exec`] tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The current block finished on this tick.
    Ok,
    /// More segments remain in the current block.
    Again,
    /// Nothing to do: the queue is empty, or the run cursor is pinned behind
    /// a hold point.
    NoOp,
}

/// Fatal errors raised from within the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// The executor reached a state the state machine does not model.
    InternalError,
    /// An `MCode` block carried a code with no registered handler.
    UnknownMCode(u32),
    /// The downstream stepper sink rejected a prepared segment.
    SinkRejected(SinkError),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::InternalError => write!(f, "executor reached an impossible state"),
            ExecError::UnknownMCode(code) => write!(f, "no handler registered for M{code}"),
            ExecError::SinkRejected(e) => write!(f, "stepper sink rejected segment: {e}"),
        }
    }
}

impl From<SinkError> for ExecError {
    fn from(e: SinkError) -> Self {
        ExecError::SinkRejected(e)
    }
}

/// Errors a [`crate::stepper::StepperSink`] may return from its `prep_*` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The stepper layer's own command queue is full.
    QueueFull,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::QueueFull => write!(f, "stepper command queue is full"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SubmitError {}
#[cfg(feature = "std")]
impl std::error::Error for ExecError {}
#[cfg(feature = "std")]
impl std::error::Error for SinkError {}
