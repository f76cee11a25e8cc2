//! # Motion Planner
//!
//! A jerk-limited Cartesian trajectory planner: fixed-capacity look-ahead
//! queue, junction-deviation cornering, constant-jerk trapezoid generation,
//! and a single-segment-per-call runtime executor. `no_std`-friendly so it
//! can run on the same MCU as the stepper pulse generator it feeds.
//!
//! Out of scope (owned by the canonical-machine layer this crate is fed
//! by): G-code parsing, inverse kinematics, stepper pulse generation,
//! config-file loading, and serial I/O. This crate defines narrow trait
//! boundaries ([`stepper::StepperSink`], [`stepper::InverseKinematics`],
//! [`stepper::MachineCallbacks`]) for those collaborators instead of owning
//! them.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod block;
pub mod config;
pub mod errors;
mod exec;
pub mod feedhold;
pub mod geometry;
mod log;
pub mod planner;
pub mod pool;
pub mod runtime;
pub mod stepper;
pub mod trapezoid;

pub use block::{Block, BlockKind, BlockState, McodeCommand, MoveState, SpindleDirection};
pub use config::{AxisLimits, PlannerConfig, Tolerances};
pub use errors::{ExecError, ExecOutcome, SinkError, SubmitError};
pub use feedhold::{FeedholdController, HoldState};
pub use planner::Planner;
pub use pool::BufferPool;
pub use runtime::RuntimeState;
pub use stepper::{InverseKinematics, MachineCallbacks, StepperSink};
pub use trapezoid::TrapezoidPlan;

/// A planner sized for a 3-axis Cartesian machine with a 16-deep look-ahead
/// queue, matching the common small-gantry configuration the example
/// scenarios in this crate's test suite exercise.
pub type CartesianPlanner = Planner<3, 3, 16>;
