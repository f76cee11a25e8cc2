//! Downstream collaborator traits.
//!
//! The stepper pulse generator, inverse kinematics, and canonical-machine
//! callback targets are all external collaborators out of scope for this
//! crate; this module defines only the narrow trait boundary the executor
//! calls through, exposing hardware as traits the controller is generic
//! over rather than owning concrete types.

pub use crate::block::SpindleDirection;
use crate::errors::SinkError;

/// The narrow interface the executor pushes prepared segments through.
pub trait StepperSink<const MOTORS: usize> {
    /// Prepare one constant-velocity line segment of `duration_us`,
    /// expressed as a step count per motor (already resolved by an
    /// [`InverseKinematics`] implementation).
    fn prep_line(&mut self, steps: &[i32; MOTORS], duration_us: u32) -> Result<(), SinkError>;

    /// Prepare a pure time delay.
    fn prep_dwell(&mut self, duration_us: u32) -> Result<(), SinkError>;

    /// Loader-ordering placeholder emitted after an auxiliary command's
    /// side effect has run, keeping the stepper loader's ordering intact
    /// even though no motion occurred.
    fn prep_null(&mut self) -> Result<(), SinkError>;

    /// Ask the stepper ISR to schedule another `exec()` call.
    fn request_exec(&mut self);

    /// Whether the stepper layer still has outstanding prepared work.
    fn is_busy(&self) -> bool;
}

/// Resolves a Cartesian travel vector and its duration into per-motor step
/// counts. Implemented by the (out-of-scope) inverse-kinematics layer.
pub trait InverseKinematics<const AXES: usize, const MOTORS: usize> {
    fn steps_for_travel(&self, travel_mm: &[f64; AXES], duration_us: u32) -> [i32; MOTORS];
}

/// Side-effect handler table for auxiliary commands: MCodes dispatch
/// through this trait rather than a `switch` over numeric codes.
pub trait MachineCallbacks {
    fn exec_program_stop(&mut self);
    fn exec_program_end(&mut self);
    fn exec_spindle_control(&mut self, dir: SpindleDirection);
    fn exec_mist_coolant(&mut self, on: bool);
    fn exec_flood_coolant(&mut self, on: bool);
    fn exec_feed_override_enable(&mut self, enable: bool);
}
