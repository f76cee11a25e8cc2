//! Tunables and tolerances.
//!
//! Plain, strongly-typed settings structs in the shape of `McuConfig`/
//! `StepperConfig`: the canonical-machine layer that actually parses
//! `printer.cfg` is out of scope, so this module only defines the struct
//! the loader is expected to populate.

/// Per-axis dynamics limits used by the look-ahead planner and geometry
/// helpers.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisLimits<const AXES: usize> {
    /// Maximum jerk per axis, in mm/min^3 (or the caller's consistent unit).
    pub jerk_max: [f64; AXES],
    /// Junction-deviation distance per axis, in mm.
    pub junction_deviation: [f64; AXES],
}

impl<const AXES: usize> Default for AxisLimits<AXES> {
    fn default() -> Self {
        Self {
            jerk_max: [0.0; AXES],
            junction_deviation: [0.0; AXES],
        }
    }
}

/// Tolerances controlling when the trapezoid generator treats two velocities
/// as equal, a section as negligible, or a fixed-point iteration as converged.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    /// Below this length or duration, a move is considered zero-length.
    pub epsilon: f64,
    /// Velocities within this much of each other are treated as equal.
    pub velocity_tolerance: f64,
    /// Section lengths within this much of the target are considered exact.
    pub length_tolerance: f64,
    /// Sections shorter than this are zeroed and their length redistributed.
    pub min_section_length: f64,
    /// Multiplier on `min_section_length` marking the H/T-with-body boundary
    /// in branch 6 of the trapezoid generator.
    pub length_factor: f64,
    /// Relative-change threshold that terminates the asymmetric HT
    /// fixed-point iteration (branch 7).
    pub iteration_error_pct: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            epsilon: 1.0e-6,
            velocity_tolerance: 1.0e-3,
            length_tolerance: 1.0e-4,
            min_section_length: 1.0e-3,
            length_factor: 2.0,
            iteration_error_pct: 1.0e-3,
        }
    }
}

/// Full configuration for a [`crate::Planner`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct PlannerConfig<const AXES: usize> {
    pub axis_limits: AxisLimits<AXES>,
    /// Centripetal-acceleration budget used by `junction_vmax`, in
    /// mm/min^2 (or the caller's consistent unit).
    pub junction_acceleration: f64,
    /// Target duration of one executor segment, in microseconds.
    pub segment_target_us: u32,
    pub tolerances: Tolerances,
    /// When true, every submitted block is planned as an exact stop
    /// (`entry_vmax = exit_vmax = 0`), matching G-code path control G61.1/G64
    /// semantics at the canonical-machine layer. The planner only consumes
    /// this as a per-submission flag (see `Planner::submit_accel_line`); it
    /// does not parse G-code itself.
    pub exact_stop_default: bool,
}

impl<const AXES: usize> Default for PlannerConfig<AXES> {
    fn default() -> Self {
        Self {
            axis_limits: AxisLimits::default(),
            junction_acceleration: 0.0,
            segment_target_us: 5_000,
            tolerances: Tolerances::default(),
            exact_stop_default: false,
        }
    }
}
