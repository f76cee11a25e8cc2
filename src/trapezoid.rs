//! Jerk-limited S-curve trapezoid generator.
//!
//! Pure function of a block's velocity targets and length: it never touches
//! pool or queue state, which keeps it independently testable against each
//! of the seven segmentation branches below.

use crate::config::Tolerances;
use crate::geometry::{target_length, target_velocity};
use crate::log;

/// The head/body/tail segmentation of one block, plus whatever velocity
/// targets the branch that was taken needed to degrade or reduce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrapezoidPlan {
    pub head_length: f64,
    pub body_length: f64,
    pub tail_length: f64,
    pub entry_velocity: f64,
    pub cruise_velocity: f64,
    pub exit_velocity: f64,
}

const MAX_ASYMMETRIC_ITERATIONS: u32 = 20;

fn close(a: f64, b: f64, tol: &Tolerances) -> bool {
    (a - b).abs() < tol.velocity_tolerance
}

/// Zeroes any section shorter than `min_section_length` and redistributes its
/// length to the adjacent section(s), then nudges whichever section is
/// largest so the three sections sum to `length` exactly (absorbing
/// floating-point error from the branch that computed them).
fn finalize(
    mut head: f64,
    mut body: f64,
    mut tail: f64,
    entry: f64,
    cruise: f64,
    exit: f64,
    length: f64,
    tol: &Tolerances,
) -> TrapezoidPlan {
    if head < tol.min_section_length {
        body += head;
        head = 0.0;
    }
    if tail < tol.min_section_length {
        body += tail;
        tail = 0.0;
    }
    if body > 0.0 && body < tol.min_section_length {
        if head > 0.0 {
            head += body;
        } else if tail > 0.0 {
            tail += body;
        }
        body = 0.0;
    }

    let diff = length - (head + body + tail);
    if diff.abs() > 0.0 {
        if body > 0.0 || (head == 0.0 && tail == 0.0) {
            body += diff;
        } else if head >= tail {
            head += diff;
        } else {
            tail += diff;
        }
    }

    TrapezoidPlan {
        head_length: head.max(0.0),
        body_length: body.max(0.0),
        tail_length: tail.max(0.0),
        entry_velocity: entry,
        cruise_velocity: cruise,
        exit_velocity: exit,
    }
}

/// Fixed-point search for the cruise velocity of an asymmetric head/tail
/// split with no body (branch 7 below). Bounded to
/// [`MAX_ASYMMETRIC_ITERATIONS`]; falls back to a symmetric split around the
/// average of `entry`/`exit` if it fails to converge, to preserve real-time
/// determinism.
fn asymmetric_ht(
    entry: f64,
    exit: f64,
    cruise_ceiling: f64,
    length: f64,
    jerk: f64,
    tol: &Tolerances,
) -> TrapezoidPlan {
    let mut vt = cruise_ceiling;
    let mut head = target_length(entry, vt, jerk);
    let mut tail = target_length(exit, vt, jerk);
    let mut converged = false;

    for _ in 0..MAX_ASYMMETRIC_ITERATIONS {
        if head + tail <= length {
            converged = true;
            break;
        }
        let new_vt = if head >= tail {
            let head_len = (length - tail).max(0.0);
            target_velocity(entry, head_len, jerk)
        } else {
            let tail_len = (length - head).max(0.0);
            target_velocity(exit, tail_len, jerk)
        };
        let rel_change = (new_vt - vt).abs() / vt.max(tol.epsilon);
        vt = new_vt;
        head = target_length(entry, vt, jerk);
        tail = target_length(exit, vt, jerk);
        if rel_change < tol.iteration_error_pct {
            converged = true;
            break;
        }
    }

    if !converged {
        log::warn!("trapezoid: asymmetric HT iteration failed to converge, using symmetric fallback");
        vt = (entry + exit) / 2.0;
        head = target_length(entry, vt, jerk);
        tail = target_length(exit, vt, jerk);
    }

    // Scale proportionally so head + tail == length exactly, rather than
    // trusting the (possibly non-converged) raw values.
    let raw_total = head + tail;
    if raw_total > tol.epsilon {
        let scale = length / raw_total;
        head *= scale;
        tail *= scale;
    } else {
        head = length / 2.0;
        tail = length / 2.0;
    }

    finalize(head, 0.0, tail, entry, vt, exit, length, tol)
}

/// Computes the head/body/tail segmentation for a block given its planned
/// entry/cruise/exit velocity targets, length, and per-move jerk.
pub fn plan_trapezoid(
    entry_velocity: f64,
    cruise_velocity: f64,
    exit_velocity: f64,
    length: f64,
    jerk: f64,
    tol: &Tolerances,
) -> TrapezoidPlan {
    // Branch 1: zero-length move.
    if length < tol.epsilon || jerk <= 0.0 {
        return TrapezoidPlan {
            head_length: 0.0,
            body_length: 0.0,
            tail_length: 0.0,
            entry_velocity,
            cruise_velocity,
            exit_velocity,
        };
    }

    // Branch 2: body-only (entry, cruise, exit all equal within tolerance).
    if close(entry_velocity, cruise_velocity, tol) && close(cruise_velocity, exit_velocity, tol) {
        return TrapezoidPlan {
            head_length: 0.0,
            body_length: length,
            tail_length: 0.0,
            entry_velocity,
            cruise_velocity,
            exit_velocity,
        };
    }

    // Branch 3: full head-body-tail at the requested cruise velocity.
    let head = target_length(entry_velocity, cruise_velocity, jerk);
    if head < length {
        let tail = target_length(exit_velocity, cruise_velocity, jerk);
        let body = length - head - tail;
        if body > tol.epsilon {
            return finalize(
                head,
                body,
                tail,
                entry_velocity,
                cruise_velocity,
                exit_velocity,
                length,
                tol,
            );
        }
    }

    // No body achievable at the requested cruise velocity.
    // Branch 4: symmetric head/tail when entry and exit already match.
    if close(entry_velocity, exit_velocity, tol) {
        let half = length / 2.0;
        let reduced_cruise = target_velocity(entry_velocity, half, jerk);
        return finalize(
            half,
            0.0,
            half,
            entry_velocity,
            reduced_cruise,
            exit_velocity,
            length,
            tol,
        );
    }

    let (lo, hi) = if entry_velocity <= exit_velocity {
        (entry_velocity, exit_velocity)
    } else {
        (exit_velocity, entry_velocity)
    };
    let full_ramp = target_length(lo, hi, jerk);

    // Branch 5: degraded H'/T' — the line is too short to meet the
    // requested velocity change at all.
    if full_ramp > length + tol.length_tolerance {
        log::debug!("trapezoid: degraded endpoint velocity, line too short for full ramp");
        return if entry_velocity < exit_velocity {
            let reached = target_velocity(entry_velocity, length, jerk);
            finalize(
                length,
                0.0,
                0.0,
                entry_velocity,
                reached,
                reached,
                length,
                tol,
            )
        } else {
            let reached = target_velocity(exit_velocity, length, jerk);
            finalize(
                0.0,
                0.0,
                length,
                reached,
                reached,
                exit_velocity,
                length,
                tol,
            )
        };
    }

    // Branch 6: H/T with a small body when the line comfortably exceeds the
    // minimum ramp length but not by much.
    let min_len = full_ramp.max(tol.min_section_length);
    if length <= min_len * tol.length_factor {
        let cruise = hi;
        let body = length - full_ramp;
        return if entry_velocity < exit_velocity {
            finalize(
                full_ramp,
                body,
                0.0,
                entry_velocity,
                cruise,
                exit_velocity,
                length,
                tol,
            )
        } else {
            finalize(
                0.0,
                body,
                full_ramp,
                entry_velocity,
                cruise,
                exit_velocity,
                length,
                tol,
            )
        };
    }

    // Branch 7: asymmetric head/tail, no body, cruise below the requested
    // ceiling.
    asymmetric_ht(entry_velocity, exit_velocity, cruise_velocity, length, jerk, tol)
}
