//! Phase angle helpers.

use std::f64::consts::{PI, TAU};

/// Wrap a phase angle (or a difference of phases) into the canonical interval.
///
/// Computes `((x + π) mod 2π) − π` with a floor-style modulo, so the result
/// always lies in `[−π, π)` regardless of the sign of `x`. Phase differences
/// close to ±π therefore fold onto the opposite edge instead of running off
/// past the interval.
///
/// Non-finite input propagates: `NaN` stays `NaN` and `±∞` becomes `NaN`.
///
/// # Examples
///
/// ```
/// use dpc_math::wrap_phase;
///
/// // +3 rad minus -3 rad is 6 rad, which wraps to 6 - 2π
/// let d = wrap_phase(3.0 - (-3.0));
/// assert!((d + 0.2831853071795862).abs() < 1e-12);
/// ```
pub fn wrap_phase(x: f64) -> f64 {
    (x + PI).rem_euclid(TAU) - PI
}
