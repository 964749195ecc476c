//! Visibility of phase-stepping curves.
//!
//! Visibility is the contrast of the sinusoid, `2 · a1 / a0`. Computed on a
//! flat it characterizes the interferometer; computed on flat-normalized
//! signals it is the dark-field-sensitive ratio.

use ndarray::{Array, ArrayBase, Axis, Data, RemoveAxis, Zip};
use tracing::debug;

use crate::error::ReconstructionError;
use crate::signal::{A0, A1, SIGNAL_CHANNELS};

/// Compute `2 · a1 / a0` for every position of a signal array.
///
/// The trailing signal axis is consumed, so a (rows, cols, groups, 3) input
/// gives a (rows, cols, groups) output. Zero `a0` yields infinities or NaN.
///
/// # Returns
/// * `Ok(Array)` - Newly allocated visibility array
/// * `Err(ReconstructionError::ShapeMismatch)` - If the last axis is not the signal axis
pub fn visibility<S, D>(
    signals: &ArrayBase<S, D>,
) -> Result<Array<f64, D::Smaller>, ReconstructionError>
where
    S: Data<Elem = f64>,
    D: RemoveAxis,
{
    let ndim = signals.ndim();
    if ndim == 0 || signals.len_of(Axis(ndim - 1)) != SIGNAL_CHANNELS {
        return Err(ReconstructionError::ShapeMismatch {
            context: "visibility",
            expected: vec![SIGNAL_CHANNELS],
            found: signals.shape().to_vec(),
        });
    }

    let signal_axis = Axis(ndim - 1);
    let a0 = signals.index_axis(signal_axis, A0);
    let a1 = signals.index_axis(signal_axis, A1);

    let visibility = Zip::from(&a0)
        .and(&a1)
        .map_collect(|&a0, &a1| 2.0 * a1 / a0);

    debug!("created visibility map with shape {:?}", visibility.shape());

    Ok(visibility)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{extract_signals, PHI};
    use approx::assert_relative_eq;
    use ndarray::{arr2, Array1, Array3, Array4};
    use test_helpers::phase_stepping_curve;

    #[test]
    fn test_visibility_exact_value() {
        let signals = arr2(&[[1000.0, 0.4, 150.0]]);
        let vis = visibility(&signals).unwrap();
        assert_eq!(vis, Array1::from(vec![0.3]));
    }

    #[test]
    fn test_visibility_drops_signal_axis() {
        let signals = Array4::from_shape_fn((3, 4, 2, 3), |(_, _, _, c)| [10.0, 0.0, 2.0][c]);
        let vis = visibility(&signals).unwrap();
        assert_eq!(vis.shape(), &[3, 4, 2]);
        assert!(vis.iter().all(|&v| (v - 0.4).abs() < 1e-12));
    }

    #[test]
    fn test_visibility_of_synthetic_curves() {
        let steps = 12;
        let curves = Array3::from_shape_fn((2, 2, steps), |(y, x, k)| {
            let v = 0.1 + 0.2 * (y * 2 + x) as f64;
            phase_stepping_curve(2000.0, v, 0.5, steps, 2)[k]
        });

        let signals = extract_signals(&curves, 2).unwrap();
        let vis = visibility(&signals).unwrap();

        for ((y, x), &v) in vis.indexed_iter() {
            assert_relative_eq!(v, 0.1 + 0.2 * (y * 2 + x) as f64, epsilon = 1e-9);
        }
        assert_relative_eq!(signals[[0, 0, PHI]], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_visibility_zero_average() {
        let signals = arr2(&[[0.0, 0.0, 1.0], [0.0, 0.0, 0.0]]);
        let vis = visibility(&signals).unwrap();
        assert!(vis[0].is_infinite());
        assert!(vis[1].is_nan());
    }

    #[test]
    fn test_visibility_rejects_step_axis() {
        let curves = Array3::<f64>::zeros((2, 2, 8));
        assert!(matches!(
            visibility(&curves),
            Err(ReconstructionError::ShapeMismatch { .. })
        ));
    }
}
