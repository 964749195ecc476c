//! Robust statistics for combining repeated acquisitions.
//!
//! The median is used instead of the mean wherever several acquisitions of
//! the same quantity are merged, since a single corrupted frame (detector
//! glitch, cosmic-ray hit) shifts the mean arbitrarily far but leaves the
//! median on one of the well-behaved samples.
//!
//! NaN handling follows the usual array-library convention: a NaN anywhere
//! in the input makes the median NaN. Infinite values are ordered normally.

use ndarray::{Array, ArrayBase, Data, Dimension};
use thiserror::Error;

/// Errors that can occur while computing statistics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("cannot compute the median of an empty input")]
    EmptyInput,
    #[error("array shapes differ: expected {expected:?}, found {found:?}")]
    MismatchedShapes {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

/// Median of a slice of values.
///
/// Copies the input into a scratch buffer and delegates to
/// [`median_in_place`]. For even-length input the two middle values are
/// averaged.
///
/// # Returns
/// * `Ok(median)` - The median value (NaN if any input is NaN)
/// * `Err(StatsError::EmptyInput)` - If `values` is empty
pub fn median(values: &[f64]) -> Result<f64, StatsError> {
    let mut scratch = values.to_vec();
    median_in_place(&mut scratch)
}

/// Median of a mutable slice, reordering the slice as a side effect.
///
/// Uses a linear-time selection rather than a full sort.
pub fn median_in_place(values: &mut [f64]) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::EmptyInput);
    }

    if values.iter().any(|v| v.is_nan()) {
        return Ok(f64::NAN);
    }

    let len = values.len();
    let mid = len / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *upper;

    if len % 2 == 1 {
        Ok(upper)
    } else {
        // Everything left of `mid` is <= upper after selection
        let lower_max = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok((lower_max + upper) / 2.0)
    }
}

/// Element-wise median across a set of equally shaped arrays.
///
/// The output has the shape of the inputs; element `i` is the median of
/// element `i` of every input array. Inputs are only read.
///
/// # Returns
/// * `Ok(Array)` - Newly allocated array of medians
/// * `Err(StatsError::EmptyInput)` - If `arrays` is empty
/// * `Err(StatsError::MismatchedShapes)` - If any array differs in shape from the first
pub fn median_across<S, D>(arrays: &[ArrayBase<S, D>]) -> Result<Array<f64, D>, StatsError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let first = arrays.first().ok_or(StatsError::EmptyInput)?;

    for array in &arrays[1..] {
        if array.shape() != first.shape() {
            return Err(StatsError::MismatchedShapes {
                expected: first.shape().to_vec(),
                found: array.shape().to_vec(),
            });
        }
    }

    let mut output = Array::zeros(first.raw_dim());
    let mut scratch = vec![0.0; arrays.len()];
    let mut iters: Vec<_> = arrays.iter().map(|a| a.iter()).collect();

    for value in output.iter_mut() {
        for (slot, iter) in scratch.iter_mut().zip(iters.iter_mut()) {
            *slot = iter.next().copied().unwrap_or(f64::NAN);
        }
        *value = median_in_place(&mut scratch)?;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, Array2};

    #[test]
    fn test_median_odd_length() {
        assert_eq!(median(&[5.0, 1.0, 3.0]).unwrap(), 3.0);
        assert_eq!(median(&[7.0]).unwrap(), 7.0);
    }

    #[test]
    fn test_median_even_length_averages_middle() {
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&[]), Err(StatsError::EmptyInput));
    }

    #[test]
    fn test_median_propagates_nan() {
        assert!(median(&[1.0, f64::NAN, 3.0]).unwrap().is_nan());
    }

    #[test]
    fn test_median_with_infinity() {
        assert_eq!(median(&[1.0, f64::INFINITY, 2.0]).unwrap(), 2.0);
    }

    #[test]
    fn test_median_does_not_touch_input() {
        let values = [3.0, 1.0, 2.0];
        let _ = median(&values).unwrap();
        assert_eq!(values, [3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_median_across_rejects_outlier() {
        let arrays = vec![
            arr1(&[10.0, 20.0]),
            arr1(&[11.0, 21.0]),
            arr1(&[1100.0, 19.0]),
            arr1(&[9.0, 22.0]),
            arr1(&[12.0, 18.0]),
        ];

        let med = median_across(&arrays).unwrap();
        assert_eq!(med[0], 11.0);
        assert_eq!(med[1], 20.0);
    }

    #[test]
    fn test_median_across_keeps_shape() {
        let a = Array2::from_elem((3, 4), 1.0);
        let b = Array2::from_elem((3, 4), 3.0);
        let med = median_across(&[a.view(), b.view()]).unwrap();
        assert_eq!(med.shape(), &[3, 4]);
        assert!(med.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_median_across_shape_mismatch() {
        let a = Array2::<f64>::zeros((2, 2));
        let b = Array2::<f64>::zeros((2, 3));
        let err = median_across(&[a, b]).unwrap_err();
        assert_eq!(
            err,
            StatsError::MismatchedShapes {
                expected: vec![2, 2],
                found: vec![2, 3],
            }
        );
    }

    #[test]
    fn test_median_across_empty() {
        let arrays: Vec<Array2<f64>> = Vec::new();
        assert_eq!(median_across(&arrays), Err(StatsError::EmptyInput));
    }
}
