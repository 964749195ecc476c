//! Splitting a long exposure sequence into individual phase-stepping curves.
//!
//! A scan may record several phase-stepping curves back to back. Grouping
//! turns the trailing exposure axis of length N into two axes,
//! (N / phase_steps, phase_steps), so each curve becomes its own group
//! while step order inside a group and group order are preserved.

use ndarray::{Array3, Array4, ArrayBase, Data, Ix3, Ix4};
use tracing::debug;

use crate::error::ReconstructionError;

/// Reshape a (rows, cols, N) stack into (rows, cols, N / phase_steps, phase_steps).
///
/// Group `g`, step `s` of the output equals exposure `g * phase_steps + s`
/// of the input.
///
/// # Returns
/// * `Ok(Array4<f64>)` - Newly allocated grouped array
/// * `Err(ReconstructionError::InvalidGrouping)` - If `phase_steps` is zero or does not divide N
pub fn group_phase_steps<S>(
    stack: &ArrayBase<S, Ix3>,
    phase_steps: usize,
) -> Result<Array4<f64>, ReconstructionError>
where
    S: Data<Elem = f64>,
{
    let (rows, cols, exposures) = stack.dim();

    if phase_steps == 0 || exposures % phase_steps != 0 {
        return Err(ReconstructionError::InvalidGrouping {
            exposures,
            phase_steps,
        });
    }

    let groups = exposures / phase_steps;
    let grouped = Array4::from_shape_fn((rows, cols, groups, phase_steps), |(y, x, g, s)| {
        stack[[y, x, g * phase_steps + s]]
    });

    debug!(
        "split {} exposures into {} curves of {} steps",
        exposures, groups, phase_steps
    );

    Ok(grouped)
}

/// Concatenate grouped curves back along the step axis.
///
/// Inverse of [`group_phase_steps`]: a (rows, cols, G, S) array becomes
/// (rows, cols, G * S) with the groups laid end to end in order.
pub fn ungroup_phase_steps<S>(grouped: &ArrayBase<S, Ix4>) -> Array3<f64>
where
    S: Data<Elem = f64>,
{
    let (rows, cols, groups, steps) = grouped.dim();
    Array3::from_shape_fn((rows, cols, groups * steps), |(y, x, i)| {
        grouped[[y, x, i / steps, i % steps]]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_stack(rows: usize, cols: usize, n: usize) -> Array3<f64> {
        Array3::from_shape_fn((rows, cols, n), |(y, x, i)| (y * 1000 + x * 100 + i) as f64)
    }

    #[test]
    fn test_group_shape_and_order() {
        let stack = numbered_stack(2, 3, 12);
        let grouped = group_phase_steps(&stack, 4).unwrap();

        assert_eq!(grouped.shape(), &[2, 3, 3, 4]);
        assert_eq!(grouped[[1, 2, 0, 0]], 1200.0);
        assert_eq!(grouped[[1, 2, 2, 3]], 1211.0);
        assert_eq!(grouped[[0, 1, 1, 2]], 106.0);
    }

    #[test]
    fn test_single_group_when_steps_equal_exposures() {
        let stack = numbered_stack(2, 2, 5);
        let grouped = group_phase_steps(&stack, 5).unwrap();
        assert_eq!(grouped.shape(), &[2, 2, 1, 5]);
    }

    #[test]
    fn test_ungroup_reproduces_stack() {
        let stack = numbered_stack(3, 2, 15);
        let grouped = group_phase_steps(&stack, 5).unwrap();
        assert_eq!(ungroup_phase_steps(&grouped), stack);
    }

    #[test]
    fn test_group_not_divisible() {
        let stack = numbered_stack(2, 2, 10);
        assert_eq!(
            group_phase_steps(&stack, 4).unwrap_err(),
            ReconstructionError::InvalidGrouping {
                exposures: 10,
                phase_steps: 4,
            }
        );
    }

    #[test]
    fn test_group_zero_steps() {
        let stack = numbered_stack(1, 1, 3);
        assert!(matches!(
            group_phase_steps(&stack, 0),
            Err(ReconstructionError::InvalidGrouping { .. })
        ));
    }

    #[test]
    fn test_group_does_not_modify_input() {
        let stack = numbered_stack(2, 2, 6);
        let before = stack.clone();
        let _ = group_phase_steps(&stack.view(), 3).unwrap();
        assert_eq!(stack, before);
    }
}
