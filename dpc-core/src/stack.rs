//! Stacking of individual exposures into one phase-stepping cube.
//!
//! Each exposure of a scan is a 2D detector frame. Stacking places frame `i`
//! at index `i` of a new trailing axis, giving a (rows, cols, exposures)
//! array whose last axis is the acquisition sequence. The order is taken
//! exactly as given; frames are never re-sorted, since the Fourier phase of
//! every pixel depends on it.

use ndarray::{Array3, ArrayBase, Axis, Data, Ix2};
use tracing::debug;

use crate::error::ReconstructionError;

/// Stack same-shaped 2D frames along a new trailing axis.
///
/// Pixels are converted to `f64` on the way in, so detector-native types
/// (`u16`, `u32`) and floating point frames are accepted alike. The input
/// frames are only read.
///
/// # Returns
/// * `Ok(Array3<f64>)` - Array of shape (rows, cols, frames.len())
/// * `Err(ReconstructionError::EmptyStack)` - If `frames` is empty
/// * `Err(ReconstructionError::ShapeMismatch)` - If any frame differs in shape from the first
pub fn stack_frames<T, S>(frames: &[ArrayBase<S, Ix2>]) -> Result<Array3<f64>, ReconstructionError>
where
    T: Copy + Into<f64>,
    S: Data<Elem = T>,
{
    let first = frames
        .first()
        .ok_or(ReconstructionError::EmptyStack("frames"))?;
    let (rows, cols) = first.dim();

    if let Some(bad) = frames.iter().find(|frame| frame.dim() != (rows, cols)) {
        return Err(ReconstructionError::ShapeMismatch {
            context: "stack_frames",
            expected: vec![rows, cols],
            found: bad.shape().to_vec(),
        });
    }

    let mut stack = Array3::zeros((rows, cols, frames.len()));
    for (index, frame) in frames.iter().enumerate() {
        stack
            .index_axis_mut(Axis(2), index)
            .zip_mut_with(frame, |dst, &src| *dst = src.into());
    }

    debug!(
        "stacked {} frames of {}x{} into {:?}",
        frames.len(),
        rows,
        cols,
        stack.shape()
    );

    Ok(stack)
}
