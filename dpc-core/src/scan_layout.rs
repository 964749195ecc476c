//! Acquisition layouts with periodic flat scans.
//!
//! Long acquisitions interleave the sample and the reference: `flats_every`
//! sample scans are followed by `n_flats` flat scans, and the pattern
//! repeats. Every sample scan is normalized with the flats recorded right
//! after it, which tracks slow drifts of the interferometer.

use ndarray::{concatenate, Array, ArrayView, Axis, RemoveAxis};
use tracing::{debug, warn};

use crate::error::ReconstructionError;

/// Axis that enumerates phase-stepping curves in grouped arrays.
pub const GROUP_AXIS: Axis = Axis(2);

/// One repetition of the sample/flat pattern, borrowed from the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanGroup<'a, T> {
    /// Position of this group in the acquisition sequence
    pub index: usize,
    pub samples: &'a [T],
    pub flats: &'a [T],
}

/// Split an ordered acquisition sequence into sample/flat groups.
///
/// Each group takes `flats_every` consecutive items as samples and the next
/// `n_flats` items as flats. A trailing incomplete repetition is dropped.
///
/// # Returns
/// * `Ok(Vec<ScanGroup>)` - Groups in acquisition order, borrowing `items`
/// * `Err(ReconstructionError::InvalidScanLayout)` - If either count is zero
///   or no complete group exists
pub fn split_flats_every<T>(
    items: &[T],
    flats_every: usize,
    n_flats: usize,
) -> Result<Vec<ScanGroup<'_, T>>, ReconstructionError> {
    if flats_every == 0 || n_flats == 0 {
        return Err(ReconstructionError::InvalidScanLayout(format!(
            "flats_every ({flats_every}) and n_flats ({n_flats}) must both be positive"
        )));
    }

    let period = flats_every + n_flats;
    let complete = items.len() / period;
    if complete == 0 {
        return Err(ReconstructionError::InvalidScanLayout(format!(
            "{} scans are fewer than one repetition of {} samples and {} flats",
            items.len(),
            flats_every,
            n_flats
        )));
    }

    let leftover = items.len() % period;
    if leftover != 0 {
        warn!(
            "ignoring {} trailing scans that do not form a complete sample/flat group",
            leftover
        );
    }

    let groups: Vec<ScanGroup<'_, T>> = items
        .chunks_exact(period)
        .enumerate()
        .map(|(index, chunk)| {
            let (samples, flats) = chunk.split_at(flats_every);
            ScanGroup {
                index,
                samples,
                flats,
            }
        })
        .collect();

    debug!(
        "split {} scans into {} groups of {} samples and {} flats",
        items.len(),
        groups.len(),
        flats_every,
        n_flats
    );

    Ok(groups)
}

/// Concatenate per-scan results along [`GROUP_AXIS`] in the given order.
///
/// All parts must agree on every axis except the group axis.
pub fn merge_groups<D>(parts: &[ArrayView<f64, D>]) -> Result<Array<f64, D>, ReconstructionError>
where
    D: RemoveAxis,
{
    let first = parts
        .first()
        .ok_or(ReconstructionError::EmptyStack("group results"))?;

    for part in &parts[1..] {
        let compatible = part.ndim() == first.ndim()
            && part
                .shape()
                .iter()
                .zip(first.shape())
                .enumerate()
                .all(|(axis, (a, b))| axis == GROUP_AXIS.index() || a == b);
        if !compatible {
            return Err(ReconstructionError::ShapeMismatch {
                context: "merge_groups",
                expected: first.shape().to_vec(),
                found: part.shape().to_vec(),
            });
        }
    }

    concatenate(GROUP_AXIS, parts).map_err(|_| ReconstructionError::ShapeMismatch {
        context: "merge_groups",
        expected: first.shape().to_vec(),
        found: Vec::new(),
    })
}
