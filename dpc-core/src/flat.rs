//! Flat-field normalization of the extracted signals.
//!
//! A flat is the same acquisition without the sample. Dividing out its
//! average intensity and visibility and subtracting its phase removes the
//! response of the grating interferometer itself, leaving
//!
//! - absorption `= a0_s / a0_f`
//! - differential phase `= wrap(phi_s - phi_f)`
//! - dark-field `= a1_s / (a1_f / absorption)`
//!
//! When several flats were taken they are merged with a per-element median
//! before normalization.

use ndarray::{Array, ArrayBase, ArrayView, Axis, Data, Dimension, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

use dpc_math::{median_across, wrap_phase};

use crate::error::ReconstructionError;
use crate::signal::{extract_signals, SignalTriple, SIGNAL_CHANNELS};

/// Where the median across repeated flats is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatAveraging {
    /// Median of the raw phase-stepping curves, then a single extraction.
    #[default]
    RawCurves,
    /// Extraction of every flat, then a median of each signal channel.
    Signals,
}

/// A flat acquisition reduced to one set of curves and signals.
#[derive(Debug, Clone)]
pub struct FlatField<D: Dimension> {
    /// Median phase-stepping curves across all flat acquisitions
    pub curves: Array<f64, D>,
    /// Flat signals with the signal axis last
    pub signals: Array<f64, D>,
}

/// Normalize one sample triple by one flat triple.
///
/// Absorption is computed first and the dark-field uses that normalized
/// value. Zero denominators yield infinities or NaN.
pub fn combine_triples(sample: SignalTriple, flat: SignalTriple) -> SignalTriple {
    let absorption = sample.a0 / flat.a0;
    let phase = wrap_phase(sample.phi - flat.phi);
    let dark_field = sample.a1 / (flat.a1 / absorption);
    SignalTriple::new(absorption, phase, dark_field)
}

/// Normalize sample signals by flat signals.
///
/// Both arrays carry the signal axis last. The flat must either have the
/// sample's shape or broadcast to it, which lets a flat with a single curve
/// group (size-1 group axis) serve every group of the sample.
///
/// # Returns
/// * `Ok(Array)` - Newly allocated (absorption, phase, dark-field) array
/// * `Err(ReconstructionError::ShapeMismatch)` - If either signal axis is not of length 3
///   or the flat cannot be broadcast to the sample shape
pub fn combine_with_flat<S1, S2, D>(
    sample: &ArrayBase<S1, D>,
    flat: &ArrayBase<S2, D>,
) -> Result<Array<f64, D>, ReconstructionError>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    check_signal_axis(sample.shape(), "combine_with_flat (sample)")?;
    check_signal_axis(flat.shape(), "combine_with_flat (flat)")?;

    let flat: ArrayView<f64, D> = if flat.shape() == sample.shape() {
        flat.view()
    } else {
        flat.broadcast(sample.raw_dim())
            .ok_or_else(|| ReconstructionError::ShapeMismatch {
                context: "combine_with_flat",
                expected: sample.shape().to_vec(),
                found: flat.shape().to_vec(),
            })?
    };

    let signal_axis = Axis(sample.ndim() - 1);
    let mut combined = Array::zeros(sample.raw_dim());

    Zip::from(combined.lanes_mut(signal_axis))
        .and(sample.lanes(signal_axis))
        .and(flat.lanes(signal_axis))
        .for_each(|mut out, s, f| {
            let merged = combine_triples(SignalTriple::from_lane(s), SignalTriple::from_lane(f));
            for (slot, value) in out.iter_mut().zip(merged.to_array()) {
                *slot = value;
            }
        });

    debug!(
        "merged flat {:?} into sample {:?} and unwrapped the phase",
        flat.shape(),
        combined.shape()
    );

    Ok(combined)
}

/// Per-element median across repeated acquisitions.
///
/// Works on raw curves and on extracted signals alike; every element is
/// treated independently, so for signals each channel gets its own median.
/// The inputs are only read.
pub fn median_combine<S, D>(
    acquisitions: &[ArrayBase<S, D>],
) -> Result<Array<f64, D>, ReconstructionError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    median_across(acquisitions).map_err(|e| ReconstructionError::from_stats(e, "flat acquisitions"))
}

/// Reduce one or more flat acquisitions to a single [`FlatField`].
///
/// `flats` holds phase-stepping curves with the step axis last.
pub fn average_flats<S, D>(
    flats: &[ArrayBase<S, D>],
    periods: usize,
    averaging: FlatAveraging,
) -> Result<FlatField<D>, ReconstructionError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let curves = median_combine(flats)?;

    let signals = match averaging {
        FlatAveraging::RawCurves => extract_signals(&curves, periods)?,
        FlatAveraging::Signals => {
            let per_flat = flats
                .iter()
                .map(|flat| extract_signals(flat, periods))
                .collect::<Result<Vec<_>, _>>()?;
            median_combine(&per_flat)?
        }
    };

    debug!(
        "averaged {} flats ({:?}) into signals {:?}",
        flats.len(),
        averaging,
        signals.shape()
    );

    Ok(FlatField { curves, signals })
}

fn check_signal_axis(shape: &[usize], context: &'static str) -> Result<(), ReconstructionError> {
    match shape.last() {
        Some(&SIGNAL_CHANNELS) => Ok(()),
        _ => {
            let mut expected = shape.to_vec();
            match expected.last_mut() {
                Some(last) => *last = SIGNAL_CHANNELS,
                None => expected.push(SIGNAL_CHANNELS),
            }
            Err(ReconstructionError::ShapeMismatch {
                context,
                expected,
                found: shape.to_vec(),
            })
        }
    }
}
