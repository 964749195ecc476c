//! Fourier extraction of the phase-stepping signal.
//!
//! Every pixel records an intensity curve
//!
//! ```text
//! I[k] = c · (1 + v · cos(2π · periods · k / N + φ)),   k = 0 .. N-1
//! ```
//!
//! sampled at N phase steps spanning `periods` full grating periods (the
//! closing sample at 2π · periods is not part of the curve). The unnormalized
//! DFT of that curve has
//!
//! - `|F[0]|        = c · N`        (average intensity, `a0`)
//! - `|F[periods]|  = v · c · N / 2` (first-harmonic amplitude, `a1`)
//! - `arg F[periods] = φ`            (phase, `phi`)
//!
//! so those three numbers are all that is kept. The transform is a plain
//! forward FFT of the real curve: no windowing, no padding and no division
//! by N, which keeps a0 of sample and flat directly comparable.

use std::sync::Arc;

use ndarray::{Array, ArrayBase, Axis, Data, Dimension, Zip};
use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ReconstructionError;

/// Index of the average intensity in the signal axis.
pub const A0: usize = 0;
/// Index of the phase in the signal axis.
pub const PHI: usize = 1;
/// Index of the first-harmonic amplitude in the signal axis.
pub const A1: usize = 2;
/// Length of the signal axis.
pub const SIGNAL_CHANNELS: usize = 3;

/// The three Fourier quantities of one phase-stepping curve.
///
/// After flat normalization the same layout holds absorption, differential
/// phase and dark-field in place of `a0`, `phi` and `a1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalTriple {
    pub a0: f64,
    pub phi: f64,
    pub a1: f64,
}

impl SignalTriple {
    pub fn new(a0: f64, phi: f64, a1: f64) -> Self {
        Self { a0, phi, a1 }
    }

    /// Extract the signal of a single phase-stepping curve.
    pub fn from_curve(curve: &[f64], periods: usize) -> Result<Self, ReconstructionError> {
        let mut extractor = SignalExtractor::new(curve.len(), periods)?;
        Ok(extractor.extract(curve.iter()))
    }

    /// Read a triple from a lane of length [`SIGNAL_CHANNELS`].
    pub fn from_lane<'a, I>(lane: I) -> Self
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let mut values = [f64::NAN; SIGNAL_CHANNELS];
        for (slot, &value) in values.iter_mut().zip(lane) {
            *slot = value;
        }
        Self::from(values)
    }

    /// Contrast of the curve, `2 · a1 / a0`.
    pub fn visibility(&self) -> f64 {
        2.0 * self.a1 / self.a0
    }

    pub fn to_array(self) -> [f64; SIGNAL_CHANNELS] {
        [self.a0, self.phi, self.a1]
    }
}

impl From<[f64; SIGNAL_CHANNELS]> for SignalTriple {
    fn from(values: [f64; SIGNAL_CHANNELS]) -> Self {
        Self::new(values[A0], values[PHI], values[A1])
    }
}

/// Reusable FFT plan and buffers for curves of one length.
struct SignalExtractor {
    fft: Arc<dyn Fft<f64>>,
    periods: usize,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl SignalExtractor {
    fn new(steps: usize, periods: usize) -> Result<Self, ReconstructionError> {
        // The one-sided spectrum of an N-point real curve holds bins 0..=N/2
        if periods == 0 || periods > steps / 2 {
            return Err(ReconstructionError::InvalidPeriods { periods, steps });
        }

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(steps);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            fft,
            periods,
            buffer: vec![Complex64::new(0.0, 0.0); steps],
            scratch,
        })
    }

    fn extract<'a, I>(&mut self, curve: I) -> SignalTriple
    where
        I: IntoIterator<Item = &'a f64>,
    {
        for (slot, &value) in self.buffer.iter_mut().zip(curve) {
            *slot = Complex64::new(value, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let dc = self.buffer[0];
        let harmonic = self.buffer[self.periods];
        SignalTriple::new(dc.norm(), harmonic.arg(), harmonic.norm())
    }
}

/// Extract (a0, phi, a1) along the last axis of a phase-stepping array.
///
/// The last axis of `curves` is the phase-step axis; all preceding axes
/// (pixel rows, columns, curve groups) are carried through unchanged. The
/// output replaces the step axis by a signal axis of length
/// [`SIGNAL_CHANNELS`] ordered as [`A0`], [`PHI`], [`A1`].
///
/// `periods` selects the harmonic bin. Bin `N/2` (Nyquist) is accepted even
/// though the extracted values are of undefined quality there.
///
/// # Returns
/// * `Ok(Array)` - Newly allocated signal array
/// * `Err(ReconstructionError::InvalidPeriods)` - If `periods` is zero or above N/2
/// * `Err(ReconstructionError::ShapeMismatch)` - If `curves` is zero-dimensional
pub fn extract_signals<S, D>(
    curves: &ArrayBase<S, D>,
    periods: usize,
) -> Result<Array<f64, D>, ReconstructionError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let ndim = curves.ndim();
    if ndim == 0 {
        return Err(ReconstructionError::ShapeMismatch {
            context: "extract_signals",
            expected: vec![SIGNAL_CHANNELS],
            found: Vec::new(),
        });
    }

    let step_axis = Axis(ndim - 1);
    let steps = curves.len_of(step_axis);
    let mut extractor = SignalExtractor::new(steps, periods)?;

    let mut shape = curves.raw_dim();
    shape[ndim - 1] = SIGNAL_CHANNELS;
    let mut signals = Array::zeros(shape);

    Zip::from(curves.lanes(step_axis))
        .and(signals.lanes_mut(step_axis))
        .for_each(|curve, mut signal| {
            let triple = extractor.extract(curve.iter());
            signal[A0] = triple.a0;
            signal[PHI] = triple.phi;
            signal[A1] = triple.a1;
        });

    debug!(
        "extracted harmonic {} from {} curves of {} steps, output shape {:?}",
        periods,
        signals.len() / SIGNAL_CHANNELS,
        steps,
        signals.shape()
    );

    Ok(signals)
}
