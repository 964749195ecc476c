//! Error taxonomy for the reconstruction core.
//!
//! Every error is a local, synchronous failure of one transformation call.
//! Numerical degeneracies (division by zero, NaN in the input) are never
//! reported here; they flow through the output arrays as IEEE-754 values.

use dpc_math::StatsError;
use thiserror::Error;

/// Errors raised by the reconstruction stages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconstructionError {
    /// Arrays that must line up pixel for pixel have different shapes.
    #[error("shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// The exposure count is not a whole number of phase-stepping curves.
    #[error("cannot split {exposures} exposures into curves of {phase_steps} phase steps")]
    InvalidGrouping {
        exposures: usize,
        phase_steps: usize,
    },

    /// The requested harmonic has no bin in the one-sided spectrum.
    #[error("harmonic {periods} is outside the one-sided spectrum of a {steps}-step curve")]
    InvalidPeriods { periods: usize, steps: usize },

    /// Nothing to stack or combine.
    #[error("no {0} to combine")]
    EmptyStack(&'static str),

    /// The flats-every acquisition layout cannot be applied.
    #[error("invalid scan layout: {0}")]
    InvalidScanLayout(String),
}

impl ReconstructionError {
    pub(crate) fn from_stats(err: StatsError, context: &'static str) -> Self {
        match err {
            StatsError::EmptyInput => ReconstructionError::EmptyStack(context),
            StatsError::MismatchedShapes { expected, found } => ReconstructionError::ShapeMismatch {
                context,
                expected,
                found,
            },
        }
    }
}
