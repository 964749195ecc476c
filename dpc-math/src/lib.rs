//! dpc-math - Numerical helpers for phase-stepping reconstruction
//!
//! This crate holds the small pieces of math that the reconstruction
//! pipeline leans on but that are not specific to any one stage:
//!
//! - **Statistics** - NaN-propagating median over slices and across arrays
//! - **Angles** - wrapping phase differences into the canonical interval
//!
//! # Example
//!
//! ```
//! use dpc_math::{median, wrap_phase};
//!
//! let m = median(&[3.0, 1.0, 2.0]).unwrap();
//! assert_eq!(m, 2.0);
//!
//! let wrapped = wrap_phase(6.0);
//! assert!((wrapped - (6.0 - 2.0 * std::f64::consts::PI)).abs() < 1e-12);
//! ```

pub mod angle;
pub mod stats;

pub use angle::wrap_phase;
pub use stats::{median, median_across, median_in_place, StatsError};
