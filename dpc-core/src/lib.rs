//! Reconstruction of differential phase contrast images from X-ray
//! grating-interferometer phase-stepping scans.
//!
//! The processing chain for one scan is
//!
//! 1. [`stack`]: exposures → (rows, cols, N) cube
//! 2. [`grouping`]: cube → (rows, cols, curves, steps)
//! 3. [`signal`]: curves → (a0, phi, a1) per pixel and curve
//! 4. [`flat`]: sample signals ÷ median flat → (absorption, phase, dark-field)
//! 5. [`visibility`]: flat signals → 2 · a1 / a0
//!
//! [`reconstruction`] composes these stages for whole scans, [`scan_layout`]
//! handles acquisitions with periodic flats, and [`io`] holds the file
//! adapters used by the command-line tools.

pub mod algo;
pub mod config;
pub mod error;
pub mod flat;
pub mod frame_geometry;
pub mod grouping;
pub mod io;
pub mod reconstruction;
pub mod scan_layout;
pub mod signal;
pub mod stack;
pub mod visibility;

pub use config::{ConfigError, ReconstructionConfig};
pub use error::ReconstructionError;
pub use flat::{average_flats, combine_with_flat, FlatAveraging, FlatField};
pub use frame_geometry::FrameGeometry;
pub use grouping::{group_phase_steps, ungroup_phase_steps};
pub use reconstruction::{
    merge_group_results, prepare_curves, reconstruct_group, reconstruct_groups_in_parallel,
    reconstruct_scan, visibility_of_scan, Attributes, CurveLayout, Reconstruction, Scan,
};
pub use scan_layout::{merge_groups, split_flats_every, ScanGroup, GROUP_AXIS};
pub use signal::{extract_signals, SignalTriple};
pub use stack::stack_frames;
pub use visibility::visibility;
