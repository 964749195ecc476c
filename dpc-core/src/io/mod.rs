//! Thin file adapters around the reconstruction core.
//!
//! The core itself only sees arrays. These adapters read raw detector
//! exposures and scan manifests before the core runs, and persist its
//! results afterwards:
//!
//! - **raw**: headerless little-endian `u16` frames
//! - **manifest**: JSON list of a scan's frames in acquisition order
//! - **dataset**: `.bin` + `.json` pairs holding n-dimensional `f64` arrays
//! - **dataset_writer**: worker threads that write datasets off the main thread

pub mod dataset;
pub mod dataset_writer;
pub mod manifest;
pub mod raw;

use std::path::PathBuf;

use thiserror::Error;

use crate::frame_geometry::FrameGeometry;

pub use dataset::Dataset;
pub use dataset_writer::{DatasetWriterHandle, WriteSummary};
pub use manifest::ScanManifest;
pub use raw::{read_raw_frame, unpack_u16_frame, UnpackFrameError};

/// Errors raised by the file adapters.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("failed to access {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot read {} as a {geometry} frame: {source}", .path.display())]
    Frame {
        path: PathBuf,
        geometry: FrameGeometry,
        #[source]
        source: UnpackFrameError,
    },

    #[error("no frame geometry given for {}", .0.display())]
    MissingGeometry(PathBuf),

    #[error("dataset {} already exists (enable overwrite to replace it)", .0.display())]
    DatasetExists(PathBuf),

    #[error("dataset {} is corrupt: {reason}", .path.display())]
    CorruptDataset { path: PathBuf, reason: String },
}

impl IoError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IoError::File {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        IoError::Json {
            path: path.into(),
            source,
        }
    }
}
