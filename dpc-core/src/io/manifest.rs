//! Scan manifests: which raw files make up a scan, in which order.
//!
//! ```json
//! {
//!   "frames": ["scan_000/000.raw", "scan_000/001.raw"],
//!   "geometry": { "rows": 512, "cols": 640 },
//!   "attributes": { "exposure_ms": 200 }
//! }
//! ```
//!
//! Relative frame paths are resolved against the manifest's directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::raw::read_raw_frame;
use super::IoError;
use crate::frame_geometry::FrameGeometry;
use crate::reconstruction::{Attributes, Scan};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanManifest {
    /// Raw exposure files in acquisition order
    pub frames: Vec<PathBuf>,
    /// Frame layout, overriding the configured one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<FrameGeometry>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl ScanManifest {
    pub fn new(frames: Vec<PathBuf>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    /// Load a manifest and resolve its frame paths.
    pub fn load(path: &Path) -> Result<Self, IoError> {
        let content = std::fs::read_to_string(path).map_err(|e| IoError::file(path, e))?;
        let mut manifest: ScanManifest =
            serde_json::from_str(&content).map_err(|e| IoError::json(path, e))?;

        if let Some(base) = path.parent() {
            for frame in manifest.frames.iter_mut() {
                if frame.is_relative() {
                    *frame = base.join(&*frame);
                }
            }
        }
        manifest.source = Some(path.to_path_buf());

        Ok(manifest)
    }

    pub fn save(&self, path: &Path) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| IoError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| IoError::file(path, e))
    }

    /// Read every listed frame.
    ///
    /// The manifest's own geometry wins over `default_geometry`. The
    /// manifest path is recorded in the scan attributes as `source`.
    pub fn load_scan(&self, default_geometry: Option<FrameGeometry>) -> Result<Scan<u16>, IoError> {
        let origin = self.source.clone().unwrap_or_default();
        let geometry = self
            .geometry
            .or(default_geometry)
            .ok_or_else(|| IoError::MissingGeometry(origin.clone()))?;

        let frames = self
            .frames
            .iter()
            .map(|path| read_raw_frame(path, &geometry))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "loaded {} frames of {} from {}",
            frames.len(),
            geometry,
            origin.display()
        );

        let mut attributes = self.attributes.clone();
        if self.source.is_some() {
            attributes.insert(
                "source".to_string(),
                serde_json::Value::from(origin.display().to_string()),
            );
        }

        Ok(Scan::new(frames).with_attributes(attributes))
    }
}
