//! Reconstruction settings stored as JSON.
//!
//! Every field has a default, so a config file only needs the values that
//! differ. Command-line flags are applied on top of the loaded file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flat::FlatAveraging;
use crate::frame_geometry::FrameGeometry;
use crate::reconstruction::CurveLayout;

/// Default output group directory for stored datasets.
pub const DEFAULT_OUTPUT_GROUP: &str = "postprocessing";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Exposures per phase-stepping curve; unset means one curve per scan
    pub phase_steps: Option<usize>,
    /// Grating periods covered by one curve
    pub periods: usize,
    /// Sample scans between two flat blocks
    pub flats_every: usize,
    /// Flat scans per flat block
    pub n_flats: usize,
    pub flat_averaging: FlatAveraging,
    /// Drop the closing exposure of every scan
    pub drop_last: bool,
    /// Worker threads, 0 for one per core
    pub jobs: usize,
    pub overwrite: bool,
    /// Output group directory, relative to the output root
    pub output_group: PathBuf,
    /// Layout of raw frames for manifests that do not carry their own
    pub frame_geometry: Option<FrameGeometry>,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            phase_steps: None,
            periods: 1,
            flats_every: 1,
            n_flats: 1,
            flat_averaging: FlatAveraging::default(),
            drop_last: false,
            jobs: 1,
            overwrite: false,
            output_group: PathBuf::from(DEFAULT_OUTPUT_GROUP),
            frame_geometry: None,
        }
    }
}

impl ReconstructionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check values that cannot be right for any scan.
    ///
    /// Constraints that depend on the data (divisibility of the exposure
    /// count, the harmonic bin) are checked when the scan is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phase_steps == Some(0) {
            return Err(ConfigError::Invalid("phase_steps must be positive".into()));
        }
        if let Some(steps) = self.phase_steps {
            if self.periods > steps / 2 {
                return Err(ConfigError::Invalid(format!(
                    "periods ({}) must not exceed half of phase_steps ({})",
                    self.periods, steps
                )));
            }
        }
        if self.periods == 0 {
            return Err(ConfigError::Invalid("periods must be positive".into()));
        }
        if self.flats_every == 0 || self.n_flats == 0 {
            return Err(ConfigError::Invalid(
                "flats_every and n_flats must be positive".into(),
            ));
        }
        if let Some(geometry) = &self.frame_geometry {
            if geometry.pixel_count() == 0 {
                return Err(ConfigError::Invalid(format!(
                    "frame geometry {geometry} has no pixels"
                )));
            }
        }
        Ok(())
    }

    /// Curve parameters used by the reconstruction chain.
    pub fn curve_layout(&self) -> CurveLayout {
        CurveLayout {
            phase_steps: self.phase_steps,
            periods: self.periods,
            drop_last: self.drop_last,
        }
    }

    /// Directory datasets are written to under `output_root`.
    pub fn output_dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.output_group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ReconstructionConfig::default();
        assert_eq!(config.periods, 1);
        assert_eq!(config.flats_every, 1);
        assert_eq!(config.n_flats, 1);
        assert_eq!(config.flat_averaging, FlatAveraging::RawCurves);
        assert!(!config.overwrite);
        assert_eq!(config.output_group, PathBuf::from("postprocessing"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ReconstructionConfig =
            serde_json::from_str(r#"{"phase_steps": 24, "flat_averaging": "signals"}"#).unwrap();
        assert_eq!(config.phase_steps, Some(24));
        assert_eq!(config.flat_averaging, FlatAveraging::Signals);
        assert_eq!(config.periods, 1);
        assert_eq!(config.jobs, 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ReconstructionConfig {
            phase_steps: Some(12),
            periods: 2,
            flats_every: 3,
            frame_geometry: Some(FrameGeometry::new(512, 640).with_header_bytes(64)),
            ..ReconstructionConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(ReconstructionConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ReconstructionConfig::load(Path::new("/nonexistent/config.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"periods": "two"}"#).unwrap();
        assert!(matches!(
            ReconstructionConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            ReconstructionConfig {
                phase_steps: Some(0),
                ..Default::default()
            },
            ReconstructionConfig {
                periods: 0,
                ..Default::default()
            },
            ReconstructionConfig {
                phase_steps: Some(6),
                periods: 4,
                ..Default::default()
            },
            ReconstructionConfig {
                n_flats: 0,
                ..Default::default()
            },
            ReconstructionConfig {
                frame_geometry: Some(FrameGeometry::new(0, 10)),
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_curve_layout_and_output_dir() {
        let config = ReconstructionConfig {
            phase_steps: Some(8),
            drop_last: true,
            ..Default::default()
        };
        let layout = config.curve_layout();
        assert_eq!(layout.phase_steps, Some(8));
        assert!(layout.drop_last);
        assert_eq!(
            config.output_dir(Path::new("/data/run1")),
            PathBuf::from("/data/run1/postprocessing")
        );
    }
}
