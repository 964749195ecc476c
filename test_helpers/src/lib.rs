//! Test helpers for the DPC workspace
//!
//! Synthetic phase-stepping data with known parameters, and a shared
//! `test_output/` directory for tests that leave files behind.

use ndarray::Array2;
use once_cell::sync::Lazy;
use std::env;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

/// Error type for test helper operations
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),
}

/// Returns the path to the project root directory.
///
/// This function searches for the project root by looking for the Cargo.toml file
/// that defines the workspace. It starts from the current directory and moves up
/// until it finds the workspace root.
///
/// # Returns
/// * Ok(PathBuf) - The path to the project root
/// * Err(TestHelperError) - If the project root could not be found
pub fn find_project_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::ProjectRootNotFound(format!("Failed to get current directory: {}", e))
    })?;

    // Search for workspace Cargo.toml
    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            // Check if this is the workspace root
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {}", e))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        // Go up one directory
        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::ProjectRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

/// Lazily initialized project root path
static PROJECT_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_project_root().expect("Failed to find project root directory"));

/// Returns the path to the output directory for test artifacts.
///
/// This function returns a path to a directory where test outputs like
/// images, plots, and other artifacts can be saved. It creates the directory
/// if it doesn't exist.
///
/// # Returns
/// * PathBuf - The path to the output directory
pub fn get_output_dir() -> PathBuf {
    let output_dir = PROJECT_ROOT.join("test_output");

    // Create the directory if it doesn't exist
    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");
    }

    output_dir
}

/// Returns a path within the output directory.
///
/// This is a convenience function for building paths relative to the output directory.
///
/// # Arguments
/// * `path` - The relative path within the output directory
///
/// # Returns
/// * PathBuf - The full path to the file in the output directory
pub fn output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    get_output_dir().join(path)
}

/// Ideal phase-stepping curve `c · (1 + v · cos(2π · periods · k / n + phi))`.
///
/// The `n` samples span exactly `periods` grating periods without the
/// closing sample.
pub fn phase_stepping_curve(c: f64, v: f64, phi: f64, n: usize, periods: usize) -> Vec<f64> {
    (0..n)
        .map(|k| {
            let angle = 2.0 * PI * periods as f64 * k as f64 / n as f64;
            c * (1.0 + v * (angle + phi).cos())
        })
        .collect()
}

/// One frame per curve value, every pixel of a frame set to that value.
pub fn uniform_frames(shape: (usize, usize), curve: &[f64]) -> Vec<Array2<f64>> {
    curve
        .iter()
        .map(|&value| Array2::from_elem(shape, value))
        .collect()
}

/// Frames where pixel (y, x) follows its own curve from `curve_at`.
///
/// `curve_at(y, x)` must return `n` values for every pixel.
pub fn frames_from_pixel_curves<F>(shape: (usize, usize), n: usize, curve_at: F) -> Vec<Array2<f64>>
where
    F: Fn(usize, usize) -> Vec<f64>,
{
    let (rows, cols) = shape;
    let curves: Vec<Vec<f64>> = (0..rows * cols).map(|i| curve_at(i / cols, i % cols)).collect();
    (0..n)
        .map(|k| Array2::from_shape_fn(shape, |(y, x)| curves[y * cols + x][k]))
        .collect()
}

/// Round floating point frames to detector counts.
pub fn to_detector_counts(frames: &[Array2<f64>]) -> Vec<Array2<u16>> {
    frames
        .iter()
        .map(|frame| frame.mapv(|v| v.round().clamp(0.0, u16::MAX as f64) as u16))
        .collect()
}

/// Encode a frame as headerless little-endian `u16` bytes.
pub fn raw_frame_bytes(frame: &Array2<u16>) -> Vec<u8> {
    frame.iter().flat_map(|p| p.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_root_exists() {
        let root = find_project_root().expect("Failed to find project root");
        assert!(root.exists());
        assert!(root.join("Cargo.toml").exists());
    }

    #[test]
    fn test_output_dir_created() {
        let output = get_output_dir();
        assert!(output.exists());
        assert!(output.is_dir());
    }

    #[test]
    fn test_output_path() {
        let path = output_path("visibility.bin");
        assert_eq!(path, get_output_dir().join("visibility.bin"));
    }

    #[test]
    fn test_curve_mean_and_extremes() {
        let curve = phase_stepping_curve(100.0, 0.5, 0.0, 8, 1);
        let mean = curve.iter().sum::<f64>() / curve.len() as f64;
        assert!((mean - 100.0).abs() < 1e-9);
        assert!((curve[0] - 150.0).abs() < 1e-9);
        assert!((curve[4] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_curves_layout() {
        let frames = frames_from_pixel_curves((2, 3), 4, |y, x| vec![(y * 10 + x) as f64; 4]);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[2][[1, 2]], 12.0);
    }

    #[test]
    fn test_detector_counts_round_and_clamp() {
        let frame = ndarray::arr2(&[[1.6, -3.0], [70_000.0, 2.4]]);
        let counts = to_detector_counts(&[frame]);
        assert_eq!(counts[0], ndarray::arr2(&[[2u16, 0], [u16::MAX, 2]]));
        assert_eq!(raw_frame_bytes(&counts[0])[..2], [2, 0]);
    }
}
