//! End-to-end reconstruction of synthetic phase-stepping acquisitions.
//!
//! Scans are generated from known per-pixel parameters, pushed through the
//! full chain and the recovered absorption, phase and dark-field compared
//! against the values they were built from.

use approx::assert_relative_eq;
use dpc_core::io::{Dataset, DatasetWriterHandle, ScanManifest};
use dpc_core::signal::{A0, A1, PHI};
use dpc_core::{
    merge_group_results, reconstruct_groups_in_parallel, reconstruct_scan, split_flats_every,
    visibility_of_scan, FlatAveraging, FrameGeometry, Reconstruction, ReconstructionConfig, Scan,
};
use ndarray::{s, Array2};
use std::path::{Path, PathBuf};
use test_helpers::{
    frames_from_pixel_curves, output_path, phase_stepping_curve, raw_frame_bytes,
    to_detector_counts,
};

const SHAPE: (usize, usize) = (3, 4);
const STEPS: usize = 8;
const CURVES_PER_SCAN: usize = 2;

fn flat_phase(y: usize, x: usize) -> f64 {
    0.1 * x as f64 - 0.2 * y as f64
}

fn transmission(_y: usize, x: usize) -> f64 {
    0.5 + 0.1 * x as f64
}

fn phase_shift(y: usize, _x: usize) -> f64 {
    0.3 * (y as f64 - 1.0)
}

const VISIBILITY_LOSS: f64 = 0.8;
const FLAT_COUNTS: f64 = 2000.0;
const FLAT_VISIBILITY: f64 = 0.3;

fn flat_scan(intensity: f64) -> Scan<f64> {
    Scan::new(frames_from_pixel_curves(SHAPE, STEPS * CURVES_PER_SCAN, |y, x| {
        phase_stepping_curve(intensity, FLAT_VISIBILITY, flat_phase(y, x), STEPS, 1)
            .repeat(CURVES_PER_SCAN)
    }))
}

fn sample_scan(flat_intensity: f64) -> Scan<f64> {
    Scan::new(frames_from_pixel_curves(SHAPE, STEPS * CURVES_PER_SCAN, |y, x| {
        phase_stepping_curve(
            flat_intensity * transmission(y, x),
            FLAT_VISIBILITY * VISIBILITY_LOSS,
            flat_phase(y, x) + phase_shift(y, x),
            STEPS,
            1,
        )
        .repeat(CURVES_PER_SCAN)
    }))
}

fn assert_recovers_sample(result: &Reconstruction, tolerance: f64) {
    let (rows, cols, groups, _) = result.dpc_reconstruction.dim();
    for y in 0..rows {
        for x in 0..cols {
            let t = transmission(y, x);
            for g in 0..groups {
                let lane = result.dpc_reconstruction.slice(s![y, x, g, ..]);
                assert_relative_eq!(lane[A0], t, epsilon = tolerance);
                assert_relative_eq!(lane[PHI], phase_shift(y, x), epsilon = tolerance);
                // a1 ratio times the absorption of the same pixel
                assert_relative_eq!(lane[A1], VISIBILITY_LOSS * t * t, epsilon = tolerance);
            }
        }
    }
}

#[test]
fn test_flats_every_acquisition() {
    // Two repetitions of (sample, sample, flat); the beam drifts by 10%
    let mut scans = Vec::new();
    for intensity in [FLAT_COUNTS, FLAT_COUNTS * 1.1] {
        scans.push(sample_scan(intensity));
        scans.push(sample_scan(intensity));
        scans.push(flat_scan(intensity));
    }
    // Incomplete trailing repetition
    scans.push(sample_scan(FLAT_COUNTS));

    let config = ReconstructionConfig {
        phase_steps: Some(STEPS),
        flats_every: 2,
        n_flats: 1,
        jobs: 2,
        ..ReconstructionConfig::default()
    };
    config.validate().unwrap();

    let groups = split_flats_every(&scans, config.flats_every, config.n_flats).unwrap();
    assert_eq!(groups.len(), 2);

    let results = reconstruct_groups_in_parallel(
        &groups,
        &config.curve_layout(),
        config.flat_averaging,
        config.jobs,
    )
    .unwrap();
    assert!(results.iter().all(|result| result.is_ok()));

    let merged = merge_group_results(&groups, results).unwrap();
    assert_eq!(merged.attributes["group_indices"], serde_json::json!([0, 1]));
    assert_eq!(merged.attributes["curve_groups"], serde_json::json!([4, 4]));
    assert_eq!(merged.attributes["skipped_group_indices"], serde_json::json!([]));

    assert_eq!(
        merged.dpc_reconstruction.shape(),
        &[SHAPE.0, SHAPE.1, 2 * 2 * CURVES_PER_SCAN, 3]
    );
    assert_eq!(merged.visibility.shape(), &[SHAPE.0, SHAPE.1, 2 * CURVES_PER_SCAN]);
    assert_recovers_sample(&merged, 1e-9);

    for &v in merged.visibility.iter() {
        assert_relative_eq!(v, FLAT_VISIBILITY, epsilon = 1e-9);
    }
}

#[test]
fn test_median_flat_ignores_corrupted_acquisition() {
    let clean: Vec<Scan<f64>> = (0..5).map(|_| flat_scan(FLAT_COUNTS)).collect();
    let mut corrupted = clean.clone();
    for frame in corrupted[2].frames.iter_mut() {
        frame[[1, 1]] *= 100.0;
    }

    let sample = sample_scan(FLAT_COUNTS);
    let config = ReconstructionConfig {
        phase_steps: Some(STEPS),
        ..ReconstructionConfig::default()
    };

    for averaging in [FlatAveraging::RawCurves, FlatAveraging::Signals] {
        let layout = config.curve_layout();
        let reference = reconstruct_scan(&sample, &clean, &layout, averaging).unwrap();
        let robust = reconstruct_scan(&sample, &corrupted, &layout, averaging).unwrap();

        for (a, b) in reference
            .dpc_reconstruction
            .iter()
            .zip(robust.dpc_reconstruction.iter())
        {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
        assert_recovers_sample(&robust, 1e-9);
    }
}

#[test]
fn test_visibility_only_chain() {
    let config = ReconstructionConfig {
        phase_steps: Some(STEPS),
        ..ReconstructionConfig::default()
    };
    let vis = visibility_of_scan(&sample_scan(FLAT_COUNTS), &config.curve_layout()).unwrap();

    assert_eq!(vis.shape(), &[SHAPE.0, SHAPE.1, CURVES_PER_SCAN]);
    for &v in vis.iter() {
        assert_relative_eq!(v, FLAT_VISIBILITY * VISIBILITY_LOSS, epsilon = 1e-9);
    }
}

fn write_raw_scan(dir: &Path, name: &str, frames: &[Array2<u16>], header: usize) -> ScanManifest {
    let mut paths = Vec::new();
    for (i, frame) in frames.iter().enumerate() {
        let file = format!("{name}_{i:03}.raw");
        let mut bytes = vec![0u8; header];
        bytes.extend(raw_frame_bytes(frame));
        std::fs::write(dir.join(&file), bytes).unwrap();
        paths.push(PathBuf::from(file));
    }

    let mut manifest = ScanManifest::new(paths);
    manifest
        .attributes
        .insert("exposure_ms".to_string(), serde_json::json!(250));
    let manifest_path = dir.join(format!("{name}.json"));
    manifest.save(&manifest_path).unwrap();
    ScanManifest::load(&manifest_path).unwrap()
}

#[test]
fn test_raw_files_to_stored_datasets() {
    let input = tempfile::tempdir().unwrap();
    let scale = 15.0;

    let sample_frames = to_detector_counts(&sample_scan(FLAT_COUNTS * scale).frames);
    let flat_frames = to_detector_counts(&flat_scan(FLAT_COUNTS * scale).frames);
    let sample_manifest = write_raw_scan(input.path(), "sample", &sample_frames, 32);
    let flat_manifest = write_raw_scan(input.path(), "flat", &flat_frames, 32);

    let config_path = input.path().join("config.json");
    ReconstructionConfig {
        phase_steps: Some(STEPS),
        overwrite: true,
        frame_geometry: Some(FrameGeometry::new(SHAPE.0, SHAPE.1).with_header_bytes(32)),
        ..ReconstructionConfig::default()
    }
    .save(&config_path)
    .unwrap();
    let config = ReconstructionConfig::load(&config_path).unwrap();

    let sample = sample_manifest.load_scan(config.frame_geometry).unwrap();
    let flat = flat_manifest.load_scan(config.frame_geometry).unwrap();
    assert_eq!(sample.frames, sample_frames);

    let result = reconstruct_scan(
        &sample,
        &[flat],
        &config.curve_layout(),
        config.flat_averaging,
    )
    .unwrap();
    assert_eq!(result.attributes["exposure_ms"], serde_json::json!(250));
    assert_recovers_sample(&result, 1e-3);

    let output_dir = config.output_dir(&output_path("pipeline_raw_files"));
    let writer = DatasetWriterHandle::new(2, 4).unwrap();
    for dataset in result.datasets() {
        writer.write(dataset, output_dir.clone(), config.overwrite).unwrap();
    }
    let summary = writer.wait_for_completion();
    assert_eq!(summary.written, 5);
    assert_eq!(summary.failed, 0);

    let stored = Dataset::read(&output_dir, "dpc_reconstruction").unwrap();
    assert_eq!(stored.data.shape(), result.dpc_reconstruction.shape());
    assert_eq!(stored.data, result.dpc_reconstruction.clone().into_dyn());
    assert_eq!(stored.attributes["exposure_ms"], serde_json::json!(250));
}
