//! End-to-end reconstruction of phase-stepping scans.
//!
//! Ties the individual stages together: stack the exposures of every scan,
//! cut them into curves, extract the Fourier signal and normalize the
//! samples by the flats recorded next to them.

use std::collections::BTreeMap;

use ndarray::{Array, Array2, Array3, Array4, ArrayView, Axis, Ix4, RemoveAxis};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::algo::{process_in_parallel, ParallelError};
use crate::error::ReconstructionError;
use crate::flat::{average_flats, combine_with_flat, FlatAveraging};
use crate::grouping::group_phase_steps;
use crate::io::Dataset;
use crate::scan_layout::{merge_groups, ScanGroup, GROUP_AXIS};
use crate::signal::extract_signals;
use crate::stack::stack_frames;
use crate::visibility::visibility;

/// Free-form metadata carried from the input scans to the output datasets.
pub type Attributes = BTreeMap<String, Value>;

/// Attribute listing the scan group indices a result covers, in order.
pub const GROUP_INDICES: &str = "group_indices";
/// Attribute listing the `source` of every sample scan, in order.
pub const SOURCES: &str = "sources";
/// Attribute listing how many group-axis entries each scan group contributed.
pub const CURVE_GROUPS: &str = "curve_groups";
/// Attribute listing scan groups left out of a merged result.
pub const SKIPPED_GROUP_INDICES: &str = "skipped_group_indices";

const LIST_ATTRIBUTES: [&str; 3] = [GROUP_INDICES, SOURCES, CURVE_GROUPS];

/// The exposures of one phase-stepping scan in acquisition order.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan<T = u16> {
    pub frames: Vec<Array2<T>>,
    pub attributes: Attributes,
}

impl<T> Scan<T> {
    pub fn new(frames: Vec<Array2<T>>) -> Self {
        Self {
            frames,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Parameters shared by every curve of a reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveLayout {
    /// Exposures per curve; `None` treats each scan as a single curve
    pub phase_steps: Option<usize>,
    /// Grating periods covered by one curve
    pub periods: usize,
    /// Drop the last exposure of every scan before grouping
    pub drop_last: bool,
}

impl Default for CurveLayout {
    fn default() -> Self {
        Self {
            phase_steps: None,
            periods: 1,
            drop_last: false,
        }
    }
}

/// Result of normalizing sample scans by their flats.
///
/// Arrays are (rows, cols, groups, ...) with the group axis at
/// [`GROUP_AXIS`]. Sample scans of one reconstruction are laid end to end
/// along the group axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// (absorption, differential phase, dark-field) with the signal axis last
    pub dpc_reconstruction: Array4<f64>,
    /// Flat visibility per pixel and flat curve group
    pub visibility: Array3<f64>,
    /// Flat (a0, phi, a1) with the signal axis last
    pub flat_parameters: Array4<f64>,
    /// Sample curves with the step axis last
    pub phase_stepping_curves: Array4<f64>,
    /// Median flat curves with the step axis last
    pub flat_phase_stepping_curves: Array4<f64>,
    pub attributes: Attributes,
}

impl Reconstruction {
    /// Lay several reconstructions end to end along the group axis.
    ///
    /// Scalar attributes come from the first part. The per-group lists
    /// ([`GROUP_INDICES`], [`SOURCES`], [`CURVE_GROUPS`]) are joined across
    /// all parts so every group-axis entry stays traceable to its scans.
    pub fn concatenate(parts: &[Reconstruction]) -> Result<Reconstruction, ReconstructionError> {
        let first = parts
            .first()
            .ok_or(ReconstructionError::EmptyStack("reconstructions"))?;

        let mut attributes = first.attributes.clone();
        for key in LIST_ATTRIBUTES {
            let joined: Vec<Value> = parts
                .iter()
                .filter_map(|part| part.attributes.get(key))
                .flat_map(|value| match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                })
                .collect();
            if !joined.is_empty() {
                attributes.insert(key.to_string(), Value::Array(joined));
            }
        }

        Ok(Reconstruction {
            dpc_reconstruction: merge_field(parts, |r| r.dpc_reconstruction.view())?,
            visibility: merge_field(parts, |r| r.visibility.view())?,
            flat_parameters: merge_field(parts, |r| r.flat_parameters.view())?,
            phase_stepping_curves: merge_field(parts, |r| r.phase_stepping_curves.view())?,
            flat_phase_stepping_curves: merge_field(parts, |r| {
                r.flat_phase_stepping_curves.view()
            })?,
            attributes,
        })
    }

    /// Output datasets under their stored names.
    pub fn datasets(&self) -> Vec<Dataset> {
        let named = [
            ("dpc_reconstruction", self.dpc_reconstruction.clone().into_dyn()),
            ("visibility", self.visibility.clone().into_dyn()),
            ("flat_parameters", self.flat_parameters.clone().into_dyn()),
            ("phase_stepping_curves", self.phase_stepping_curves.clone().into_dyn()),
            (
                "flat_phase_stepping_curves",
                self.flat_phase_stepping_curves.clone().into_dyn(),
            ),
        ];

        named
            .into_iter()
            .map(|(name, data)| Dataset::new(name, data).with_attributes(self.attributes.clone()))
            .collect()
    }
}

fn merge_field<'a, D, F>(
    parts: &'a [Reconstruction],
    field: F,
) -> Result<Array<f64, D>, ReconstructionError>
where
    D: RemoveAxis,
    F: Fn(&'a Reconstruction) -> ArrayView<'a, f64, D>,
{
    let views: Vec<_> = parts.iter().map(field).collect();
    merge_groups(&views)
}

/// Turn one scan into grouped phase-stepping curves.
///
/// # Returns
/// A (rows, cols, groups, steps) array of curves.
pub fn prepare_curves<T>(
    scan: &Scan<T>,
    layout: &CurveLayout,
) -> Result<Array4<f64>, ReconstructionError>
where
    T: Copy + Into<f64>,
{
    let mut frames = scan.frames.as_slice();
    if layout.drop_last {
        frames = match frames.split_last() {
            Some((_, rest)) if !rest.is_empty() => rest,
            _ => {
                return Err(ReconstructionError::EmptyStack(
                    "frames after dropping the last one",
                ))
            }
        };
    }

    let stack = stack_frames(frames)?;
    let steps = layout.phase_steps.unwrap_or(stack.len_of(Axis(2)));
    group_phase_steps(&stack, steps)
}

/// Reconstruct the sample scans of one group against its flats.
///
/// The flats are reduced once to a single flat field; every sample scan is
/// normalized by it and the results are concatenated along the group axis.
pub fn reconstruct_group<T>(
    group: &ScanGroup<'_, Scan<T>>,
    layout: &CurveLayout,
    averaging: FlatAveraging,
) -> Result<Reconstruction, ReconstructionError>
where
    T: Copy + Into<f64>,
{
    if group.samples.is_empty() {
        return Err(ReconstructionError::EmptyStack("sample scans"));
    }

    let flat_curves = group
        .flats
        .iter()
        .map(|scan| prepare_curves(scan, layout))
        .collect::<Result<Vec<_>, _>>()?;
    let flat = average_flats(&flat_curves, layout.periods, averaging)?;

    let mut signals = Vec::with_capacity(group.samples.len());
    let mut curves = Vec::with_capacity(group.samples.len());
    for scan in group.samples {
        let sample_curves = prepare_curves(scan, layout)?;
        let sample_signals = extract_signals(&sample_curves, layout.periods)?;
        signals.push(combine_with_flat(&sample_signals, &flat.signals)?);
        curves.push(sample_curves);
    }

    let dpc_reconstruction = merge_owned(&signals)?;
    let phase_stepping_curves = merge_owned(&curves)?;

    let mut attributes = group
        .samples
        .first()
        .map(|scan| scan.attributes.clone())
        .unwrap_or_default();
    attributes.remove("source");
    let sources = group
        .samples
        .iter()
        .map(|scan| scan.attributes.get("source").cloned().unwrap_or(Value::Null))
        .collect();
    attributes.insert(GROUP_INDICES.to_string(), Value::from(vec![group.index]));
    attributes.insert(SOURCES.to_string(), Value::Array(sources));
    attributes.insert(
        CURVE_GROUPS.to_string(),
        Value::from(vec![dpc_reconstruction.len_of(GROUP_AXIS)]),
    );
    attributes.insert("periods".to_string(), Value::from(layout.periods));

    debug!(
        "group {}: {} samples against {} flats, output {:?}",
        group.index,
        group.samples.len(),
        group.flats.len(),
        dpc_reconstruction.shape()
    );

    Ok(Reconstruction {
        dpc_reconstruction,
        visibility: visibility(&flat.signals)?,
        flat_parameters: flat.signals,
        phase_stepping_curves,
        flat_phase_stepping_curves: flat.curves,
        attributes,
    })
}

fn merge_owned(parts: &[Array4<f64>]) -> Result<Array4<f64>, ReconstructionError> {
    let views: Vec<ArrayView<f64, Ix4>> = parts.iter().map(|part| part.view()).collect();
    merge_groups(&views)
}

/// Reconstruct a single sample scan against one or more flat scans.
pub fn reconstruct_scan<T>(
    sample: &Scan<T>,
    flats: &[Scan<T>],
    layout: &CurveLayout,
    averaging: FlatAveraging,
) -> Result<Reconstruction, ReconstructionError>
where
    T: Copy + Into<f64>,
{
    let group = ScanGroup {
        index: 0,
        samples: std::slice::from_ref(sample),
        flats,
    };
    reconstruct_group(&group, layout, averaging)
}

/// Visibility of every curve of a scan, shaped (rows, cols, groups).
pub fn visibility_of_scan<T>(
    scan: &Scan<T>,
    layout: &CurveLayout,
) -> Result<Array3<f64>, ReconstructionError>
where
    T: Copy + Into<f64>,
{
    let curves = prepare_curves(scan, layout)?;
    let signals = extract_signals(&curves, layout.periods)?;
    visibility(&signals)
}

/// Reconstruct independent scan groups on `jobs` worker threads.
///
/// Each group succeeds or fails on its own; the outer error only reports a
/// failure to set up the worker pool.
pub fn reconstruct_groups_in_parallel<T>(
    groups: &[ScanGroup<'_, Scan<T>>],
    layout: &CurveLayout,
    averaging: FlatAveraging,
    jobs: usize,
) -> Result<Vec<Result<Reconstruction, ReconstructionError>>, ParallelError>
where
    T: Copy + Into<f64> + Sync + Send,
{
    info!("reconstructing {} scan groups", groups.len());

    let results = process_in_parallel(groups, jobs, |_, group| {
        let result = reconstruct_group(group, layout, averaging);
        if let Err(e) = &result {
            warn!("scan group {} failed: {}", group.index, e);
        }
        result
    })?;

    Ok(results)
}

/// Concatenate the successful results of [`reconstruct_groups_in_parallel`].
///
/// `results` must be in the order of `groups`. Failed groups are left out
/// of the arrays and listed under [`SKIPPED_GROUP_INDICES`].
///
/// # Returns
/// * `Ok(Reconstruction)` - Merged result of every successful group
/// * `Err(ReconstructionError::EmptyStack)` - If no group succeeded
pub fn merge_group_results<T>(
    groups: &[ScanGroup<'_, Scan<T>>],
    results: Vec<Result<Reconstruction, ReconstructionError>>,
) -> Result<Reconstruction, ReconstructionError> {
    let mut merged = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for (group, result) in groups.iter().zip(results) {
        match result {
            Ok(reconstruction) => merged.push(reconstruction),
            Err(_) => skipped.push(group.index),
        }
    }

    if merged.is_empty() {
        return Err(ReconstructionError::EmptyStack("successful scan groups"));
    }
    if !skipped.is_empty() {
        warn!("leaving out failed scan groups {:?}", skipped);
    }

    let mut reconstruction = Reconstruction::concatenate(&merged)?;
    reconstruction
        .attributes
        .insert(SKIPPED_GROUP_INDICES.to_string(), Value::from(skipped));
    Ok(reconstruction)
}
