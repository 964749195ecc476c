//! Per-pixel visibility of phase-stepping scans.
//!
//! Every manifest is processed on its own; the visibility of each scan is
//! stored in a subdirectory named after the manifest.

use anyhow::{Context, Result};
use clap::Parser;
use dpc_core::algo::process_in_parallel;
use dpc_core::io::{Dataset, DatasetWriterHandle};
use dpc_core::visibility_of_scan;
use dpc_tools::{init_tracing, load_scans, SharedArgs};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Compute the visibility of phase-stepping scans")]
struct Args {
    #[command(flatten)]
    shared: SharedArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.shared.verbose);

    let config = args.shared.resolve_config()?;
    let layout = config.curve_layout();

    let scans = load_scans(&args.shared.manifests, config.frame_geometry)?;
    let results = process_in_parallel(&scans, config.jobs, |_, scan| {
        visibility_of_scan(scan, &layout)
    })?;

    let output_dir = config.output_dir(&args.shared.output_root());
    let writer = DatasetWriterHandle::new(config.jobs.max(1), 8)?;
    let mut failed_scans = 0;

    for ((manifest, scan), result) in args.shared.manifests.iter().zip(&scans).zip(results) {
        let name = manifest
            .file_stem()
            .with_context(|| format!("Manifest path {} has no file name", manifest.display()))?;

        match result {
            Ok(visibility) => {
                let dataset =
                    Dataset::new("visibility", visibility).with_attributes(scan.attributes.clone());
                writer.write(dataset, output_dir.join(name), config.overwrite)?;
            }
            Err(e) => {
                warn!("Skipping {}: {}", manifest.display(), e);
                failed_scans += 1;
            }
        }
    }

    let summary = writer.wait_for_completion();
    info!(
        "Visibility written for {} scans, {} scans failed, {} writes failed",
        summary.written, failed_scans, summary.failed
    );

    if failed_scans + summary.failed > 0 {
        anyhow::bail!("{} scans were not processed", failed_scans + summary.failed);
    }
    Ok(())
}
