//! Differential phase contrast reconstruction of phase-stepping scans.
//!
//! Reads the scans listed by the manifests, splits them into sample and
//! flat scans according to the flats-every layout, reconstructs every
//! group in parallel and stores the concatenated result as datasets. Groups
//! that fail are left out and listed in the `skipped_group_indices`
//! attribute.

use anyhow::{Context, Result};
use clap::Parser;
use dpc_core::io::DatasetWriterHandle;
use dpc_core::{merge_group_results, reconstruct_groups_in_parallel, split_flats_every};
use dpc_tools::{init_tracing, load_scans, SharedArgs};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Reconstruct absorption, differential phase and dark-field from phase-stepping scans"
)]
struct Args {
    #[command(flatten)]
    shared: SharedArgs,

    /// Sample scans between two flat blocks
    #[arg(long)]
    flats_every: Option<usize>,

    /// Flat scans per flat block
    #[arg(long)]
    n_flats: Option<usize>,

    /// Take the flat median after signal extraction instead of on raw curves
    #[arg(long)]
    median_signals: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.shared.verbose);

    let mut config = args.shared.resolve_config()?;
    if let Some(flats_every) = args.flats_every {
        config.flats_every = flats_every;
    }
    if let Some(n_flats) = args.n_flats {
        config.n_flats = n_flats;
    }
    if args.median_signals {
        config.flat_averaging = dpc_core::FlatAveraging::Signals;
    }
    config.validate().context("Invalid configuration")?;

    info!("DPC reconstruction");
    info!("==================");
    info!("{:?}", config);

    let scans = load_scans(&args.shared.manifests, config.frame_geometry)?;
    let groups = split_flats_every(&scans, config.flats_every, config.n_flats)
        .context("Cannot arrange scans into sample/flat groups")?;

    let results = reconstruct_groups_in_parallel(
        &groups,
        &config.curve_layout(),
        config.flat_averaging,
        config.jobs,
    )?;

    let total = results.len();
    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    info!("Reconstructed {} of {} scan groups", succeeded, total);

    let merged = merge_group_results(&groups, results)
        .with_context(|| format!("All {} scan groups failed", total))?;

    let output_dir = config.output_dir(&args.shared.output_root());
    let writer = DatasetWriterHandle::new(config.jobs.max(1), 8)?;
    for dataset in merged.datasets() {
        writer.write(dataset, output_dir.clone(), config.overwrite)?;
    }

    let summary = writer.wait_for_completion();
    if summary.failed > 0 {
        anyhow::bail!(
            "{} datasets could not be written to {}",
            summary.failed,
            output_dir.display()
        );
    }

    info!(
        "Wrote {} datasets to {}",
        summary.written,
        output_dir.display()
    );
    Ok(())
}
