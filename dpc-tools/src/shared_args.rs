//! Arguments and setup common to every DPC binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use dpc_core::io::ScanManifest;
use dpc_core::{FrameGeometry, ReconstructionConfig, Scan};
use tracing::info;

/// Parse a frame size in format "ROWSxCOLS"
fn parse_geometry(s: &str) -> Result<FrameGeometry, String> {
    let (rows, cols) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| "Frame size must be in format 'ROWSxCOLS'".to_string())?;

    let rows = rows
        .trim()
        .parse::<usize>()
        .map_err(|_| "Invalid row count".to_string())?;
    let cols = cols
        .trim()
        .parse::<usize>()
        .map_err(|_| "Invalid column count".to_string())?;

    Ok(FrameGeometry::new(rows, cols))
}

/// Common arguments shared across the DPC binaries
#[derive(Parser, Debug, Clone)]
pub struct SharedArgs {
    /// Scan manifests (JSON) in acquisition order
    #[arg(required = true, value_name = "MANIFEST")]
    pub manifests: Vec<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output root directory (defaults to the directory of the first manifest)
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Replace existing datasets
    #[arg(short = 'o', long)]
    pub overwrite: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Worker threads (0 for one per core)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Exposures per phase-stepping curve
    #[arg(short = 's', long)]
    pub steps: Option<usize>,

    /// Grating periods covered by one curve
    #[arg(long)]
    pub periods: Option<usize>,

    /// Drop the closing exposure of every scan
    #[arg(long)]
    pub drop_last: bool,

    /// Raw frame size for manifests without geometry (format: "ROWSxCOLS")
    #[arg(long, value_parser = parse_geometry)]
    pub frame_size: Option<FrameGeometry>,

    /// Bytes to skip at the start of each raw frame
    #[arg(long)]
    pub header_bytes: Option<usize>,
}

impl SharedArgs {
    /// Load the configuration file (if any), apply flag overrides and validate.
    pub fn resolve_config(&self) -> Result<ReconstructionConfig> {
        let mut config = match &self.config {
            Some(path) => ReconstructionConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ReconstructionConfig::default(),
        };

        if let Some(steps) = self.steps {
            config.phase_steps = Some(steps);
        }
        if let Some(periods) = self.periods {
            config.periods = periods;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        config.overwrite |= self.overwrite;
        config.drop_last |= self.drop_last;

        if let Some(geometry) = self.frame_size {
            config.frame_geometry = Some(geometry);
        }
        if let Some(header_bytes) = self.header_bytes {
            let geometry = config
                .frame_geometry
                .context("--header-bytes needs a frame size from --frame-size or the config")?;
            config.frame_geometry = Some(geometry.with_header_bytes(header_bytes));
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Directory that output groups are created in.
    pub fn output_root(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            self.manifests
                .first()
                .and_then(|path| path.parent())
                .map(Path::to_path_buf)
                .unwrap_or_default()
        })
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug over info.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Read every manifest and its frames, in the given order.
pub fn load_scans(manifests: &[PathBuf], geometry: Option<FrameGeometry>) -> Result<Vec<Scan>> {
    manifests
        .iter()
        .map(|path| {
            let manifest = ScanManifest::load(path)
                .with_context(|| format!("Failed to read manifest {}", path.display()))?;
            let scan = manifest
                .load_scan(geometry)
                .with_context(|| format!("Failed to load frames of {}", path.display()))?;
            info!("{}: {} frames", path.display(), scan.frames.len());
            Ok(scan)
        })
        .collect()
}
