//! Shared plumbing for the DPC command-line tools.

pub mod shared_args;

pub use shared_args::{init_tracing, load_scans, SharedArgs};
