//! Scheduling helpers for running independent reconstructions.

pub mod parallel;

pub use parallel::{process_in_parallel, ParallelError};
