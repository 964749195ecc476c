//! Parallel processing of independent scans.
//!
//! Scans do not share any state, so they are spread over a dedicated rayon
//! pool with one task per scan. Results come back in input order, and a
//! failure inside one task is just that task's output value.

use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;
use tracing::debug;

/// Errors from setting up the worker pool.
#[derive(Error, Debug)]
pub enum ParallelError {
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// Run `processor` over every input on a pool of `jobs` worker threads.
///
/// # Arguments
/// * `inputs` - Items to process; each is handed to exactly one task
/// * `jobs` - Number of worker threads, 0 lets rayon pick one per core
/// * `processor` - Closure receiving the item index and the item
///
/// # Returns
/// The per-item outputs in the same order as `inputs`.
pub fn process_in_parallel<I, O, F>(
    inputs: &[I],
    jobs: usize,
    processor: F,
) -> Result<Vec<O>, ParallelError>
where
    I: Sync,
    O: Send,
    F: Fn(usize, &I) -> O + Send + Sync,
{
    let pool = ThreadPoolBuilder::new().num_threads(jobs).build()?;
    debug!(
        "processing {} items on {} worker threads",
        inputs.len(),
        pool.current_num_threads()
    );

    let outputs = pool.install(|| {
        inputs
            .par_iter()
            .enumerate()
            .map(|(index, input)| processor(index, input))
            .collect()
    });

    Ok(outputs)
}
