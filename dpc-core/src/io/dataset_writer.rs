//! Background dataset writer with a worker thread pool.
//!
//! Reconstruction results are handed to a bounded channel and written by
//! worker threads, so the next scan can be processed while the previous
//! one is still being stored.

use std::mem;
use std::path::PathBuf;
use std::thread::JoinHandle;

use anyhow::Result;
use crossbeam_channel::{bounded, Sender, TrySendError};
use tracing::{info, warn};

use super::Dataset;

/// Outcome of all writes handled by a [`DatasetWriterHandle`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub failed: usize,
}

impl WriteSummary {
    fn add(&mut self, other: WriteSummary) {
        self.written += other.written;
        self.failed += other.failed;
    }
}

pub struct DatasetWriterHandle {
    sender: Sender<DatasetWriteTask>,
    workers: Vec<JoinHandle<WriteSummary>>,
}

struct DatasetWriteTask {
    dataset: Dataset,
    directory: PathBuf,
    overwrite: bool,
}

impl DatasetWriterHandle {
    pub fn new(num_workers: usize, buffer_size: usize) -> Result<Self> {
        if num_workers == 0 {
            anyhow::bail!("Dataset writer needs at least one worker");
        }

        let (sender, receiver) = bounded::<DatasetWriteTask>(buffer_size);

        let mut workers = Vec::new();
        for worker_id in 0..num_workers {
            let receiver = receiver.clone();

            let handle = std::thread::spawn(move || {
                info!("Dataset writer worker {} started", worker_id);
                let mut summary = WriteSummary::default();
                while let Ok(task) = receiver.recv() {
                    match task.dataset.write(&task.directory, task.overwrite) {
                        Ok(path) => {
                            info!("Saved {}", path.display());
                            summary.written += 1;
                        }
                        Err(e) => {
                            warn!(
                                "Worker {} failed to save dataset {} to {}: {}",
                                worker_id,
                                task.dataset.name,
                                task.directory.display(),
                                e
                            );
                            summary.failed += 1;
                        }
                    }
                }
                info!("Dataset writer worker {} shutting down", worker_id);
                summary
            });

            workers.push(handle);
        }

        Ok(Self { sender, workers })
    }

    /// Queue a dataset, blocking while the queue is full.
    pub fn write(&self, dataset: Dataset, directory: PathBuf, overwrite: bool) -> Result<()> {
        let task = DatasetWriteTask {
            dataset,
            directory,
            overwrite,
        };
        if self.sender.send(task).is_err() {
            anyhow::bail!("Dataset writer workers have shut down");
        }
        Ok(())
    }

    /// Queue a dataset without blocking.
    pub fn try_write(&self, dataset: Dataset, directory: PathBuf, overwrite: bool) -> Result<()> {
        let name = dataset.name.clone();
        let task = DatasetWriteTask {
            dataset,
            directory,
            overwrite,
        };

        match self.sender.try_send(task) {
            Ok(_) => Ok(()),
            Err(TrySendError::Full(_)) => {
                anyhow::bail!("Dataset writer queue full, cannot write {}", name)
            }
            Err(TrySendError::Disconnected(_)) => {
                anyhow::bail!("Dataset writer workers have shut down")
            }
        }
    }

    /// Close the queue, wait for pending writes and report the totals.
    pub fn wait_for_completion(mut self) -> WriteSummary {
        mem::drop(self.sender);

        let mut summary = WriteSummary::default();
        for (worker_id, handle) in self.workers.drain(..).enumerate() {
            match handle.join() {
                Ok(worker_summary) => summary.add(worker_summary),
                Err(e) => warn!("Worker {} panicked: {:?}", worker_id, e),
            }
        }

        info!(
            "All dataset writer workers completed: {} written, {} failed",
            summary.written, summary.failed
        );
        summary
    }
}
