//! In-process coordinator
//!
//! Runs the whole pipeline inside one process: partition the bounds, hand one
//! task per worker to an [`Executor`], then block on the gather barrier.

use super::gather::{collect, FinalResult};
use crate::executor::Executor;
use crate::partition::SearchBounds;
use crate::Result;
use anyhow::Context;
use crossbeam::channel::unbounded;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of one run plus wall-clock time
#[derive(Debug, Clone)]
pub struct RunReport {
    pub result: FinalResult,
    /// Partition through merge
    pub elapsed: Duration,
}

/// Local partition → scan → gather pipeline
pub struct LocalCoordinator {
    executor: Arc<dyn Executor>,
}

impl LocalCoordinator {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    pub fn run(&self, bounds: SearchBounds) -> Result<RunReport> {
        let started = Instant::now();

        // Fail fast: nothing is submitted if the bounds are bad
        let tasks = bounds.tasks()?;

        tracing::info!(
            limit = bounds.limit,
            workers = bounds.workers,
            executor = self.executor.name(),
            "Starting local search"
        );

        let (tx, rx) = unbounded();
        for task in tasks {
            self.executor
                .submit(task, tx.clone())
                .with_context(|| format!("Failed to submit task for worker {}", task.worker_id))?;
        }
        // Only workers hold senders now, so a lost worker disconnects the channel
        drop(tx);

        let result = collect(&rx, bounds.workers).context("Gather failed")?;
        let elapsed = started.elapsed();

        tracing::info!(
            primes = result.count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Local search complete"
        );

        Ok(RunReport { result, elapsed })
    }
}
