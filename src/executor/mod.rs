//! Task executors
//!
//! An executor takes one [`ScanTask`] at a time and eventually sends exactly
//! one [`TaskOutcome`] back on the reply channel it was given. Where the scan
//! runs (a dedicated thread, a pool, inline) is up to the implementation; the
//! gather side only ever sees the channel.
//!
//! A panicking scan is reported as a [`WorkerFailure`] rather than a silent
//! disconnect, so the coordinator can name the worker that failed.

pub mod mock;

use crate::config::ExecutorConfig;
use crate::coordinator::gather::{TaskOutcome, WorkerFailure};
use crate::partition::ScanTask;
use crate::scanner::{scan_task, Scanner};
use crate::Result;
use anyhow::Context;
use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Runs scan tasks somewhere and reports back on a channel
pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start `task`. The outcome is sent on `reply` exactly once, or `reply`
    /// is dropped if the task is lost.
    fn submit(&self, task: ScanTask, reply: Sender<TaskOutcome>) -> Result<()>;
}

/// Executor selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// One OS thread per task
    #[default]
    Thread,
    /// Shared rayon pool
    Rayon,
}

impl ExecutorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorKind::Thread => "thread",
            ExecutorKind::Rayon => "rayon",
        }
    }
}

/// Build the configured executor around `scanner`
pub fn create_executor(
    config: &ExecutorConfig,
    scanner: Arc<dyn Scanner>,
) -> Result<Arc<dyn Executor>> {
    match config.kind {
        ExecutorKind::Thread => Ok(Arc::new(ThreadExecutor::new(scanner))),
        ExecutorKind::Rayon => {
            let threads = config.threads.unwrap_or_else(num_cpus::get);
            Ok(Arc::new(RayonExecutor::new(scanner, threads)?))
        }
    }
}

/// Scan one task, turning a panic into a failure outcome
pub(crate) fn run_task(scanner: &dyn Scanner, task: ScanTask) -> TaskOutcome {
    catch_unwind(AssertUnwindSafe(|| scan_task(scanner, task))).map_err(|payload| {
        let reason = if let Some(msg) = payload.downcast_ref::<&str>() {
            format!("scan panicked: {}", msg)
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            format!("scan panicked: {}", msg)
        } else {
            "scan panicked".to_string()
        };
        tracing::warn!(worker_id = task.worker_id, range = %task.range, "{}", reason);
        WorkerFailure {
            worker_id: task.worker_id,
            reason,
        }
    })
}

/// Spawns a named OS thread per task
pub struct ThreadExecutor {
    scanner: Arc<dyn Scanner>,
}

impl ThreadExecutor {
    pub fn new(scanner: Arc<dyn Scanner>) -> Self {
        Self { scanner }
    }
}

impl Executor for ThreadExecutor {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn submit(&self, task: ScanTask, reply: Sender<TaskOutcome>) -> Result<()> {
        let scanner = Arc::clone(&self.scanner);
        std::thread::Builder::new()
            .name(format!("scan-worker-{}", task.worker_id))
            .spawn(move || {
                let outcome = run_task(scanner.as_ref(), task);
                // The gatherer may already have bailed on another worker's failure
                let _ = reply.send(outcome);
            })
            .with_context(|| format!("Failed to spawn thread for worker {}", task.worker_id))?;
        Ok(())
    }
}

/// Runs tasks on a fixed-size rayon pool
///
/// With fewer threads than workers, tasks queue inside the pool; each still
/// reports exactly once.
pub struct RayonExecutor {
    scanner: Arc<dyn Scanner>,
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    pub fn new(scanner: Arc<dyn Scanner>, threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("scan-pool-{}", i))
            .build()
            .context("Failed to build rayon thread pool")?;
        Ok(Self { scanner, pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Executor for RayonExecutor {
    fn name(&self) -> &'static str {
        "rayon"
    }

    fn submit(&self, task: ScanTask, reply: Sender<TaskOutcome>) -> Result<()> {
        let scanner = Arc::clone(&self.scanner);
        self.pool.spawn(move || {
            let outcome = run_task(scanner.as_ref(), task);
            let _ = reply.send(outcome);
        });
        Ok(())
    }
}
