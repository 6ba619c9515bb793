//! Typed errors for the partition / gather core
//!
//! Everything outside the core uses `anyhow`; these variants are what the
//! core itself can report, so callers can `downcast_ref::<PrimeError>()` when
//! they need to tell a bad argument from a lost worker.

use crate::partition::{Range, WorkerId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimeError {
    /// Rejected before any work is dispatched
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Worker {worker_id} failed: {reason}")]
    WorkerFailure { worker_id: WorkerId, reason: String },

    /// Gather ended before every worker reported
    #[error("Incomplete computation: no result from worker(s) {missing:?}")]
    Incomplete { missing: Vec<WorkerId> },

    #[error("Result from unknown worker {worker_id} (expected ids 0..{workers})")]
    UnknownWorker { worker_id: WorkerId, workers: usize },

    #[error("Duplicate result from worker {0}")]
    DuplicateResult(WorkerId),

    #[error("Worker {worker_id} reported range {got}, but was assigned {expected}")]
    RangeMismatch { worker_id: WorkerId, expected: Range, got: Range },

    #[error("Timed out after {secs}s waiting for worker(s) {missing:?}")]
    Timeout { secs: u64, missing: Vec<WorkerId> },
}

impl PrimeError {
    /// Worker ids this error is about, if any
    pub fn affected_workers(&self) -> Vec<WorkerId> {
        match self {
            PrimeError::InvalidArgument(_) => Vec::new(),
            PrimeError::WorkerFailure { worker_id, .. }
            | PrimeError::UnknownWorker { worker_id, .. }
            | PrimeError::RangeMismatch { worker_id, .. }
            | PrimeError::DuplicateResult(worker_id) => vec![*worker_id],
            PrimeError::Incomplete { missing } | PrimeError::Timeout { missing, .. } => {
                missing.clone()
            }
        }
    }
}
