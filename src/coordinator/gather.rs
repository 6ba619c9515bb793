//! Result gathering
//!
//! Collects exactly one [`PartialResult`] per worker and merges them into the
//! final ascending prime list.
//!
//! Results are stored by [`WorkerId`], never by arrival order. Ranges are
//! contiguous and increasing and every partial result is ascending, so walking
//! the slots from worker 0 to worker W-1 and concatenating yields the global
//! ascending list without a comparison sort.
//!
//! # Example
//!
//! ```
//! use primegather::coordinator::gather::Gatherer;
//! use primegather::partition::Range;
//! use primegather::PartialResult;
//!
//! let mut gatherer = Gatherer::new(2);
//! // Arrival order does not matter
//! gatherer.add(PartialResult::new(1, Range::new(5, 10), vec![5, 7])).unwrap();
//! gatherer.add(PartialResult::new(0, Range::new(0, 5), vec![2, 3])).unwrap();
//!
//! let result = gatherer.finish().unwrap();
//! assert_eq!(result.primes, vec![2, 3, 5, 7]);
//! assert_eq!(result.count(), 4);
//! ```

use crate::error::PrimeError;
use crate::partition::{Range, ScanTask, WorkerId};
use crossbeam::channel::Receiver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Primes found in one range, tagged with the worker that produced them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResult {
    pub worker_id: WorkerId,
    pub range: Range,
    /// Ascending
    pub primes: Vec<u64>,
    /// Scan time, diagnostic only
    #[serde(default)]
    pub elapsed_ns: u64,
}

impl PartialResult {
    pub fn new(worker_id: WorkerId, range: Range, primes: Vec<u64>) -> Self {
        Self {
            worker_id,
            range,
            primes,
            elapsed_ns: 0,
        }
    }
}

/// A worker that could not produce its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub worker_id: WorkerId,
    pub reason: String,
}

impl From<WorkerFailure> for PrimeError {
    fn from(failure: WorkerFailure) -> Self {
        PrimeError::WorkerFailure {
            worker_id: failure.worker_id,
            reason: failure.reason,
        }
    }
}

/// What a worker sends back: its result, or why there is none
pub type TaskOutcome = std::result::Result<PartialResult, WorkerFailure>;

/// Per-worker line of the final report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub worker_id: WorkerId,
    pub range: Range,
    pub primes_found: usize,
    pub elapsed_ns: u64,
}

impl WorkerSummary {
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns)
    }
}

/// All primes below the limit, ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResult {
    /// Exclusive upper bound of the search
    pub limit: u64,
    pub primes: Vec<u64>,
    /// One entry per worker, in worker id order
    pub workers: Vec<WorkerSummary>,
}

impl FinalResult {
    pub fn count(&self) -> usize {
        self.primes.len()
    }
}

/// Indexed collection of partial results
///
/// One slot per worker id. Filling a slot twice or addressing a slot outside
/// `[0, W)` is rejected, since either means the transport delivered something
/// that does not belong to this partition.
#[derive(Debug)]
pub struct Gatherer {
    slots: Vec<Option<PartialResult>>,
    /// Range each worker was given, when known
    assigned: Vec<Option<Range>>,
    received: usize,
}

impl Gatherer {
    pub fn new(workers: usize) -> Self {
        Self {
            slots: vec![None; workers],
            assigned: vec![None; workers],
            received: 0,
        }
    }

    /// Gatherer that also checks each result covers the range its worker was
    /// assigned
    ///
    /// Used where results come from outside the process.
    pub fn for_tasks(tasks: &[ScanTask]) -> Self {
        let mut gatherer = Self::new(tasks.len());
        for task in tasks {
            if let Some(slot) = gatherer.assigned.get_mut(task.worker_id) {
                *slot = Some(task.range);
            }
        }
        gatherer
    }

    /// Number of workers expected
    pub fn workers(&self) -> usize {
        self.slots.len()
    }

    /// Number of results received so far
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.slots.len()
    }

    /// Worker ids that have not reported yet, ascending
    pub fn missing(&self) -> Vec<WorkerId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    /// Store a partial result in its worker's slot
    pub fn add(&mut self, partial: PartialResult) -> Result<(), PrimeError> {
        let workers = self.slots.len();
        let slot = self
            .slots
            .get_mut(partial.worker_id)
            .ok_or(PrimeError::UnknownWorker {
                worker_id: partial.worker_id,
                workers,
            })?;

        if slot.is_some() {
            return Err(PrimeError::DuplicateResult(partial.worker_id));
        }

        if let Some(expected) = self.assigned[partial.worker_id] {
            if partial.range != expected {
                return Err(PrimeError::RangeMismatch {
                    worker_id: partial.worker_id,
                    expected,
                    got: partial.range,
                });
            }
        }

        *slot = Some(partial);
        self.received += 1;
        Ok(())
    }

    /// Merge every slot in worker id order
    ///
    /// Fails with `Incomplete` unless all W results are present; a partial
    /// answer is never returned.
    pub fn finish(self) -> Result<FinalResult, PrimeError> {
        if !self.is_complete() {
            return Err(PrimeError::Incomplete {
                missing: self.missing(),
            });
        }

        let total: usize = self.slots.iter().flatten().map(|p| p.primes.len()).sum();
        let mut primes = Vec::with_capacity(total);
        let mut workers = Vec::with_capacity(self.slots.len());
        let mut limit = 0;

        for partial in self.slots.into_iter().flatten() {
            limit = limit.max(partial.range.end);
            workers.push(WorkerSummary {
                worker_id: partial.worker_id,
                range: partial.range,
                primes_found: partial.primes.len(),
                elapsed_ns: partial.elapsed_ns,
            });
            primes.extend(partial.primes);
        }

        if !is_ascending(&primes) {
            tracing::warn!(
                "Gathered primes are not ascending; a scanner broke its ordering contract, sorting"
            );
            primes.sort_unstable();
        }

        Ok(FinalResult {
            limit,
            primes,
            workers,
        })
    }
}

/// Merge a complete map of worker results
pub fn gather(
    results: HashMap<WorkerId, PartialResult>,
    workers: usize,
) -> Result<FinalResult, PrimeError> {
    let mut gatherer = Gatherer::new(workers);
    for (worker_id, partial) in results {
        if partial.worker_id != worker_id {
            return Err(PrimeError::InvalidArgument(format!(
                "result keyed as worker {} was produced by worker {}",
                worker_id, partial.worker_id
            )));
        }
        gatherer.add(partial)?;
    }
    gatherer.finish()
}

/// Block until all `workers` outcomes have arrived on `rx`, then merge
///
/// This is the barrier of the pipeline. It returns as soon as a worker
/// reports a failure. If every sender is dropped before all results are in
/// (a worker died without reporting), the gather fails with `Incomplete`.
/// There is no timeout here.
pub fn collect(rx: &Receiver<TaskOutcome>, workers: usize) -> Result<FinalResult, PrimeError> {
    let mut gatherer = Gatherer::new(workers);

    while !gatherer.is_complete() {
        match rx.recv() {
            Ok(Ok(partial)) => {
                tracing::debug!(
                    worker_id = partial.worker_id,
                    found = partial.primes.len(),
                    received = gatherer.received() + 1,
                    expected = workers,
                    "result received"
                );
                gatherer.add(partial)?;
            }
            Ok(Err(failure)) => return Err(failure.into()),
            Err(_) => {
                return Err(PrimeError::Incomplete {
                    missing: gatherer.missing(),
                })
            }
        }
    }

    gatherer.finish()
}

fn is_ascending(values: &[u64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
