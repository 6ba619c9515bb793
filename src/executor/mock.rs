//! Mock executor for testing
//!
//! Runs every scan inline on the submitting thread, but controls when and in
//! which order the outcomes reach the gatherer. This is how tests prove that
//! the merge does not depend on arrival order and that a lost or failed worker
//! is reported rather than papered over.
//!
//! # Example
//!
//! ```
//! use primegather::coordinator::gather::collect;
//! use primegather::executor::Executor;
//! use primegather::executor::mock::{Delivery, MockExecutor};
//! use primegather::partition::SearchBounds;
//! use primegather::scanner::{create_scanner, ScannerKind};
//! use crossbeam::channel::unbounded;
//!
//! let executor = MockExecutor::new(create_scanner(ScannerKind::TrialDivision))
//!     .with_delivery(Delivery::Reversed);
//!
//! let bounds = SearchBounds::new(30, 3).unwrap();
//! let (tx, rx) = unbounded();
//! for task in bounds.tasks().unwrap() {
//!     executor.submit(task, tx.clone()).unwrap();
//! }
//! drop(tx);
//!
//! // Outcomes are held back until flushed, then sent worker 2, 1, 0
//! executor.flush();
//! let result = collect(&rx, 3).unwrap();
//! assert_eq!(result.primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
//! ```

use super::{run_task, Executor};
use crate::coordinator::gather::{TaskOutcome, WorkerFailure};
use crate::partition::{ScanTask, WorkerId};
use crate::scanner::Scanner;
use crate::Result;
use crossbeam::channel::Sender;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// When buffered outcomes are released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Send each outcome as soon as its task is submitted
    Immediate,
    /// Hold until `flush`, then send in submission order
    InOrder,
    /// Hold until `flush`, then send last-submitted first
    Reversed,
    /// Hold until `flush`, then send in a seeded random order
    Shuffled { seed: u64 },
}

/// Test double for [`Executor`]
pub struct MockExecutor {
    scanner: Arc<dyn Scanner>,
    delivery: Delivery,

    /// Workers whose reply sender is dropped without sending
    dropped: HashSet<WorkerId>,

    /// Workers that report a failure instead of a result
    failed: HashSet<WorkerId>,

    pending: Mutex<Vec<(TaskOutcome, Sender<TaskOutcome>)>>,

    /// Every task seen, in submission order
    submitted: Mutex<Vec<ScanTask>>,
    submitted_cv: Condvar,
}

impl MockExecutor {
    /// Buffering in submission order, nothing dropped or failed
    pub fn new(scanner: Arc<dyn Scanner>) -> Self {
        Self {
            scanner,
            delivery: Delivery::InOrder,
            dropped: HashSet::new(),
            failed: HashSet::new(),
            pending: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            submitted_cv: Condvar::new(),
        }
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Lose this worker's result: its sender is dropped without a send
    pub fn drop_worker(mut self, worker_id: WorkerId) -> Self {
        self.dropped.insert(worker_id);
        self
    }

    /// Make this worker report a failure
    pub fn fail_worker(mut self, worker_id: WorkerId) -> Self {
        self.failed.insert(worker_id);
        self
    }

    /// Tasks submitted so far
    pub fn submitted(&self) -> Vec<ScanTask> {
        lock(&self.submitted).clone()
    }

    /// Block until at least `count` tasks have been submitted and their
    /// outcomes sent or buffered
    pub fn wait_for_submissions(&self, count: usize) {
        let mut submitted = lock(&self.submitted);
        while submitted.len() < count {
            submitted = self
                .submitted_cv
                .wait(submitted)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Number of outcomes held back
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Release every held outcome in the configured order
    ///
    /// Senders are dropped after sending, so once all tasks are submitted and
    /// flushed the reply channel disconnects.
    pub fn flush(&self) {
        let mut pending = std::mem::take(&mut *lock(&self.pending));

        match self.delivery {
            Delivery::Immediate | Delivery::InOrder => {}
            Delivery::Reversed => pending.reverse(),
            Delivery::Shuffled { seed } => {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                pending.shuffle(&mut rng);
            }
        }

        for (outcome, reply) in pending {
            let _ = reply.send(outcome);
        }
    }
}

impl Executor for MockExecutor {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn submit(&self, task: ScanTask, reply: Sender<TaskOutcome>) -> Result<()> {
        if self.dropped.contains(&task.worker_id) {
            drop(reply);
        } else {
            let outcome = if self.failed.contains(&task.worker_id) {
                Err(WorkerFailure {
                    worker_id: task.worker_id,
                    reason: "mock failure".to_string(),
                })
            } else {
                run_task(self.scanner.as_ref(), task)
            };

            if self.delivery == Delivery::Immediate {
                let _ = reply.send(outcome);
            } else {
                lock(&self.pending).push((outcome, reply));
            }
        }

        // Recorded only once the outcome is buffered, so a flush after
        // `wait_for_submissions` never misses it
        let mut submitted = lock(&self.submitted);
        submitted.push(task);
        self.submitted_cv.notify_all();
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::gather::collect;
    use crate::error::PrimeError;
    use crate::partition::SearchBounds;
    use crate::scanner::{create_scanner, ScannerKind};
    use crossbeam::channel::unbounded;

    fn submit_all(
        executor: &MockExecutor,
        limit: i64,
        workers: i64,
    ) -> crossbeam::channel::Receiver<TaskOutcome> {
        let (tx, rx) = unbounded();
        for task in SearchBounds::new(limit, workers).unwrap().tasks().unwrap() {
            executor.submit(task, tx.clone()).unwrap();
        }
        rx
    }

    fn trial() -> Arc<dyn Scanner> {
        create_scanner(ScannerKind::TrialDivision)
    }

    #[test]
    fn test_buffers_until_flush() {
        let executor = MockExecutor::new(trial());
        let rx = submit_all(&executor, 30, 3);
        assert_eq!(executor.pending(), 3);
        assert!(rx.try_recv().is_err());

        executor.flush();
        assert_eq!(executor.pending(), 0);
        assert_eq!(collect(&rx, 3).unwrap().count(), 10);
    }

    #[test]
    fn test_reversed_delivery_order() {
        let executor = MockExecutor::new(trial()).with_delivery(Delivery::Reversed);
        let rx = submit_all(&executor, 40, 4);
        executor.flush();

        let arrival: Vec<WorkerId> = rx.try_iter().map(|o| o.unwrap().worker_id).collect();
        assert_eq!(arrival, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_shuffled_delivery_still_merges_in_order() {
        for seed in 0..8 {
            let executor = MockExecutor::new(trial()).with_delivery(Delivery::Shuffled { seed });
            let rx = submit_all(&executor, 1000, 16);
            executor.flush();
            let result = collect(&rx, 16).unwrap();
            assert_eq!(result.count(), 168, "seed {}", seed);
            assert!(result.primes.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_dropped_worker_disconnects() {
        let executor = MockExecutor::new(trial()).drop_worker(0).drop_worker(2);
        let rx = submit_all(&executor, 30, 3);
        executor.flush();
        assert_eq!(
            collect(&rx, 3).unwrap_err(),
            PrimeError::Incomplete { missing: vec![0, 2] }
        );
    }

    #[test]
    fn test_failed_worker() {
        let executor = MockExecutor::new(trial())
            .with_delivery(Delivery::Immediate)
            .fail_worker(1);
        let rx = submit_all(&executor, 30, 3);
        assert!(matches!(
            collect(&rx, 3),
            Err(PrimeError::WorkerFailure { worker_id: 1, .. })
        ));
    }

    #[test]
    fn test_records_submissions() {
        let executor = MockExecutor::new(trial()).with_delivery(Delivery::Immediate);
        let _rx = submit_all(&executor, 30, 3);
        executor.wait_for_submissions(3);
        let ids: Vec<WorkerId> = executor.submitted().iter().map(|t| t.worker_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    /// Takes long enough that a flush racing the last submission would miss it
    struct SlowScanner;

    impl Scanner for SlowScanner {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn scan(&self, range: crate::partition::Range) -> Vec<u64> {
            std::thread::sleep(std::time::Duration::from_millis(50));
            trial().scan(range)
        }
    }

    #[test]
    fn test_wait_for_submissions_sees_buffered_outcomes() {
        let executor =
            Arc::new(MockExecutor::new(Arc::new(SlowScanner)).with_delivery(Delivery::Reversed));
        let (tx, rx) = unbounded();

        let submitter = {
            let executor = executor.clone();
            std::thread::spawn(move || {
                for task in SearchBounds::new(40, 4).unwrap().tasks().unwrap() {
                    executor.submit(task, tx.clone()).unwrap();
                }
            })
        };

        executor.wait_for_submissions(4);
        assert_eq!(executor.pending(), 4);
        executor.flush();
        submitter.join().unwrap();

        assert_eq!(executor.pending(), 0);
        assert_eq!(collect(&rx, 4).unwrap().count(), 12);
    }
}
