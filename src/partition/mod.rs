//! Range partitioning
//!
//! Splits `[0, N)` into `W` contiguous, non-overlapping half-open ranges, one
//! per worker. The split is computed once, up front, and is fully determined by
//! `(N, W)`:
//!
//! ```text
//! chunk   = ceil(N / W)
//! start_i = min(N, i * chunk)
//! end_i   = min(N, (i + 1) * chunk)
//! ```
//!
//! When `N < W` the trailing ranges are empty. That is a valid partition, not
//! an error: an empty range simply scans to an empty result.
//!
//! # Example
//!
//! ```
//! use primegather::partition::{partition, Range};
//!
//! let ranges = partition(30, 3).unwrap();
//! assert_eq!(ranges, vec![Range::new(0, 10), Range::new(10, 20), Range::new(20, 30)]);
//! ```

use crate::error::PrimeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a worker in `[0, W)`
///
/// Only used to put partial results back in range order at gather time.
pub type WorkerId = usize;

/// Largest accepted worker count
///
/// Every worker owns a range, a task and a result slot, so W is bounded by
/// what a coordinator can reasonably allocate and track.
pub const MAX_WORKERS: usize = 1 << 20;

/// Half-open interval `[start, end)` of candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

impl Range {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "range start {} past end {}", start, end);
        Self { start, end }
    }

    /// Number of integers covered
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, n: u64) -> bool {
        self.start <= n && n < self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One unit of work: a range and the worker that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTask {
    pub worker_id: WorkerId,
    pub range: Range,
}

/// Validated search bounds `(N, W)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBounds {
    /// Exclusive upper bound N
    pub limit: u64,
    /// Worker count W
    pub workers: usize,
}

impl SearchBounds {
    /// Validate signed inputs as they come from the CLI or a config file
    ///
    /// Rejects `N < 0`, `W <= 0` and `W > MAX_WORKERS` with `InvalidArgument`.
    pub fn new(limit: i64, workers: i64) -> Result<Self, PrimeError> {
        if limit < 0 {
            return Err(PrimeError::InvalidArgument(format!(
                "limit must be non-negative, got {}",
                limit
            )));
        }
        if workers <= 0 {
            return Err(PrimeError::InvalidArgument(format!(
                "workers must be at least 1, got {}",
                workers
            )));
        }
        let workers = usize::try_from(workers)
            .ok()
            .filter(|&w| w <= MAX_WORKERS)
            .ok_or_else(|| too_many_workers(workers))?;

        Ok(Self {
            limit: limit as u64,
            workers,
        })
    }

    pub fn partition(&self) -> Result<Vec<Range>, PrimeError> {
        partition(self.limit, self.workers)
    }

    pub fn tasks(&self) -> Result<Vec<ScanTask>, PrimeError> {
        Ok(tasks(&self.partition()?))
    }
}

/// Split `[0, limit)` into `workers` contiguous ranges
pub fn partition(limit: u64, workers: usize) -> Result<Vec<Range>, PrimeError> {
    if workers == 0 {
        return Err(PrimeError::InvalidArgument(
            "workers must be at least 1, got 0".to_string(),
        ));
    }

    if workers > MAX_WORKERS {
        return Err(too_many_workers(workers));
    }

    let chunk = limit.div_ceil(workers as u64);

    let ranges = (0..workers as u64)
        .map(|i| {
            let start = i.saturating_mul(chunk).min(limit);
            let end = (i + 1).saturating_mul(chunk).min(limit);
            Range::new(start, end)
        })
        .collect();

    Ok(ranges)
}

fn too_many_workers(workers: impl fmt::Display) -> PrimeError {
    PrimeError::InvalidArgument(format!(
        "workers must be at most {}, got {}",
        MAX_WORKERS, workers
    ))
}

/// Pair each range with its worker id (position in the partition)
pub fn tasks(ranges: &[Range]) -> Vec<ScanTask> {
    ranges
        .iter()
        .enumerate()
        .map(|(worker_id, &range)| ScanTask { worker_id, range })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(ranges: &[Range], limit: u64) {
        assert!(!ranges.is_empty());
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges.last().unwrap().end, limit);
        for pair in ranges.windows(2) {
            assert_eq!(
                pair[0].end, pair[1].start,
                "gap or overlap between {} and {}",
                pair[0], pair[1]
            );
        }
        for r in ranges {
            assert!(r.start <= r.end && r.end <= limit);
        }
    }

    #[test]
    fn test_partition_even_split() {
        let ranges = partition(30, 3).unwrap();
        assert_eq!(ranges, vec![Range::new(0, 10), Range::new(10, 20), Range::new(20, 30)]);
    }

    #[test]
    fn test_partition_uneven_split() {
        // chunk = ceil(10 / 4) = 3
        let ranges = partition(10, 4).unwrap();
        assert_eq!(
            ranges,
            vec![Range::new(0, 3), Range::new(3, 6), Range::new(6, 9), Range::new(9, 10)]
        );
    }

    #[test]
    fn test_partition_covers_exactly() {
        for limit in [0u64, 1, 2, 3, 7, 10, 29, 30, 31, 100, 997, 1000] {
            for workers in 1..=20usize {
                let ranges = partition(limit, workers).unwrap();
                assert_eq!(ranges.len(), workers);
                assert_covers(&ranges, limit);

                let total: u64 = ranges.iter().map(|r| r.len()).sum();
                assert_eq!(total, limit, "N={} W={}", limit, workers);
            }
        }
    }

    #[test]
    fn test_partition_more_workers_than_numbers() {
        let ranges = partition(3, 10).unwrap();
        assert_covers(&ranges, 3);
        assert_eq!(ranges.iter().filter(|r| r.is_empty()).count(), 7);
        assert_eq!(ranges[5], Range::new(3, 3));
    }

    #[test]
    fn test_partition_zero_limit() {
        let ranges = partition(0, 5).unwrap();
        assert_eq!(ranges.len(), 5);
        assert!(ranges.iter().all(|r| r.is_empty()));
    }

    #[test]
    fn test_partition_zero_workers() {
        let err = partition(100, 0).unwrap_err();
        assert!(matches!(err, PrimeError::InvalidArgument(_)));
    }

    #[test]
    fn test_partition_is_deterministic() {
        assert_eq!(partition(1_000_003, 7).unwrap(), partition(1_000_003, 7).unwrap());
    }

    #[test]
    fn test_partition_near_u64_max() {
        let ranges = partition(u64::MAX, 3).unwrap();
        assert_covers(&ranges, u64::MAX);
    }

    #[test]
    fn test_search_bounds_rejects_negative() {
        assert!(matches!(SearchBounds::new(-1, 4), Err(PrimeError::InvalidArgument(_))));
        assert!(matches!(SearchBounds::new(10, 0), Err(PrimeError::InvalidArgument(_))));
        assert!(matches!(SearchBounds::new(10, -3), Err(PrimeError::InvalidArgument(_))));

        let bounds = SearchBounds::new(30, 3).unwrap();
        assert_eq!(bounds.limit, 30);
        assert_eq!(bounds.workers, 3);
    }

    #[test]
    fn test_search_bounds_rejects_huge_worker_count() {
        for workers in [MAX_WORKERS as i64 + 1, 1 << 40, i64::MAX] {
            assert!(matches!(
                SearchBounds::new(10, workers),
                Err(PrimeError::InvalidArgument(_))
            ));
        }
        assert!(matches!(partition(10, usize::MAX), Err(PrimeError::InvalidArgument(_))));

        let bounds = SearchBounds::new(10, MAX_WORKERS as i64).unwrap();
        assert_eq!(bounds.workers, MAX_WORKERS);
    }

    #[test]
    fn test_tasks_carry_worker_ids() {
        let tasks = SearchBounds::new(30, 3).unwrap().tasks().unwrap();
        let ids: Vec<WorkerId> = tasks.iter().map(|t| t.worker_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(tasks[2].range, Range::new(20, 30));
    }

    #[test]
    fn test_range_helpers() {
        let r = Range::new(10, 20);
        assert_eq!(r.len(), 10);
        assert!(!r.is_empty());
        assert!(r.contains(10));
        assert!(!r.contains(20));
        assert_eq!(r.to_string(), "[10, 20)");
    }
}
