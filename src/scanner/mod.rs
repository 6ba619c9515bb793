//! Local scanners
//!
//! A scanner finds the primes inside one [`Range`]. It is the unit of parallel
//! work: a scan reads no shared mutable state, writes only its own output
//! vector, and needs no synchronization while it runs, so it can be scheduled
//! on a thread, a pool, or a remote node.
//!
//! # Implementations
//!
//! - [`TrialDivisionScanner`]: asks the primality oracle about every
//!   candidate (odd candidates only, after 2)
//! - [`SegmentedSieveScanner`]: odd-only segmented sieve of Eratosthenes over
//!   the range, seeded with the primes up to `sqrt(end - 1)`
//!
//! Both produce ascending output by construction and must agree on every
//! range.

use crate::partition::{Range, ScanTask};
use crate::prime::{integer_sqrt, is_prime, small_primes};
use crate::PartialResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Finds the primes in a range
///
/// Implementations must be `Send + Sync`: one scanner instance is shared by
/// every worker of an executor.
pub trait Scanner: Send + Sync {
    /// Short name for logs and reports
    fn name(&self) -> &'static str;

    /// Primes in `range`, ascending. An empty range yields an empty vector.
    fn scan(&self, range: Range) -> Vec<u64>;
}

/// Scanner selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScannerKind {
    /// Trial division by odd numbers up to the square root
    #[default]
    TrialDivision,
    /// Odd-only segmented sieve
    SegmentedSieve,
}

impl ScannerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScannerKind::TrialDivision => "trial-division",
            ScannerKind::SegmentedSieve => "segmented-sieve",
        }
    }
}

/// Build the scanner for `kind`
pub fn create_scanner(kind: ScannerKind) -> Arc<dyn Scanner> {
    match kind {
        ScannerKind::TrialDivision => Arc::new(TrialDivisionScanner),
        ScannerKind::SegmentedSieve => Arc::new(SegmentedSieveScanner::default()),
    }
}

/// Run one task and tag the output with its worker id
pub fn scan_task(scanner: &dyn Scanner, task: ScanTask) -> PartialResult {
    let started = Instant::now();
    let primes = scanner.scan(task.range);
    let elapsed_ns = started.elapsed().as_nanos() as u64;

    tracing::debug!(
        worker_id = task.worker_id,
        range = %task.range,
        found = primes.len(),
        scanner = scanner.name(),
        "scan complete"
    );

    PartialResult {
        worker_id: task.worker_id,
        range: task.range,
        primes,
        elapsed_ns,
    }
}

/// Trial division over every candidate in the range
#[derive(Debug, Clone, Copy, Default)]
pub struct TrialDivisionScanner;

impl Scanner for TrialDivisionScanner {
    fn name(&self) -> &'static str {
        "trial-division"
    }

    fn scan(&self, range: Range) -> Vec<u64> {
        let mut primes = Vec::new();
        if range.contains(2) {
            primes.push(2);
        }

        // Even numbers past 2 are never prime; start at the first odd >= 3
        let mut n = range.start.max(3);
        if n % 2 == 0 {
            n += 1;
        }
        while n < range.end {
            if is_prime(n) {
                primes.push(n);
            }
            n = match n.checked_add(2) {
                Some(next) => next,
                None => break,
            };
        }
        primes
    }
}

/// Odd-only segmented sieve
///
/// Memory is bounded by the segment size plus the base primes, which are
/// computed once per scan up to `sqrt(end - 1)`.
#[derive(Debug, Clone, Copy)]
pub struct SegmentedSieveScanner {
    /// Odd candidates per segment
    segment_odds: u64,
}

impl SegmentedSieveScanner {
    pub const DEFAULT_SEGMENT_ODDS: u64 = 1 << 18;

    pub fn with_segment_odds(segment_odds: u64) -> Self {
        Self {
            segment_odds: segment_odds.max(1),
        }
    }
}

impl Default for SegmentedSieveScanner {
    fn default() -> Self {
        Self::with_segment_odds(Self::DEFAULT_SEGMENT_ODDS)
    }
}

impl Scanner for SegmentedSieveScanner {
    fn name(&self) -> &'static str {
        "segmented-sieve"
    }

    fn scan(&self, range: Range) -> Vec<u64> {
        let mut primes = Vec::new();
        if range.contains(2) {
            primes.push(2);
        }

        let mut lo = range.start.max(3);
        if lo % 2 == 0 {
            lo += 1;
        }
        if lo >= range.end {
            return primes;
        }

        let base: Vec<u64> = small_primes(integer_sqrt(range.end - 1))
            .into_iter()
            .filter(|&p| p != 2)
            .collect();

        let mut composite: Vec<bool> = Vec::new();
        let mut seg_lo = lo;
        while seg_lo < range.end {
            // seg_lo is odd; the segment covers seg_lo, seg_lo + 2, ... < seg_hi
            let seg_hi = seg_lo
                .saturating_add(2 * self.segment_odds)
                .min(range.end);
            let count = ((seg_hi - seg_lo + 1) / 2) as usize;
            composite.clear();
            composite.resize(count, false);

            for &p in &base {
                let square = p * p;
                if square >= seg_hi {
                    break;
                }
                let mut multiple = if square >= seg_lo {
                    square
                } else {
                    match seg_lo.div_ceil(p).checked_mul(p) {
                        Some(m) => m,
                        None => continue,
                    }
                };
                if multiple % 2 == 0 {
                    multiple = match multiple.checked_add(p) {
                        Some(m) => m,
                        None => continue,
                    };
                }
                while multiple < seg_hi {
                    composite[((multiple - seg_lo) / 2) as usize] = true;
                    multiple = match multiple.checked_add(2 * p) {
                        Some(m) => m,
                        None => break,
                    };
                }
            }

            primes.extend(
                composite
                    .iter()
                    .enumerate()
                    .filter(|&(_, &is_composite)| !is_composite)
                    .map(|(i, _)| seg_lo + 2 * i as u64),
            );

            seg_lo = seg_hi;
        }

        primes
    }
}
