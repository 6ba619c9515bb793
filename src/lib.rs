//! primegather - partitioned parallel prime search
//!
//! Finds every prime below a bound N by splitting `[0, N)` into W contiguous
//! ranges, scanning each range independently, and merging the partial
//! results back in range order.
//!
//! # Architecture
//!
//! - **Partitioning**: deterministic split of `[0, N)` into W ranges
//! - **Scanners**: trial division or segmented sieve over one range
//! - **Executors**: OS threads, a rayon pool, or a test double
//! - **Gather**: WorkerId-indexed merge behind a single barrier
//! - **Distributed mode**: coordinator assigns ranges to node services over TCP
//!
//! # Example
//!
//! ```
//! use primegather::coordinator::LocalCoordinator;
//! use primegather::executor::ThreadExecutor;
//! use primegather::partition::SearchBounds;
//! use primegather::scanner::{create_scanner, ScannerKind};
//! use std::sync::Arc;
//!
//! let executor = ThreadExecutor::new(create_scanner(ScannerKind::TrialDivision));
//! let coordinator = LocalCoordinator::new(Arc::new(executor));
//!
//! let report = coordinator.run(SearchBounds::new(30, 3)?)?;
//! assert_eq!(report.result.primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod coordinator;
pub mod distributed;
pub mod error;
pub mod executor;
pub mod output;
pub mod partition;
pub mod prime;
pub mod scanner;
pub mod util;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{FinalResult, PartialResult};
pub use error::PrimeError;

/// Result type used throughout primegather
pub type Result<T> = anyhow::Result<T>;
