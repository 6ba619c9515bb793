//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::error::PrimeError;
use crate::executor::ExecutorKind;
use crate::partition::SearchBounds;
use crate::scanner::ScannerKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Defaults everywhere except the search limit
    pub fn with_limit(limit: i64) -> Self {
        Self {
            search: SearchConfig {
                limit,
                workers: None,
                scanner: ScannerKind::default(),
            },
            executor: ExecutorConfig::default(),
            output: OutputConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }

    /// Validated `(N, W)` for this run
    pub fn bounds(&self) -> Result<SearchBounds, PrimeError> {
        SearchBounds::new(self.search.limit, self.search.resolved_workers())
    }
}

/// What to search
///
/// Kept signed so that a negative limit or worker count in a config file is
/// reported as an invalid argument instead of a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Exclusive upper bound N
    pub limit: i64,
    /// Worker count W (defaults to the number of logical CPUs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<i64>,
    /// Scanner used by every worker
    #[serde(default)]
    pub scanner: ScannerKind,
}

impl SearchConfig {
    pub fn resolved_workers(&self) -> i64 {
        self.workers.unwrap_or_else(|| num_cpus::get() as i64)
    }
}

/// Where local workers run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub kind: ExecutorKind,
    /// Pool size for the rayon executor (defaults to the number of logical CPUs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON report file path
    pub json_output: Option<PathBuf>,
    /// Primes to print from each end of the list (0 = none)
    #[serde(default = "default_show_primes")]
    pub show_primes: usize,
    /// Report only the count; the JSON report omits the prime list
    #[serde(default)]
    pub count_only: bool,
    /// Print the per-worker table
    #[serde(default)]
    pub per_worker: bool,
}

fn default_show_primes() -> usize {
    10
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_output: None,
            show_primes: default_show_primes(),
            count_only: false,
            per_worker: false,
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Give up waiting for remote results after this many seconds (0 = wait forever)
    #[serde(default)]
    pub result_timeout_secs: u64,
    /// Dry run mode
    #[serde(default)]
    pub dry_run: bool,
    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}
