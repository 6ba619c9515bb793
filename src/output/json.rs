//! JSON output formatting
//!
//! Writes one report per run with:
//! - Run info (version, timestamp, host, mode)
//! - The search configuration actually used
//! - Prime count and elapsed time
//! - Per-worker ranges, counts and timings
//! - The full prime list, unless `count_only` is set

use crate::config::Config;
use crate::coordinator::local::RunReport;
use crate::partition::WorkerId;
use crate::util::time::{calculate_rate, format_duration};
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        let micros = d.as_micros() as u64;
        let human = format_duration(d);
        Self { micros, human }
    }
}

/// Run identification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunInfo {
    pub version: String,
    /// RFC 3339, UTC
    pub timestamp: String,
    pub hostname: Option<String>,
    /// standalone or coordinator
    pub mode: String,
}

/// Search parameters as resolved for this run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSearchConfig {
    pub limit: u64,
    pub workers: usize,
    pub scanner: String,
    pub executor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWorker {
    pub worker_id: WorkerId,
    pub start: u64,
    pub end: u64,
    pub primes_found: usize,
    pub elapsed: JsonDuration,
}

/// Complete report file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub info: JsonRunInfo,
    pub config: JsonSearchConfig,
    pub count: usize,
    pub elapsed: JsonDuration,
    /// Candidates examined per second of wall time
    pub candidates_per_sec: f64,
    pub per_worker: Vec<JsonWorker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primes: Option<Vec<u64>>,
}

/// Build the report for a finished run
pub fn build_json_report(report: &RunReport, config: &Config, mode: &str) -> JsonReport {
    let result = &report.result;

    let per_worker = result
        .workers
        .iter()
        .map(|w| JsonWorker {
            worker_id: w.worker_id,
            start: w.range.start,
            end: w.range.end,
            primes_found: w.primes_found,
            elapsed: JsonDuration::from_duration(w.elapsed()),
        })
        .collect();

    JsonReport {
        info: JsonRunInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            hostname: hostname::get().ok().and_then(|h| h.into_string().ok()),
            mode: mode.to_string(),
        },
        config: JsonSearchConfig {
            limit: result.limit,
            workers: result.workers.len(),
            scanner: config.search.scanner.as_str().to_string(),
            executor: config.executor.kind.as_str().to_string(),
            threads: config.executor.threads,
        },
        count: result.count(),
        elapsed: JsonDuration::from_duration(report.elapsed),
        candidates_per_sec: calculate_rate(result.limit, report.elapsed),
        per_worker,
        primes: (!config.output.count_only).then(|| result.primes.clone()),
    }
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, report)?;
    } else {
        serde_json::to_writer(writer, report)?;
    }

    Ok(())
}
