//! Configuration validation
//!
//! Everything here runs before any work is dispatched.

use super::*;
use anyhow::Result;

/// Above this many workers per candidate the partition is mostly empty ranges
const MAX_REASONABLE_WORKERS: i64 = 65_536;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_search(&config.search)?;
    validate_executor(&config.executor)?;
    validate_output(&config.output)?;
    validate_runtime(&config.runtime)?;

    Ok(())
}

/// Validate search bounds
///
/// Bad bounds surface as [`PrimeError::InvalidArgument`] inside the anyhow
/// error, so callers can still downcast.
pub fn validate_search(search: &SearchConfig) -> Result<()> {
    let workers = search.resolved_workers();
    SearchBounds::new(search.limit, workers)?;

    if workers > MAX_REASONABLE_WORKERS {
        tracing::warn!(
            workers,
            "Very high worker count, this may cause performance issues"
        );
    }

    if workers > search.limit {
        tracing::warn!(
            workers,
            limit = search.limit,
            "More workers than candidates; trailing workers get empty ranges"
        );
    }

    Ok(())
}

/// Validate executor configuration
pub fn validate_executor(executor: &ExecutorConfig) -> Result<()> {
    if executor.threads == Some(0) {
        anyhow::bail!("executor.threads must be at least 1");
    }

    if executor.threads.is_some() && executor.kind == ExecutorKind::Thread {
        tracing::warn!(
            "executor.threads is ignored by the thread executor (one thread per worker)"
        );
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if let Some(ref path) = output.json_output {
        if path.as_os_str().is_empty() {
            anyhow::bail!("json_output must not be empty");
        }
        if path.is_dir() {
            anyhow::bail!(
                "json_output must be a file path, got directory {}",
                path.display()
            );
        }
    }

    Ok(())
}

/// Validate runtime configuration
pub fn validate_runtime(runtime: &RuntimeConfig) -> Result<()> {
    // A day is far beyond any sane search; larger values are almost always a unit mixup
    if runtime.result_timeout_secs > 86_400 {
        tracing::warn!(
            secs = runtime.result_timeout_secs,
            "result_timeout_secs is longer than a day"
        );
    }

    Ok(())
}
