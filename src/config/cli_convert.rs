//! CLI to Config conversion utilities

use crate::config::cli::Cli;
use crate::config::Config;
use anyhow::{Context, Result};

/// Parse a count string (e.g., "1000", "10k", "5M", "1e6", "1_000_000")
///
/// Suffixes are decimal: k = 10^3, m = 10^6, g = 10^9. A leading minus sign
/// is accepted so that negative limits are reported by validation rather
/// than as a parse failure.
pub fn parse_count(s: &str) -> Result<i64> {
    let s = s.trim().to_lowercase().replace('_', "");

    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.as_str()),
    };

    let value: i64 = if let Some((mantissa, exponent)) = digits.split_once('e') {
        let mantissa: i64 = mantissa
            .parse()
            .with_context(|| format!("Invalid count format: {}", s))?;
        let exponent: u32 = exponent
            .parse()
            .with_context(|| format!("Invalid count format: {}", s))?;
        10i64
            .checked_pow(exponent)
            .and_then(|scale| mantissa.checked_mul(scale))
            .with_context(|| format!("Count out of range: {}", s))?
    } else {
        let (num_str, multiplier) = if let Some(n) = digits.strip_suffix('k') {
            (n, 1_000i64)
        } else if let Some(n) = digits.strip_suffix('m') {
            (n, 1_000_000)
        } else if let Some(n) = digits.strip_suffix('g') {
            (n, 1_000_000_000)
        } else {
            (digits, 1)
        };
        let num: i64 = num_str
            .parse()
            .with_context(|| format!("Invalid count format: {}", s))?;
        num.checked_mul(multiplier)
            .with_context(|| format!("Count out of range: {}", s))?
    };

    Ok(if negative { -value } else { value })
}

/// Parse a duration string (e.g., "60s", "5m", "1h") to seconds
pub fn parse_duration(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("sec") {
        (n, 1u64)
    } else if let Some(n) = s.strip_suffix("min") {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Duration too large: {}", s))
}

/// Build a configuration from CLI arguments alone
pub fn cli_to_config(cli: &Cli) -> Result<Config> {
    let limit_str = cli
        .limit
        .as_deref()
        .context("--limit is required without a config file")?;
    let limit = parse_count(limit_str).context("Invalid limit")?;

    let mut config = Config::with_limit(limit);
    apply_cli_overrides(cli, &mut config)?;
    Ok(config)
}

/// Copy every option the user actually set on the command line into `config`
pub(crate) fn apply_cli_overrides(cli: &Cli, config: &mut Config) -> Result<()> {
    if let Some(ref limit_str) = cli.limit {
        config.search.limit = parse_count(limit_str).context("Invalid limit")?;
    }
    if let Some(workers) = cli.workers {
        config.search.workers = Some(workers);
    }
    if let Some(scanner) = cli.scanner {
        config.search.scanner = scanner;
    }

    if let Some(kind) = cli.executor {
        config.executor.kind = kind;
    }
    if let Some(threads) = cli.threads {
        config.executor.threads = Some(threads);
    }

    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if let Some(show) = cli.show {
        config.output.show_primes = show;
    }
    config.output.count_only |= cli.count_only;
    config.output.per_worker |= cli.per_worker;

    if let Some(ref timeout) = cli.timeout {
        config.runtime.result_timeout_secs =
            parse_duration(timeout).context("Invalid timeout")?;
    }
    config.runtime.dry_run |= cli.dry_run;
    config.runtime.debug |= cli.debug;

    Ok(())
}
