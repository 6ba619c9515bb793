//! TOML configuration file parsing
//!
//! ```toml
//! [search]
//! limit = 10000000
//! workers = 16
//! scanner = "segmented-sieve"
//!
//! [executor]
//! kind = "rayon"
//! threads = 8
//!
//! [output]
//! json_output = "primes.json"
//! show_primes = 5
//! count_only = true
//!
//! [runtime]
//! result_timeout_secs = 120
//! ```

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert::apply_cli_overrides;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    apply_cli_overrides(cli, &mut config)?;
    Ok(config)
}

/// Load the configuration for this invocation
///
/// With `--config`, the file is the base and CLI flags override it;
/// otherwise the CLI alone describes the run.
pub fn load_config(cli: &Cli) -> Result<Config> {
    match cli.config {
        Some(ref path) => merge_cli_with_config(cli, parse_toml_file(path)?),
        None => super::cli_convert::cli_to_config(cli),
    }
}
