//! CLI argument parsing using clap

use crate::executor::ExecutorKind;
use crate::scanner::ScannerKind;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Standalone mode (default) - search with local workers
    Standalone,
    /// Coordinator mode - assign ranges to node services and gather
    Coordinator,
    /// Service mode - scan ranges assigned by a coordinator
    Service,
}

/// primegather - partitioned parallel prime search
#[derive(Parser, Debug)]
#[command(name = "primegather")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: standalone, coordinator, or service
    #[arg(long, value_enum, default_value = "standalone")]
    pub mode: ExecutionMode,

    /// Port for service to listen on (service mode only)
    #[arg(long, default_value = "9999")]
    pub listen_port: u16,

    /// Comma-separated node addresses for coordinator mode
    /// (e.g., "10.0.1.10:9999,10.0.1.11:9999")
    #[arg(long)]
    pub host_list: Option<String>,

    /// File containing list of node addresses (one per line, for coordinator mode)
    #[arg(long)]
    pub clients_file: Option<PathBuf>,

    /// Port to connect to on worker nodes (coordinator mode only)
    #[arg(long, default_value = "9999")]
    pub worker_port: u16,

    // === Search Options ===
    /// Exclusive upper bound N (e.g., 1000000, 10M, 1e6)
    ///
    /// Not required in service mode (coordinator sends the ranges)
    #[arg(short = 'n', long, allow_hyphen_values = true)]
    pub limit: Option<String>,

    /// Number of workers W (defaults to the number of logical CPUs)
    #[arg(short = 'w', long, allow_hyphen_values = true)]
    pub workers: Option<i64>,

    /// Scanner used by each worker
    #[arg(long, value_enum)]
    pub scanner: Option<ScannerKind>,

    /// Where local workers run
    #[arg(long, value_enum)]
    pub executor: Option<ExecutorKind>,

    /// Thread pool size for the rayon executor and on service nodes
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    // === Output Options ===
    /// Write a JSON report to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Number of primes to print from each end of the list (0 to disable)
    #[arg(long)]
    pub show: Option<usize>,

    /// Only report the count (JSON report omits the prime list)
    #[arg(long)]
    pub count_only: bool,

    /// Print per-worker ranges, counts and timings
    #[arg(long)]
    pub per_worker: bool,

    // === Runtime Options ===
    /// Give up waiting for node results after this long (e.g., 30s, 5m; coordinator mode)
    #[arg(long)]
    pub timeout: Option<String>,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration and show the partition without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    ///
    /// Only checks what can be checked before a config file is merged in;
    /// the search bounds themselves are validated on the merged config.
    pub fn validate(&self) -> anyhow::Result<()> {
        // Service mode doesn't need validation (coordinator sends the work)
        if self.mode == ExecutionMode::Service {
            return Ok(());
        }

        if self.limit.is_none() && self.config.is_none() {
            anyhow::bail!("must specify --limit or --config");
        }

        if self.threads == Some(0) {
            anyhow::bail!("threads must be at least 1");
        }

        let has_nodes = self.host_list.is_some() || self.clients_file.is_some();
        if self.mode == ExecutionMode::Coordinator && !has_nodes {
            anyhow::bail!("Coordinator mode requires --host-list or --clients-file");
        }

        Ok(())
    }

    /// Node addresses for coordinator mode, from `--host-list` or `--clients-file`
    ///
    /// Addresses without a port get `--worker-port` appended. Blank lines and
    /// `#` comments in the clients file are skipped.
    pub fn node_addresses(&self) -> anyhow::Result<Vec<String>> {
        let with_port = |addr: &str| {
            if addr.contains(':') {
                addr.to_string()
            } else {
                format!("{}:{}", addr, self.worker_port)
            }
        };

        let addresses: Vec<String> = if let Some(ref host_list) = self.host_list {
            host_list
                .split(',')
                .map(str::trim)
                .filter(|addr| !addr.is_empty())
                .map(with_port)
                .collect()
        } else if let Some(ref clients_file) = self.clients_file {
            let content = std::fs::read_to_string(clients_file).with_context(|| {
                format!("Failed to read clients file: {}", clients_file.display())
            })?;

            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(with_port)
                .collect()
        } else {
            anyhow::bail!("Coordinator mode requires --host-list or --clients-file");
        };

        if addresses.is_empty() {
            anyhow::bail!("No node addresses given");
        }
        Ok(addresses)
    }
}
