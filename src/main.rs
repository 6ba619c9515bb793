//! primegather CLI entry point

use anyhow::{Context, Result};
use primegather::config::cli::{Cli, ExecutionMode};
use primegather::config::{toml::load_config, validator::validate_config, Config};
use primegather::coordinator::{LocalCoordinator, RunReport};
use primegather::distributed::{DistributedCoordinator, NodeService};
use primegather::executor::create_executor;
use primegather::output::{build_json_report, print_results, write_json_output};
use primegather::scanner::create_scanner;
use primegather::util::time::format_number;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    cli.validate()?;

    // Service mode has no search config; everything else is loaded first so
    // `runtime.debug` from a config file can raise the log level
    if cli.mode == ExecutionMode::Service {
        init_logging(cli.debug);
        return run_service(&cli);
    }

    let config = load_config(&cli)?;
    init_logging(config.runtime.debug);

    match cli.mode {
        ExecutionMode::Coordinator => run_coordinator(&cli, config),
        _ => run_standalone(config),
    }
}

/// Structured logging: LOG_FORMAT=json for log collectors, human-readable stderr otherwise
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

/// Validate and display the configuration
///
/// Returns `None` for a dry run.
fn prepare_config(config: Config) -> Result<Option<Config>> {
    validate_config(&config).context("Configuration validation failed")?;

    print_configuration(&config)?;

    if config.runtime.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(None);
    }

    println!();
    Ok(Some(config))
}

/// Run in standalone mode (single machine)
fn run_standalone(config: Config) -> Result<()> {
    let Some(config) = prepare_config(config)? else {
        return Ok(());
    };

    let bounds = config.bounds()?;
    let scanner = create_scanner(config.search.scanner);
    let executor = create_executor(&config.executor, scanner)?;

    let report = LocalCoordinator::new(executor).run(bounds)?;

    finish(&report, &config, "standalone")
}

/// Run in service mode (scan ranges for a coordinator)
fn run_service(cli: &Cli) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let service = NodeService::new(cli.listen_port)
            .context("Failed to create node service")?;

        service.run().await
    })
}

/// Run in coordinator mode (spread ranges over node services)
fn run_coordinator(cli: &Cli, config: Config) -> Result<()> {
    let node_addresses = cli.node_addresses()?;

    let Some(config) = prepare_config(config)? else {
        return Ok(());
    };
    println!("Nodes: {}", node_addresses.join(", "));
    println!();

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let config = Arc::new(config);
    let report = runtime.block_on(async {
        let coordinator = DistributedCoordinator::new(config.clone(), node_addresses)
            .context("Failed to create coordinator")?;

        coordinator.run().await
    })?;

    finish(&report, &config, "coordinator")
}

fn finish(report: &RunReport, config: &Config, mode: &str) -> Result<()> {
    print_results(report, config);

    if let Some(ref path) = config.output.json_output {
        let json = build_json_report(report, config, mode);
        write_json_output(path, &json, true)?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}

fn print_configuration(config: &Config) -> Result<()> {
    let bounds = config.bounds()?;

    println!("primegather v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Configuration:");
    println!("  Search:");
    println!("    Limit: {}", format_number(bounds.limit));
    println!("    Workers: {}", bounds.workers);
    println!("    Scanner: {}", config.search.scanner.as_str());
    println!("  Executor:");
    println!("    Kind: {}", config.executor.kind.as_str());
    if let Some(threads) = config.executor.threads {
        println!("    Threads: {}", threads);
    }
    if config.runtime.result_timeout_secs > 0 {
        println!("  Result timeout: {}s", config.runtime.result_timeout_secs);
    }

    if config.runtime.dry_run {
        println!("  Partition:");
        for task in bounds.tasks()? {
            println!("    Worker {}: {}", task.worker_id, task.range);
        }
    }

    Ok(())
}
