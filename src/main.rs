//! primeshard CLI entry point

use anyhow::{Context, Result};
use primeshard::bench::BenchmarkHarness;
use primeshard::config::cli::{Cli, ExecutionMode};
use primeshard::config::toml::build_config;
use primeshard::config::validator::validate_config;
use primeshard::config::Config;
use primeshard::coordinator::Coordinator;
use primeshard::distributed::{NodeService, RemoteCoordinator};
use primeshard::output::{json, text};
use primeshard::stats::RoundReport;
use primeshard::util::time::{format_number, format_seconds};
use primeshard::worker::process::run_chunk_worker;
use primeshard::workload::Workload;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    setup_logging(cli.debug);
    cli.validate()?;

    // Stdout of a chunk worker carries only its result
    if cli.mode != ExecutionMode::ChunkWorker {
        println!("primeshard v{}", env!("CARGO_PKG_VERSION"));
        println!("Distributed prime counting");
        println!();
    }

    match cli.mode {
        ExecutionMode::ChunkWorker => {
            run_chunk_worker(std::io::stdin().lock(), std::io::stdout().lock(), cli.threads)
        }
        ExecutionMode::Local => run_local(&cli),
        ExecutionMode::Coordinator => run_coordinator(&cli),
        ExecutionMode::Worker => run_worker(&cli),
        ExecutionMode::Benchmark => run_benchmark(&cli),
    }
}

/// Log to stderr; stdout is reserved for reports and chunk-worker results
fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("primeshard=debug,warn")
    } else {
        EnvFilter::new("primeshard=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Build and validate the configuration for a mode
fn load_config(cli: &Cli, needs_input: bool) -> Result<Config> {
    let config = build_config(cli)?;
    validate_config(&config, needs_input).context("Configuration validation failed")?;
    Ok(config)
}

/// Run one round on this machine
fn run_local(cli: &Cli) -> Result<()> {
    let config = load_config(cli, true)?;
    print!("{}", config);
    println!();

    let workload = Workload::from_config(&config.input)?;
    let coordinator = Coordinator::new(config);
    let report = coordinator.run_local(&workload)?;

    finish_round(coordinator.config(), &report)
}

/// Accept remote workers, then run one round across them
fn run_coordinator(cli: &Cli) -> Result<()> {
    let config = load_config(cli, true)?;
    print!("{}", config);
    println!();

    let workload = Workload::from_config(&config.input)?;
    let expected = config.workers.count;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let coordinator = Coordinator::new(config);
    let report = runtime.block_on(async {
        let listener = RemoteCoordinator::bind(&coordinator.config().network).await?;
        println!("Waiting for {} workers on {}...", expected, listener.local_addr()?);
        println!();

        let targets = listener.accept_targets(expected).await?;
        coordinator
            .run_remote(&workload, targets)
            .await
            .context("Remote round failed")
    })?;

    finish_round(coordinator.config(), &report)?;

    // Failed sessions are already printed; still exit non-zero
    report.ensure_complete()?;
    Ok(())
}

/// Serve one chunk for a coordinator
fn run_worker(cli: &Cli) -> Result<()> {
    let config = load_config(cli, false)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let report = runtime.block_on(async {
        let service = NodeService::new(&config).context("Failed to create node service")?;
        service.run().await
    })?;

    println!(
        "Node {} found {} primes among {} numbers in {} seconds",
        report.node_id,
        format_number(report.prime_count),
        format_number(report.values as u64),
        format_seconds(report.elapsed)
    );
    Ok(())
}

/// Sweep local rounds and report the fastest configuration
fn run_benchmark(cli: &Cli) -> Result<()> {
    let config = load_config(cli, true)?;
    print!("{}", config);
    println!();

    let workload = Workload::from_config(&config.input)?;
    let coordinator = Coordinator::new(config);
    let harness = BenchmarkHarness::new(&coordinator);

    let report = match cli.max_threads {
        Some(max_threads) => harness.sweep_hybrid(&workload, cli.max_workers, max_threads)?,
        None => harness.sweep(&workload, cli.max_workers)?,
    };

    println!();
    text::print_benchmark_report(&report);

    if let Some(ref path) = coordinator.config().output.json {
        json::write_json_output(path, &json::build_benchmark_output(&report))?;
        println!();
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}

/// Print a round report and write JSON if configured
fn finish_round(config: &Config, report: &RoundReport) -> Result<()> {
    text::print_round_report(report, config.output.per_worker);

    if let Some(ref path) = config.output.json {
        json::write_json_output(path, &json::build_round_output(report, config.output.per_worker))?;
        println!();
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}
