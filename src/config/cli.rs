//! CLI argument parsing using clap

use crate::config::Backend;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Local mode (default) - count on this machine with threads or processes
    Local,
    /// Coordinator mode - accept remote workers and run one round
    Coordinator,
    /// Worker mode - connect to a coordinator and count one chunk
    Worker,
    /// Benchmark mode - sweep local worker counts
    Benchmark,
    /// Child process unit used by the process backends
    #[value(hide = true)]
    ChunkWorker,
}

/// primeshard - distributed prime counting
#[derive(Parser, Debug)]
#[command(name = "primeshard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: local, coordinator, worker, or benchmark
    #[arg(long, value_enum, default_value = "local")]
    pub mode: ExecutionMode,

    /// TOML configuration file (command-line flags take precedence)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Delimited text file of integers
    ///
    /// Not used in worker mode (the coordinator sends the chunk)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    // === Workload Options ===
    /// Generate this many pseudo-random integers instead of reading INPUT
    #[arg(long, value_name = "COUNT")]
    pub generate: Option<usize>,

    /// Upper bound (exclusive) of generated integers
    #[arg(long)]
    pub max_value: Option<i64>,

    /// Seed for generated integers
    #[arg(long)]
    pub seed: Option<u64>,

    // === Network Options ===
    /// Coordinator address to bind (coordinator) or connect to (worker)
    #[arg(long)]
    pub host: Option<String>,

    /// Coordinator port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bytes per payload read (e.g., 64k)
    #[arg(long)]
    pub buffer_size: Option<String>,

    /// I/O timeout per protocol step (e.g., 30s, 5m; 0 disables)
    #[arg(long)]
    pub timeout: Option<String>,

    /// How long the coordinator waits for each worker to connect (e.g., 60s)
    #[arg(long)]
    pub accept_timeout: Option<String>,

    /// Largest payload a worker accepts (e.g., 256M)
    #[arg(long)]
    pub max_payload: Option<String>,

    // === Worker Options ===
    /// Local execution units, or remote workers to accept
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Local execution backend
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Threads inside each child process (hybrid backend)
    #[arg(long)]
    pub threads_per_process: Option<usize>,

    /// Units a worker node uses for its chunk (default: CPU count)
    #[arg(long)]
    pub node_units: Option<usize>,

    /// Threads used by a chunk-worker child
    #[arg(long, default_value = "1", hide = true)]
    pub threads: usize,

    // === Benchmark Options ===
    /// Largest worker count in the sweep
    #[arg(long, default_value = "12")]
    pub max_workers: usize,

    /// Sweep processes x threads (hybrid backend) up to this many threads per process
    #[arg(long)]
    pub max_threads: Option<usize>,

    // === Output Options ===
    /// Write a JSON report to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Hide per-worker lines in the text report
    #[arg(long)]
    pub no_per_worker: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        // Worker and chunk-worker modes get their data over the wire
        if matches!(self.mode, ExecutionMode::Worker | ExecutionMode::ChunkWorker) {
            if self.threads == 0 {
                anyhow::bail!("threads must be at least 1");
            }
            return Ok(());
        }

        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }

        if self.threads_per_process == Some(0) {
            anyhow::bail!("threads_per_process must be at least 1");
        }

        if self.input.is_some() && self.generate.is_some() {
            anyhow::bail!("can only specify one of: INPUT or --generate");
        }

        if let Some(max_value) = self.max_value {
            if max_value <= 0 {
                anyhow::bail!("max_value must be positive");
            }
        }

        if self.mode == ExecutionMode::Benchmark {
            if self.max_workers == 0 {
                anyhow::bail!("max_workers must be at least 1");
            }
            if self.max_threads == Some(0) {
                anyhow::bail!("max_threads must be at least 1");
            }
        }

        Ok(())
    }
}
