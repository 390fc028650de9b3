//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Every tunable of a round (network endpoint, framing limits, worker counts,
//! input location) lives in [`Config`] and is passed in explicitly.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::distributed::protocol::Framing;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where chunks are counted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Threads or child processes on this machine
    #[default]
    Local,
    /// Worker nodes connected over TCP
    Remote,
}

/// Network configuration (remote mode)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address the coordinator binds and workers connect to
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bytes requested per payload read
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Timeout for every blocking protocol read or write (0 disables)
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// How long the coordinator waits for each worker to connect (unset waits forever)
    #[serde(default)]
    pub accept_timeout_secs: Option<u64>,
    /// Largest payload a worker accepts
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    65432
}

fn default_buffer_size() -> usize {
    65536
}

fn default_io_timeout_secs() -> u64 {
    300
}

fn default_max_payload_bytes() -> usize {
    1 << 30
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            buffer_size: default_buffer_size(),
            io_timeout_secs: default_io_timeout_secs(),
            accept_timeout_secs: None,
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

impl NetworkConfig {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        match self.io_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn accept_timeout(&self) -> Option<Duration> {
        self.accept_timeout_secs.map(Duration::from_secs)
    }

    /// Framing limits for sessions and node services
    pub fn framing(&self) -> Framing {
        Framing {
            buffer_size: self.buffer_size,
            timeout: self.io_timeout(),
            max_payload_bytes: self.max_payload_bytes,
        }
    }
}

/// Local execution backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Everything in the calling thread
    Sequential,
    /// Scoped OS threads
    #[default]
    Threads,
    /// One child process per chunk
    Processes,
    /// Child processes, each splitting its chunk over its own threads
    Hybrid,
}

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Local execution units, or remote workers to wait for
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub backend: Backend,
    /// Threads inside each child process (hybrid backend only)
    #[serde(default = "default_threads_per_process")]
    pub threads_per_process: usize,
    /// Units a worker node uses for its own chunk (defaults to the CPU count)
    #[serde(default)]
    pub node_units: Option<usize>,
}

fn default_count() -> usize {
    3
}

fn default_threads_per_process() -> usize {
    2
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            backend: Backend::default(),
            threads_per_process: default_threads_per_process(),
            node_units: None,
        }
    }
}

impl WorkerConfig {
    pub fn node_units(&self) -> usize {
        self.node_units.unwrap_or_else(num_cpus::get)
    }
}

/// Input configuration
///
/// The location is always given explicitly; no default locations are searched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Delimited text file of integers
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Generate the workload instead of reading it
    #[serde(default)]
    pub synthetic: Option<SyntheticConfig>,
}

impl InputConfig {
    pub fn is_set(&self) -> bool {
        self.path.is_some() || self.synthetic.is_some()
    }
}

/// Seeded pseudo-random workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub count: usize,
    #[serde(default = "default_max_value")]
    pub max_value: i64,
    #[serde(default)]
    pub seed: u64,
}

fn default_max_value() -> i64 {
    1_000_000
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON report path
    #[serde(default)]
    pub json: Option<PathBuf>,
    /// Print one line per worker
    #[serde(default = "default_per_worker")]
    pub per_worker: bool,
}

fn default_per_worker() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: None,
            per_worker: default_per_worker(),
        }
    }
}

// Display trait implementations

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Mode: {}", self.mode)?;
        writeln!(f, "  Network: {}", self.network)?;
        writeln!(f, "  Workers: {}", self.workers)?;
        writeln!(f, "  Input: {}", self.input)?;
        Ok(())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Local => write!(f, "local"),
            Mode::Remote => write!(f, "remote"),
        }
    }
}

impl fmt::Display for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, buffer={}", self.address(), self.buffer_size)?;
        match self.io_timeout() {
            Some(timeout) => write!(f, ", timeout={}s", timeout.as_secs()),
            None => write!(f, ", no timeout"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Sequential => write!(f, "sequential"),
            Backend::Threads => write!(f, "threads"),
            Backend::Processes => write!(f, "processes"),
            Backend::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.count, self.backend)?;
        if self.backend == Backend::Hybrid {
            write!(f, ", {} threads/process", self.threads_per_process)?;
        }
        Ok(())
    }
}

impl fmt::Display for InputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, &self.synthetic) {
            (Some(path), _) => write!(f, "{}", path.display()),
            (None, Some(s)) => write!(f, "synthetic({} values < {}, seed={})", s.count, s.max_value, s.seed),
            (None, None) => write!(f, "none"),
        }
    }
}
