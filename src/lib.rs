//! primeshard - distributed prime counting
//!
//! Splits a list of integers into contiguous chunks, counts the primes in
//! each chunk on a worker, and aggregates the per-worker counts and timings.
//!
//! # Architecture
//!
//! - **Partitioning**: `N` values into `W` contiguous chunks, remainder to the last
//! - **Local pool**: threads, child processes, or processes with inner threads
//! - **Remote sessions**: a five-step TCP exchange per worker node
//! - **Coordinator**: one round, local or remote, with a partial-failure report
//! - **Benchmark**: sweeps over unit counts and process x thread grids

pub mod bench;
pub mod config;
pub mod coordinator;
pub mod distributed;
pub mod error;
pub mod output;
pub mod partition;
pub mod stats;
pub mod util;
pub mod worker;
pub mod workload;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::Coordinator;
pub use workload::Workload;

/// Result type used throughout primeshard
pub type Result<T> = anyhow::Result<T>;
