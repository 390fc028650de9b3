//! Benchmark harness
//!
//! Runs the same workload through local rounds of increasing size and
//! records the wall time of each. Two sweeps:
//!
//! - `sweep`: 1..=N units with the configured backend
//! - `sweep_hybrid`: every processes x threads combination up to a grid size
//!
//! Every round must count the same total; a mismatch aborts the sweep.

use crate::config::Backend;
use crate::coordinator::Coordinator;
use crate::error::BenchmarkError;
use crate::workload::Workload;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// One measured configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchEntry {
    /// Execution units (threads or processes)
    pub units: usize,

    /// Threads inside each unit (1 unless hybrid)
    pub threads_per_unit: usize,

    /// Wall time of the whole round
    pub wall_time: Duration,

    pub total_primes: u64,
}

impl BenchEntry {
    pub fn total_workers(&self) -> usize {
        self.units * self.threads_per_unit
    }
}

/// Result of a sweep
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub backend: Backend,
    pub workload_len: usize,
    pub entries: Vec<BenchEntry>,
}

impl BenchmarkReport {
    /// Entry with the lowest wall time
    pub fn optimal(&self) -> Option<&BenchEntry> {
        self.entries.iter().min_by_key(|e| e.wall_time)
    }

    /// Speedup of each entry relative to the first
    pub fn speedups(&self) -> Vec<f64> {
        let Some(baseline) = self.entries.first() else {
            return Vec::new();
        };
        let base = baseline.wall_time.as_secs_f64();

        self.entries
            .iter()
            .map(|e| base / e.wall_time.as_secs_f64().max(1e-9))
            .collect()
    }

    /// Total every entry agreed on
    pub fn total_primes(&self) -> Option<u64> {
        self.entries.first().map(|e| e.total_primes)
    }
}

/// Runs sweeps of local rounds through a coordinator
pub struct BenchmarkHarness<'a> {
    coordinator: &'a Coordinator,
}

impl<'a> BenchmarkHarness<'a> {
    pub fn new(coordinator: &'a Coordinator) -> Self {
        Self { coordinator }
    }

    /// One round per unit count in `1..=max_units`, configured backend
    pub fn sweep(&self, workload: &Workload, max_units: usize) -> Result<BenchmarkReport, BenchmarkError> {
        let workers = &self.coordinator.config().workers;
        let backend = workers.backend;
        let threads = match backend {
            Backend::Hybrid => workers.threads_per_process,
            _ => 1,
        };

        let configs: Vec<(usize, usize)> = (1..=max_units).map(|units| (units, threads)).collect();
        self.run(workload, backend, &configs)
    }

    /// One hybrid round per `processes x threads` in `[1, max_processes] x [1, max_threads]`
    pub fn sweep_hybrid(
        &self,
        workload: &Workload,
        max_processes: usize,
        max_threads: usize,
    ) -> Result<BenchmarkReport, BenchmarkError> {
        let configs: Vec<(usize, usize)> = (1..=max_processes)
            .flat_map(|p| (1..=max_threads).map(move |t| (p, t)))
            .collect();
        self.run(workload, Backend::Hybrid, &configs)
    }

    fn run(
        &self,
        workload: &Workload,
        backend: Backend,
        configs: &[(usize, usize)],
    ) -> Result<BenchmarkReport, BenchmarkError> {
        if configs.is_empty() {
            return Err(BenchmarkError::Empty);
        }

        let mut entries: Vec<BenchEntry> = Vec::with_capacity(configs.len());
        for &(units, threads) in configs {
            info!("Testing with {} {} units x {} threads", units, backend, threads);

            let pool = self
                .coordinator
                .pool(units, backend, threads)
                .map_err(|e| BenchmarkError::Round(e.into()))?;
            let report = self.coordinator.run_local_with(workload, &pool)?;

            let entry = BenchEntry {
                units,
                threads_per_unit: threads,
                wall_time: report.wall_time,
                total_primes: report.aggregate.total_primes,
            };

            if let Some(first) = entries.first() {
                ensure_consistent(first, &entry)?;
            }

            info!(
                "Found {} primes in {:.4} seconds",
                entry.total_primes,
                entry.wall_time.as_secs_f64()
            );
            entries.push(entry);
        }

        Ok(BenchmarkReport {
            backend,
            workload_len: workload.len(),
            entries,
        })
    }
}

/// Every configuration must count the same total as the first one
fn ensure_consistent(first: &BenchEntry, entry: &BenchEntry) -> Result<(), BenchmarkError> {
    if first.total_primes != entry.total_primes {
        return Err(BenchmarkError::Inconsistent {
            units: entry.units,
            threads: entry.threads_per_unit,
            expected: first.total_primes,
            found: entry.total_primes,
        });
    }
    Ok(())
}
