//! Coordinator module
//!
//! Orchestrates one round: partition the workload, dispatch the chunks to
//! local execution units or remote sessions, and aggregate the results.
//!
//! # Failure policy
//!
//! The two modes fail differently, and callers must handle both:
//!
//! - **Local** rounds are all-or-nothing. If any unit fails, the round
//!   returns [`CoordinatorError::Worker`] and no report is produced, so a
//!   count is never silently short.
//! - **Remote** rounds always produce a [`RoundReport`] once every session is
//!   terminal. Failed sessions are listed in `report.failures` and the
//!   aggregate covers only the successful ones. Use
//!   [`RoundReport::ensure_complete`] to turn a partial round into an error.

use crate::config::{Backend, Config, Mode};
use crate::distributed::coordinator::{dispatch, RemoteTarget};
use crate::error::{CoordinatorError, WorkerError};
use crate::partition::partition;
use crate::stats::aggregator::RoundAggregator;
use crate::stats::RoundReport;
use crate::worker::LocalWorkerPool;
use crate::workload::Workload;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Where a round's chunks go
#[derive(Debug)]
pub enum WorkerTargets {
    /// `units` local execution units with the configured backend
    Local { units: usize },
    /// Already-accepted connections, one chunk each
    Remote(Vec<RemoteTarget>),
}

/// Round coordinator
pub struct Coordinator {
    config: Config,

    /// Child executable for the process backends (defaults to the current executable)
    program: Option<PathBuf>,
}

impl Coordinator {
    pub fn new(config: Config) -> Self {
        Self { config, program: None }
    }

    /// Use `program` for child processes instead of the current executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Pool with `units` units and the configured backend
    pub fn local_pool(&self, units: usize) -> Result<LocalWorkerPool, WorkerError> {
        self.pool(units, self.config.workers.backend, self.config.workers.threads_per_process)
    }

    /// Pool with an explicit backend and thread count
    pub fn pool(&self, units: usize, backend: Backend, threads_per_process: usize) -> Result<LocalWorkerPool, WorkerError> {
        let pool = LocalWorkerPool::new(units, backend)?.with_threads_per_process(threads_per_process);
        Ok(match &self.program {
            Some(program) => pool.with_program(program.clone()),
            None => pool,
        })
    }

    /// Run one round with the chunks going where `targets` says
    pub async fn run(&self, workload: &Workload, targets: WorkerTargets) -> Result<RoundReport, CoordinatorError> {
        match targets {
            WorkerTargets::Local { units } => {
                let pool = self.local_pool(units)?;
                let workload = workload.clone();
                tokio::task::spawn_blocking(move || run_local_round(&workload, &pool))
                    .await
                    .map_err(|e| CoordinatorError::Join(e.to_string()))?
            }
            WorkerTargets::Remote(targets) => self.run_remote(workload, targets).await,
        }
    }

    /// Local round with `workers.count` units (blocking)
    pub fn run_local(&self, workload: &Workload) -> Result<RoundReport, CoordinatorError> {
        let pool = self.local_pool(self.config.workers.count)?;
        run_local_round(workload, &pool)
    }

    /// Local round on an explicit pool (blocking)
    pub fn run_local_with(&self, workload: &Workload, pool: &LocalWorkerPool) -> Result<RoundReport, CoordinatorError> {
        run_local_round(workload, pool)
    }

    /// Remote round: chunk `i` goes to target `i`
    ///
    /// Returns once every session has finished, successfully or not.
    pub async fn run_remote(&self, workload: &Workload, targets: Vec<RemoteTarget>) -> Result<RoundReport, CoordinatorError> {
        if targets.is_empty() {
            return Err(CoordinatorError::NoTargets);
        }

        let start = Instant::now();
        let chunks = partition(workload.as_slice(), targets.len())?;
        let expected = chunks.len();

        info!(
            "Dispatching {} numbers to {} remote workers",
            workload.len(),
            expected
        );

        let outcomes = dispatch(targets, chunks, self.config.network.framing()).await;

        let mut aggregator = RoundAggregator::new(Mode::Remote, expected);
        for outcome in outcomes {
            match outcome {
                Ok(result) => aggregator.add_result(result),
                Err(failure) => aggregator.add_failure(failure),
            }
        }

        let report = aggregator.into_report(start.elapsed(), workload.len());
        info!(
            "Remote round finished: {} of {} workers succeeded",
            report.aggregate.succeeded, report.aggregate.expected
        );
        Ok(report)
    }
}

/// Partition over the pool's units, count, and aggregate
fn run_local_round(workload: &Workload, pool: &LocalWorkerPool) -> Result<RoundReport, CoordinatorError> {
    let start = Instant::now();
    let chunks = partition(workload.as_slice(), pool.units())?;
    let expected = chunks.len();

    info!(
        "Counting {} numbers with {} {} units",
        workload.len(),
        pool.units(),
        pool.backend()
    );

    let results = pool.process_all(chunks)?;

    let mut aggregator = RoundAggregator::new(Mode::Local, expected);
    for result in results {
        aggregator.add_result(result);
    }
    Ok(aggregator.into_report(start.elapsed(), workload.len()))
}
