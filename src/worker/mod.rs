//! Local worker pool
//!
//! Executes the counting predicate over chunks with a fixed number of
//! concurrent execution units and returns one result per chunk, ordered by
//! chunk index regardless of completion order.
//!
//! # Backends
//!
//! - **Sequential**: every chunk counted in the calling thread
//! - **Threads**: scoped OS threads counting in-process
//! - **Processes**: each chunk counted by a child process of this executable
//! - **Hybrid**: child processes that split their chunk over their own threads
//!
//! All backends produce identical counts for identical input; only wall-clock
//! timing differs.
//!
//! # Scheduling
//!
//! Chunks are queued together with their exclusive result slot from a
//! [`ResultArena`]. Units pop `(chunk, slot)` pairs until the queue is empty,
//! so a slot is only ever written by the unit that popped it.
//!
//! # Fault policy
//!
//! Any unit failure (panic, child crash, malformed child output, empty slot)
//! fails the whole call. The pool never under-counts.
//!
//! # Example
//!
//! ```
//! use primeshard::config::Backend;
//! use primeshard::partition::partition;
//! use primeshard::worker::LocalWorkerPool;
//!
//! let pool = LocalWorkerPool::new(3, Backend::Threads).unwrap();
//! let chunks = partition(&[2, 3, 4, 5, 6, 7, 8, 9, 10], 3).unwrap();
//! let results = pool.process_all(chunks).unwrap();
//!
//! let counts: Vec<u64> = results.iter().map(|r| r.prime_count).collect();
//! assert_eq!(counts, vec![2, 2, 1]);
//! ```

pub mod predicate;
pub mod process;

use crate::config::{Backend, WorkerConfig};
use crate::error::WorkerError;
use crate::partition::Chunk;
use crate::stats::aggregator::ResultArena;
use crate::stats::WorkerResult;
use crossbeam::queue::SegQueue;
use process::ProcessExecutor;
use std::path::PathBuf;
use tracing::debug;

/// Something that can turn a chunk into a result
///
/// Implementations must be shareable across the pool's threads.
pub trait ChunkExecutor: Sync {
    /// Count one chunk
    fn execute(&self, chunk: &Chunk) -> Result<WorkerResult, WorkerError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Counts chunks in the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessExecutor;

impl ChunkExecutor for InProcessExecutor {
    fn execute(&self, chunk: &Chunk) -> Result<WorkerResult, WorkerError> {
        Ok(predicate::count_chunk(chunk))
    }

    fn name(&self) -> &'static str {
        "in-process"
    }
}

/// Fixed-size pool of execution units
#[derive(Debug, Clone)]
pub struct LocalWorkerPool {
    /// Concurrent execution units (threads or child processes)
    units: usize,

    backend: Backend,

    /// Threads inside each child process (hybrid backend only)
    threads_per_process: usize,

    /// Executable used for child processes (defaults to the current executable)
    program: Option<PathBuf>,
}

impl LocalWorkerPool {
    /// Create a pool with `units` execution units
    pub fn new(units: usize, backend: Backend) -> Result<Self, WorkerError> {
        if units == 0 {
            return Err(WorkerError::NoUnits);
        }
        Ok(Self {
            units,
            backend,
            threads_per_process: 1,
            program: None,
        })
    }

    /// Create a pool from the `[workers]` configuration section
    pub fn from_config(config: &WorkerConfig) -> Result<Self, WorkerError> {
        Ok(Self::new(config.count, config.backend)?
            .with_threads_per_process(config.threads_per_process))
    }

    pub fn with_threads_per_process(mut self, threads: usize) -> Self {
        self.threads_per_process = threads.max(1);
        self
    }

    /// Use `program` instead of the current executable for child processes
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn threads_per_process(&self) -> usize {
        self.threads_per_process
    }

    /// Count every chunk and return the results in chunk-index order
    pub fn process_all(&self, mut chunks: Vec<Chunk>) -> Result<Vec<WorkerResult>, WorkerError> {
        chunks.sort_by_key(|c| c.index());

        match self.backend {
            Backend::Sequential => run_sequential(&InProcessExecutor, chunks),
            Backend::Threads => run_pool(self.units, &InProcessExecutor, chunks),
            Backend::Processes => {
                let executor = self.process_executor(1)?;
                run_pool(self.units, &executor, chunks)
            }
            Backend::Hybrid => {
                let executor = self.process_executor(self.threads_per_process)?;
                run_pool(self.units, &executor, chunks)
            }
        }
    }

    fn process_executor(&self, threads: usize) -> Result<ProcessExecutor, WorkerError> {
        match &self.program {
            Some(program) => Ok(ProcessExecutor::new(program.clone(), threads)),
            None => ProcessExecutor::current_exe(threads),
        }
    }
}

/// Count chunks one after another in the calling thread
fn run_sequential<E: ChunkExecutor>(
    executor: &E,
    chunks: Vec<Chunk>,
) -> Result<Vec<WorkerResult>, WorkerError> {
    let mut arena = ResultArena::with_slots(chunks.len());
    for (chunk, slot) in chunks.iter().zip(arena.slots_mut()) {
        *slot = Some(executor.execute(chunk)?);
    }
    arena.into_complete()
}

/// Run `units` scoped threads over a shared queue of chunks
fn run_pool<E: ChunkExecutor>(
    units: usize,
    executor: &E,
    chunks: Vec<Chunk>,
) -> Result<Vec<WorkerResult>, WorkerError> {
    let units = units.min(chunks.len()).max(1);
    let mut arena = ResultArena::with_slots(chunks.len());

    debug!(
        units,
        chunks = chunks.len(),
        executor = executor.name(),
        "Starting worker pool"
    );

    let queue = SegQueue::new();
    for job in chunks.into_iter().zip(arena.slots_mut()) {
        queue.push(job);
    }

    let first_error = crossbeam::scope(|scope| {
        let handles: Vec<_> = (0..units)
            .map(|unit| {
                let queue = &queue;
                scope.spawn(move |_| -> Result<usize, WorkerError> {
                    let mut processed = 0;
                    while let Some((chunk, slot)) = queue.pop() {
                        *slot = Some(executor.execute(&chunk)?);
                        processed += 1;
                    }
                    debug!(unit, processed, "Execution unit finished");
                    Ok(processed)
                })
            })
            .collect();

        let mut first_error = None;
        for (unit, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(WorkerError::Panicked { unit });
                }
            }
        }
        first_error
    })
    .map_err(|_| WorkerError::PoolPanicked)?;

    drop(queue);

    if let Some(e) = first_error {
        return Err(e);
    }

    arena.into_complete()
}
