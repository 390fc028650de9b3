//! Child-process execution unit
//!
//! The process and hybrid backends count each chunk in a child process of
//! this same executable, started in the hidden `chunk-worker` mode. The
//! child speaks the wire formats over its standard streams:
//!
//! - stdin: the chunk as a comma-separated payload, closed after writing
//! - stdout: `<count>,<seconds>` once counting is done
//! - stderr: inherited, so child diagnostics reach the terminal
//!
//! A child that exits unsuccessfully or prints anything else fails the unit.

use super::{ChunkExecutor, LocalWorkerPool};
use crate::config::Backend;
use crate::distributed::protocol::{decode_payload, decode_result, encode_payload, encode_result};
use crate::error::WorkerError;
use crate::partition::{partition, Chunk};
use crate::stats::WorkerResult;
use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::debug;

/// Runs one child process per chunk
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: PathBuf,
    threads: usize,
}

impl ProcessExecutor {
    /// Use `program` as the child executable, each child counting with `threads` threads
    pub fn new(program: PathBuf, threads: usize) -> Self {
        Self {
            program,
            threads: threads.max(1),
        }
    }

    /// Use the currently running executable as the child
    pub fn current_exe(threads: usize) -> Result<Self, WorkerError> {
        let program = std::env::current_exe().map_err(|source| WorkerError::Spawn { chunk: 0, source })?;
        Ok(Self::new(program, threads))
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl ChunkExecutor for ProcessExecutor {
    fn execute(&self, chunk: &Chunk) -> Result<WorkerResult, WorkerError> {
        let index = chunk.index();

        let mut child = Command::new(&self.program)
            .arg("--mode")
            .arg("chunk-worker")
            .arg("--threads")
            .arg(self.threads.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| WorkerError::Spawn { chunk: index, source })?;

        debug!(chunk = index, pid = child.id(), threads = self.threads, "Spawned chunk worker");

        // Dropping stdin after the write closes the pipe so the child sees EOF
        if let Some(mut stdin) = child.stdin.take() {
            let payload = encode_payload(chunk.values());
            stdin
                .write_all(payload.as_bytes())
                .map_err(|source| WorkerError::ChildIo { chunk: index, source })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|source| WorkerError::ChildIo { chunk: index, source })?;

        if !output.status.success() {
            return Err(WorkerError::ExitStatus {
                chunk: index,
                status: output.status.to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let (prime_count, elapsed) = decode_result(&text).map_err(|e| WorkerError::BadOutput {
            chunk: index,
            reason: e.to_string(),
        })?;

        if prime_count > chunk.len() as u64 {
            return Err(WorkerError::BadOutput {
                chunk: index,
                reason: format!("{} primes reported for {} values", prime_count, chunk.len()),
            });
        }

        Ok(WorkerResult::new(index, prime_count, elapsed))
    }

    fn name(&self) -> &'static str {
        if self.threads > 1 {
            "hybrid"
        } else {
            "process"
        }
    }
}

/// Body of the hidden `chunk-worker` mode
///
/// Reads one payload from `input`, counts it with `threads` threads and
/// writes the result message to `output`.
pub fn run_chunk_worker<R: Read, W: Write>(mut input: R, mut output: W, threads: usize) -> Result<()> {
    let mut payload = String::new();
    input
        .read_to_string(&mut payload)
        .context("Failed to read chunk from stdin")?;
    let values = decode_payload(&payload).context("Failed to decode chunk")?;

    let start = Instant::now();
    let pool = LocalWorkerPool::new(threads.max(1), Backend::Threads)?;
    let results = pool.process_all(partition(&values, pool.units())?)?;
    let prime_count: u64 = results.iter().map(|r| r.prime_count).sum();
    let elapsed = start.elapsed();

    output
        .write_all(encode_result(prime_count, elapsed).as_bytes())
        .context("Failed to write result")?;
    output.flush().context("Failed to flush result")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(input: &str, threads: usize) -> Result<(u64, std::time::Duration)> {
        let mut output = Vec::new();
        run_chunk_worker(Cursor::new(input.as_bytes()), &mut output, threads)?;
        Ok(decode_result(std::str::from_utf8(&output)?)?)
    }

    #[test]
    fn test_chunk_worker_counts() {
        let (count, _) = run("2,3,4,5,6,7,8,9,10", 1).unwrap();
        assert_eq!(count, 4);

        let (count, _) = run("2,3,4,5,6,7,8,9,10", 4).unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_chunk_worker_empty_input() {
        let (count, _) = run("", 2).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_chunk_worker_rejects_garbage() {
        let err = run("1,x,3", 1).unwrap_err();
        assert!(err.to_string().contains("decode chunk"));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let executor = ProcessExecutor::new(PathBuf::from("/nonexistent/primeshard"), 1);
        let result = executor.execute(&Chunk::new(3, vec![2, 3]));
        assert!(matches!(result, Err(WorkerError::Spawn { chunk: 3, .. })));
    }

    #[test]
    fn test_executor_name() {
        assert_eq!(ProcessExecutor::new(PathBuf::from("x"), 1).name(), "process");
        assert_eq!(ProcessExecutor::new(PathBuf::from("x"), 4).name(), "hybrid");
        assert_eq!(ProcessExecutor::new(PathBuf::from("x"), 0).threads(), 1);
    }
}
