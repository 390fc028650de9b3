//! Error types for primeshard
//!
//! The hierarchy mirrors the two failure policies of a round:
//! - Local execution failures (`WorkerError`) are fatal to the whole round
//! - Remote session failures (`SessionError`) are isolated to one session and
//!   split into transport and protocol families for diagnostics
//!
//! Application glue (CLI, config files, report writing) uses `anyhow` on top
//! of these types.

use crate::distributed::protocol::Step;
use std::time::Duration;
use thiserror::Error;

/// Invalid partitioning request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    /// Asked for zero chunks
    #[error("part count must be greater than zero")]
    ZeroParts,
}

/// Local execution unit failure (round-fatal)
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Pool was configured without any execution units
    #[error("worker pool needs at least one execution unit")]
    NoUnits,

    /// An execution thread panicked
    #[error("execution unit {unit} panicked")]
    Panicked { unit: usize },

    /// The scoped thread pool itself failed to join
    #[error("worker pool scope panicked")]
    PoolPanicked,

    /// Child process could not be started
    #[error("failed to spawn child process for chunk {chunk}: {source}")]
    Spawn {
        chunk: usize,
        #[source]
        source: std::io::Error,
    },

    /// Pipe I/O with a child process failed
    #[error("I/O error with child process for chunk {chunk}: {source}")]
    ChildIo {
        chunk: usize,
        #[source]
        source: std::io::Error,
    },

    /// Child process terminated abnormally
    #[error("child process for chunk {chunk} exited with {status}")]
    ExitStatus { chunk: usize, status: String },

    /// Child process answered with something other than a result message
    #[error("child process for chunk {chunk} returned malformed output: {reason}")]
    BadOutput { chunk: usize, reason: String },

    /// A result slot was never written
    #[error("no result produced for chunk {chunk}")]
    MissingResult { chunk: usize },

    #[error(transparent)]
    Partition(#[from] PartitionError),
}

/// Connection-level failure of a remote session
#[derive(Error, Debug)]
pub enum TransportError {
    /// Socket read/write failed
    #[error("I/O error on {step}: {source}")]
    Io {
        step: Step,
        #[source]
        source: std::io::Error,
    },

    /// Peer closed the stream before the step completed
    #[error("peer closed the connection during {step}")]
    Closed { step: Step },

    /// Stream ended before the declared payload size was received
    #[error("stream closed after {received} of {expected} payload bytes")]
    ShortRead { expected: usize, received: usize },

    /// No progress within the configured read timeout
    #[error("timed out after {after:?} during {step}")]
    Timeout { step: Step, after: Duration },
}

/// Message-level failure of a remote session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed size header {0:?}")]
    BadSizeHeader(String),

    #[error("declared payload of {size} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("non-numeric payload token {token:?}")]
    BadToken { token: String },

    #[error("malformed result message {0:?}")]
    BadResult(String),

    #[error("result reports {count} primes for a chunk of {len} values")]
    CountExceedsChunk { count: u64, len: usize },
}

/// Failure of a single remote session
///
/// Never propagated past the session boundary: the coordinator records it
/// next to the target that produced it.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol failure: {0}")]
    Protocol(#[from] ProtocolError),

    /// The task driving the session did not run to completion
    #[error("session task aborted: {0}")]
    Aborted(String),
}

impl SessionError {
    /// Short family name used in reports
    pub fn family(&self) -> &'static str {
        match self {
            SessionError::Transport(_) => "transport",
            SessionError::Protocol(_) => "protocol",
            SessionError::Aborted(_) => "aborted",
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, SessionError::Transport(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, SessionError::Protocol(_))
    }
}

/// Failure to run a round at all
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    Partition(#[from] PartitionError),

    /// Local rounds are all-or-nothing
    #[error("local round failed: {0}")]
    Worker(#[from] WorkerError),

    #[error("remote round needs at least one connected worker")]
    NoTargets,

    #[error("local round task failed: {0}")]
    Join(String),
}

/// A remote round that completed with failed sessions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoundError {
    #[error("{succeeded} of {expected} workers succeeded; failed chunks: {failed:?}")]
    Partial {
        succeeded: usize,
        expected: usize,
        failed: Vec<usize>,
    },
}

/// Benchmark sweep failure
#[derive(Error, Debug)]
pub enum BenchmarkError {
    /// Sweep range was empty
    #[error("benchmark needs at least one configuration")]
    Empty,

    #[error(transparent)]
    Round(#[from] CoordinatorError),

    /// Two configurations counted different totals for the same workload
    #[error("{units} units x {threads} threads counted {found} primes, expected {expected}")]
    Inconsistent {
        units: usize,
        threads: usize,
        expected: u64,
        found: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_families() {
        let transport: SessionError = TransportError::Closed { step: Step::Result }.into();
        assert!(transport.is_transport());
        assert_eq!(transport.family(), "transport");

        let protocol: SessionError = ProtocolError::BadResult("x".to_string()).into();
        assert!(protocol.is_protocol());
        assert_eq!(protocol.family(), "protocol");
    }

    #[test]
    fn test_error_messages() {
        let err = TransportError::ShortRead { expected: 10, received: 4 };
        assert_eq!(err.to_string(), "stream closed after 4 of 10 payload bytes");

        let err = RoundError::Partial { succeeded: 2, expected: 3, failed: vec![1] };
        assert_eq!(err.to_string(), "2 of 3 workers succeeded; failed chunks: [1]");
    }
}
