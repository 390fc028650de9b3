//! Round statistics
//!
//! Per-chunk results, the derived aggregate, and the report a coordinator
//! hands to the reporter after every round.
//!
//! # Example
//!
//! ```
//! use primeshard::stats::{AggregateResult, WorkerResult};
//! use std::time::Duration;
//!
//! let results = vec![
//!     WorkerResult::new(0, 2, Duration::from_millis(10)),
//!     WorkerResult::new(1, 3, Duration::from_millis(30)),
//! ];
//!
//! let aggregate = AggregateResult::from_results(&results, 2);
//! assert_eq!(aggregate.total_primes, 5);
//! assert_eq!(aggregate.average_elapsed(), Duration::from_millis(20));
//! ```

pub mod aggregator;

use crate::config::Mode;
use crate::distributed::session::SessionFailure;
use crate::error::RoundError;
use std::time::Duration;

/// Outcome of counting one chunk
///
/// Produced exactly once per chunk by the unit or session that processed it.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResult {
    /// Index of the chunk this result belongs to
    pub chunk_index: usize,

    /// Number of primes in the chunk (never more than the chunk length)
    pub prime_count: u64,

    /// Time the worker spent counting
    pub elapsed: Duration,
}

impl WorkerResult {
    pub fn new(chunk_index: usize, prime_count: u64, elapsed: Duration) -> Self {
        Self {
            chunk_index,
            prime_count,
            elapsed,
        }
    }
}

/// Totals derived from the successful results of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregateResult {
    /// Sum of prime counts over successful results
    pub total_primes: u64,

    /// Sum of every successful worker's own elapsed time
    pub total_elapsed: Duration,

    /// Slowest successful worker
    pub max_elapsed: Duration,

    /// Workers that returned a result
    pub succeeded: usize,

    /// Workers the round dispatched to
    pub expected: usize,
}

impl AggregateResult {
    /// Aggregate a set of successful results
    pub fn from_results(results: &[WorkerResult], expected: usize) -> Self {
        let mut aggregate = Self {
            expected,
            ..Self::default()
        };

        for result in results {
            aggregate.total_primes += result.prime_count;
            aggregate.total_elapsed += result.elapsed;
            aggregate.max_elapsed = aggregate.max_elapsed.max(result.elapsed);
            aggregate.succeeded += 1;
        }

        aggregate
    }

    /// Average elapsed time per successful worker
    pub fn average_elapsed(&self) -> Duration {
        if self.succeeded == 0 {
            return Duration::ZERO;
        }
        self.total_elapsed / self.succeeded as u32
    }

    pub fn failed(&self) -> usize {
        self.expected.saturating_sub(self.succeeded)
    }
}

/// Everything known about one completed round
#[derive(Debug)]
pub struct RoundReport {
    /// Local or remote round
    pub mode: Mode,

    /// Successful results, ordered by chunk index
    pub results: Vec<WorkerResult>,

    /// Failed remote sessions (always empty for local rounds)
    pub failures: Vec<SessionFailure>,

    pub aggregate: AggregateResult,

    /// Coordinator-side wall clock time for the whole round
    pub wall_time: Duration,

    /// Number of integers in the workload
    pub workload_len: usize,
}

impl RoundReport {
    /// True when every dispatched worker returned a result
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.aggregate.succeeded == self.aggregate.expected
    }

    /// Chunk indices whose worker failed
    pub fn failed_chunks(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.chunk_index).collect()
    }

    /// Turn a partial round into an error for callers that need every result
    pub fn ensure_complete(&self) -> Result<(), RoundError> {
        if self.is_complete() {
            return Ok(());
        }
        Err(RoundError::Partial {
            succeeded: self.aggregate.succeeded,
            expected: self.aggregate.expected,
            failed: self.failed_chunks(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_empty() {
        let aggregate = AggregateResult::from_results(&[], 3);
        assert_eq!(aggregate.total_primes, 0);
        assert_eq!(aggregate.succeeded, 0);
        assert_eq!(aggregate.failed(), 3);
        assert_eq!(aggregate.average_elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_aggregate_sums_and_max() {
        let results = vec![
            WorkerResult::new(0, 2, Duration::from_millis(5)),
            WorkerResult::new(1, 2, Duration::from_millis(15)),
            WorkerResult::new(2, 1, Duration::from_millis(10)),
        ];
        let aggregate = AggregateResult::from_results(&results, 3);
        assert_eq!(aggregate.total_primes, 5);
        assert_eq!(aggregate.total_elapsed, Duration::from_millis(30));
        assert_eq!(aggregate.max_elapsed, Duration::from_millis(15));
        assert_eq!(aggregate.average_elapsed(), Duration::from_millis(10));
        assert_eq!(aggregate.failed(), 0);
    }

    #[test]
    fn test_complete_report() {
        let results = vec![WorkerResult::new(0, 1, Duration::from_millis(1))];
        let report = RoundReport {
            mode: Mode::Local,
            aggregate: AggregateResult::from_results(&results, 1),
            results,
            failures: Vec::new(),
            wall_time: Duration::from_millis(2),
            workload_len: 1,
        };
        assert!(report.is_complete());
        assert!(report.ensure_complete().is_ok());
    }

    #[test]
    fn test_missing_results_are_not_complete() {
        let results = vec![WorkerResult::new(0, 1, Duration::from_millis(1))];
        let report = RoundReport {
            mode: Mode::Remote,
            aggregate: AggregateResult::from_results(&results, 2),
            results,
            failures: Vec::new(),
            wall_time: Duration::from_millis(2),
            workload_len: 4,
        };
        assert!(!report.is_complete());
        assert!(matches!(
            report.ensure_complete(),
            Err(RoundError::Partial { succeeded: 1, expected: 2, .. })
        ));
    }
}
