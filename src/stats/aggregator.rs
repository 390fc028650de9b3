//! Result collection
//!
//! Two pieces sit between the workers and the report:
//!
//! - [`ResultArena`]: index-aligned result slots allocated once per round.
//!   Each slot is handed out as an exclusive `&mut`, so every slot has exactly
//!   one writer and the hot path needs no locks or shared counters.
//! - [`RoundAggregator`]: collects successes and failures and derives the
//!   aggregate once every worker has reached a terminal state.
//!
//! # Example
//!
//! ```
//! use primeshard::stats::aggregator::ResultArena;
//! use primeshard::stats::WorkerResult;
//! use std::time::Duration;
//!
//! let mut arena: ResultArena<WorkerResult> = ResultArena::with_slots(2);
//! for (index, slot) in arena.slots_mut().enumerate() {
//!     *slot = Some(WorkerResult::new(index, 1, Duration::ZERO));
//! }
//! let results = arena.into_complete().unwrap();
//! assert_eq!(results.len(), 2);
//! ```

use crate::config::Mode;
use crate::distributed::session::SessionFailure;
use crate::error::WorkerError;
use crate::stats::{AggregateResult, RoundReport, WorkerResult};
use std::time::Duration;

/// Fixed set of result slots, one per chunk
#[derive(Debug)]
pub struct ResultArena<T> {
    slots: Vec<Option<T>>,
}

impl<T> ResultArena<T> {
    /// Allocate `len` empty slots
    pub fn with_slots(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Exclusive handles to every slot, in index order
    pub fn slots_mut(&mut self) -> std::slice::IterMut<'_, Option<T>> {
        self.slots.iter_mut()
    }

    /// Number of slots that have been written
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn into_slots(self) -> Vec<Option<T>> {
        self.slots
    }
}

impl ResultArena<WorkerResult> {
    /// Take every result, failing on the first empty slot
    ///
    /// A missing result is a hard failure rather than a silent zero.
    pub fn into_complete(self) -> Result<Vec<WorkerResult>, WorkerError> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(chunk, slot)| slot.ok_or(WorkerError::MissingResult { chunk }))
            .collect()
    }
}

/// Collects the terminal state of every worker in a round
#[derive(Debug)]
pub struct RoundAggregator {
    mode: Mode,
    expected: usize,
    results: Vec<WorkerResult>,
    failures: Vec<SessionFailure>,
}

impl RoundAggregator {
    pub fn new(mode: Mode, expected: usize) -> Self {
        Self {
            mode,
            expected,
            results: Vec::with_capacity(expected),
            failures: Vec::new(),
        }
    }

    pub fn add_result(&mut self, result: WorkerResult) {
        self.results.push(result);
    }

    pub fn add_failure(&mut self, failure: SessionFailure) {
        self.failures.push(failure);
    }

    /// Workers that reached a terminal state so far
    pub fn reported(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    /// Aggregate over the successful results collected so far
    pub fn aggregate(&self) -> AggregateResult {
        AggregateResult::from_results(&self.results, self.expected)
    }

    /// Finish the round
    pub fn into_report(mut self, wall_time: Duration, workload_len: usize) -> RoundReport {
        self.results.sort_by_key(|r| r.chunk_index);
        self.failures.sort_by_key(|f| f.chunk_index);
        let aggregate = self.aggregate();

        RoundReport {
            mode: self.mode,
            results: self.results,
            failures: self.failures,
            aggregate,
            wall_time,
            workload_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::protocol::Step;
    use crate::distributed::session::SessionState;
    use crate::error::TransportError;

    #[test]
    fn test_arena_new() {
        let arena: ResultArena<WorkerResult> = ResultArena::with_slots(3);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.filled(), 0);
    }

    #[test]
    fn test_arena_missing_slot_is_error() {
        let mut arena: ResultArena<WorkerResult> = ResultArena::with_slots(3);
        for (index, slot) in arena.slots_mut().enumerate() {
            if index != 1 {
                *slot = Some(WorkerResult::new(index, 0, Duration::ZERO));
            }
        }
        assert_eq!(arena.filled(), 2);
        match arena.into_complete() {
            Err(WorkerError::MissingResult { chunk }) => assert_eq!(chunk, 1),
            other => panic!("expected missing result, got {:?}", other),
        }
    }

    #[test]
    fn test_arena_empty_is_complete() {
        let arena: ResultArena<WorkerResult> = ResultArena::with_slots(0);
        assert!(arena.is_empty());
        assert!(arena.into_complete().unwrap().is_empty());
    }

    #[test]
    fn test_aggregator_orders_results() {
        let mut aggregator = RoundAggregator::new(Mode::Local, 3);
        aggregator.add_result(WorkerResult::new(2, 1, Duration::from_millis(3)));
        aggregator.add_result(WorkerResult::new(0, 2, Duration::from_millis(1)));
        aggregator.add_result(WorkerResult::new(1, 2, Duration::from_millis(2)));
        assert_eq!(aggregator.reported(), 3);

        let report = aggregator.into_report(Duration::from_millis(4), 9);
        let order: Vec<usize> = report.results.iter().map(|r| r.chunk_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(report.aggregate.total_primes, 5);
        assert!(report.is_complete());
    }

    #[test]
    fn test_aggregator_partial_round() {
        let mut aggregator = RoundAggregator::new(Mode::Remote, 3);
        aggregator.add_result(WorkerResult::new(0, 4, Duration::from_millis(2)));
        aggregator.add_failure(SessionFailure {
            target: 1,
            chunk_index: 1,
            peer: None,
            state: SessionState::ResultAwaited,
            error: TransportError::Closed { step: Step::Result }.into(),
        });
        aggregator.add_result(WorkerResult::new(2, 6, Duration::from_millis(4)));

        let report = aggregator.into_report(Duration::from_millis(5), 30);
        assert!(!report.is_complete());
        assert_eq!(report.aggregate.total_primes, 10);
        assert_eq!(report.aggregate.succeeded, 2);
        assert_eq!(report.aggregate.average_elapsed(), Duration::from_millis(3));
        assert_eq!(report.failed_chunks(), vec![1]);
    }
}
