//! Workload partitioning
//!
//! Splits an ordered sequence of integers into `parts` contiguous chunks of
//! `ceil(N / parts)` values each. The last chunks may be shorter, and are
//! empty when `parts > N`.
//!
//! The partitioner always returns exactly `parts` chunks. An empty workload
//! therefore yields `parts` empty chunks, each of which counts zero primes.
//!
//! # Example
//!
//! ```
//! use primeshard::partition::partition;
//!
//! let chunks = partition(&[2, 3, 4, 5, 6, 7, 8, 9, 10], 3).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[1].values(), &[5, 6, 7]);
//! ```

use crate::error::PartitionError;

/// Contiguous slice of the workload owned by exactly one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Ordinal position of this chunk in the partition (0..parts)
    index: usize,

    /// Values in workload order
    values: Vec<i64>,
}

impl Chunk {
    pub fn new(index: usize, values: Vec<i64>) -> Self {
        Self { index, values }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<i64> {
        self.values
    }
}

/// Number of values per chunk for a given workload length
pub fn chunk_size(len: usize, parts: usize) -> Result<usize, PartitionError> {
    if parts == 0 {
        return Err(PartitionError::ZeroParts);
    }
    Ok(len.div_ceil(parts))
}

/// Split `items` into `parts` ordered, contiguous chunks
///
/// Deterministic: the same input always yields the same partition.
pub fn partition(items: &[i64], parts: usize) -> Result<Vec<Chunk>, PartitionError> {
    let size = chunk_size(items.len(), parts)?;
    let len = items.len();

    let chunks = (0..parts)
        .map(|index| {
            let start = (index * size).min(len);
            let end = (start + size).min(len);
            Chunk::new(index, items[start..end].to_vec())
        })
        .collect();

    Ok(chunks)
}

/// Re-assemble chunks in index order
pub fn concat(chunks: &[Chunk]) -> Vec<i64> {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index());
    ordered.iter().flat_map(|c| c.values().iter().copied()).collect()
}
