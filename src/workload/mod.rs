//! Workload source
//!
//! Supplies the ordered integer sequence a round partitions. Two sources:
//!
//! - **Delimited text**: every comma-separated field of every line that parses
//!   as an integer, in file order. Other fields (headers, blanks, words) are
//!   skipped and counted.
//! - **Synthetic**: seeded pseudo-random integers, reproducible across runs.
//!
//! The location of a file is always given by the caller.

use crate::config::InputConfig;
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Loader statistics for a delimited text file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: usize,
    pub values: usize,
    pub skipped: usize,
}

/// Immutable ordered sequence of integers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workload {
    values: Vec<i64>,
}

impl Workload {
    pub fn from_values(values: Vec<i64>) -> Self {
        Self { values }
    }

    /// Build the workload an `[input]` section describes
    pub fn from_config(input: &InputConfig) -> Result<Self> {
        match (&input.path, &input.synthetic) {
            (Some(path), _) => Self::from_csv_path(path),
            (None, Some(s)) => Ok(Self::synthetic(s.count, s.max_value, s.seed)),
            (None, None) => anyhow::bail!("No input configured"),
        }
    }

    /// Load a delimited text file
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open input file: {}", path.display()))?;

        let (workload, stats) = Self::parse_csv(BufReader::new(file))
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;

        info!(
            rows = stats.rows,
            values = stats.values,
            "Loaded {} numbers from {}",
            stats.values,
            path.display()
        );
        if stats.skipped > 0 {
            warn!("Skipped {} non-integer fields in {}", stats.skipped, path.display());
        }

        Ok(workload)
    }

    /// Parse delimited text from any reader
    pub fn parse_csv<R: BufRead>(reader: R) -> Result<(Self, LoadStats)> {
        let mut values = Vec::new();
        let mut stats = LoadStats::default();

        for line in reader.lines() {
            let line = line.context("Failed to read line")?;
            stats.rows += 1;

            for field in line.split(',') {
                let field = field.trim();
                if field.is_empty() {
                    continue;
                }
                match field.parse::<i64>() {
                    Ok(value) => values.push(value),
                    Err(_) => stats.skipped += 1,
                }
            }
        }

        stats.values = values.len();
        Ok((Self { values }, stats))
    }

    /// `count` pseudo-random integers in `[0, max_value)`
    ///
    /// The same seed always produces the same workload. A non-positive
    /// `max_value` yields all zeros.
    pub fn synthetic(count: usize, max_value: i64, seed: u64) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let upper = max_value.max(1);
        let values = (0..count).map(|_| rng.gen_range(0..upper)).collect();
        Self { values }
    }

    pub fn as_slice(&self) -> &[i64] {
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

impl From<Vec<i64>> for Workload {
    fn from(values: Vec<i64>) -> Self {
        Self::from_values(values)
    }
}
