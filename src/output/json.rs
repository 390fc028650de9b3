//! JSON output formatting
//!
//! Serializes round and benchmark reports with:
//! - An RFC 3339 timestamp and the coordinator's host name
//! - Totals and the succeeded/expected count
//! - Per-worker results and per-worker failures

use crate::bench::{BenchEntry, BenchmarkReport};
use crate::stats::RoundReport;
use crate::util::time::format_duration;
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Duration with both seconds and human-readable format
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JsonDuration {
    pub secs: f64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            secs: d.as_secs_f64(),
            human: format_duration(d),
        }
    }
}

/// Run metadata
#[derive(Debug, Clone, Serialize)]
pub struct JsonRunInfo {
    pub tool: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub host: String,
}

impl JsonRunInfo {
    pub fn now() -> Self {
        Self {
            tool: "primeshard",
            version: env!("CARGO_PKG_VERSION"),
            timestamp: chrono::Utc::now().to_rfc3339(),
            host: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// One successful worker
#[derive(Debug, Clone, Serialize)]
pub struct JsonWorkerResult {
    pub worker: usize,
    pub prime_count: u64,
    pub elapsed: JsonDuration,
}

/// One failed worker
#[derive(Debug, Clone, Serialize)]
pub struct JsonWorkerFailure {
    pub worker: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
    pub state: String,
    pub family: &'static str,
    pub error: String,
}

/// Complete round output
#[derive(Debug, Clone, Serialize)]
pub struct JsonRoundOutput {
    pub run: JsonRunInfo,
    pub mode: String,
    pub numbers: usize,
    pub total_primes: u64,
    pub total_elapsed: JsonDuration,
    pub average_elapsed: JsonDuration,
    pub max_elapsed: JsonDuration,
    pub wall_time: JsonDuration,
    pub succeeded: usize,
    pub expected: usize,
    pub complete: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<JsonWorkerResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<JsonWorkerFailure>,
}

/// Build the JSON form of a round report
pub fn build_round_output(report: &RoundReport, per_worker: bool) -> JsonRoundOutput {
    let aggregate = &report.aggregate;

    let workers = if per_worker {
        report
            .results
            .iter()
            .map(|r| JsonWorkerResult {
                worker: r.chunk_index,
                prime_count: r.prime_count,
                elapsed: JsonDuration::from_duration(r.elapsed),
            })
            .collect()
    } else {
        Vec::new()
    };

    let failures = report
        .failures
        .iter()
        .map(|f| JsonWorkerFailure {
            worker: f.chunk_index,
            peer: f.peer.map(|p| p.to_string()),
            state: f.state.to_string(),
            family: f.error.family(),
            error: f.error.to_string(),
        })
        .collect();

    JsonRoundOutput {
        run: JsonRunInfo::now(),
        mode: report.mode.to_string(),
        numbers: report.workload_len,
        total_primes: aggregate.total_primes,
        total_elapsed: JsonDuration::from_duration(aggregate.total_elapsed),
        average_elapsed: JsonDuration::from_duration(aggregate.average_elapsed()),
        max_elapsed: JsonDuration::from_duration(aggregate.max_elapsed),
        wall_time: JsonDuration::from_duration(report.wall_time),
        succeeded: aggregate.succeeded,
        expected: aggregate.expected,
        complete: report.is_complete(),
        workers,
        failures,
    }
}

/// One benchmark row
#[derive(Debug, Clone, Serialize)]
pub struct JsonBenchEntry {
    pub units: usize,
    pub threads_per_unit: usize,
    pub wall_time: JsonDuration,
    pub speedup: f64,
}

/// Complete benchmark output
#[derive(Debug, Clone, Serialize)]
pub struct JsonBenchmarkOutput {
    pub run: JsonRunInfo,
    pub backend: String,
    pub numbers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_primes: Option<u64>,
    pub entries: Vec<JsonBenchEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal: Option<JsonBenchEntry>,
}

/// Build the JSON form of a benchmark report
pub fn build_benchmark_output(report: &BenchmarkReport) -> JsonBenchmarkOutput {
    let speedups = report.speedups();
    let to_json = |e: &BenchEntry, speedup: f64| JsonBenchEntry {
        units: e.units,
        threads_per_unit: e.threads_per_unit,
        wall_time: JsonDuration::from_duration(e.wall_time),
        speedup,
    };

    let entries: Vec<JsonBenchEntry> = report
        .entries
        .iter()
        .zip(speedups.iter())
        .map(|(e, &s)| to_json(e, s))
        .collect();

    let optimal = report.optimal().and_then(|best| {
        report
            .entries
            .iter()
            .position(|e| e == best)
            .map(|i| entries[i].clone())
    });

    JsonBenchmarkOutput {
        run: JsonRunInfo::now(),
        backend: report.backend.to_string(),
        numbers: report.workload_len,
        total_primes: report.total_primes(),
        entries,
        optimal,
    }
}

/// Write any JSON output to file (pretty-printed)
pub fn write_json_output<T: Serialize>(output_path: &Path, output: &T) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;

    serde_json::to_writer_pretty(BufWriter::new(file), output)
        .with_context(|| format!("Failed to write JSON output: {}", output_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Backend, Mode};
    use crate::distributed::protocol::Step;
    use crate::distributed::{SessionFailure, SessionState};
    use crate::error::TransportError;
    use crate::stats::aggregator::RoundAggregator;
    use crate::stats::WorkerResult;

    fn report() -> RoundReport {
        let mut aggregator = RoundAggregator::new(Mode::Remote, 2);
        aggregator.add_result(WorkerResult::new(0, 3, Duration::from_millis(250)));
        aggregator.add_failure(SessionFailure {
            target: 1,
            chunk_index: 1,
            peer: Some("10.0.0.2:51000".parse().unwrap()),
            state: SessionState::ResultAwaited,
            error: TransportError::Closed { step: Step::Result }.into(),
        });
        aggregator.into_report(Duration::from_millis(500), 6)
    }

    #[test]
    fn test_round_output_fields() {
        let output = build_round_output(&report(), true);
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(value["mode"], "remote");
        assert_eq!(value["total_primes"], 3);
        assert_eq!(value["succeeded"], 1);
        assert_eq!(value["expected"], 2);
        assert_eq!(value["complete"], false);
        assert_eq!(value["workers"][0]["elapsed"]["secs"], 0.25);
        assert_eq!(value["failures"][0]["family"], "transport");
        assert_eq!(value["failures"][0]["state"], "result-awaited");
        assert_eq!(value["failures"][0]["peer"], "10.0.0.2:51000");
        assert!(value["run"]["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_round_output_without_workers() {
        let output = build_round_output(&report(), false);
        let value = serde_json::to_value(&output).unwrap();
        assert!(value.get("workers").is_none());
        assert!(value.get("failures").is_some());
    }

    #[test]
    fn test_benchmark_output_optimal() {
        let entry = |units, millis| BenchEntry {
            units,
            threads_per_unit: 2,
            wall_time: Duration::from_millis(millis),
            total_primes: 7,
        };
        let report = BenchmarkReport {
            backend: Backend::Hybrid,
            workload_len: 10,
            entries: vec![entry(1, 800), entry(2, 400), entry(3, 500)],
        };

        let output = build_benchmark_output(&report);
        assert_eq!(output.entries.len(), 3);
        let optimal = output.optimal.unwrap();
        assert_eq!(optimal.units, 2);
        assert_eq!(optimal.speedup, 2.0);
        assert_eq!(output.total_primes, Some(7));
    }

    #[test]
    fn test_write_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round.json");

        write_json_output(&path, &build_round_output(&report(), true)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["numbers"], 6);
    }
}
