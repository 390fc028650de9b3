//! Human-readable text output

use crate::bench::BenchmarkReport;
use crate::stats::RoundReport;
use crate::util::time::{calculate_rate, format_number, format_rate, format_seconds};
use std::fmt::{self, Write};

/// Print round results to console
///
/// Displays:
/// - One line per worker (optional)
/// - Failed workers with their error family
/// - Totals and the succeeded/expected count
pub fn print_round_report(report: &RoundReport, per_worker: bool) {
    print!("{}", render_round_report(report, per_worker));
}

/// Render the round report as it is printed
pub fn render_round_report(report: &RoundReport, per_worker: bool) -> String {
    let mut out = String::new();
    // fmt::Write for String never fails
    let _ = write_round_report(&mut out, report, per_worker);
    out
}

fn write_round_report(out: &mut String, report: &RoundReport, per_worker: bool) -> fmt::Result {
    let aggregate = &report.aggregate;

    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out, "                    ROUND RESULTS ({})", report.mode)?;
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out)?;

    if per_worker && !report.results.is_empty() {
        for result in &report.results {
            writeln!(
                out,
                "Worker {} found {} primes in {} seconds",
                result.chunk_index,
                format_number(result.prime_count),
                format_seconds(result.elapsed)
            )?;
        }
        writeln!(out)?;
    }

    if !report.failures.is_empty() {
        writeln!(out, "Failed workers:")?;
        for failure in &report.failures {
            writeln!(
                out,
                "  ❌ Worker {} ({} failure): {}",
                failure.chunk_index,
                failure.error.family(),
                failure
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "Numbers:        {}", format_number(report.workload_len as u64))?;
    writeln!(out, "Total primes:   {}", format_number(aggregate.total_primes))?;
    writeln!(out, "Total elapsed:  {} s", format_seconds(aggregate.total_elapsed))?;
    writeln!(out, "Average per worker: {} s", format_seconds(aggregate.average_elapsed()))?;
    writeln!(out, "Slowest worker: {} s", format_seconds(aggregate.max_elapsed))?;
    writeln!(
        out,
        "Wall time:      {} s ({} numbers/s)",
        format_seconds(report.wall_time),
        format_rate(calculate_rate(report.workload_len, report.wall_time))
    )?;
    writeln!(out)?;

    let marker = if report.is_complete() { "✅" } else { "⚠️ " };
    writeln!(
        out,
        "{} {} of {} workers succeeded",
        marker, aggregate.succeeded, aggregate.expected
    )?;

    Ok(())
}

/// Print a benchmark sweep as a table
pub fn print_benchmark_report(report: &BenchmarkReport) {
    print!("{}", render_benchmark_report(report));
}

/// Render the benchmark table as it is printed
pub fn render_benchmark_report(report: &BenchmarkReport) -> String {
    let mut out = String::new();
    let _ = write_benchmark_report(&mut out, report);
    out
}

fn write_benchmark_report(out: &mut String, report: &BenchmarkReport) -> fmt::Result {
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out, "                 BENCHMARK RESULTS ({})", report.backend)?;
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out)?;
    writeln!(out, "{:>7} | {:>7} | {:>10} | {:>7}", "units", "threads", "time (s)", "speedup")?;
    writeln!(out, "{:-<7}-+-{:-<7}-+-{:-<10}-+-{:-<7}", "", "", "", "")?;

    for (entry, speedup) in report.entries.iter().zip(report.speedups()) {
        writeln!(
            out,
            "{:>7} | {:>7} | {:>10} | {:>6.2}x",
            entry.units,
            entry.threads_per_unit,
            format_seconds(entry.wall_time),
            speedup
        )?;
    }
    writeln!(out)?;

    if let Some(total) = report.total_primes() {
        writeln!(out, "Total primes: {} (all configurations agree)", format_number(total))?;
    }
    if let Some(best) = report.optimal() {
        writeln!(
            out,
            "Optimal configuration: {} units x {} threads = {} workers ({} s)",
            best.units,
            best.threads_per_unit,
            best.total_workers(),
            format_seconds(best.wall_time)
        )?;
    }

    Ok(())
}
