//! Benchmarking module for fillsched
//!
//! Times every strategy on synthetic lot sets of increasing size.

pub mod synthetic;

use chrono::NaiveDateTime;
use fillsched_core::{Configuration, ScheduleError, StrategyKind};
use std::time::{Duration, Instant};

/// Result of a benchmark run
#[derive(Debug)]
pub struct BenchmarkResult {
    pub strategy: StrategyKind,
    pub lot_count: usize,
    pub generation_time: Duration,
    pub schedule_time: Duration,
    pub status: BenchmarkStatus,
    pub makespan_hours: Option<f64>,
    pub changeover_hours: Option<f64>,
}

/// Status of a benchmark run
#[derive(Debug)]
pub enum BenchmarkStatus {
    Success,
    /// Exact strategy stopped at its time limit with an incumbent
    NotProven,
    Skipped(String),
    Error(String),
}

impl std::fmt::Display for BenchmarkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchmarkStatus::Success => write!(f, "OK"),
            BenchmarkStatus::NotProven => write!(f, "NOT PROVEN"),
            BenchmarkStatus::Skipped(why) => write!(f, "SKIPPED: {}", why),
            BenchmarkStatus::Error(e) => write!(f, "ERROR: {}", e),
        }
    }
}

/// Generate `lot_count` lots and schedule them with `strategy`
pub fn run_benchmark(
    strategy: StrategyKind,
    lot_count: usize,
    types: usize,
    seed: u64,
    start: NaiveDateTime,
    config: &Configuration,
) -> BenchmarkResult {
    let gen_start = Instant::now();
    let lots = synthetic::generate_lots(lot_count, types, seed, config.fill_rate_vph);
    let generation_time = gen_start.elapsed();

    let schedule_start = Instant::now();
    let outcome = fillsched_solver::schedule(lots, start, config, strategy);
    let schedule_time = schedule_start.elapsed();

    let (status, makespan_hours, changeover_hours) = match outcome {
        Ok(result) => {
            let status = match &result.solver {
                Some(report) if !report.proven_optimal() => BenchmarkStatus::NotProven,
                _ if !result.validation.is_valid() => {
                    BenchmarkStatus::Error(result.validation.errors.join("; "))
                }
                _ => BenchmarkStatus::Success,
            };
            (
                status,
                Some(result.kpis.makespan_hours),
                Some(result.kpis.total_changeover_hours),
            )
        }
        Err(e @ ScheduleError::CapacityExceeded { .. }) => {
            (BenchmarkStatus::Skipped(e.to_string()), None, None)
        }
        Err(e) => (BenchmarkStatus::Error(e.to_string()), None, None),
    };

    BenchmarkResult {
        strategy,
        lot_count,
        generation_time,
        schedule_time,
        status,
        makespan_hours,
        changeover_hours,
    }
}

/// Run every strategy in `strategies` over each size
pub fn run_benchmark_series(
    strategies: &[StrategyKind],
    sizes: &[usize],
    types: usize,
    seed: u64,
    start: NaiveDateTime,
    config: &Configuration,
) -> Vec<BenchmarkResult> {
    let mut results = Vec::new();
    for &size in sizes {
        for &strategy in strategies {
            tracing::info!(%strategy, lots = size, "benchmark run");
            results.push(run_benchmark(strategy, size, types, seed, start, config));
        }
    }
    results
}

/// Print a formatted benchmark report
pub fn print_report(results: &[BenchmarkResult]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════════════════════════════════╗");
    println!("║                                fillsched Benchmark Report                                ║");
    println!("╠══════════════════════════════════════════════════════════════════════════════════════════╣");
    println!(
        "║ {:^12} │ {:^6} │ {:^10} │ {:^11} │ {:^10} │ {:^10} │ {:^16} ║",
        "Strategy", "Lots", "Generate", "Schedule", "Makespan", "Changeov.", "Status"
    );
    println!("╠══════════════════════════════════════════════════════════════════════════════════════════╣");

    for result in results {
        let gen_ms = format!("{:.2}ms", result.generation_time.as_secs_f64() * 1000.0);
        let sched_ms = format!("{:.2}ms", result.schedule_time.as_secs_f64() * 1000.0);
        let makespan = result
            .makespan_hours
            .map_or_else(|| "-".to_string(), |h| format!("{:.1}h", h));
        let changeover = result
            .changeover_hours
            .map_or_else(|| "-".to_string(), |h| format!("{:.1}h", h));
        let mut status = result.status.to_string();
        status.truncate(16);

        println!(
            "║ {:<12} │ {:>6} │ {:>10} │ {:>11} │ {:>10} │ {:>10} │ {:<16} ║",
            result.strategy.as_str(),
            result.lot_count,
            gen_ms,
            sched_ms,
            makespan,
            changeover,
            status
        );
    }

    println!("╚══════════════════════════════════════════════════════════════════════════════════════════╝");
    println!();

    let successful: Vec<_> = results
        .iter()
        .filter(|r| matches!(r.status, BenchmarkStatus::Success | BenchmarkStatus::NotProven))
        .collect();
    if !successful.is_empty() {
        let total_lots: usize = successful.iter().map(|r| r.lot_count).sum();
        let total_time: f64 = successful
            .iter()
            .map(|r| r.schedule_time.as_secs_f64())
            .sum();

        println!("Summary:");
        println!("  Successful runs: {}/{}", successful.len(), results.len());
        println!("  Total lots scheduled: {}", total_lots);
        if total_time > 0.0 {
            println!("  Average throughput: {:.0} lots/sec", total_lots as f64 / total_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap()
    }

    #[test]
    fn heuristic_benchmark_succeeds() {
        let result = run_benchmark(StrategyKind::LptPack, 40, 4, 1, start(), &Configuration::default());
        assert!(matches!(result.status, BenchmarkStatus::Success), "{}", result.status);
        assert!(result.makespan_hours.is_some());
    }

    #[test]
    fn exact_strategy_skips_large_sets() {
        let result = run_benchmark(StrategyKind::MilpOpt, 31, 4, 1, start(), &Configuration::default());
        assert!(matches!(result.status, BenchmarkStatus::Skipped(_)));
    }
}
