//! Run several strategies over the same input and line the results up
//!
//! Each run owns its own strategy and orchestrator state, so the runs are
//! spread across the rayon pool.

use crate::schedule;
use chrono::NaiveDateTime;
use fillsched_core::{Configuration, Lot, ScheduleError, ScheduleResult, StrategyKind};
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::info;

/// Outcome of one strategy in a comparison
#[derive(Debug)]
pub struct ComparisonRow {
    pub strategy: String,
    pub outcome: Result<ScheduleResult, ScheduleError>,
    pub elapsed: Duration,
}

/// KPI differences of a row against a baseline (row minus baseline)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KpiDelta {
    pub makespan_hours: f64,
    pub changeover_hours: f64,
    pub clean_hours: f64,
}

impl ComparisonRow {
    /// Build a row from an already computed outcome
    pub fn new(
        strategy: impl Into<String>,
        outcome: Result<ScheduleResult, ScheduleError>,
        elapsed: Duration,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            outcome,
            elapsed,
        }
    }

    /// Differences against `baseline`; `None` when this run failed
    pub fn delta(&self, baseline: &ScheduleResult) -> Option<KpiDelta> {
        let kpis = &self.outcome.as_ref().ok()?.kpis;
        Some(KpiDelta {
            makespan_hours: kpis.makespan_hours - baseline.kpis.makespan_hours,
            changeover_hours: kpis.total_changeover_hours - baseline.kpis.total_changeover_hours,
            clean_hours: kpis.total_clean_hours - baseline.kpis.total_clean_hours,
        })
    }
}

/// Schedule `lots` once per strategy in `kinds`, in parallel.
///
/// Rows come back in request order.
pub fn compare_strategies(
    lots: &[Lot],
    start_time: NaiveDateTime,
    config: &Configuration,
    kinds: &[StrategyKind],
) -> Vec<ComparisonRow> {
    info!(lots = lots.len(), strategies = kinds.len(), "comparing strategies");
    kinds
        .par_iter()
        .map(|&kind| {
            let started = Instant::now();
            let outcome = schedule(lots.to_vec(), start_time, config, kind);
            ComparisonRow::new(kind.as_str(), outcome, started.elapsed())
        })
        .collect()
}

/// Row with the shortest makespan among successful runs
pub fn best_by_makespan(rows: &[ComparisonRow]) -> Option<&ComparisonRow> {
    rows.iter()
        .filter_map(|row| row.outcome.as_ref().ok().map(|r| (row, r.kpis.makespan_hours)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(row, _)| row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn rows_follow_request_order() {
        let lots = vec![
            Lot::new("L1", "A", 1, 2.0),
            Lot::new("L2", "B", 1, 3.0),
            Lot::new("L3", "A", 1, 1.0),
        ];
        let kinds = [StrategyKind::LptPack, StrategyKind::SptPack, StrategyKind::CfsPack];
        let rows = compare_strategies(&lots, start(), &Configuration::default(), &kinds);

        let names: Vec<&str> = rows.iter().map(|r| r.strategy.as_str()).collect();
        assert_eq!(names, vec!["lpt-pack", "spt-pack", "cfs-pack"]);
        assert!(rows.iter().all(|r| r.outcome.is_ok()));
    }

    #[test]
    fn delta_against_itself_is_zero() {
        let lots = vec![Lot::new("L1", "A", 1, 2.0), Lot::new("L2", "B", 1, 3.0)];
        let rows = compare_strategies(&lots, start(), &Configuration::default(), &[StrategyKind::SptPack]);
        let baseline = rows[0].outcome.as_ref().unwrap();
        assert_eq!(rows[0].delta(baseline), Some(KpiDelta::default()));
        assert!(best_by_makespan(&rows).is_some());
    }
}
