//! # fillsched-solver
//!
//! Scheduling engine for filling lines.
//!
//! This crate provides:
//! - The orchestrator loop that places lots on parallel fillers
//! - Six packing strategies (five heuristics and an exact assignment model)
//! - Input and schedule validation
//! - KPI computation, strategy comparison and a given-order baseline
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use fillsched_core::{Configuration, Lot, StrategyKind};
//! use fillsched_solver::schedule;
//!
//! let lots = vec![
//!     Lot::new("L001", "VialE", 40_000, 2.0),
//!     Lot::new("L002", "VialH", 60_000, 3.0),
//! ];
//! let start = NaiveDate::from_ymd_opt(2025, 1, 6)
//!     .unwrap()
//!     .and_hms_opt(6, 0, 0)
//!     .unwrap();
//!
//! let result = schedule(lots, start, &Configuration::default(), StrategyKind::SmartPack).unwrap();
//! assert_eq!(result.kpis.lots_scheduled, 2);
//! assert!(result.validation.is_valid());
//! ```

pub mod compare;
pub mod kpi;
pub mod orchestrator;
pub mod sequence;
pub mod strategy;
pub mod validate;

pub use compare::{best_by_makespan, compare_strategies, ComparisonRow, KpiDelta};
pub use sequence::{order_by_sequence, schedule_in_sequence, GIVEN_ORDER};
pub use strategy::{PackingStrategy, Pick, PickContext, Strategy};
pub use validate::{validate_inputs, validate_inputs_with, validate_schedule, validate_schedule_with};

use chrono::NaiveDateTime;
use fillsched_core::{
    Activity, Configuration, Lot, ScheduleError, ScheduleResult, SolverReport, StrategyKind,
    ValidationReport,
};
use tracing::{info, warn};

/// Schedule `lots` from `start_time` with the chosen strategy.
///
/// Inputs are validated first; any error aborts with
/// [`ScheduleError::InvalidInput`] before an activity is produced. The
/// finished schedule is validated again and the findings travel with the
/// result rather than failing it.
pub fn schedule(
    lots: Vec<Lot>,
    start_time: NaiveDateTime,
    config: &Configuration,
    kind: StrategyKind,
) -> Result<ScheduleResult, ScheduleError> {
    let input_report = validate_inputs(&lots, config);
    if !input_report.is_valid() {
        warn!(errors = input_report.errors.len(), "input validation failed");
        return Err(ScheduleError::InvalidInput {
            errors: input_report.errors,
        });
    }

    info!(strategy = %kind, lots = lots.len(), fillers = config.num_fillers, "scheduling");

    let mut strategy = Strategy::from_kind(kind, config);
    let activities = orchestrator::run(&mut strategy, lots.clone(), start_time, config)?;
    let report = strategy.solver_report();

    Ok(finish(
        kind.as_str(),
        activities,
        &lots,
        start_time,
        config,
        input_report,
        report,
    ))
}

/// KPIs, output validation and result assembly shared by every entry point
pub(crate) fn finish(
    strategy: &str,
    activities: Vec<Activity>,
    lots: &[Lot],
    start_time: NaiveDateTime,
    config: &Configuration,
    input_report: ValidationReport,
    solver: Option<SolverReport>,
) -> ScheduleResult {
    let kpis = kpi::compute(&activities, start_time, lots, config);
    let mut validation = input_report;
    validation.merge(validate_schedule(&activities, lots, config));

    if !validation.is_valid() {
        warn!(
            strategy,
            errors = validation.errors.len(),
            "produced schedule failed validation"
        );
    }
    info!(
        strategy,
        makespan_hours = kpis.makespan_hours,
        changeover_hours = kpis.total_changeover_hours,
        clean_blocks = kpis.clean_blocks,
        "schedule complete"
    );

    ScheduleResult {
        strategy: strategy.to_string(),
        start_time,
        activities,
        kpis,
        validation,
        solver,
    }
}
