//! # fillsched-core
//!
//! Core domain model for the fillsched filling-line scheduling engine.
//!
//! This crate provides:
//! - Domain types: `Lot`, `Activity`, `Configuration`, `KpiSummary`
//! - Result types: `ScheduleResult`, `ValidationReport`, `SolverReport`
//! - The strategy identifier `StrategyKind`
//! - Error types (`ScheduleError`)
//!
//! ## Example
//!
//! ```rust
//! use fillsched_core::{Configuration, Lot, StrategyKind};
//!
//! let lots = vec![
//!     Lot::new("L001", "VialE", 120_000, 6.0),
//!     Lot::new("L002", "VialH", 80_000, 4.0).priority("high"),
//! ];
//! let config = Configuration::default().fillers(2);
//! let strategy: StrategyKind = "smart".parse().unwrap();
//!
//! assert_eq!(strategy, StrategyKind::SmartPack);
//! assert_eq!(config.num_fillers, 2);
//! assert_eq!(lots.len(), 2);
//! ```

pub mod config;

pub use config::{
    CfsParams, ClusterOrder, Configuration, HybridParams, MilpParams, SmartPackParams, WithinOrder,
};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Type Aliases & Constants
// ============================================================================

/// Unique identifier for a lot
pub type LotId = String;

/// Identifier of a filling line, 1-indexed
pub type FillerId = usize;

/// Tolerance used for every comparison of hour quantities
pub const HOURS_EPSILON: f64 = 1e-6;

/// Convert fractional hours into a chrono duration (microsecond resolution)
pub fn hours_to_duration(hours: f64) -> Duration {
    Duration::microseconds((hours * 3_600_000_000.0).round() as i64)
}

/// Convert a chrono duration back into fractional hours
pub fn duration_to_hours(duration: Duration) -> f64 {
    duration.num_microseconds().map_or_else(
        || duration.num_milliseconds() as f64 / 3_600_000.0,
        |us| us as f64 / 3_600_000_000.0,
    )
}

// ============================================================================
// Lot
// ============================================================================

/// A production job to be filled on one line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// Unique identifier
    pub lot_id: LotId,
    /// Product/container type; drives changeover cost
    pub lot_type: String,
    /// Number of units (vials)
    pub quantity: i64,
    /// Processing duration in hours
    pub fill_hours: f64,
    /// Priority level name (see `Configuration::priority_levels`)
    #[serde(default)]
    pub priority: Option<String>,
    /// Earliest desired fill start
    #[serde(default)]
    pub target_start: Option<NaiveDateTime>,
    /// Latest desired fill end
    #[serde(default)]
    pub target_end: Option<NaiveDateTime>,
}

impl Lot {
    /// Create a lot with an explicit fill duration
    pub fn new(
        lot_id: impl Into<String>,
        lot_type: impl Into<String>,
        quantity: i64,
        fill_hours: f64,
    ) -> Self {
        Self {
            lot_id: lot_id.into(),
            lot_type: lot_type.into(),
            quantity,
            fill_hours,
            priority: None,
            target_start: None,
            target_end: None,
        }
    }

    /// Create a lot whose fill duration is derived from the line fill rate
    pub fn from_quantity(
        lot_id: impl Into<String>,
        lot_type: impl Into<String>,
        quantity: i64,
        fill_rate_vph: f64,
    ) -> Self {
        let fill_hours = if fill_rate_vph > 0.0 {
            quantity as f64 / fill_rate_vph
        } else {
            f64::NAN
        };
        Self::new(lot_id, lot_type, quantity, fill_hours)
    }

    /// Set the priority level
    pub fn priority(mut self, level: impl Into<String>) -> Self {
        self.priority = Some(level.into());
        self
    }

    /// Set the delivery window (either bound may be open)
    pub fn window(mut self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        self.target_start = start;
        self.target_end = end;
        self
    }

    /// Does this lot carry any window bound?
    pub fn has_window(&self) -> bool {
        self.target_start.is_some() || self.target_end.is_some()
    }

    /// Hours by which a fill over `[start, end]` falls outside the window.
    /// Zero when the interval is inside (or the lot has no window).
    pub fn window_deviation_hours(&self, start: NaiveDateTime, end: NaiveDateTime) -> f64 {
        let early = self
            .target_start
            .map_or(0.0, |ts| duration_to_hours(ts - start).max(0.0));
        let late = self
            .target_end
            .map_or(0.0, |te| duration_to_hours(end - te).max(0.0));
        early + late
    }

    /// Whether a fill over `[start, end]` violates the window
    pub fn violates_window(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.window_deviation_hours(start, end) > HOURS_EPSILON
    }
}

// ============================================================================
// Activity
// ============================================================================

/// What a filler is doing during an activity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityKind {
    Fill,
    Clean,
    Changeover,
    Idle,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Fill => "FILL",
            ActivityKind::Clean => "CLEAN",
            ActivityKind::Changeover => "CHANGEOVER",
            ActivityKind::Idle => "IDLE",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled interval on exactly one filler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub kind: ActivityKind,
    /// 1-indexed filler
    pub filler_id: FillerId,
    /// Set for FILL only
    pub lot_id: Option<LotId>,
    /// Set for FILL only
    pub lot_type: Option<String>,
    /// Set for FILL only
    pub num_units: Option<i64>,
    /// Free-form annotation (e.g. `"A->B"` on a changeover)
    pub note: Option<String>,
}

impl Activity {
    /// A non-FILL activity
    pub fn new(
        kind: ActivityKind,
        filler_id: FillerId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        Self {
            start,
            end,
            kind,
            filler_id,
            lot_id: None,
            lot_type: None,
            num_units: None,
            note: None,
        }
    }

    /// A FILL activity for `lot`
    pub fn fill(lot: &Lot, filler_id: FillerId, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            kind: ActivityKind::Fill,
            filler_id,
            lot_id: Some(lot.lot_id.clone()),
            lot_type: Some(lot.lot_type.clone()),
            num_units: Some(lot.quantity),
            note: None,
        }
    }

    /// Attach a note
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn duration_hours(&self) -> f64 {
        duration_to_hours(self.end - self.start)
    }

    pub fn is_fill(&self) -> bool {
        self.kind == ActivityKind::Fill
    }
}

// ============================================================================
// Strategy identifiers
// ============================================================================

/// The closed set of scheduling strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    SmartPack,
    SptPack,
    LptPack,
    CfsPack,
    HybridPack,
    MilpOpt,
}

impl StrategyKind {
    /// All strategies in canonical order
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::SmartPack,
        StrategyKind::SptPack,
        StrategyKind::LptPack,
        StrategyKind::CfsPack,
        StrategyKind::HybridPack,
        StrategyKind::MilpOpt,
    ];

    /// Canonical identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::SmartPack => "smart-pack",
            StrategyKind::SptPack => "spt-pack",
            StrategyKind::LptPack => "lpt-pack",
            StrategyKind::CfsPack => "cfs-pack",
            StrategyKind::HybridPack => "hybrid-pack",
            StrategyKind::MilpOpt => "milp-opt",
        }
    }

    /// Heuristics complete quickly; the exact strategy is bounded by a time limit
    pub fn is_exact(&self) -> bool {
        matches!(self, StrategyKind::MilpOpt)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "smart-pack" | "smartpack" | "smart" => Ok(StrategyKind::SmartPack),
            "spt-pack" | "sptpack" | "spt" => Ok(StrategyKind::SptPack),
            "lpt-pack" | "lptpack" | "lpt" => Ok(StrategyKind::LptPack),
            "cfs-pack" | "cfspack" | "cfs" => Ok(StrategyKind::CfsPack),
            "hybrid-pack" | "hybridpack" | "hybrid" => Ok(StrategyKind::HybridPack),
            "milp-opt" | "milpopt" | "milp" => Ok(StrategyKind::MilpOpt),
            _ => Err(ScheduleError::UnknownStrategy(s.to_string())),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// How a validator reacts to the first error
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Stop at the first error instead of collecting all of them
    pub fail_fast: bool,
}

impl ValidationOptions {
    pub fn fail_fast() -> Self {
        Self { fail_fast: true }
    }
}

/// Outcome of a validation pass. Never thrown; always returned.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Append another report's findings
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

// ============================================================================
// KPIs & Results
// ============================================================================

/// Aggregate figures for one produced schedule
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    /// End of the last activity minus the schedule start
    pub makespan_hours: f64,
    pub total_fill_hours: f64,
    pub total_clean_hours: f64,
    pub total_changeover_hours: f64,
    pub total_idle_hours: f64,
    pub lots_scheduled: usize,
    pub clean_blocks: usize,
    /// total_fill_hours / (makespan_hours * num_fillers)
    pub utilization: f64,
    /// FILL activities outside their lot's target window
    pub window_violations: usize,
}

/// Termination status of the exact solver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    /// Optimality certified
    Optimal,
    /// Best incumbent at the time limit; optimality not proven
    Feasible,
}

/// Report attached to results produced by the exact strategy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    pub status: SolverStatus,
    /// Objective value in minutes (changeover + clean penalty + window penalty)
    pub objective: i64,
    pub elapsed_ms: u128,
}

impl SolverReport {
    pub fn proven_optimal(&self) -> bool {
        self.status == SolverStatus::Optimal
    }
}

/// Everything one scheduling run produces
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleResult {
    /// Strategy identifier (or `"given-order"` for sequence replays)
    pub strategy: String,
    pub start_time: NaiveDateTime,
    pub activities: Vec<Activity>,
    pub kpis: KpiSummary,
    pub validation: ValidationReport,
    pub solver: Option<SolverReport>,
}

impl ScheduleResult {
    /// Activities on one filler, in time order
    pub fn filler_activities(&self, filler_id: FillerId) -> Vec<&Activity> {
        let mut acts: Vec<&Activity> = self
            .activities
            .iter()
            .filter(|a| a.filler_id == filler_id)
            .collect();
        acts.sort_by_key(|a| a.start);
        acts
    }

    /// Lot ids in the order their FILL activities start
    pub fn fill_order(&self) -> Vec<&str> {
        let mut fills: Vec<&Activity> = self.activities.iter().filter(|a| a.is_fill()).collect();
        fills.sort_by_key(|a| (a.start, a.filler_id));
        fills.iter().filter_map(|a| a.lot_id.as_deref()).collect()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Scheduling error
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Invalid input: {}", .errors.join("; "))]
    InvalidInput { errors: Vec<String> },

    #[error("Capacity exceeded: {lots} lots exceed the exact-solver ceiling of {ceiling}")]
    CapacityExceeded { lots: usize, ceiling: usize },

    #[error(
        "Infeasible: lot {lot_id} needs {fill_hours:.2} h but a clean block holds at most {max_clean_hours:.2} h"
    )]
    Infeasible {
        lot_id: LotId,
        fill_hours: f64,
        max_clean_hours: f64,
    },

    #[error("Solver timeout: no feasible assignment found within {seconds} s")]
    SolverTimeout { seconds: u64 },

    #[error("Solver failure: {0}")]
    SolverFailure(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Internal invariant violation: {0}")]
    InternalInvariantViolation(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn lot_builder() {
        let lot = Lot::new("L1", "VialE", 1000, 2.5)
            .priority("high")
            .window(Some(at(8)), Some(at(20)));

        assert_eq!(lot.lot_id, "L1");
        assert_eq!(lot.priority.as_deref(), Some("high"));
        assert!(lot.has_window());
    }

    #[test]
    fn lot_from_quantity_uses_fill_rate() {
        let lot = Lot::from_quantity("L1", "VialE", 19_920, 19_920.0);
        assert!((lot.fill_hours - 1.0).abs() < 1e-12);

        let bad = Lot::from_quantity("L2", "VialE", 100, 0.0);
        assert!(bad.fill_hours.is_nan());
    }

    #[test]
    fn window_deviation() {
        let lot = Lot::new("L1", "A", 1, 2.0).window(Some(at(10)), Some(at(14)));

        assert_eq!(lot.window_deviation_hours(at(10), at(12)), 0.0);
        assert!((lot.window_deviation_hours(at(8), at(10)) - 2.0).abs() < 1e-9);
        assert!((lot.window_deviation_hours(at(13), at(15)) - 1.0).abs() < 1e-9);
        assert!(lot.violates_window(at(13), at(15)));
        assert!(!Lot::new("L2", "A", 1, 2.0).violates_window(at(0), at(23)));
    }

    #[test]
    fn hours_round_trip_through_duration() {
        let d = hours_to_duration(2.345_678);
        assert!((duration_to_hours(d) - 2.345_678).abs() < 1e-9);
    }

    #[test]
    fn strategy_kind_parsing_accepts_aliases() {
        assert_eq!("smart-pack".parse::<StrategyKind>().unwrap(), StrategyKind::SmartPack);
        assert_eq!("SPT".parse::<StrategyKind>().unwrap(), StrategyKind::SptPack);
        assert_eq!("lpt_pack".parse::<StrategyKind>().unwrap(), StrategyKind::LptPack);
        assert_eq!("milp".parse::<StrategyKind>().unwrap(), StrategyKind::MilpOpt);
        assert!(matches!(
            "tabu".parse::<StrategyKind>(),
            Err(ScheduleError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn strategy_kind_display_round_trips() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
    }

    #[test]
    fn activity_kind_serializes_uppercase() {
        let json = serde_json::to_string(&ActivityKind::Changeover).unwrap();
        assert_eq!(json, "\"CHANGEOVER\"");
    }

    #[test]
    fn invalid_input_message_lists_errors() {
        let err = ScheduleError::InvalidInput {
            errors: vec!["no lots provided".into()],
        };
        assert_eq!(err.to_string(), "Invalid input: no lots provided");
    }
}
