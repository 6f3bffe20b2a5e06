//! Packing strategies
//!
//! Every strategy answers two questions for the orchestrator:
//!
//! - `reorder`: an optional upfront pass establishing a base ordering of lots
//! - `pick_next`: given one filler's state, which remaining lot goes next, or
//!   whether the current clean block should be closed
//!
//! The set of strategies is closed: [`Strategy`] is an enum over the six
//! implementations, each carrying its own parameters, built from a
//! [`StrategyKind`] and a [`Configuration`].

mod cfs;
mod hybrid;
mod milp;
mod ordered;
mod smart;

pub use cfs::CfsPack;
pub use hybrid::HybridPack;
pub use milp::{MilpOpt, MilpPlan, PlannedSlot};
pub use ordered::{LptPack, SptPack};
pub use smart::SmartPack;

use chrono::NaiveDateTime;
use fillsched_core::{
    Configuration, FillerId, Lot, ScheduleError, SolverReport, StrategyKind, HOURS_EPSILON,
};

/// Decision returned by `pick_next`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pick {
    /// Schedule `remaining[index]` next on this filler
    Lot(usize),
    /// Close the current block with a CLEAN and start a fresh one
    StartNewBlock,
    /// This filler takes no further lots in this run
    Release,
}

/// Read-only view of one filler's state at a scheduling step
#[derive(Clone, Copy, Debug)]
pub struct PickContext<'a> {
    pub remaining: &'a [Lot],
    pub previous_type: Option<&'a str>,
    /// Fill + changeover hours consumed since the last CLEAN
    pub block_hours_used: f64,
    pub filler_id: FillerId,
    pub cursor: NaiveDateTime,
    pub config: &'a Configuration,
}

impl PickContext<'_> {
    /// Changeover plus fill hours needed to place `lot` next
    pub fn need_hours(&self, lot: &Lot) -> f64 {
        self.config.changeover_hours(self.previous_type, &lot.lot_type) + lot.fill_hours
    }

    /// Whether `lot` fits the remaining block capacity
    pub fn fits(&self, lot: &Lot) -> bool {
        self.block_hours_used + self.need_hours(lot) <= self.config.max_clean_hours + HOURS_EPSILON
    }

    /// Nothing has been placed since the last CLEAN
    pub fn block_is_empty(&self) -> bool {
        self.previous_type.is_none() && self.block_hours_used <= HOURS_EPSILON
    }
}

/// Capability contract implemented by every strategy
pub trait PackingStrategy {
    /// Canonical strategy name
    fn name(&self) -> &'static str;

    /// Refuse inputs the strategy cannot take before any other check runs
    fn check_capacity(&self, _lot_count: usize) -> Result<(), ScheduleError> {
        Ok(())
    }

    /// Establish the base ordering of lots. Identity by default.
    fn reorder(
        &mut self,
        lots: Vec<Lot>,
        _start_time: NaiveDateTime,
        _config: &Configuration,
    ) -> Result<Vec<Lot>, ScheduleError> {
        Ok(lots)
    }

    /// Choose the next lot for the filler described by `ctx`
    fn pick_next(&self, ctx: &PickContext<'_>) -> Pick;

    /// Solver statistics, for strategies that run an exact model
    fn solver_report(&self) -> Option<SolverReport> {
        None
    }
}

/// First lot in `remaining` order that fits, else close the block
pub(crate) fn first_fit(ctx: &PickContext<'_>) -> Pick {
    ctx.remaining
        .iter()
        .position(|lot| ctx.fits(lot))
        .map_or(Pick::StartNewBlock, Pick::Lot)
}

// ============================================================================
// Closed dispatch
// ============================================================================

/// One of the six strategies, with its parameters
#[derive(Clone, Debug)]
pub enum Strategy {
    SmartPack(SmartPack),
    SptPack(SptPack),
    LptPack(LptPack),
    CfsPack(CfsPack),
    HybridPack(HybridPack),
    MilpOpt(MilpOpt),
}

impl Strategy {
    /// Build the strategy for `kind`, copying its parameters out of `config`
    pub fn from_kind(kind: StrategyKind, config: &Configuration) -> Self {
        match kind {
            StrategyKind::SmartPack => Strategy::SmartPack(SmartPack::new(config.smart_pack.clone())),
            StrategyKind::SptPack => Strategy::SptPack(SptPack),
            StrategyKind::LptPack => Strategy::LptPack(LptPack),
            StrategyKind::CfsPack => Strategy::CfsPack(CfsPack::new(config.cfs.clone())),
            StrategyKind::HybridPack => Strategy::HybridPack(HybridPack::new(config.hybrid.clone())),
            StrategyKind::MilpOpt => Strategy::MilpOpt(MilpOpt::new(config.milp.clone())),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::SmartPack(_) => StrategyKind::SmartPack,
            Strategy::SptPack(_) => StrategyKind::SptPack,
            Strategy::LptPack(_) => StrategyKind::LptPack,
            Strategy::CfsPack(_) => StrategyKind::CfsPack,
            Strategy::HybridPack(_) => StrategyKind::HybridPack,
            Strategy::MilpOpt(_) => StrategyKind::MilpOpt,
        }
    }

    fn inner(&self) -> &dyn PackingStrategy {
        match self {
            Strategy::SmartPack(s) => s,
            Strategy::SptPack(s) => s,
            Strategy::LptPack(s) => s,
            Strategy::CfsPack(s) => s,
            Strategy::HybridPack(s) => s,
            Strategy::MilpOpt(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn PackingStrategy {
        match self {
            Strategy::SmartPack(s) => s,
            Strategy::SptPack(s) => s,
            Strategy::LptPack(s) => s,
            Strategy::CfsPack(s) => s,
            Strategy::HybridPack(s) => s,
            Strategy::MilpOpt(s) => s,
        }
    }
}

impl PackingStrategy for Strategy {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn check_capacity(&self, lot_count: usize) -> Result<(), ScheduleError> {
        self.inner().check_capacity(lot_count)
    }

    fn reorder(
        &mut self,
        lots: Vec<Lot>,
        start_time: NaiveDateTime,
        config: &Configuration,
    ) -> Result<Vec<Lot>, ScheduleError> {
        self.inner_mut().reorder(lots, start_time, config)
    }

    fn pick_next(&self, ctx: &PickContext<'_>) -> Pick {
        self.inner().pick_next(ctx)
    }

    fn solver_report(&self) -> Option<SolverReport> {
        self.inner().solver_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx<'a>(
        remaining: &'a [Lot],
        prev: Option<&'a str>,
        used: f64,
        config: &'a Configuration,
    ) -> PickContext<'a> {
        PickContext {
            remaining,
            previous_type: prev,
            block_hours_used: used,
            filler_id: 1,
            cursor: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            config,
        }
    }

    #[test]
    fn first_fit_skips_lots_that_overflow() {
        let config = Configuration::default().max_clean_hours(10.0);
        let lots = vec![Lot::new("L1", "B", 1, 5.0), Lot::new("L2", "A", 1, 1.0)];

        // 6h used with prev A: L1 needs 8 + 5, L2 needs 1
        assert_eq!(first_fit(&ctx(&lots, Some("A"), 6.0, &config)), Pick::Lot(1));
        assert_eq!(
            first_fit(&ctx(&lots, Some("A"), 9.5, &config)),
            Pick::StartNewBlock
        );
    }

    #[test]
    fn from_kind_round_trips() {
        let config = Configuration::default();
        for kind in StrategyKind::ALL {
            let strategy = Strategy::from_kind(kind, &config);
            assert_eq!(strategy.kind(), kind);
            assert_eq!(strategy.name(), kind.as_str());
        }
    }
}
