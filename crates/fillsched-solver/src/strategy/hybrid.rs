//! Hybrid packing: type-streak bonus combined with an SPT bias

use super::{PackingStrategy, Pick, PickContext};
use fillsched_core::{hours_to_duration, HybridParams, Lot};

#[derive(Clone, Debug, Default)]
pub struct HybridPack {
    params: HybridParams,
}

impl HybridPack {
    pub fn new(params: HybridParams) -> Self {
        Self { params }
    }

    /// Weighted score of placing `lot` next; higher is better
    fn score(&self, ctx: &PickContext<'_>, lot: &Lot) -> f64 {
        let changeover = ctx.config.changeover_hours(ctx.previous_type, &lot.lot_type);
        let same_type = ctx.previous_type == Some(lot.lot_type.as_str());

        let mut score = -self.params.spt_weight * lot.fill_hours
            - self.params.switch_penalty_multiplier * changeover;
        if same_type {
            score += self.params.same_type_bonus;
        }
        if ctx.config.window_penalty_weight > 0.0 && lot.has_window() {
            let start = ctx.cursor + hours_to_duration(changeover);
            let end = start + hours_to_duration(lot.fill_hours);
            score -= ctx.config.window_penalty_weight * lot.window_deviation_hours(start, end);
        }
        score
    }
}

impl PackingStrategy for HybridPack {
    fn name(&self) -> &'static str {
        "hybrid-pack"
    }

    fn pick_next(&self, ctx: &PickContext<'_>) -> Pick {
        let mut best: Option<(usize, f64)> = None;
        for (idx, lot) in ctx.remaining.iter().enumerate() {
            if !ctx.fits(lot) {
                continue;
            }
            let score = self.score(ctx, lot);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }
        best.map_or(Pick::StartNewBlock, |(idx, _)| Pick::Lot(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use fillsched_core::Configuration;

    fn cursor() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn pick(lots: &[Lot], prev: Option<&str>, used: f64, config: &Configuration) -> Pick {
        let ctx = PickContext {
            remaining: lots,
            previous_type: prev,
            block_hours_used: used,
            filler_id: 1,
            cursor: cursor(),
            config,
        };
        HybridPack::new(config.hybrid.clone()).pick_next(&ctx)
    }

    #[test]
    fn prefers_same_type_over_shorter_switch() {
        let config = Configuration::default();
        let lots = vec![Lot::new("B1", "B", 1, 1.0), Lot::new("A1", "A", 1, 3.0)];
        // A1: 2.0 - 1.5 = 0.5; B1: -0.5 - 8.8 = -9.3
        assert_eq!(pick(&lots, Some("A"), 0.0, &config), Pick::Lot(1));
    }

    #[test]
    fn prefers_shorter_lot_on_fresh_block() {
        let config = Configuration::default();
        let lots = vec![Lot::new("L1", "A", 1, 6.0), Lot::new("L2", "B", 1, 2.0)];
        assert_eq!(pick(&lots, None, 0.0, &config), Pick::Lot(1));
    }

    #[test]
    fn closes_block_when_nothing_fits() {
        let config = Configuration::default().max_clean_hours(10.0);
        let lots = vec![Lot::new("L1", "A", 1, 6.0)];
        assert_eq!(pick(&lots, Some("A"), 5.0, &config), Pick::StartNewBlock);
    }
}
