//! Smart-pack: scored greedy packing with bounded look-ahead
//!
//! Each candidate that fits the current block gets a cost combining:
//!
//! - the changeover hours from the matrix, scaled by a dynamic multiplier that
//!   grows with block utilization (late switches fragment the block)
//! - a slack-waste penalty when the capacity left behind is too small for any
//!   remaining lot
//! - a streak bonus for staying on the current type
//! - priority and delivery-window terms
//! - a packing reward equal to the fill hours placed
//!
//! The `beam_width` cheapest candidates are then each rolled out `beam_width`
//! further greedy steps on a private [`Snapshot`]; the candidate with the
//! lowest cumulative cost wins. Rollouts never touch the orchestrator state.

use super::{PackingStrategy, Pick, PickContext};
use chrono::NaiveDateTime;
use fillsched_core::{hours_to_duration, Configuration, Lot, SmartPackParams, HOURS_EPSILON};

#[derive(Clone, Debug, Default)]
pub struct SmartPack {
    params: SmartPackParams,
}

/// Immutable-by-convention copy of the block state used for rollouts
#[derive(Clone, Debug)]
struct Snapshot<'a> {
    /// Indices into `remaining` not yet placed
    pending: Vec<usize>,
    previous_type: Option<&'a str>,
    block_hours_used: f64,
    cursor: NaiveDateTime,
}

impl<'a> Snapshot<'a> {
    fn block_is_empty(&self) -> bool {
        self.previous_type.is_none() && self.block_hours_used <= HOURS_EPSILON
    }

    fn without(&self, idx: usize) -> Vec<usize> {
        self.pending.iter().copied().filter(|&i| i != idx).collect()
    }

    /// State after placing `lots[idx]`
    fn place(&self, lots: &'a [Lot], idx: usize, config: &Configuration) -> Self {
        let lot = &lots[idx];
        let need = config.changeover_hours(self.previous_type, &lot.lot_type) + lot.fill_hours;
        Self {
            pending: self.without(idx),
            previous_type: Some(lot.lot_type.as_str()),
            block_hours_used: self.block_hours_used + need,
            cursor: self.cursor + hours_to_duration(need),
        }
    }

    /// State after a CLEAN
    fn clean(&self, config: &Configuration) -> Self {
        Self {
            pending: self.pending.clone(),
            previous_type: None,
            block_hours_used: 0.0,
            cursor: self.cursor + hours_to_duration(config.clean_hours),
        }
    }
}

impl SmartPack {
    pub fn new(params: SmartPackParams) -> Self {
        Self { params }
    }

    /// Usable capacity of the block; the pad only applies once something is placed
    fn capacity(&self, snap: &Snapshot<'_>, config: &Configuration) -> f64 {
        if snap.block_is_empty() {
            config.max_clean_hours
        } else {
            config.max_clean_hours - self.params.util_pad_hours
        }
    }

    fn dynamic_multiplier(&self, block_hours_used: f64, config: &Configuration) -> f64 {
        let u = (block_hours_used / config.max_clean_hours.max(HOURS_EPSILON)).clamp(0.0, 1.0);
        let lo = self.params.dynamic_switch_mult_min;
        let hi = self.params.dynamic_switch_mult_max;
        lo + (hi - lo) * u
    }

    /// Capacity left after `used_after` that no lot in `others` can fill
    fn unusable_slack(
        &self,
        used_after: f64,
        new_prev: &str,
        others: impl Iterator<Item = usize>,
        lots: &[Lot],
        config: &Configuration,
    ) -> f64 {
        let cap = (config.max_clean_hours - used_after).max(0.0);
        if cap <= HOURS_EPSILON {
            return 0.0;
        }
        let min_need = others
            .map(|i| config.changeover_hours(Some(new_prev), &lots[i].lot_type) + lots[i].fill_hours)
            .fold(f64::INFINITY, f64::min);
        if min_need.is_finite() && min_need > cap + HOURS_EPSILON {
            cap
        } else {
            0.0
        }
    }

    /// Cost of placing `lots[idx]` on `snap`; `None` when it does not fit
    fn cost(
        &self,
        snap: &Snapshot<'_>,
        lots: &[Lot],
        idx: usize,
        config: &Configuration,
    ) -> Option<f64> {
        let lot = &lots[idx];
        let changeover = config.changeover_hours(snap.previous_type, &lot.lot_type);
        let need = changeover + lot.fill_hours;
        if snap.block_hours_used + need > self.capacity(snap, config) + HOURS_EPSILON {
            return None;
        }

        let switch = changeover * self.dynamic_multiplier(snap.block_hours_used, config);
        let slack = self.unusable_slack(
            snap.block_hours_used + need,
            &lot.lot_type,
            snap.pending.iter().copied().filter(|&i| i != idx),
            lots,
            config,
        );
        let streak = if snap.previous_type == Some(lot.lot_type.as_str()) {
            self.params.streak_bonus
        } else {
            0.0
        };
        let priority = self.params.priority_weight * config.priority_weight(lot.priority.as_deref());
        let window = if config.window_penalty_weight > 0.0 && lot.has_window() {
            let start = snap.cursor + hours_to_duration(changeover);
            let end = start + hours_to_duration(lot.fill_hours);
            config.window_penalty_weight * lot.window_deviation_hours(start, end)
        } else {
            0.0
        };

        Some(switch + self.params.slack_waste_weight * slack - streak - priority + window - lot.fill_hours)
    }

    /// Cheapest fitting candidate on `snap`, ties to the earliest index
    fn greedy(&self, snap: &Snapshot<'_>, lots: &[Lot], config: &Configuration) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for &idx in &snap.pending {
            if let Some(c) = self.cost(snap, lots, idx, config) {
                if best.map_or(true, |(_, b)| c < b) {
                    best = Some((idx, c));
                }
            }
        }
        best
    }

    /// Cumulative cost of `depth` greedy steps from `snap`
    fn rollout<'a>(
        &self,
        snap: Snapshot<'a>,
        lots: &'a [Lot],
        config: &Configuration,
        depth: usize,
    ) -> f64 {
        if depth == 0 || snap.pending.is_empty() {
            return 0.0;
        }
        match self.greedy(&snap, lots, config) {
            Some((idx, cost)) => cost + self.rollout(snap.place(lots, idx, config), lots, config, depth - 1),
            None if snap.block_is_empty() => 0.0,
            None => {
                let wasted = (config.max_clean_hours - snap.block_hours_used).max(0.0);
                self.params.slack_waste_weight * wasted
                    + self.rollout(snap.clean(config), lots, config, depth - 1)
            }
        }
    }
}

impl PackingStrategy for SmartPack {
    fn name(&self) -> &'static str {
        "smart-pack"
    }

    fn pick_next(&self, ctx: &PickContext<'_>) -> Pick {
        let lots = ctx.remaining;
        let config = ctx.config;
        let snap = Snapshot {
            pending: (0..lots.len()).collect(),
            previous_type: ctx.previous_type,
            block_hours_used: ctx.block_hours_used,
            cursor: ctx.cursor,
        };

        let mut scored: Vec<(usize, f64)> = snap
            .pending
            .iter()
            .filter_map(|&idx| self.cost(&snap, lots, idx, config).map(|c| (idx, c)))
            .collect();
        if scored.is_empty() {
            return Pick::StartNewBlock;
        }
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        let width = self.params.beam_width.max(1);
        let mut best: Option<(usize, f64)> = None;
        for &(idx, base) in scored.iter().take(width) {
            let total = base + self.rollout(snap.place(lots, idx, config), lots, config, width);
            if best.map_or(true, |(_, b)| total < b - HOURS_EPSILON) {
                best = Some((idx, total));
            }
        }

        best.map_or(Pick::StartNewBlock, |(idx, _)| Pick::Lot(idx))
    }
}
