//! Duration-ordered packers (SPT / LPT)

use super::{first_fit, PackingStrategy, Pick, PickContext};
use chrono::NaiveDateTime;
use fillsched_core::{Configuration, Lot, ScheduleError};

/// Shortest processing time first, packed greedily into clean blocks
#[derive(Clone, Copy, Debug, Default)]
pub struct SptPack;

/// Longest processing time first, packed greedily into clean blocks
#[derive(Clone, Copy, Debug, Default)]
pub struct LptPack;

impl PackingStrategy for SptPack {
    fn name(&self) -> &'static str {
        "spt-pack"
    }

    fn reorder(
        &mut self,
        mut lots: Vec<Lot>,
        _start_time: NaiveDateTime,
        _config: &Configuration,
    ) -> Result<Vec<Lot>, ScheduleError> {
        lots.sort_by(|a, b| {
            a.fill_hours
                .total_cmp(&b.fill_hours)
                .then_with(|| a.lot_id.cmp(&b.lot_id))
        });
        Ok(lots)
    }

    fn pick_next(&self, ctx: &PickContext<'_>) -> Pick {
        first_fit(ctx)
    }
}

impl PackingStrategy for LptPack {
    fn name(&self) -> &'static str {
        "lpt-pack"
    }

    fn reorder(
        &mut self,
        mut lots: Vec<Lot>,
        _start_time: NaiveDateTime,
        _config: &Configuration,
    ) -> Result<Vec<Lot>, ScheduleError> {
        lots.sort_by(|a, b| {
            b.fill_hours
                .total_cmp(&a.fill_hours)
                .then_with(|| a.lot_id.cmp(&b.lot_id))
        });
        Ok(lots)
    }

    fn pick_next(&self, ctx: &PickContext<'_>) -> Pick {
        first_fit(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn ids(lots: &[Lot]) -> Vec<&str> {
        lots.iter().map(|l| l.lot_id.as_str()).collect()
    }

    fn sample() -> Vec<Lot> {
        vec![
            Lot::new("L3", "A", 1, 4.0),
            Lot::new("L1", "B", 1, 2.0),
            Lot::new("L2", "A", 1, 4.0),
            Lot::new("L4", "C", 1, 9.0),
        ]
    }

    #[test]
    fn spt_sorts_ascending_with_id_tiebreak() {
        let ordered = SptPack
            .reorder(sample(), start(), &Configuration::default())
            .unwrap();
        assert_eq!(ids(&ordered), vec!["L1", "L2", "L3", "L4"]);
    }

    #[test]
    fn lpt_sorts_descending_with_id_tiebreak() {
        let ordered = LptPack
            .reorder(sample(), start(), &Configuration::default())
            .unwrap();
        assert_eq!(ids(&ordered), vec!["L4", "L2", "L3", "L1"]);
    }
}
