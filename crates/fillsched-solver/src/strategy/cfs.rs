//! Cluster-first, sequence-second packing
//!
//! Lots are grouped by type, clusters are ordered by a configurable key
//! (descending), and lots inside each cluster follow SPT or LPT. The picker
//! then walks that sequence linearly, packing greedily into clean blocks.

use super::{first_fit, PackingStrategy, Pick, PickContext};
use chrono::NaiveDateTime;
use fillsched_core::{CfsParams, ClusterOrder, Configuration, Lot, ScheduleError, WithinOrder};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct CfsPack {
    params: CfsParams,
}

impl CfsPack {
    pub fn new(params: CfsParams) -> Self {
        Self { params }
    }

    fn cluster_key(&self, lots: &[Lot]) -> f64 {
        match self.params.cluster_order {
            ClusterOrder::ByCount => lots.len() as f64,
            ClusterOrder::ByTotalQuantity => lots.iter().map(|l| l.quantity as f64).sum(),
            ClusterOrder::ByTotalHours => lots.iter().map(|l| l.fill_hours).sum(),
        }
    }

    fn sequence_within(&self, lots: &mut [Lot]) {
        match self.params.within {
            WithinOrder::Spt => lots.sort_by(|a, b| {
                a.fill_hours
                    .total_cmp(&b.fill_hours)
                    .then_with(|| a.lot_id.cmp(&b.lot_id))
            }),
            WithinOrder::Lpt => lots.sort_by(|a, b| {
                b.fill_hours
                    .total_cmp(&a.fill_hours)
                    .then_with(|| a.lot_id.cmp(&b.lot_id))
            }),
        }
    }
}

impl PackingStrategy for CfsPack {
    fn name(&self) -> &'static str {
        "cfs-pack"
    }

    fn reorder(
        &mut self,
        lots: Vec<Lot>,
        _start_time: NaiveDateTime,
        _config: &Configuration,
    ) -> Result<Vec<Lot>, ScheduleError> {
        // BTreeMap keeps ties between equal-key clusters ordered by type name
        let mut by_type: BTreeMap<String, Vec<Lot>> = BTreeMap::new();
        for lot in lots {
            by_type.entry(lot.lot_type.clone()).or_default().push(lot);
        }

        let mut clusters: Vec<(f64, Vec<Lot>)> = by_type
            .into_values()
            .map(|group| (self.cluster_key(&group), group))
            .collect();
        // Stable sort: descending key, type name order preserved on ties
        clusters.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut ordered = Vec::new();
        for (_, mut group) in clusters {
            self.sequence_within(&mut group);
            ordered.extend(group);
        }
        Ok(ordered)
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

    fn lots() -> Vec<Lot> {
        vec![
            Lot::new("A1", "A", 500, 1.0),
            Lot::new("B1", "B", 100, 3.0),
            Lot::new("A2", "A", 400, 2.0),
            Lot::new("C1", "C", 9000, 1.0),
            Lot::new("B2", "B", 100, 5.0),
            Lot::new("B3", "B", 100, 4.0),
        ]
    }

    fn order(params: CfsParams) -> Vec<String> {
        CfsPack::new(params)
            .reorder(lots(), start(), &Configuration::default())
            .unwrap()
            .into_iter()
            .map(|l| l.lot_id)
            .collect()
    }

    #[test]
    fn by_count_with_lpt_inside() {
        let got = order(CfsParams {
            cluster_order: ClusterOrder::ByCount,
            within: WithinOrder::Lpt,
        });
        assert_eq!(got, vec!["B2", "B3", "B1", "A2", "A1", "C1"]);
    }

    #[test]
    fn by_total_quantity_with_spt_inside() {
        let got = order(CfsParams {
            cluster_order: ClusterOrder::ByTotalQuantity,
            within: WithinOrder::Spt,
        });
        assert_eq!(got, vec!["C1", "A1", "A2", "B1", "B3", "B2"]);
    }
}
