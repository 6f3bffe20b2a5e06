//! Schedule KPIs
//!
//! | KPI | Definition |
//! |-----|------------|
//! | makespan | end of last activity - schedule start |
//! | utilization | fill hours / (makespan * fillers) |
//! | window violations | FILLs outside their lot's target window |

use chrono::NaiveDateTime;
use fillsched_core::{
    duration_to_hours, Activity, ActivityKind, Configuration, KpiSummary, Lot,
};
use std::collections::HashMap;

/// Compute the KPI summary of a produced schedule
pub fn compute(
    activities: &[Activity],
    start_time: NaiveDateTime,
    lots: &[Lot],
    config: &Configuration,
) -> KpiSummary {
    let mut kpis = KpiSummary::default();
    let by_id: HashMap<&str, &Lot> = lots.iter().map(|l| (l.lot_id.as_str(), l)).collect();

    for act in activities {
        let hours = act.duration_hours();
        match act.kind {
            ActivityKind::Fill => {
                kpis.total_fill_hours += hours;
                kpis.lots_scheduled += 1;
                let lot = act.lot_id.as_deref().and_then(|id| by_id.get(id));
                if lot.is_some_and(|l| l.violates_window(act.start, act.end)) {
                    kpis.window_violations += 1;
                }
            }
            ActivityKind::Clean => {
                kpis.total_clean_hours += hours;
                kpis.clean_blocks += 1;
            }
            ActivityKind::Changeover => kpis.total_changeover_hours += hours,
            ActivityKind::Idle => kpis.total_idle_hours += hours,
        }
    }

    kpis.makespan_hours = activities
        .iter()
        .map(|a| a.end)
        .max()
        .map_or(0.0, |end| duration_to_hours(end - start_time).max(0.0));

    let capacity = kpis.makespan_hours * config.num_fillers.max(1) as f64;
    kpis.utilization = if capacity > 0.0 {
        kpis.total_fill_hours / capacity
    } else {
        0.0
    };

    kpis
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fillsched_core::hours_to_duration;
    use pretty_assertions::assert_eq;

    fn at(h: f64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + hours_to_duration(h)
    }

    #[test]
    fn sums_by_kind() {
        let lots = vec![
            Lot::new("L1", "A", 1, 2.0),
            Lot::new("L2", "B", 1, 2.0).window(None, Some(at(30.0))),
        ];
        let acts = vec![
            Activity::new(ActivityKind::Clean, 1, at(0.0), at(24.0)),
            Activity::fill(&lots[0], 1, at(24.0), at(26.0)),
            Activity::new(ActivityKind::Changeover, 1, at(26.0), at(34.0)),
            Activity::fill(&lots[1], 1, at(34.0), at(36.0)),
        ];

        let kpis = compute(&acts, at(0.0), &lots, &Configuration::default());
        assert_eq!(kpis.lots_scheduled, 2);
        assert_eq!(kpis.clean_blocks, 1);
        assert_eq!(kpis.window_violations, 1);
        assert!((kpis.makespan_hours - 36.0).abs() < 1e-9);
        assert!((kpis.total_changeover_hours - 8.0).abs() < 1e-9);
        assert!((kpis.utilization - 4.0 / 36.0).abs() < 1e-9);
    }

    #[test]
    fn empty_schedule_has_zero_utilization() {
        let kpis = compute(&[], at(0.0), &[], &Configuration::default());
        assert_eq!(kpis, KpiSummary::default());
    }
}
