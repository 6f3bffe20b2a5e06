//! Schedule properties that must hold for every strategy
//!
//! Each heuristic runs on a generated lot set with one and two fillers, with
//! and without lot spacing, and the produced timeline is checked directly
//! (not only through the built-in validator). The exact strategy runs the
//! same checks on a smaller set, solved once and shared between tests.

use chrono::{NaiveDate, NaiveDateTime};
use fillsched_core::{
    Activity, ActivityKind, Configuration, FillerId, Lot, ScheduleResult, StrategyKind,
};
use fillsched_solver::schedule;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

const EPS: f64 = 1e-6;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 3)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap()
}

/// Deterministic lot set: 4 types, fill hours between 1 and 20
fn generated_lots(count: usize, seed: u64) -> Vec<Lot> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 33) as u32
    };
    let types = ["VialE", "VialH", "VialF", "VialX"];
    (0..count)
        .map(|i| {
            let ty = types[(next() as usize) % types.len()];
            let hours = 1.0 + f64::from(next() % 1_900) / 100.0;
            Lot::new(format!("L{:03}", i + 1), ty, 10_000 + i64::from(next() % 90_000), hours)
        })
        .collect()
}

fn configs() -> Vec<Configuration> {
    let base = Configuration::default()
        .max_clean_hours(48.0)
        .changeover("VialE", "VialH", 4.0)
        .changeover("VialH", "VialE", 6.0)
        .changeover("VialF", "VialX", 0.0);
    vec![
        base.clone(),
        base.clone().fillers(2),
        base.clone().min_lot_spacing(0.5),
        base.fillers(3).min_lot_spacing(2.0).initial_clean(false),
    ]
}

fn heuristics() -> impl Iterator<Item = StrategyKind> {
    StrategyKind::ALL.into_iter().filter(|k| !k.is_exact())
}

fn exact_configs() -> Vec<Configuration> {
    let mut base = Configuration::default()
        .max_clean_hours(48.0)
        .changeover("VialE", "VialH", 4.0)
        .changeover("VialH", "VialE", 6.0)
        .changeover("VialF", "VialX", 0.0);
    base.milp.time_limit_secs = 20;
    vec![
        base.clone(),
        base.clone().fillers(2),
        base.clone().min_lot_spacing(0.5),
        base.fillers(2).min_lot_spacing(2.0),
    ]
}

struct ExactRun {
    label: String,
    lots: Vec<Lot>,
    config: Configuration,
    result: ScheduleResult,
}

fn exact_runs() -> &'static [ExactRun] {
    static RUNS: OnceLock<Vec<ExactRun>> = OnceLock::new();
    RUNS.get_or_init(|| {
        let lots = generated_lots(8, 11);
        exact_configs()
            .into_iter()
            .enumerate()
            .map(|(i, config)| {
                let label = format!("{} / config #{i}", StrategyKind::MilpOpt);
                let result = schedule(lots.clone(), start(), &config, StrategyKind::MilpOpt)
                    .unwrap_or_else(|e| panic!("{label}: {e}"));
                ExactRun {
                    label,
                    lots: lots.clone(),
                    config,
                    result,
                }
            })
            .collect()
    })
}

fn per_filler(result: &ScheduleResult) -> BTreeMap<FillerId, Vec<&Activity>> {
    let mut map: BTreeMap<FillerId, Vec<&Activity>> = BTreeMap::new();
    for act in &result.activities {
        map.entry(act.filler_id).or_default().push(act);
    }
    for acts in map.values_mut() {
        acts.sort_by_key(|a| a.start);
    }
    map
}

fn each_run(mut check: impl FnMut(&str, &[Lot], &Configuration, &ScheduleResult)) {
    let lots = generated_lots(25, 7);
    for (i, config) in configs().iter().enumerate() {
        for kind in heuristics() {
            let label = format!("{kind} / config #{i}");
            let result = schedule(lots.clone(), start(), config, kind)
                .unwrap_or_else(|e| panic!("{label}: {e}"));
            check(&label, &lots, config, &result);
        }
    }
    for run in exact_runs() {
        check(&run.label, &run.lots, &run.config, &run.result);
    }
}

#[test]
fn built_in_validation_passes() {
    each_run(|label, _, _, result| {
        assert!(
            result.validation.is_valid(),
            "{label}: {:?}",
            result.validation.errors
        );
    });
}

#[test]
fn every_lot_filled_exactly_once() {
    each_run(|label, lots, _, result| {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for act in result.activities.iter().filter(|a| a.is_fill()) {
            *counts.entry(act.lot_id.as_deref().unwrap()).or_default() += 1;
        }
        assert_eq!(counts.len(), lots.len(), "{label}");
        assert!(counts.values().all(|&n| n == 1), "{label}");
        assert_eq!(result.kpis.lots_scheduled, lots.len(), "{label}");
    });
}

#[test]
fn activities_never_overlap_on_a_filler() {
    each_run(|label, _, config, result| {
        for (filler, acts) in per_filler(result) {
            assert!(filler >= 1 && filler <= config.num_fillers, "{label}");
            for pair in acts.windows(2) {
                assert!(pair[0].end <= pair[1].start, "{label}: filler {filler}");
                // contiguous: gaps are explicit IDLE activities
                assert_eq!(pair[0].end, pair[1].start, "{label}: filler {filler}");
            }
        }
    });
}

#[test]
fn blocks_respect_capacity() {
    each_run(|label, _, config, result| {
        for (filler, acts) in per_filler(result) {
            let mut used = 0.0;
            for act in acts {
                match act.kind {
                    ActivityKind::Clean => used = 0.0,
                    ActivityKind::Fill | ActivityKind::Changeover => {
                        used += act.duration_hours();
                        assert!(
                            used <= config.max_clean_hours + EPS,
                            "{label}: filler {filler} block at {used}"
                        );
                    }
                    ActivityKind::Idle => {}
                }
            }
        }
    });
}

#[test]
fn changeovers_match_the_matrix() {
    each_run(|label, _, config, result| {
        for (filler, acts) in per_filler(result) {
            let mut prev: Option<&str> = None;
            let mut setup = 0.0;
            for act in acts {
                match act.kind {
                    ActivityKind::Clean => {
                        prev = None;
                        setup = 0.0;
                    }
                    ActivityKind::Changeover => setup += act.duration_hours(),
                    ActivityKind::Idle => {}
                    ActivityKind::Fill => {
                        let ty = act.lot_type.as_deref().unwrap();
                        let expected = config.changeover_hours(prev, ty);
                        assert!(
                            (setup - expected).abs() < EPS,
                            "{label}: filler {filler} {prev:?}->{ty} took {setup}, expected {expected}"
                        );
                        prev = Some(ty);
                        setup = 0.0;
                    }
                }
            }
        }
    });
}

#[test]
fn spacing_is_honoured_between_fills() {
    each_run(|label, _, config, result| {
        if config.min_lot_spacing_hours <= 0.0 {
            return;
        }
        for (filler, acts) in per_filler(result) {
            let fills: Vec<&&Activity> = acts.iter().filter(|a| a.is_fill()).collect();
            for pair in fills.windows(2) {
                let gap = fillsched_core::duration_to_hours(pair[1].start - pair[0].end);
                assert!(
                    gap + EPS >= config.min_lot_spacing_hours,
                    "{label}: filler {filler} gap {gap}"
                );
            }
        }
    });
}

#[test]
fn kpis_add_up() {
    each_run(|label, lots, config, result| {
        let k = &result.kpis;
        let fill: f64 = lots.iter().map(|l| l.fill_hours).sum();
        assert!((k.total_fill_hours - fill).abs() < 1e-4, "{label}");
        let busy = k.total_fill_hours + k.total_clean_hours + k.total_changeover_hours + k.total_idle_hours;
        assert!(busy <= k.makespan_hours * config.num_fillers as f64 + 1e-4, "{label}");
        assert!(k.utilization > 0.0 && k.utilization <= 1.0, "{label}");
    });
}

#[test]
fn exact_objective_prices_the_emitted_schedule() {
    for run in exact_runs() {
        let (config, result) = (&run.config, &run.result);
        let report = result.solver.as_ref().expect("exact runs carry a solver report");

        let minutes = |hours: f64| (hours * 60.0).round() as i64;
        let used: BTreeSet<FillerId> = result
            .activities
            .iter()
            .filter(|a| a.is_fill())
            .map(|a| a.filler_id)
            .collect();
        let opening = if config.initial_clean { used.len() } else { 0 };
        let extra_cleans = (result.kpis.clean_blocks - opening) as i64;
        let emitted = minutes(result.kpis.total_changeover_hours)
            + minutes(config.clean_hours) * extra_cleans;

        assert_eq!(report.objective, emitted, "{}", run.label);
    }
}
