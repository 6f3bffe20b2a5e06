//! Exact strategy: lot-to-slot assignment as a 0-1 integer program
//!
//! # Model
//!
//! All times are integer minutes. For `n` lots, `F` fillers and `n` slots per
//! filler:
//!
//! - **Variables**
//!   - `x[i][f][k]` = 1 if lot `i` occupies slot `k` of filler `f`
//!   - `u[f][k]` slot occupied, `t[f][k][type]` type of the slot
//!   - `c[f][k]` a CLEAN precedes slot `k` (k >= 1)
//!   - `z[f][k][a][b]` slot `k-1` has type `a`, slot `k` type `b`, no clean between
//!   - `load[f][k]` block hours used after slot `k`
//!   - `st[f][k]`, `v[i]` start times and window misses (only with a window penalty)
//!   - `idle[f][k]` spacing pad before slot `k`, exactly `max(0, shortfall)`
//! - **Constraints**
//!   - every lot in exactly one (filler, slot); at most one lot per slot
//!   - occupied slots are a prefix of each filler's slot list
//!   - `load` accumulates fill + changeover, resets on a clean, stays within
//!     `max_clean_hours`
//! - **Objective**: changeover minutes + clean penalty per extra CLEAN +
//!   window penalty per missed window
//!
//! The decoded plan carries both the slot order and the `c` values, so the
//! orchestrator emits exactly the blocks the model priced. Fill and changeover
//! minutes round up and the block window rounds down, keeping planned blocks
//! within the real limit.
//!
//! The solver runs under a wall-clock [`TimeBudget`]. A timed-out search that
//! holds an incumbent yields a plan flagged [`SolverStatus::Feasible`].

use super::{PackingStrategy, Pick, PickContext};
use chrono::NaiveDateTime;
use fillsched_core::{
    duration_to_hours, Configuration, FillerId, Lot, LotId, MilpParams, ScheduleError,
    SolverReport, SolverStatus,
};
use pumpkin_solver::constraints as cp;
use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::results::{OptimisationResult, ProblemSolution};
use pumpkin_solver::termination::TimeBudget;
use pumpkin_solver::variables::TransformableVariable;
use pumpkin_solver::Solver;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the exact model placed one lot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedSlot {
    pub filler_id: FillerId,
    /// Position within the filler's sequence
    pub slot: usize,
    /// A CLEAN is planned directly before this lot
    pub new_block: bool,
}

/// Decoded solution of the exact model
#[derive(Clone, Debug)]
pub struct MilpPlan {
    pub slots: HashMap<LotId, PlannedSlot>,
    pub objective: i64,
    pub status: SolverStatus,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct MilpOpt {
    params: MilpParams,
    plan: Option<MilpPlan>,
}

impl MilpOpt {
    pub fn new(params: MilpParams) -> Self {
        Self { params, plan: None }
    }

    pub fn plan(&self) -> Option<&MilpPlan> {
        self.plan.as_ref()
    }
}

impl PackingStrategy for MilpOpt {
    fn name(&self) -> &'static str {
        "milp-opt"
    }

    fn check_capacity(&self, lot_count: usize) -> Result<(), ScheduleError> {
        if lot_count > self.params.max_lots {
            return Err(ScheduleError::CapacityExceeded {
                lots: lot_count,
                ceiling: self.params.max_lots,
            });
        }
        Ok(())
    }

    fn reorder(
        &mut self,
        mut lots: Vec<Lot>,
        start_time: NaiveDateTime,
        config: &Configuration,
    ) -> Result<Vec<Lot>, ScheduleError> {
        self.check_capacity(lots.len())?;

        let plan = solve(&lots, start_time, config, &self.params)?;
        lots.sort_by_key(|lot| {
            plan.slots
                .get(&lot.lot_id)
                .map_or((usize::MAX, usize::MAX), |s| (s.filler_id, s.slot))
        });
        self.plan = Some(plan);
        Ok(lots)
    }

    fn pick_next(&self, ctx: &PickContext<'_>) -> Pick {
        let Some(plan) = &self.plan else {
            return super::first_fit(ctx);
        };

        let next = ctx
            .remaining
            .iter()
            .enumerate()
            .filter_map(|(idx, lot)| {
                plan.slots
                    .get(&lot.lot_id)
                    .filter(|s| s.filler_id == ctx.filler_id)
                    .map(|s| (idx, *s))
            })
            .min_by_key(|(_, s)| s.slot);

        match next {
            None => Pick::Release,
            Some((_, slot)) if slot.new_block && !ctx.block_is_empty() => Pick::StartNewBlock,
            Some((idx, _)) if ctx.fits(&ctx.remaining[idx]) || ctx.block_is_empty() => {
                Pick::Lot(idx)
            }
            Some(_) => Pick::StartNewBlock,
        }
    }

    fn solver_report(&self) -> Option<SolverReport> {
        self.plan.as_ref().map(|plan| SolverReport {
            status: plan.status,
            objective: plan.objective,
            elapsed_ms: plan.elapsed.as_millis(),
        })
    }
}

fn minutes(hours: f64) -> i32 {
    (hours * 60.0).round() as i32
}

fn minutes_up(hours: f64) -> i32 {
    (hours * 60.0 - 1e-6).ceil() as i32
}

fn minutes_down(hours: f64) -> i32 {
    (hours * 60.0 + 1e-6).floor() as i32
}

/// Penalty weight in objective minutes; any positive weight stays active
fn penalty_minutes(weight: f64) -> i32 {
    if weight > 0.0 {
        minutes(weight).max(1)
    } else {
        0
    }
}

/// Build and solve the assignment model
fn solve(
    lots: &[Lot],
    start_time: NaiveDateTime,
    config: &Configuration,
    params: &MilpParams,
) -> Result<MilpPlan, ScheduleError> {
    let started = Instant::now();
    let n = lots.len();
    let fillers = config.num_fillers;
    let slots = n;

    let window = minutes_down(config.max_clean_hours);
    let clean = minutes(config.clean_hours);
    let spacing = minutes(config.min_lot_spacing_hours);
    let clean_penalty = minutes(params.clean_penalty_hours.unwrap_or(config.clean_hours));
    let window_penalty = penalty_minutes(config.window_penalty_weight);
    let fill: Vec<i32> = lots.iter().map(|l| minutes_up(l.fill_hours).max(1)).collect();

    // Distinct types, in name order
    let types: Vec<&str> = lots
        .iter()
        .map(|l| l.lot_type.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let type_of: Vec<usize> = lots
        .iter()
        .map(|l| types.iter().position(|t| *t == l.lot_type).unwrap_or(0))
        .collect();

    // Positive changeover pairs (a, b, minutes)
    let pairs: Vec<(usize, usize, i32)> = (0..types.len())
        .flat_map(|a| (0..types.len()).map(move |b| (a, b)))
        .filter(|(a, b)| a != b)
        .map(|(a, b)| {
            let hours = config.changeover_hours(Some(types[a]), types[b]);
            (a, b, minutes_up(hours))
        })
        .filter(|(_, _, m)| *m > 0)
        .collect();
    let max_changeover = pairs.iter().map(|p| p.2).max().unwrap_or(0);

    let windowed: Vec<usize> = if window_penalty > 0 {
        (0..n).filter(|&i| lots[i].has_window()).collect()
    } else {
        Vec::new()
    };

    info!(
        lots = n,
        fillers,
        types = types.len(),
        windowed = windowed.len(),
        "building exact assignment model"
    );

    let mut solver = Solver::default();
    let tag = solver.new_constraint_tag();

    // x[i][f][k]
    let x: Vec<Vec<Vec<_>>> = (0..n)
        .map(|_| {
            (0..fillers)
                .map(|_| (0..slots).map(|_| solver.new_bounded_integer(0, 1)).collect())
                .collect()
        })
        .collect();
    let u: Vec<Vec<_>> = (0..fillers)
        .map(|_| (0..slots).map(|_| solver.new_bounded_integer(0, 1)).collect())
        .collect();
    let t: Vec<Vec<Vec<_>>> = (0..fillers)
        .map(|_| {
            (0..slots)
                .map(|_| (0..types.len()).map(|_| solver.new_bounded_integer(0, 1)).collect())
                .collect()
        })
        .collect();
    // c[f][0] is never a decision: slot 0 opens the first block
    let c: Vec<Vec<_>> = (0..fillers)
        .map(|_| {
            (0..slots)
                .map(|k| solver.new_bounded_integer(0, i32::from(k > 0)))
                .collect()
        })
        .collect();
    let load: Vec<Vec<_>> = (0..fillers)
        .map(|_| (0..slots).map(|_| solver.new_bounded_integer(0, window)).collect())
        .collect();
    // z[f][k][p] for pair index p, k >= 1
    let z: Vec<Vec<Vec<_>>> = (0..fillers)
        .map(|_| {
            (0..slots)
                .map(|k| {
                    if k == 0 {
                        Vec::new()
                    } else {
                        pairs.iter().map(|_| solver.new_bounded_integer(0, 1)).collect()
                    }
                })
                .collect()
        })
        .collect();

    // Each lot exactly once
    for x_i in &x {
        let terms: Vec<_> = x_i.iter().flatten().map(|v| v.scaled(1)).collect();
        let _ = solver.add_constraint(cp::equals(terms, 1, tag)).post();
    }

    for f in 0..fillers {
        for k in 0..slots {
            // Occupancy: u = sum_i x
            let mut terms: Vec<_> = (0..n).map(|i| x[i][f][k].scaled(1)).collect();
            terms.push(u[f][k].scaled(-1));
            let _ = solver.add_constraint(cp::equals(terms, 0, tag)).post();

            // Type occupancy: t[type] = sum of x over lots of that type
            for (ty, t_var) in t[f][k].iter().enumerate() {
                let mut terms: Vec<_> = (0..n)
                    .filter(|&i| type_of[i] == ty)
                    .map(|i| x[i][f][k].scaled(1))
                    .collect();
                terms.push(t_var.scaled(-1));
                let _ = solver.add_constraint(cp::equals(terms, 0, tag)).post();
            }

            if k > 0 {
                // Used slots form a prefix
                let terms = vec![u[f][k].scaled(1), u[f][k - 1].scaled(-1)];
                let _ = solver.add_constraint(cp::less_than_or_equals(terms, 0, tag)).post();

                // A clean only precedes an occupied slot
                let terms = vec![c[f][k].scaled(1), u[f][k].scaled(-1)];
                let _ = solver.add_constraint(cp::less_than_or_equals(terms, 0, tag)).post();

                // z = t[k-1][a] AND t[k][b] AND NOT c[k]
                for (p, &(a, b, _)) in pairs.iter().enumerate() {
                    let zv = z[f][k][p];
                    let terms = vec![zv.scaled(1), t[f][k - 1][a].scaled(-1)];
                    let _ = solver.add_constraint(cp::less_than_or_equals(terms, 0, tag)).post();
                    let terms = vec![zv.scaled(1), t[f][k][b].scaled(-1)];
                    let _ = solver.add_constraint(cp::less_than_or_equals(terms, 0, tag)).post();
                    let terms = vec![zv.scaled(1), c[f][k].scaled(1)];
                    let _ = solver.add_constraint(cp::less_than_or_equals(terms, 1, tag)).post();
                    let terms = vec![
                        t[f][k - 1][a].scaled(1),
                        t[f][k][b].scaled(1),
                        c[f][k].scaled(-1),
                        zv.scaled(-1),
                    ];
                    let _ = solver.add_constraint(cp::less_than_or_equals(terms, 1, tag)).post();
                }
            }

            // Block load: load[k] >= load[k-1] + fill[k] + changeover[k] - window * c[k]
            let mut terms = vec![load[f][k].scaled(1)];
            terms.extend((0..n).map(|i| x[i][f][k].scaled(-fill[i])));
            if k > 0 {
                terms.push(load[f][k - 1].scaled(-1));
                terms.push(c[f][k].scaled(window));
                terms.extend(pairs.iter().enumerate().map(|(p, pair)| z[f][k][p].scaled(-pair.2)));
            }
            let _ = solver.add_constraint(cp::greater_than_or_equals(terms, 0, tag)).post();

            // A lot alone still has to fit
            let mut terms = vec![load[f][k].scaled(1)];
            terms.extend((0..n).map(|i| x[i][f][k].scaled(-fill[i])));
            let _ = solver.add_constraint(cp::greater_than_or_equals(terms, 0, tag)).post();
        }
    }

    // Start times and window misses
    let mut v = Vec::new();
    if !windowed.is_empty() {
        let initial = if config.initial_clean { clean } else { 0 };
        let horizon = initial
            + fill.iter().sum::<i32>()
            + (n as i32) * (clean + max_changeover + spacing)
            + 1;
        let st: Vec<Vec<_>> = (0..fillers)
            .map(|_| {
                (0..slots)
                    .map(|k| {
                        if k == 0 {
                            solver.new_bounded_integer(initial, initial)
                        } else {
                            solver.new_bounded_integer(0, horizon)
                        }
                    })
                    .collect()
            })
            .collect();

        for f in 0..fillers {
            for k in 1..slots {
                // st[k] = st[k-1] + fill[k-1] + clean*c[k] + changeover[k] + idle[k]
                let mut terms = vec![st[f][k].scaled(1), st[f][k - 1].scaled(-1)];
                terms.extend((0..n).map(|i| x[i][f][k - 1].scaled(-fill[i])));
                terms.push(c[f][k].scaled(-clean));
                terms.extend(pairs.iter().enumerate().map(|(p, pair)| z[f][k][p].scaled(-pair.2)));
                if spacing > 0 {
                    // idle = max(0, shortfall), shortfall = spacing*u - clean*c - changeover;
                    // `pad` selects the positive branch
                    let idle = solver.new_bounded_integer(0, spacing);
                    let pad = solver.new_bounded_integer(0, 1);
                    let big = spacing + clean + max_changeover;
                    terms.push(idle.scaled(-1));

                    let mut shortfall = vec![
                        idle.scaled(1),
                        u[f][k].scaled(-spacing),
                        c[f][k].scaled(clean),
                    ];
                    shortfall.extend(pairs.iter().enumerate().map(|(p, pair)| z[f][k][p].scaled(pair.2)));
                    let _ = solver
                        .add_constraint(cp::greater_than_or_equals(shortfall.clone(), 0, tag))
                        .post();
                    shortfall.push(pad.scaled(big));
                    let _ = solver
                        .add_constraint(cp::less_than_or_equals(shortfall, big, tag))
                        .post();
                    let off = vec![idle.scaled(1), pad.scaled(-spacing)];
                    let _ = solver
                        .add_constraint(cp::less_than_or_equals(off, 0, tag))
                        .post();
                }
                let _ = solver.add_constraint(cp::equals(terms, 0, tag)).post();
            }
        }

        let offset = |at: NaiveDateTime| minutes(duration_to_hours(at - start_time));
        let max_offset = windowed
            .iter()
            .flat_map(|&i| [lots[i].target_start, lots[i].target_end])
            .flatten()
            .map(|at| offset(at).abs())
            .max()
            .unwrap_or(0);
        let big = horizon + max_offset + fill.iter().copied().max().unwrap_or(0) + 1;

        for &i in &windowed {
            let miss = solver.new_bounded_integer(0, 1);
            let earliest = lots[i].target_start.map(offset).filter(|ts| *ts > 0);
            let latest = lots[i].target_end.map(offset);
            for f in 0..fillers {
                for k in 0..slots {
                    if let Some(ts) = earliest {
                        // x = 1 and miss = 0  =>  st >= ts
                        let terms = vec![
                            st[f][k].scaled(1),
                            x[i][f][k].scaled(-big),
                            miss.scaled(big),
                        ];
                        let _ = solver
                            .add_constraint(cp::greater_than_or_equals(terms, ts - big, tag))
                            .post();
                    }
                    if let Some(te) = latest {
                        // x = 1 and miss = 0  =>  st + fill <= te
                        let terms = vec![
                            st[f][k].scaled(1),
                            x[i][f][k].scaled(big),
                            miss.scaled(-big),
                        ];
                        let _ = solver
                            .add_constraint(cp::less_than_or_equals(terms, te - fill[i] + big, tag))
                            .post();
                    }
                }
            }
            v.push(miss);
        }
    }

    // Objective
    let upper = (n as i32) * (max_changeover + clean_penalty) + window_penalty * (v.len() as i32);
    let objective = solver.new_bounded_integer(0, upper.max(0));
    let mut terms = vec![objective.scaled(1)];
    for f in 0..fillers {
        for k in 1..slots {
            terms.extend(pairs.iter().enumerate().map(|(p, pair)| z[f][k][p].scaled(-pair.2)));
            if clean_penalty > 0 {
                terms.push(c[f][k].scaled(-clean_penalty));
            }
        }
    }
    terms.extend(v.iter().map(|miss| miss.scaled(-window_penalty)));
    let _ = solver.add_constraint(cp::equals(terms, 0, tag)).post();

    debug!(
        assignment_vars = n * fillers * slots,
        changeover_pairs = pairs.len(),
        objective_upper = upper,
        "model built"
    );

    let mut brancher = solver.default_brancher();
    let mut termination =
        TimeBudget::starting_now(Duration::from_secs(params.time_limit_secs.max(1)));

    fn noop_callback<B>(_: &Solver, _: pumpkin_solver::results::SolutionReference, _: &B) {}
    let result = solver.optimise(
        &mut brancher,
        &mut termination,
        LinearSatUnsat::new(OptimisationDirection::Minimise, objective, noop_callback),
    );

    let (status, values, objective_value) = match result {
        OptimisationResult::Optimal(solution) => (
            SolverStatus::Optimal,
            decode(&x, &c, |var| solution.get_integer_value(var)),
            solution.get_integer_value(objective),
        ),
        OptimisationResult::Satisfiable(solution) => (
            SolverStatus::Feasible,
            decode(&x, &c, |var| solution.get_integer_value(var)),
            solution.get_integer_value(objective),
        ),
        OptimisationResult::Unsatisfiable => {
            return Err(ScheduleError::SolverFailure(
                "assignment model is infeasible".to_string(),
            ));
        }
        OptimisationResult::Unknown => {
            return Err(ScheduleError::SolverTimeout {
                seconds: params.time_limit_secs,
            });
        }
    };

    let mut plan_slots = HashMap::with_capacity(n);
    for (lot, planned) in lots.iter().zip(values) {
        let Some(planned) = planned else {
            return Err(ScheduleError::InternalInvariantViolation(format!(
                "solution leaves lot {} unassigned",
                lot.lot_id
            )));
        };
        plan_slots.insert(lot.lot_id.clone(), planned);
    }

    let elapsed = started.elapsed();
    if status == SolverStatus::Feasible {
        warn!(
            objective = objective_value,
            elapsed_ms = elapsed.as_millis() as u64,
            "time limit reached; optimality not proven"
        );
    } else {
        info!(
            objective = objective_value,
            elapsed_ms = elapsed.as_millis() as u64,
            "exact model solved to optimality"
        );
    }

    Ok(MilpPlan {
        slots: plan_slots,
        objective: i64::from(objective_value),
        status,
        elapsed,
    })
}

/// Planned slot of every lot, read from the assignment and clean variables
fn decode<V: Copy>(
    x: &[Vec<Vec<V>>],
    c: &[Vec<V>],
    value: impl Fn(V) -> i32,
) -> Vec<Option<PlannedSlot>> {
    x.iter()
        .map(|per_filler| {
            per_filler.iter().enumerate().find_map(|(f, per_slot)| {
                let slot = per_slot.iter().position(|&var| value(var) == 1)?;
                Some(PlannedSlot {
                    filler_id: f + 1,
                    slot,
                    new_block: c
                        .get(f)
                        .and_then(|row| row.get(slot))
                        .is_some_and(|&var| value(var) == 1),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fillsched_core::hours_to_duration;
    use pretty_assertions::assert_eq;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn refuses_inputs_over_the_ceiling() {
        let lots: Vec<Lot> = (0..5)
            .map(|i| Lot::new(format!("L{i}"), "A", 1, 1.0))
            .collect();
        let mut milp = MilpOpt::new(MilpParams {
            max_lots: 4,
            ..MilpParams::default()
        });

        let err = milp
            .reorder(lots, start(), &Configuration::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::CapacityExceeded { lots: 5, ceiling: 4 }
        ));
        assert!(milp.plan().is_none());
    }

    #[test]
    fn groups_types_to_avoid_changeovers() {
        let lots = vec![
            Lot::new("A1", "A", 1, 2.0),
            Lot::new("B1", "B", 1, 2.0),
            Lot::new("A2", "A", 1, 2.0),
            Lot::new("B2", "B", 1, 2.0),
        ];
        let config = Configuration::default().max_clean_hours(24.0);
        let mut milp = MilpOpt::new(MilpParams {
            time_limit_secs: 20,
            ..MilpParams::default()
        });

        let ordered = milp.reorder(lots, start(), &config).unwrap();
        let plan = milp.plan().unwrap();

        assert_eq!(plan.status, SolverStatus::Optimal);
        // One A->B (or B->A) switch at 8h
        assert_eq!(plan.objective, 8 * 60);
        let types: Vec<&str> = ordered.iter().map(|l| l.lot_type.as_str()).collect();
        let switches = types.windows(2).filter(|w| w[0] != w[1]).count();
        assert_eq!(switches, 1);
    }

    #[test]
    fn decode_reads_clean_flags() {
        // Variables are plain indices into `values`: two lots, one filler, two slots
        let x = vec![vec![vec![0, 1]], vec![vec![2, 3]]];
        let c = vec![vec![4, 5]];
        let values = [0, 1, 1, 0, 0, 1];

        let planned = decode(&x, &c, |var: usize| values[var]);
        assert_eq!(
            planned,
            vec![
                Some(PlannedSlot {
                    filler_id: 1,
                    slot: 1,
                    new_block: true,
                }),
                Some(PlannedSlot {
                    filler_id: 1,
                    slot: 0,
                    new_block: false,
                }),
            ]
        );

        let unassigned = decode(&[vec![vec![0]]], &c, |_: usize| 0);
        assert_eq!(unassigned, vec![None]);
    }

    #[test]
    fn penalty_weights_never_round_to_zero() {
        assert_eq!(penalty_minutes(0.0), 0);
        assert_eq!(penalty_minutes(0.005), 1);
        assert_eq!(penalty_minutes(1.5), 90);
        assert_eq!(minutes_up(2.0), 120);
        assert_eq!(minutes_up(2.001), 121);
        assert_eq!(minutes_down(9.999), 599);
    }

    #[test]
    fn tiny_window_weight_still_moves_lots() {
        // Both orders cost one changeover; only the window term separates them
        let lots = vec![
            Lot::new("A1", "A", 1, 2.0).window(None, Some(start() + hours_to_duration(27.0))),
            Lot::new("B1", "B", 1, 2.0),
        ];
        let config = Configuration::default()
            .max_clean_hours(10.0)
            .default_changeover(1.0)
            .window_penalty(0.005);
        let mut milp = MilpOpt::new(MilpParams {
            time_limit_secs: 20,
            ..MilpParams::default()
        });

        let ordered = milp.reorder(lots, start(), &config).unwrap();
        let plan = milp.plan().unwrap();
        assert_eq!(plan.status, SolverStatus::Optimal);
        assert_eq!(ordered[0].lot_id, "A1");
        assert_eq!(plan.objective, 60);
    }
}
