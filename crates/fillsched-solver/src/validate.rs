//! Constraint validation for lot inputs and produced schedules.
//!
//! Both validators return a [`ValidationReport`] instead of failing; callers
//! decide what to do with errors. With [`ValidationOptions::fail_fast`] the
//! first error stops the pass.
//!
//! Input checks:
//! - an empty lot set
//! - per-lot fields (id, type, quantity, fill hours, window order)
//! - duplicate lot ids, in one pass over the whole set
//! - configuration parameters
//!
//! Schedule checks:
//! - interval sanity, filler range and per-filler non-overlap
//! - block capacity between CLEANs
//! - changeover durations against the configured rule
//! - every lot filled exactly once, with its own duration
//! - lot spacing and delivery windows

use fillsched_core::{
    Activity, ActivityKind, Configuration, FillerId, Lot, ValidationOptions, ValidationReport,
    HOURS_EPSILON,
};
use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;

/// Accumulates findings; signals a stop after the first error when fail-fast
struct Collector {
    report: ValidationReport,
    fail_fast: bool,
}

impl Collector {
    fn new(options: ValidationOptions) -> Self {
        Self {
            report: ValidationReport::new(),
            fail_fast: options.fail_fast,
        }
    }

    fn error(&mut self, message: impl Into<String>) -> ControlFlow<()> {
        self.report.errors.push(message.into());
        if self.fail_fast {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.report.warnings.push(message.into());
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Check lots and configuration before scheduling, collecting every problem
pub fn validate_inputs(lots: &[Lot], config: &Configuration) -> ValidationReport {
    validate_inputs_with(lots, config, ValidationOptions::default())
}

pub fn validate_inputs_with(
    lots: &[Lot],
    config: &Configuration,
    options: ValidationOptions,
) -> ValidationReport {
    let mut out = Collector::new(options);
    let _ = check_inputs(lots, config, &mut out);
    out.report
}

fn check_inputs(lots: &[Lot], config: &Configuration, out: &mut Collector) -> ControlFlow<()> {
    for problem in config.check() {
        out.error(format!("configuration: {problem}"))?;
    }

    if lots.is_empty() {
        out.error("no lots provided")?;
        return ControlFlow::Continue(());
    }

    for lot in lots {
        check_lot(lot, config, out)?;
    }

    // Set membership over the whole input, once
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(lots.len());
    for lot in lots {
        let count = seen.entry(lot.lot_id.as_str()).or_insert(0);
        *count += 1;
        if *count == 2 {
            out.error(format!("duplicate lot_id: {}", lot.lot_id))?;
        }
    }

    ControlFlow::Continue(())
}

fn check_lot(lot: &Lot, config: &Configuration, out: &mut Collector) -> ControlFlow<()> {
    let id = if lot.lot_id.trim().is_empty() {
        out.error("lot with empty lot_id")?;
        "<unnamed>"
    } else {
        lot.lot_id.as_str()
    };

    if lot.lot_type.trim().is_empty() {
        out.error(format!("lot {id}: lot_type is empty"))?;
    }
    if lot.quantity <= 0 {
        out.error(format!("lot {id}: quantity must be positive (got {})", lot.quantity))?;
    }
    if !lot.fill_hours.is_finite() || lot.fill_hours <= 0.0 {
        out.error(format!(
            "lot {id}: fill_hours must be positive (got {})",
            lot.fill_hours
        ))?;
    } else if lot.fill_hours > config.max_clean_hours + HOURS_EPSILON {
        out.warning(format!(
            "lot {id}: fill_hours {:.2} exceeds max_clean_hours {:.2}; it cannot fit any block",
            lot.fill_hours, config.max_clean_hours
        ));
    }
    if let (Some(start), Some(end)) = (lot.target_start, lot.target_end) {
        if start >= end {
            out.error(format!(
                "lot {id}: target_start {start} is not before target_end {end}"
            ))?;
        }
    }
    if let Some(level) = lot.priority.as_deref() {
        if !config.priority_levels.contains_key(level) {
            out.warning(format!(
                "lot {id}: unknown priority '{level}', treated as lowest"
            ));
        }
    }

    ControlFlow::Continue(())
}

// ============================================================================
// Schedules
// ============================================================================

/// Check a produced schedule against the lots it was built from
pub fn validate_schedule(
    activities: &[Activity],
    lots: &[Lot],
    config: &Configuration,
) -> ValidationReport {
    validate_schedule_with(activities, lots, config, ValidationOptions::default())
}

pub fn validate_schedule_with(
    activities: &[Activity],
    lots: &[Lot],
    config: &Configuration,
    options: ValidationOptions,
) -> ValidationReport {
    let mut out = Collector::new(options);
    let _ = check_schedule(activities, lots, config, &mut out);
    out.report
}

fn check_schedule(
    activities: &[Activity],
    lots: &[Lot],
    config: &Configuration,
    out: &mut Collector,
) -> ControlFlow<()> {
    let mut by_filler: BTreeMap<FillerId, Vec<&Activity>> = BTreeMap::new();
    for act in activities {
        if act.end <= act.start {
            out.error(format!(
                "{} on filler {} at {} has non-positive duration",
                act.kind, act.filler_id, act.start
            ))?;
        }
        if act.filler_id < 1 || act.filler_id > config.num_fillers {
            out.error(format!(
                "{} at {} uses filler {} outside 1..={}",
                act.kind, act.start, act.filler_id, config.num_fillers
            ))?;
        }
        by_filler.entry(act.filler_id).or_default().push(act);
    }

    for (filler, acts) in &mut by_filler {
        acts.sort_by_key(|a| a.start);
        check_timeline(*filler, acts, config, out)?;
    }

    check_coverage(activities, lots, config, out)
}

/// Overlap, block capacity, changeover and spacing on one filler
fn check_timeline(
    filler: FillerId,
    acts: &[&Activity],
    config: &Configuration,
    out: &mut Collector,
) -> ControlFlow<()> {
    let mut block_hours = 0.0;
    let mut previous_type: Option<&str> = None;
    let mut pending_changeover = 0.0;
    let mut last_fill_end = None;

    for (i, act) in acts.iter().enumerate() {
        if let Some(prev) = i.checked_sub(1).map(|j| acts[j]) {
            if act.start < prev.end {
                out.error(format!(
                    "filler {filler}: {} at {} overlaps {} ending {}",
                    act.kind, act.start, prev.kind, prev.end
                ))?;
            } else if act.start > prev.end {
                out.warning(format!(
                    "filler {filler}: unmodeled gap from {} to {}",
                    prev.end, act.start
                ));
            }
        }

        let hours = act.duration_hours();
        match act.kind {
            ActivityKind::Clean => {
                block_hours = 0.0;
                previous_type = None;
                pending_changeover = 0.0;
            }
            ActivityKind::Idle => {}
            ActivityKind::Changeover => {
                block_hours += hours;
                pending_changeover += hours;
            }
            ActivityKind::Fill => {
                block_hours += hours;
                let lot_type = act.lot_type.as_deref().unwrap_or_default();
                let expected = config.changeover_hours(previous_type, lot_type);
                if (pending_changeover - expected).abs() > HOURS_EPSILON {
                    out.error(format!(
                        "filler {filler}: changeover {}->{lot_type} took {pending_changeover:.4} h, expected {expected:.4} h",
                        previous_type.unwrap_or("CLEAN"),
                    ))?;
                }
                if config.min_lot_spacing_hours > HOURS_EPSILON {
                    if let Some(last) = last_fill_end {
                        let gap = fillsched_core::duration_to_hours(act.start - last);
                        if gap + HOURS_EPSILON < config.min_lot_spacing_hours {
                            out.error(format!(
                                "filler {filler}: fill of {} starts {gap:.4} h after the previous fill, below min_lot_spacing_hours {:.4}",
                                act.lot_id.as_deref().unwrap_or_default(),
                                config.min_lot_spacing_hours
                            ))?;
                        }
                    }
                }
                previous_type = Some(lot_type);
                pending_changeover = 0.0;
                last_fill_end = Some(act.end);
            }
        }

        if block_hours > config.max_clean_hours + HOURS_EPSILON {
            out.error(format!(
                "filler {filler}: block reaches {block_hours:.4} h at {}, above max_clean_hours {:.4}",
                act.end, config.max_clean_hours
            ))?;
            // Report each overflowing block once
            block_hours = f64::NEG_INFINITY;
        }
    }

    ControlFlow::Continue(())
}

/// Every lot filled exactly once with its own duration, inside its window
fn check_coverage(
    activities: &[Activity],
    lots: &[Lot],
    config: &Configuration,
    out: &mut Collector,
) -> ControlFlow<()> {
    let by_id: HashMap<&str, &Lot> = lots.iter().map(|l| (l.lot_id.as_str(), l)).collect();
    let mut filled: HashMap<&str, usize> = HashMap::new();

    for act in activities.iter().filter(|a| a.is_fill()) {
        let Some(id) = act.lot_id.as_deref() else {
            out.error(format!("FILL on filler {} at {} has no lot_id", act.filler_id, act.start))?;
            continue;
        };
        *filled.entry(id).or_insert(0) += 1;

        let Some(lot) = by_id.get(id) else {
            out.error(format!("FILL references unknown lot {id}"))?;
            continue;
        };
        if (act.duration_hours() - lot.fill_hours).abs() > HOURS_EPSILON {
            out.error(format!(
                "lot {id}: filled for {:.4} h, expected {:.4} h",
                act.duration_hours(),
                lot.fill_hours
            ))?;
        }
        if lot.violates_window(act.start, act.end) {
            let message = format!(
                "lot {id}: fill {} - {} is outside its target window",
                act.start, act.end
            );
            if config.hard_windows {
                out.error(message)?;
            } else {
                out.warning(message);
            }
        }
    }

    for lot in lots {
        match filled.get(lot.lot_id.as_str()).copied().unwrap_or(0) {
            1 => {}
            0 => out.error(format!("lot {} is not scheduled", lot.lot_id))?,
            n => out.error(format!("lot {} is scheduled {n} times", lot.lot_id))?,
        }
    }

    ControlFlow::Continue(())
}
