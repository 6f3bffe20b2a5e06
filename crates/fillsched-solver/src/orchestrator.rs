//! Time-stepping loop that turns strategy decisions into activities
//!
//! Each step selects the active filler with the earliest cursor (ties to the
//! lowest id), asks the strategy for a decision against that filler's state,
//! and emits the resulting CLEAN / IDLE / CHANGEOVER / FILL activities.
//! All state lives in a per-run array of [`FillerState`] records.

use crate::strategy::{PackingStrategy, Pick, PickContext};
use chrono::NaiveDateTime;
use fillsched_core::{
    hours_to_duration, Activity, ActivityKind, Configuration, FillerId, Lot, ScheduleError,
    HOURS_EPSILON,
};
use tracing::{debug, trace};

/// Mutable state of one filler during a run
#[derive(Clone, Debug)]
struct FillerState {
    id: FillerId,
    cursor: NaiveDateTime,
    block_hours_used: f64,
    previous_type: Option<String>,
    /// Received at least one lot
    started: bool,
    /// Strategy declared this filler done
    released: bool,
    last_fill_end: Option<NaiveDateTime>,
}

impl FillerState {
    fn new(id: FillerId, start_time: NaiveDateTime) -> Self {
        Self {
            id,
            cursor: start_time,
            block_hours_used: 0.0,
            previous_type: None,
            started: false,
            released: false,
            last_fill_end: None,
        }
    }

    fn block_is_empty(&self) -> bool {
        self.previous_type.is_none() && self.block_hours_used <= HOURS_EPSILON
    }

    /// Append an activity of `hours` at the cursor and advance it
    fn emit(&mut self, kind: ActivityKind, hours: f64, out: &mut Vec<Activity>) {
        let start = self.cursor;
        self.cursor = start + hours_to_duration(hours);
        out.push(Activity::new(kind, self.id, start, self.cursor));
    }

    /// Cursor as the next fill will see it, counting a pending initial clean
    fn projected_cursor(&self, config: &Configuration) -> NaiveDateTime {
        if !self.started && config.initial_clean {
            self.cursor + hours_to_duration(config.clean_hours)
        } else {
            self.cursor
        }
    }

    fn clean(&mut self, config: &Configuration, out: &mut Vec<Activity>) {
        self.emit(ActivityKind::Clean, config.clean_hours, out);
        self.block_hours_used = 0.0;
        self.previous_type = None;
    }
}

/// Lot whose fill alone overflows a clean block, in input order
pub(crate) fn find_oversized<'a>(lots: &'a [Lot], config: &Configuration) -> Option<&'a Lot> {
    lots.iter()
        .find(|lot| lot.fill_hours > config.max_clean_hours + HOURS_EPSILON)
}

/// Drive `strategy` until every lot is placed.
///
/// Returns the activities sorted by `(start, filler_id)`.
pub fn run<S: PackingStrategy + ?Sized>(
    strategy: &mut S,
    lots: Vec<Lot>,
    start_time: NaiveDateTime,
    config: &Configuration,
) -> Result<Vec<Activity>, ScheduleError> {
    strategy.check_capacity(lots.len())?;
    if let Some(lot) = find_oversized(&lots, config) {
        return Err(ScheduleError::Infeasible {
            lot_id: lot.lot_id.clone(),
            fill_hours: lot.fill_hours,
            max_clean_hours: config.max_clean_hours,
        });
    }

    let mut remaining = strategy.reorder(lots, start_time, config)?;
    let mut fillers: Vec<FillerState> = (1..=config.num_fillers.max(1))
        .map(|id| FillerState::new(id, start_time))
        .collect();
    let mut activities = Vec::new();

    // Every lot costs at most one block close plus one placement; each filler
    // releases once
    let max_steps = 2 * remaining.len() + fillers.len() + 1;
    let mut steps = 0usize;

    while !remaining.is_empty() {
        steps += 1;
        if steps > max_steps {
            return Err(ScheduleError::InternalInvariantViolation(format!(
                "{} made no progress after {max_steps} steps ({} lots left)",
                strategy.name(),
                remaining.len()
            )));
        }

        let Some(slot) = fillers
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.released)
            .min_by_key(|(_, f)| (f.cursor, f.id))
            .map(|(i, _)| i)
        else {
            return Err(ScheduleError::InternalInvariantViolation(format!(
                "every filler released with {} lots unscheduled",
                remaining.len()
            )));
        };
        let filler = &mut fillers[slot];

        let pick = strategy.pick_next(&PickContext {
            remaining: &remaining,
            previous_type: filler.previous_type.as_deref(),
            block_hours_used: filler.block_hours_used,
            filler_id: filler.id,
            cursor: filler.projected_cursor(config),
            config,
        });
        trace!(filler = filler.id, ?pick, "decision");

        match pick {
            Pick::Release => {
                debug!(filler = filler.id, "filler released");
                filler.released = true;
            }
            Pick::StartNewBlock => {
                if filler.block_is_empty() {
                    return Err(ScheduleError::InternalInvariantViolation(format!(
                        "{} closed an empty block on filler {}",
                        strategy.name(),
                        filler.id
                    )));
                }
                debug!(filler = filler.id, used = filler.block_hours_used, "closing block");
                filler.clean(config, &mut activities);
            }
            Pick::Lot(idx) => {
                if idx >= remaining.len() {
                    return Err(ScheduleError::InternalInvariantViolation(format!(
                        "{} picked index {idx} of {} remaining lots",
                        strategy.name(),
                        remaining.len()
                    )));
                }
                let lot = remaining.remove(idx);
                place(filler, &lot, config, &mut activities)?;
            }
        }
    }

    activities.sort_by_key(|a| (a.start, a.filler_id));
    Ok(activities)
}

/// Emit everything needed to fill `lot` next on `filler`
fn place(
    filler: &mut FillerState,
    lot: &Lot,
    config: &Configuration,
    out: &mut Vec<Activity>,
) -> Result<(), ScheduleError> {
    if !filler.started {
        filler.started = true;
        if config.initial_clean {
            filler.clean(config, out);
        }
    }

    let mut changeover = config.changeover_hours(filler.previous_type.as_deref(), &lot.lot_type);
    if filler.block_hours_used + changeover + lot.fill_hours > config.max_clean_hours + HOURS_EPSILON {
        if filler.block_is_empty() {
            return Err(ScheduleError::InternalInvariantViolation(format!(
                "lot {} does not fit an empty block on filler {}",
                lot.lot_id, filler.id
            )));
        }
        debug!(filler = filler.id, lot = %lot.lot_id, "forced clean before lot");
        filler.clean(config, out);
        changeover = 0.0;
    }

    // Pad only the shortfall; changeover and clean time count toward the gap
    if config.min_lot_spacing_hours > HOURS_EPSILON {
        if let Some(last) = filler.last_fill_end {
            let earliest = last + hours_to_duration(config.min_lot_spacing_hours);
            let fill_start = filler.cursor + hours_to_duration(changeover);
            if earliest > fill_start {
                let idle = fillsched_core::duration_to_hours(earliest - fill_start);
                if idle > HOURS_EPSILON {
                    filler.emit(ActivityKind::Idle, idle, out);
                }
            }
        }
    }

    if changeover > HOURS_EPSILON {
        let from = filler.previous_type.as_deref().unwrap_or_default();
        let start = filler.cursor;
        filler.cursor = start + hours_to_duration(changeover);
        out.push(
            Activity::new(ActivityKind::Changeover, filler.id, start, filler.cursor)
                .note(format!("{from}->{}", lot.lot_type)),
        );
    }

    let start = filler.cursor;
    filler.cursor = start + hours_to_duration(lot.fill_hours);
    out.push(Activity::fill(lot, filler.id, start, filler.cursor));

    filler.block_hours_used += changeover + lot.fill_hours;
    filler.previous_type = Some(lot.lot_type.clone());
    filler.last_fill_end = Some(filler.cursor);

    if filler.block_hours_used > config.max_clean_hours + HOURS_EPSILON {
        return Err(ScheduleError::InternalInvariantViolation(format!(
            "block on filler {} holds {:.3} h, above {:.3} h",
            filler.id, filler.block_hours_used, config.max_clean_hours
        )));
    }
    Ok(())
}
