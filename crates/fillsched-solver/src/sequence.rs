//! Given-order baseline: replay a caller-supplied lot sequence
//!
//! Useful as the reference row when comparing strategies: it shows what the
//! plan looks like when lots run exactly as listed, with CLEANs inserted
//! only where the next lot would overflow the block.

use crate::strategy::{PackingStrategy, Pick, PickContext};
use crate::{finish, orchestrator};
use chrono::NaiveDateTime;
use fillsched_core::{Configuration, Lot, LotId, ScheduleError, ScheduleResult};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Identifier reported in `ScheduleResult::strategy`
pub const GIVEN_ORDER: &str = "given-order";

/// Order `lots` by `sequence`.
///
/// Lots missing from `sequence` follow in input order. Returns the ordered
/// lots and the ids in `sequence` that match no lot.
pub fn order_by_sequence(lots: Vec<Lot>, sequence: &[LotId]) -> (Vec<Lot>, Vec<LotId>) {
    let mut slots: Vec<Option<Lot>> = lots.into_iter().map(Some).collect();
    let index: HashMap<String, usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, lot)| lot.as_ref().map(|l| (l.lot_id.clone(), i)))
        .collect();

    let mut ordered = Vec::with_capacity(slots.len());
    let mut unknown = Vec::new();
    let mut used = HashSet::new();
    for id in sequence {
        match index.get(id) {
            Some(&i) if used.insert(i) => {
                if let Some(lot) = slots[i].take() {
                    ordered.push(lot);
                }
            }
            Some(_) => {}
            None => unknown.push(id.clone()),
        }
    }
    ordered.extend(slots.into_iter().flatten());
    (ordered, unknown)
}

/// Places lots strictly in the order given
#[derive(Clone, Copy, Debug, Default)]
struct FixedOrder;

impl PackingStrategy for FixedOrder {
    fn name(&self) -> &'static str {
        GIVEN_ORDER
    }

    fn pick_next(&self, ctx: &PickContext<'_>) -> Pick {
        match ctx.remaining.first() {
            Some(lot) if ctx.fits(lot) || ctx.block_is_empty() => Pick::Lot(0),
            Some(_) => Pick::StartNewBlock,
            None => Pick::Release,
        }
    }
}

/// Schedule `lots` in the order of `sequence` through the shared orchestrator
pub fn schedule_in_sequence(
    lots: Vec<Lot>,
    sequence: &[LotId],
    start_time: NaiveDateTime,
    config: &Configuration,
) -> Result<ScheduleResult, ScheduleError> {
    let input_report = crate::validate::validate_inputs(&lots, config);
    if !input_report.is_valid() {
        return Err(ScheduleError::InvalidInput {
            errors: input_report.errors,
        });
    }

    let (ordered, unknown) = order_by_sequence(lots.clone(), sequence);
    info!(lots = ordered.len(), unknown = unknown.len(), "scheduling in given order");

    let activities = orchestrator::run(&mut FixedOrder, ordered, start_time, config)?;
    let mut result = finish(GIVEN_ORDER, activities, &lots, start_time, config, input_report, None);
    result.validation.warnings.extend(
        unknown
            .into_iter()
            .map(|id| format!("sequence references unknown lot {id}")),
    );
    Ok(result)
}
