//! Text and JSON rendering of results

use fillsched_core::{KpiSummary, ScheduleResult, ValidationReport};
use fillsched_solver::ComparisonRow;
use std::fmt::Write;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Activity table, KPIs and validation findings
pub fn schedule_text(result: &ScheduleResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Strategy: {}", result.strategy);
    let _ = writeln!(out, "Start:    {}", result.start_time.format(TIME_FORMAT));
    if let Some(solver) = &result.solver {
        let status = if solver.proven_optimal() {
            "optimal"
        } else {
            "feasible (optimality not proven)"
        };
        let _ = writeln!(
            out,
            "Solver:   {status}, objective {} min, {} ms",
            solver.objective, solver.elapsed_ms
        );
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "{:<6} {:<16} {:<16} {:<10} {:>8}  {:<10} {:<10} {}",
        "Filler", "Start", "End", "Kind", "Hours", "Lot", "Type", "Note"
    );
    let _ = writeln!(out, "{}", "-".repeat(92));
    for act in &result.activities {
        let _ = writeln!(
            out,
            "{:<6} {:<16} {:<16} {:<10} {:>8.2}  {:<10} {:<10} {}",
            act.filler_id,
            act.start.format(TIME_FORMAT).to_string(),
            act.end.format(TIME_FORMAT).to_string(),
            act.kind.as_str(),
            act.duration_hours(),
            act.lot_id.as_deref().unwrap_or("-"),
            act.lot_type.as_deref().unwrap_or("-"),
            act.note.as_deref().unwrap_or(""),
        );
    }
    out.push('\n');
    out.push_str(&kpi_text(&result.kpis));
    out.push_str(&validation_text(&result.validation));
    out
}

pub fn kpi_text(kpis: &KpiSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "KPIs:");
    let _ = writeln!(out, "  Makespan:          {:>10.2} h", kpis.makespan_hours);
    let _ = writeln!(out, "  Fill:              {:>10.2} h", kpis.total_fill_hours);
    let _ = writeln!(out, "  Clean:             {:>10.2} h ({} blocks)", kpis.total_clean_hours, kpis.clean_blocks);
    let _ = writeln!(out, "  Changeover:        {:>10.2} h", kpis.total_changeover_hours);
    let _ = writeln!(out, "  Idle:              {:>10.2} h", kpis.total_idle_hours);
    let _ = writeln!(out, "  Lots scheduled:    {:>10}", kpis.lots_scheduled);
    let _ = writeln!(out, "  Utilization:       {:>9.1}%", kpis.utilization * 100.0);
    let _ = writeln!(out, "  Window violations: {:>10}", kpis.window_violations);
    out
}

pub fn validation_text(report: &ValidationReport) -> String {
    let mut out = String::new();
    for error in &report.errors {
        let _ = writeln!(out, "error: {error}");
    }
    for warning in &report.warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    if report.errors.is_empty() && report.warnings.is_empty() {
        let _ = writeln!(out, "Validation: OK");
    }
    out
}

/// One line per strategy, deltas against `baseline` when present
pub fn comparison_text(rows: &[ComparisonRow], baseline: Option<&ScheduleResult>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:>10} {:>10} {:>8} {:>11} {:>7} {:>9} {:>10}  {}",
        "Strategy", "Makespan", "Changeov.", "Cleans", "Utilization", "Windows", "Time(ms)", "vs base", "Status"
    );
    let _ = writeln!(out, "{}", "-".repeat(100));
    for row in rows {
        let ms = row.elapsed.as_secs_f64() * 1000.0;
        match &row.outcome {
            Ok(result) => {
                let k = &result.kpis;
                let delta = baseline
                    .and_then(|b| row.delta(b))
                    .map_or_else(|| "-".to_string(), |d| format!("{:+.2}", d.makespan_hours));
                let status = match &result.solver {
                    Some(s) if !s.proven_optimal() => "OK (not proven optimal)",
                    _ if !result.validation.is_valid() => "INVALID",
                    _ => "OK",
                };
                let _ = writeln!(
                    out,
                    "{:<12} {:>10.2} {:>10.2} {:>8} {:>10.1}% {:>7} {:>9.1} {:>10}  {}",
                    row.strategy,
                    k.makespan_hours,
                    k.total_changeover_hours,
                    k.clean_blocks,
                    k.utilization * 100.0,
                    k.window_violations,
                    ms,
                    delta,
                    status
                );
            }
            Err(e) => {
                let _ = writeln!(
                    out,
                    "{:<12} {:>10} {:>10} {:>8} {:>11} {:>7} {:>9.1} {:>10}  ERROR: {e}",
                    row.strategy, "-", "-", "-", "-", "-", ms, "-"
                );
            }
        }
    }
    out
}

/// JSON document for one comparison
pub fn comparison_json(rows: &[ComparisonRow]) -> serde_json::Value {
    let items: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| match &row.outcome {
            Ok(result) => serde_json::json!({
                "strategy": row.strategy,
                "elapsed_ms": row.elapsed.as_millis() as u64,
                "kpis": result.kpis,
                "valid": result.validation.is_valid(),
                "solver": result.solver,
            }),
            Err(e) => serde_json::json!({
                "strategy": row.strategy,
                "elapsed_ms": row.elapsed.as_millis() as u64,
                "error": e.to_string(),
            }),
        })
        .collect();
    serde_json::Value::Array(items)
}
