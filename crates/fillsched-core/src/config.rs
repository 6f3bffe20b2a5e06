//! Scheduling configuration
//!
//! All parameters carry safe defaults so partial TOML/JSON files deserialize.
//! Numeric fields are checked by [`Configuration::check`] before any run;
//! a configuration with problems never produces activities.
//!
//! ```toml
//! num_fillers = 2
//! max_clean_hours = 120.0
//! clean_hours = 24.0
//! default_changeover_hours = 8.0
//!
//! [changeover_matrix.VialE]
//! VialH = 6.0
//!
//! [smart_pack]
//! beam_width = 4
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Nested changeover lookup: `from_type -> to_type -> hours`
pub type ChangeoverMatrix = BTreeMap<String, BTreeMap<String, f64>>;

// ============================================================================
// Configuration
// ============================================================================

/// Scheduling parameters for one run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Number of parallel filling lines
    pub num_fillers: usize,
    /// Maximum production hours (fill + changeover) between two cleans
    pub max_clean_hours: f64,
    /// Duration of one CLEAN activity
    pub clean_hours: f64,
    /// Changeover used when a type pair is missing from the matrix
    pub default_changeover_hours: f64,
    pub changeover_matrix: ChangeoverMatrix,
    /// Minimum elapsed time between consecutive fills on one filler
    pub min_lot_spacing_hours: f64,
    /// Hours-equivalent penalty for missing a delivery window
    pub window_penalty_weight: f64,
    /// Report window misses as validation errors rather than warnings
    pub hard_windows: bool,
    /// Open every filler timeline with a CLEAN
    pub initial_clean: bool,
    /// Vials per hour, used to derive fill hours from quantities
    pub fill_rate_vph: f64,
    pub priority_levels: BTreeMap<String, f64>,
    pub smart_pack: SmartPackParams,
    pub cfs: CfsParams,
    pub hybrid: HybridParams,
    pub milp: MilpParams,
}

impl Default for Configuration {
    fn default() -> Self {
        let priority_levels = [("high", 3.0), ("normal", 1.0), ("low", 0.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            num_fillers: 1,
            max_clean_hours: 120.0,
            clean_hours: 24.0,
            default_changeover_hours: 8.0,
            changeover_matrix: ChangeoverMatrix::new(),
            min_lot_spacing_hours: 0.0,
            window_penalty_weight: 0.0,
            hard_windows: false,
            initial_clean: true,
            fill_rate_vph: 332.0 * 60.0,
            priority_levels,
            smart_pack: SmartPackParams::default(),
            cfs: CfsParams::default(),
            hybrid: HybridParams::default(),
            milp: MilpParams::default(),
        }
    }
}

impl Configuration {
    pub fn fillers(mut self, n: usize) -> Self {
        self.num_fillers = n;
        self
    }

    pub fn max_clean_hours(mut self, hours: f64) -> Self {
        self.max_clean_hours = hours;
        self
    }

    pub fn clean_hours(mut self, hours: f64) -> Self {
        self.clean_hours = hours;
        self
    }

    pub fn default_changeover(mut self, hours: f64) -> Self {
        self.default_changeover_hours = hours;
        self
    }

    /// Set one directed matrix entry
    pub fn changeover(mut self, from: impl Into<String>, to: impl Into<String>, hours: f64) -> Self {
        self.changeover_matrix
            .entry(from.into())
            .or_default()
            .insert(to.into(), hours);
        self
    }

    pub fn min_lot_spacing(mut self, hours: f64) -> Self {
        self.min_lot_spacing_hours = hours;
        self
    }

    pub fn window_penalty(mut self, weight: f64) -> Self {
        self.window_penalty_weight = weight;
        self
    }

    pub fn initial_clean(mut self, enabled: bool) -> Self {
        self.initial_clean = enabled;
        self
    }

    /// Setup hours between a lot of type `prev` and one of type `next`.
    ///
    /// Zero directly after a CLEAN (`prev == None`) and between equal types.
    pub fn changeover_hours(&self, prev: Option<&str>, next: &str) -> f64 {
        match prev {
            None => 0.0,
            Some(p) if p == next => 0.0,
            Some(p) => self
                .changeover_matrix
                .get(p)
                .and_then(|row| row.get(next))
                .copied()
                .unwrap_or(self.default_changeover_hours),
        }
    }

    /// Weight of a priority level; missing or unknown names get the lowest weight
    pub fn priority_weight(&self, level: Option<&str>) -> f64 {
        level
            .and_then(|name| self.priority_levels.get(name))
            .copied()
            .unwrap_or_else(|| self.lowest_priority_weight())
    }

    fn lowest_priority_weight(&self) -> f64 {
        self.priority_levels
            .values()
            .copied()
            .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.min(w))))
            .unwrap_or(0.0)
    }

    /// Validate every numeric parameter. Returns one message per problem.
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.num_fillers < 1 {
            problems.push("num_fillers must be at least 1".to_string());
        }
        positive(&mut problems, "max_clean_hours", self.max_clean_hours);
        positive(&mut problems, "clean_hours", self.clean_hours);
        non_negative(&mut problems, "default_changeover_hours", self.default_changeover_hours);
        non_negative(&mut problems, "min_lot_spacing_hours", self.min_lot_spacing_hours);
        non_negative(&mut problems, "window_penalty_weight", self.window_penalty_weight);
        positive(&mut problems, "fill_rate_vph", self.fill_rate_vph);

        for (from, row) in &self.changeover_matrix {
            for (to, hours) in row {
                non_negative(&mut problems, &format!("changeover_matrix[{from}][{to}]"), *hours);
            }
        }
        for (name, weight) in &self.priority_levels {
            if !weight.is_finite() {
                problems.push(format!("priority_levels[{name}] must be finite (got {weight})"));
            }
        }

        let sp = &self.smart_pack;
        if sp.beam_width < 1 {
            problems.push("smart_pack.beam_width must be at least 1".to_string());
        }
        non_negative(&mut problems, "smart_pack.util_pad_hours", sp.util_pad_hours);
        non_negative(&mut problems, "smart_pack.slack_waste_weight", sp.slack_waste_weight);
        non_negative(&mut problems, "smart_pack.streak_bonus", sp.streak_bonus);
        non_negative(&mut problems, "smart_pack.priority_weight", sp.priority_weight);
        non_negative(&mut problems, "smart_pack.dynamic_switch_mult_min", sp.dynamic_switch_mult_min);
        non_negative(&mut problems, "smart_pack.dynamic_switch_mult_max", sp.dynamic_switch_mult_max);
        if sp.dynamic_switch_mult_max < sp.dynamic_switch_mult_min {
            problems.push(format!(
                "smart_pack.dynamic_switch_mult_max ({}) is below dynamic_switch_mult_min ({})",
                sp.dynamic_switch_mult_max, sp.dynamic_switch_mult_min
            ));
        }
        if sp.util_pad_hours >= self.max_clean_hours && self.max_clean_hours > 0.0 {
            problems.push("smart_pack.util_pad_hours must be below max_clean_hours".to_string());
        }

        let hy = &self.hybrid;
        non_negative(&mut problems, "hybrid.same_type_bonus", hy.same_type_bonus);
        non_negative(&mut problems, "hybrid.spt_weight", hy.spt_weight);
        non_negative(&mut problems, "hybrid.switch_penalty_multiplier", hy.switch_penalty_multiplier);

        let milp = &self.milp;
        if milp.max_lots < 1 {
            problems.push("milp.max_lots must be at least 1".to_string());
        }
        if milp.time_limit_secs < 1 {
            problems.push("milp.time_limit_secs must be at least 1".to_string());
        }
        if let Some(p) = milp.clean_penalty_hours {
            non_negative(&mut problems, "milp.clean_penalty_hours", p);
        }

        problems
    }
}

fn positive(problems: &mut Vec<String>, field: &str, value: f64) {
    if !value.is_finite() || value <= 0.0 {
        problems.push(format!("{field} must be a positive number (got {value})"));
    }
}

fn non_negative(problems: &mut Vec<String>, field: &str, value: f64) {
    if !value.is_finite() || value < 0.0 {
        problems.push(format!("{field} must be a non-negative number (got {value})"));
    }
}

// ============================================================================
// Strategy parameters
// ============================================================================

/// Knobs for the scored greedy packer with bounded look-ahead
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartPackParams {
    /// Candidates kept per step, and depth of each simulated rollout
    pub beam_width: usize,
    /// Capacity kept free in a partially used block
    pub util_pad_hours: f64,
    /// Penalty per hour of block capacity no remaining lot can use
    pub slack_waste_weight: f64,
    /// Bonus for continuing the current type
    pub streak_bonus: f64,
    /// Switch multiplier at an empty block
    pub dynamic_switch_mult_min: f64,
    /// Switch multiplier at a full block
    pub dynamic_switch_mult_max: f64,
    /// Bonus per unit of priority-level weight
    pub priority_weight: f64,
}

impl Default for SmartPackParams {
    fn default() -> Self {
        Self {
            beam_width: 3,
            util_pad_hours: 0.0,
            slack_waste_weight: 3.0,
            streak_bonus: 1.0,
            dynamic_switch_mult_min: 1.0,
            dynamic_switch_mult_max: 1.5,
            priority_weight: 0.5,
        }
    }
}

/// How cluster-first orders its type clusters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterOrder {
    /// Most lots first
    #[default]
    ByCount,
    /// Largest total quantity first
    ByTotalQuantity,
    /// Largest total fill hours first
    ByTotalHours,
}

/// Ordering of lots inside one cluster
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithinOrder {
    #[serde(alias = "SPT")]
    Spt,
    #[default]
    #[serde(alias = "LPT")]
    Lpt,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfsParams {
    pub cluster_order: ClusterOrder,
    pub within: WithinOrder,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridParams {
    pub same_type_bonus: f64,
    pub spt_weight: f64,
    pub switch_penalty_multiplier: f64,
}

impl Default for HybridParams {
    fn default() -> Self {
        Self {
            same_type_bonus: 2.0,
            spt_weight: 0.5,
            switch_penalty_multiplier: 1.1,
        }
    }
}

/// Limits for the exact strategy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilpParams {
    /// Lot-count ceiling; larger inputs are refused
    pub max_lots: usize,
    /// Wall-clock budget for the solver
    pub time_limit_secs: u64,
    /// Objective penalty per extra CLEAN; `None` uses `clean_hours`
    pub clean_penalty_hours: Option<f64>,
}

impl Default for MilpParams {
    fn default() -> Self {
        Self {
            max_lots: 30,
            time_limit_secs: 60,
            clean_penalty_hours: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let cfg = Configuration::default();
        assert_eq!(cfg.check(), Vec::<String>::new());
        assert_eq!(cfg.num_fillers, 1);
        assert_eq!(cfg.milp.max_lots, 30);
    }

    #[test]
    fn changeover_rule() {
        let cfg = Configuration::default()
            .default_changeover(8.0)
            .changeover("A", "B", 3.0);

        assert_eq!(cfg.changeover_hours(None, "A"), 0.0);
        assert_eq!(cfg.changeover_hours(Some("A"), "A"), 0.0);
        assert_eq!(cfg.changeover_hours(Some("A"), "B"), 3.0);
        // Matrix is directed
        assert_eq!(cfg.changeover_hours(Some("B"), "A"), 8.0);
    }

    #[test]
    fn priority_weight_falls_back_to_lowest() {
        let cfg = Configuration::default();
        assert_eq!(cfg.priority_weight(Some("high")), 3.0);
        assert_eq!(cfg.priority_weight(Some("urgent")), 0.0);
        assert_eq!(cfg.priority_weight(None), 0.0);
    }

    #[test]
    fn check_reports_each_bad_field() {
        let mut cfg = Configuration::default()
            .fillers(0)
            .max_clean_hours(-1.0)
            .changeover("A", "B", -2.0);
        cfg.smart_pack.beam_width = 0;

        let problems = cfg.check();
        assert!(problems.iter().any(|p| p.contains("num_fillers")));
        assert!(problems.iter().any(|p| p.contains("max_clean_hours")));
        assert!(problems.iter().any(|p| p.contains("changeover_matrix[A][B]")));
        assert!(problems.iter().any(|p| p.contains("beam_width")));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: Configuration = toml::from_str(
            r#"
            num_fillers = 2
            [changeover_matrix.A]
            B = 5.0
            [cfs]
            cluster_order = "by_total_hours"
            within = "SPT"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.num_fillers, 2);
        assert_eq!(cfg.clean_hours, 24.0);
        assert_eq!(cfg.changeover_hours(Some("A"), "B"), 5.0);
        assert_eq!(cfg.cfs.cluster_order, ClusterOrder::ByTotalHours);
        assert_eq!(cfg.cfs.within, WithinOrder::Spt);
    }
}
