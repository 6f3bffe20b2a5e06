//! Synthetic lot generators for benchmarking
//!
//! Lots are built directly, without reading files, so the engine can be
//! timed in isolation. Every generator is deterministic for a given seed.

use fillsched_core::Lot;

/// Default vial types
pub const VIAL_TYPES: [&str; 4] = ["VialE", "VialH", "VialF", "VialX"];

pub const MIN_VIALS: i64 = 20_000;
pub const MAX_VIALS: i64 = 2_300_000;

/// Small deterministic PRNG (64-bit LCG, high bits out)
#[derive(Clone, Debug)]
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x5DEE_CE66_D1CE_4E5B)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 32) as u32
    }

    /// Uniform in `lo..=hi`
    pub fn range(&mut self, lo: i64, hi: i64) -> i64 {
        let span = (hi - lo + 1).max(1) as u64;
        let wide = (u64::from(self.next_u32()) << 32) | u64::from(self.next_u32());
        lo + (wide % span) as i64
    }
}

/// Generate `count` lots over the first `types` vial types.
///
/// Ids are `L001`, `L002`, ...; vial counts are uniform in
/// `MIN_VIALS..=MAX_VIALS` and fill hours follow from `fill_rate_vph`.
pub fn generate_lots(count: usize, types: usize, seed: u64, fill_rate_vph: f64) -> Vec<Lot> {
    let types = types.clamp(1, VIAL_TYPES.len());
    let mut rng = Lcg::new(seed);
    (1..=count)
        .map(|i| {
            let lot_type = VIAL_TYPES[rng.range(0, types as i64 - 1) as usize];
            let vials = rng.range(MIN_VIALS, MAX_VIALS);
            Lot::from_quantity(format!("L{i:03}"), lot_type, vials, fill_rate_vph)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn same_seed_same_lots() {
        let a = generate_lots(50, 4, 42, 19_920.0);
        let b = generate_lots(50, 4, 42, 19_920.0);
        assert_eq!(a, b);
        assert_ne!(a, generate_lots(50, 4, 43, 19_920.0));
    }

    #[test]
    fn lots_stay_in_range() {
        let lots = generate_lots(200, 2, 7, 19_920.0);
        assert_eq!(lots.len(), 200);
        assert_eq!(lots[0].lot_id, "L001");
        assert_eq!(lots[199].lot_id, "L200");
        for lot in &lots {
            assert!((MIN_VIALS..=MAX_VIALS).contains(&lot.quantity));
            assert!(lot.lot_type == "VialE" || lot.lot_type == "VialH");
            // Largest lot still fits the default 120 h block
            assert!(lot.fill_hours < 120.0);
        }
    }
}
