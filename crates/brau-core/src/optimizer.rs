//! Shared-power duty cycle resolution.
//!
//! Both elements run off one feed that cannot carry both at full duty. When
//! the demanded fractions add up to more than one period, the demands are
//! redistributed by minimizing
//! `w_B·(u_B - u_B')² + w_M·(u_M - u_M')²` subject to `u_M' + u_B' = 1`.

use crate::error::ConfigError;
use crate::limits::{Range, Setting};
use crate::vessel::Vessel;
use serde::Serialize;

const WEIGHT_RANGE: Range = Range::new("mash weight", 0.01, 0.99);

/// Optimization weights. Only the mash weight is stored, so the pair always
/// sums to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimizerWeights {
    mash: f64,
}

impl OptimizerWeights {
    pub const EQUAL: OptimizerWeights = OptimizerWeights { mash: 0.5 };

    pub fn new(mash: f64) -> Result<Self, ConfigError> {
        let mash = Setting::new(mash).validate(&WEIGHT_RANGE)?.value();
        Ok(Self { mash })
    }

    /// Weights from the panel's integer percentage input.
    pub fn from_percent(mash_pct: f64) -> Result<Self, ConfigError> {
        Self::new(mash_pct / 100.0)
    }

    pub fn mash(&self) -> f64 {
        self.mash
    }

    pub fn boil(&self) -> f64 {
        1.0 - self.mash
    }
}

impl Default for OptimizerWeights {
    fn default() -> Self {
        Self::EQUAL
    }
}

/// Duty cycles, as fractions of the period, after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Resolution {
    pub mash: f64,
    pub boil: f64,
    /// Set when the demands were redistributed.
    pub active: bool,
}

impl Resolution {
    pub fn get(&self, vessel: Vessel) -> f64 {
        match vessel {
            Vessel::Mash => self.mash,
            Vessel::Boil => self.boil,
        }
    }
}

/// Resolves raw demands `mash`, `boil` in `[0, 1]` against the shared feed.
pub fn resolve(mash: f64, boil: f64, weights: OptimizerWeights) -> Resolution {
    if mash + boil > 1.0 {
        let boil = weights.mash() * (1.0 - mash) + weights.boil() * boil;
        Resolution {
            mash: 1.0 - boil,
            boil,
            active: true,
        }
    } else {
        Resolution {
            mash,
            boil,
            active: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_weights_split_oversubscription() {
        let res = resolve(0.6, 0.6, OptimizerWeights::EQUAL);
        assert!(res.active);
        assert!((res.boil - 0.5).abs() < 1e-12);
        assert!((res.mash - 0.5).abs() < 1e-12);
    }

    #[test]
    fn within_budget_passes_through() {
        let res = resolve(0.3, 0.7, OptimizerWeights::EQUAL);
        assert!(!res.active);
        assert_eq!((res.mash, res.boil), (0.3, 0.7));
    }

    #[test]
    fn mash_weight_favours_mash() {
        let weights = OptimizerWeights::new(0.9).unwrap();
        let res = resolve(1.0, 1.0, weights);
        // u_B' = 0.9 * 0 + 0.1 * 1
        assert!((res.boil - 0.1).abs() < 1e-12);
        assert!((res.mash - 0.9).abs() < 1e-12);
    }

    #[test]
    fn weights_outside_range_are_rejected() {
        assert!(OptimizerWeights::new(0.0).is_err());
        assert!(OptimizerWeights::new(1.0).is_err());
        assert!(OptimizerWeights::from_percent(99.0).is_ok());
        assert!(OptimizerWeights::from_percent(f64::NAN).is_err());
    }

    #[test]
    fn weights_sum_to_one() {
        let weights = OptimizerWeights::from_percent(37.0).unwrap();
        assert!((weights.mash() + weights.boil() - 1.0).abs() < 1e-15);
    }
}
