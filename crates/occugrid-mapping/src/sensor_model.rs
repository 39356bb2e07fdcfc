//! Binary inverse sensor model.
//!
//! Maps the role a cell plays in a traced beam to a constant log-odds
//! increment. No range-dependent attenuation is applied.

use occugrid_types::MapError;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::log_odds::logit;

/// What a traced beam says about one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellRole {
    /// The beam passed through the cell.
    Free,
    /// The beam's obstacle return lies in the cell.
    Hit,
    /// Beyond the measured range; the beam says nothing.
    ///
    /// [`trace_beam`][crate::beam_tracer::trace_beam] stops at the endpoint
    /// and never emits this role. Its increment is always zero.
    Unknown,
}

/// Constant increments for [`CellRole::Hit`] and [`CellRole::Free`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InverseSensorModel {
    hit: f64,
    free: f64,
}

impl InverseSensorModel {
    /// `hit` must be positive and `free` negative, both finite.
    pub fn new(hit: f64, free: f64) -> Result<Self, MapError> {
        if !hit.is_finite() || hit <= 0.0 {
            return Err(MapError::Configuration(format!("log_odds_hit must be > 0 (got {hit})")));
        }
        if !free.is_finite() || free >= 0.0 {
            return Err(MapError::Configuration(format!("log_odds_free must be < 0 (got {free})")));
        }
        Ok(Self { hit, free })
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self, MapError> {
        Self::new(config.log_odds_hit, config.log_odds_free)
    }

    /// Symmetric model from a single detection probability `p ∈ (0.5, 1)`:
    /// a hit adds `logit(p)`, a pass-through subtracts it.
    pub fn from_probability(p: f64) -> Result<Self, MapError> {
        if !(p > 0.5 && p < 1.0) {
            return Err(MapError::Configuration(format!(
                "detection probability must lie in (0.5, 1) (got {p})"
            )));
        }
        let l = logit(p);
        Self::new(l, -l)
    }

    pub fn increment_for(&self, role: CellRole) -> f64 {
        match role {
            CellRole::Hit => self.hit,
            CellRole::Free => self.free,
            CellRole::Unknown => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_follow_role() {
        let m = InverseSensorModel::new(0.9, -0.7).unwrap();
        assert_eq!(m.increment_for(CellRole::Hit), 0.9);
        assert_eq!(m.increment_for(CellRole::Free), -0.7);
        assert_eq!(m.increment_for(CellRole::Unknown), 0.0);
    }

    #[test]
    fn wrong_signs_rejected() {
        assert!(InverseSensorModel::new(-0.9, -0.7).is_err());
        assert!(InverseSensorModel::new(0.9, 0.7).is_err());
        assert!(InverseSensorModel::new(0.0, -0.7).is_err());
        assert!(InverseSensorModel::new(f64::INFINITY, -0.7).is_err());
    }

    #[test]
    fn from_probability_is_symmetric() {
        let m = InverseSensorModel::from_probability(0.7).unwrap();
        let hit = m.increment_for(CellRole::Hit);
        assert!((hit - (0.7f64 / 0.3).ln()).abs() < 1e-12);
        assert_eq!(m.increment_for(CellRole::Free), -hit);
    }

    #[test]
    fn from_probability_rejects_uninformative_values() {
        assert!(InverseSensorModel::from_probability(0.5).is_err());
        assert!(InverseSensorModel::from_probability(0.3).is_err());
        assert!(InverseSensorModel::from_probability(1.0).is_err());
    }

    #[test]
    fn from_config_uses_configured_magnitudes() {
        let m = InverseSensorModel::from_config(&ModelConfig::default()).unwrap();
        assert_eq!(m.increment_for(CellRole::Hit), ModelConfig::default().log_odds_hit);
    }
}
