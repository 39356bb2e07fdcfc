//! Log-odds arithmetic.
//!
//! ```text
//! l = log(p / (1 − p))          p = 1 / (1 + e^(−l))
//! ```
//!
//! Occupancy evidence is accumulated additively in log-odds space and only
//! converted back to a probability when a snapshot is taken.

use occugrid_types::MapError;
use serde::{Deserialize, Serialize};

/// Largest clamp magnitude accepted by [`LogOddsBounds::new`].
///
/// Beyond ~36.7 the logistic function rounds to exactly `1.0` in `f64`,
/// which would let a cell report a certain probability.
pub const MAX_LOG_ODDS_MAGNITUDE: f64 = 30.0;

/// Log-odds of probability `p`. Not clamped; `p` of 0 or 1 gives ±∞.
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Probability for log-odds value `l`.
pub fn logistic(l: f64) -> f64 {
    1.0 / (1.0 + (-l).exp())
}

/// Closed interval `[min, max]` every stored cell value is clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogOddsBounds {
    min: f64,
    max: f64,
}

impl LogOddsBounds {
    pub fn new(min: f64, max: f64) -> Result<Self, MapError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(MapError::Configuration(format!(
                "log-odds bounds must be finite (got [{min}, {max}])"
            )));
        }
        if min >= max {
            return Err(MapError::Configuration(format!(
                "log_odds_min ({min}) must be below log_odds_max ({max})"
            )));
        }
        if min < -MAX_LOG_ODDS_MAGNITUDE || max > MAX_LOG_ODDS_MAGNITUDE {
            return Err(MapError::Configuration(format!(
                "log-odds bounds must lie within ±{MAX_LOG_ODDS_MAGNITUDE} (got [{min}, {max}])"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logit_of_half_is_zero() {
        assert_eq!(logit(0.5), 0.0);
        assert_eq!(logistic(0.0), 0.5);
    }

    #[test]
    fn logistic_inverts_logit() {
        for p in [0.01, 0.2, 0.5, 0.7, 0.99] {
            assert!((logistic(logit(p)) - p).abs() < 1e-12);
        }
    }

    #[test]
    fn logistic_stays_open_at_magnitude_limit() {
        let hi = logistic(MAX_LOG_ODDS_MAGNITUDE);
        let lo = logistic(-MAX_LOG_ODDS_MAGNITUDE);
        assert!(hi < 1.0 && hi > 0.5);
        assert!(lo > 0.0 && lo < 0.5);
    }

    #[test]
    fn bounds_reject_bad_intervals() {
        assert!(LogOddsBounds::new(1.0, -1.0).is_err());
        assert!(LogOddsBounds::new(2.0, 2.0).is_err());
        assert!(LogOddsBounds::new(f64::NEG_INFINITY, 1.0).is_err());
        assert!(LogOddsBounds::new(-50.0, 50.0).is_err());
        assert!(LogOddsBounds::new(-5.0, 5.0).is_ok());
    }

    #[test]
    fn clamp_pins_to_interval() {
        let b = LogOddsBounds::new(-2.0, 3.0).unwrap();
        assert_eq!(b.clamp(10.0), 3.0);
        assert_eq!(b.clamp(-10.0), -2.0);
        assert_eq!(b.clamp(0.5), 0.5);
        assert!(b.contains(3.0));
        assert!(!b.contains(3.01));
    }
}
