//! Mapper configuration.
//!
//! A [`MapperConfig`] is built once (usually deserialised from the CLI's
//! TOML file), checked with [`MapperConfig::validate`], and handed to
//! [`Mapper::new`][crate::updater::Mapper::new]. The engine never reads
//! configuration from the environment on its own.

use std::f64::consts::{PI, TAU};

use occugrid_types::{MapError, Point2};
use serde::{Deserialize, Serialize};

use crate::grid::{GridGeometry, prior_log_odds};
use crate::log_odds::LogOddsBounds;
use crate::sensor_model::InverseSensorModel;

// ────────────────────────────────────────────────────────────────────────────
// Sections
// ────────────────────────────────────────────────────────────────────────────

/// Grid extent and placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of cells along X.
    pub width: usize,
    /// Number of cells along Y.
    pub height: usize,
    /// Cell edge length (metres per cell).
    pub resolution: f64,
    /// World X of the lower-left corner of cell (0, 0).
    pub origin_x: f64,
    /// World Y of the lower-left corner of cell (0, 0).
    pub origin_y: f64,
}

impl GridConfig {
    pub fn origin(&self) -> Point2 {
        Point2::new(self.origin_x, self.origin_y)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
            resolution: 0.1,
            origin_x: -20.0,
            origin_y: -20.0,
        }
    }
}

/// Planar range sensor limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Readings at or above this distance carry no obstacle evidence.
    pub max_range: f64,
    /// Total angular span of a sweep (radians).
    pub field_of_view: f64,
    /// Vendor value reported for "no return", if distinct from `max_range`.
    pub no_return_sentinel: Option<f64>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            max_range: 50.0,
            field_of_view: PI,
            no_return_sentinel: None,
        }
    }
}

/// Prior, inverse sensor model increments and clamp bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Occupancy probability every cell starts with.
    pub prior: f64,
    /// Log-odds added to a cell holding a beam's obstacle return.
    pub log_odds_hit: f64,
    /// Log-odds added to a cell a beam passed through.
    pub log_odds_free: f64,
    pub log_odds_min: f64,
    pub log_odds_max: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            prior: 0.5,
            log_odds_hit: 0.9,
            log_odds_free: -0.7,
            log_odds_min: -10.0,
            log_odds_max: 10.0,
        }
    }
}

/// How a scan is paired with a pose from the odometry track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseAssociation {
    /// The sample closest in time; ties go to the earlier sample.
    #[default]
    Nearest,
    /// Linear blend of the two samples that bracket the scan time.
    Interpolated,
}

impl std::fmt::Display for PoseAssociation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoseAssociation::Nearest => write!(f, "nearest"),
            PoseAssociation::Interpolated => write!(f, "interpolated"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MapperConfig
// ────────────────────────────────────────────────────────────────────────────

/// Every scalar the engine consumes, supplied once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub grid: GridConfig,
    pub sensor: SensorConfig,
    pub model: ModelConfig,
    pub association: PoseAssociation,
}

impl MapperConfig {
    /// Check every field before any processing starts.
    pub fn validate(&self) -> Result<(), MapError> {
        self.validate_grid()?;
        self.validate_sensor()?;
        self.validate_model()
    }

    /// Clamp bounds as a validated interval.
    pub fn bounds(&self) -> Result<LogOddsBounds, MapError> {
        LogOddsBounds::new(self.model.log_odds_min, self.model.log_odds_max)
    }

    fn validate_grid(&self) -> Result<(), MapError> {
        let g = &self.grid;
        GridGeometry::new(g.origin(), g.resolution, g.width, g.height).map(|_| ())
    }

    fn validate_sensor(&self) -> Result<(), MapError> {
        let s = &self.sensor;
        if !s.max_range.is_finite() || s.max_range <= 0.0 {
            return Err(invalid(format!("max_range must be > 0 (got {})", s.max_range)));
        }
        if !s.field_of_view.is_finite() || s.field_of_view <= 0.0 || s.field_of_view > TAU {
            return Err(invalid(format!(
                "field_of_view must be in (0, 2π] (got {})",
                s.field_of_view
            )));
        }
        if let Some(sentinel) = s.no_return_sentinel
            && !sentinel.is_finite()
        {
            return Err(invalid("no_return_sentinel must be finite".to_string()));
        }
        Ok(())
    }

    fn validate_model(&self) -> Result<(), MapError> {
        InverseSensorModel::from_config(&self.model)?;
        prior_log_odds(self.model.prior, self.bounds()?).map(|_| ())
    }
}

fn invalid(reason: String) -> MapError {
    MapError::Configuration(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rejected(cfg: MapperConfig, needle: &str) {
        match cfg.validate() {
            Err(MapError::Configuration(msg)) => {
                assert!(msg.contains(needle), "message {msg:?} should mention {needle:?}")
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(MapperConfig::default().validate().is_ok());
    }

    // ── grid ────────────────────────────────────────────────────────────────

    #[test]
    fn zero_dimension_rejected() {
        let mut cfg = MapperConfig::default();
        cfg.grid.width = 0;
        assert_rejected(cfg, "dimensions");
    }

    #[test]
    fn non_positive_resolution_rejected() {
        let mut cfg = MapperConfig::default();
        cfg.grid.resolution = 0.0;
        assert_rejected(cfg, "resolution");
        cfg.grid.resolution = f64::NAN;
        assert_rejected(cfg, "resolution");
    }

    #[test]
    fn grid_errors_match_geometry_constructor() {
        let cases = [
            (0, 10, 1.0),
            (10, 10, -0.5),
            (usize::MAX, 2, 1.0),
            (crate::grid::MAX_CELLS + 1, 1, 1.0),
        ];
        for (width, height, resolution) in cases {
            let mut cfg = MapperConfig::default();
            cfg.grid.width = width;
            cfg.grid.height = height;
            cfg.grid.resolution = resolution;
            let direct = GridGeometry::new(cfg.grid.origin(), resolution, width, height);
            assert_eq!(cfg.validate(), direct.map(|_| ()));
        }
    }

    #[test]
    fn overflowing_grid_rejected() {
        let mut cfg = MapperConfig::default();
        cfg.grid.width = usize::MAX;
        cfg.grid.height = 2;
        assert_rejected(cfg, "too large");
    }

    // ── sensor ──────────────────────────────────────────────────────────────

    #[test]
    fn bad_sensor_limits_rejected() {
        let mut cfg = MapperConfig::default();
        cfg.sensor.max_range = -1.0;
        assert_rejected(cfg, "max_range");

        let mut cfg = MapperConfig::default();
        cfg.sensor.field_of_view = 7.0;
        assert_rejected(cfg, "field_of_view");

        let mut cfg = MapperConfig::default();
        cfg.sensor.no_return_sentinel = Some(f64::INFINITY);
        assert_rejected(cfg, "sentinel");
    }

    // ── model ───────────────────────────────────────────────────────────────

    #[test]
    fn prior_must_be_open_probability() {
        for prior in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            let mut cfg = MapperConfig::default();
            cfg.model.prior = prior;
            assert_rejected(cfg, "prior");
        }
    }

    #[test]
    fn increments_must_have_correct_sign() {
        let mut cfg = MapperConfig::default();
        cfg.model.log_odds_hit = -0.5;
        assert_rejected(cfg, "log_odds_hit");

        let mut cfg = MapperConfig::default();
        cfg.model.log_odds_free = 0.4;
        assert_rejected(cfg, "log_odds_free");
    }

    #[test]
    fn prior_outside_bounds_rejected() {
        let mut cfg = MapperConfig::default();
        cfg.model.prior = 0.95; // logit ≈ 2.94
        cfg.model.log_odds_max = 2.0;
        assert_rejected(cfg, "prior log-odds");
    }

    // ── serde ───────────────────────────────────────────────────────────────

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg: MapperConfig = toml::from_str(
            r#"
            association = "interpolated"

            [grid]
            width = 10
            resolution = 1.0
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.grid.width, 10);
        assert_eq!(cfg.grid.height, GridConfig::default().height);
        assert_eq!(cfg.association, PoseAssociation::Interpolated);
        assert_eq!(cfg.model, ModelConfig::default());
    }
}
