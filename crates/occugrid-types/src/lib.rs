//! `occugrid-types` – shared records for the occupancy-grid mapper.
//!
//! Plain, immutable data that flows from the log parser into the mapping
//! engine: robot poses, laser sweeps, and the error type surfaced when a run
//! cannot start.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A point in the 2-D world frame (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Wrap an angle into `(-π, π]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Robot pose in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// X position (metres).
    pub x: f64,
    /// Y position (metres).
    pub y: f64,
    /// Heading, counter-clockwise from +X (radians).
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// The pose's position, dropping the heading.
    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }

    /// Project a beam of length `range` at `angle_offset` (relative to the
    /// heading) into the world frame.
    pub fn project(&self, angle_offset: f64, range: f64) -> Point2 {
        let (sin, cos) = (self.theta + angle_offset).sin_cos();
        Point2::new(self.x + range * cos, self.y + range * sin)
    }
}

/// A pose sample from the odometry track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StampedPose {
    /// Sample time (seconds).
    pub timestamp: f64,
    pub pose: Pose,
}

impl StampedPose {
    pub fn new(timestamp: f64, pose: Pose) -> Self {
        Self { timestamp, pose }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Laser scans
// ────────────────────────────────────────────────────────────────────────────

/// One range measurement within a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    /// Beam direction relative to the robot heading (radians).
    pub angle_offset: f64,
    /// Measured distance (metres).
    pub range: f64,
}

impl Beam {
    pub fn new(angle_offset: f64, range: f64) -> Self {
        Self { angle_offset, range }
    }
}

/// A single laser sweep.
///
/// # Example
///
/// ```rust
/// use occugrid_types::Scan;
/// use std::f64::consts::PI;
///
/// // Three beams spread over a 180° field of view.
/// let scan = Scan::from_sweep(12.5, &[1.0, 2.0, 3.0], PI);
/// assert_eq!(scan.len(), 3);
/// assert!((scan.beams[0].angle_offset + PI / 2.0).abs() < 1e-12);
/// assert!((scan.beams[2].angle_offset - PI / 2.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scan {
    /// Acquisition time (seconds).
    pub timestamp: f64,
    /// Beams in sweep order.
    pub beams: Vec<Beam>,
}

impl Scan {
    pub fn new(timestamp: f64, beams: Vec<Beam>) -> Self {
        Self { timestamp, beams }
    }

    /// Build a sweep whose `i`-th beam points at `start_angle + i * increment`.
    pub fn from_ranges(timestamp: f64, ranges: &[f64], start_angle: f64, increment: f64) -> Self {
        let beams = ranges
            .iter()
            .enumerate()
            .map(|(i, &range)| Beam::new(start_angle + i as f64 * increment, range))
            .collect();
        Self { timestamp, beams }
    }

    /// Build a sweep with the ranges spread evenly over
    /// `[-field_of_view / 2, +field_of_view / 2]`.
    ///
    /// A single range points straight ahead.
    pub fn from_sweep(timestamp: f64, ranges: &[f64], field_of_view: f64) -> Self {
        match ranges.len() {
            0 => Self::new(timestamp, Vec::new()),
            1 => Self::from_ranges(timestamp, ranges, 0.0, 0.0),
            n => Self::from_ranges(
                timestamp,
                ranges,
                -field_of_view / 2.0,
                field_of_view / (n - 1) as f64,
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Fatal conditions that stop a mapping run before any scan is processed.
///
/// Per-beam problems (out-of-grid endpoints, no-return beams, malformed
/// ranges) are never reported through this type; the engine resolves them
/// in place.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Pose track is empty; no scan can be localised")]
    EmptyPoseTrack,

    #[error("Pose track out of order: sample {index} at t={timestamp} follows t={previous}")]
    UnorderedPoseTrack {
        index: usize,
        previous: f64,
        timestamp: f64,
    },

    #[error("Pose sample {index} is not finite")]
    NonFinitePose { index: usize },
}
