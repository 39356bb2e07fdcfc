//! Time-indexed robot poses.
//!
//! A [`PoseTrack`] holds the odometry samples of a run, sorted by time, and
//! answers "where was the robot at time `t`?" for each scan.
//!
//! # Association policy
//!
//! [`PoseTrack::nearest`] returns the sample with the smallest `|t − tᵢ|`.
//! When a scan sits exactly between two samples the **earlier** one wins.
//! [`PoseTrack::interpolate`] blends the two bracketing samples instead and
//! clamps to the first/last sample outside the track.

use occugrid_types::{MapError, Pose, StampedPose, normalize_angle};

use crate::config::PoseAssociation;

/// Non-empty, time-ordered sequence of pose samples.
///
/// # Example
///
/// ```rust
/// use occugrid_mapping::pose_track::PoseTrack;
/// use occugrid_types::{Pose, StampedPose};
///
/// let track = PoseTrack::new(vec![
///     StampedPose::new(0.0, Pose::new(0.0, 0.0, 0.0)),
///     StampedPose::new(1.0, Pose::new(1.0, 0.0, 0.0)),
/// ])
/// .unwrap();
///
/// // Equidistant: the earlier sample wins.
/// assert_eq!(track.nearest(0.5).timestamp, 0.0);
/// assert!((track.interpolate(0.5).x - 0.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PoseTrack {
    samples: Vec<StampedPose>,
}

impl PoseTrack {
    /// Build a track, rejecting empty, non-finite, or out-of-order input.
    pub fn new(samples: Vec<StampedPose>) -> Result<Self, MapError> {
        if samples.is_empty() {
            return Err(MapError::EmptyPoseTrack);
        }
        for (index, s) in samples.iter().enumerate() {
            if !s.timestamp.is_finite() || !s.pose.is_finite() {
                return Err(MapError::NonFinitePose { index });
            }
        }
        for (index, pair) in samples.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(MapError::UnorderedPoseTrack {
                    index: index + 1,
                    previous: pair[0].timestamp,
                    timestamp: pair[1].timestamp,
                });
            }
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[StampedPose] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`; construction rejects empty tracks.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `(first, last)` sample timestamps.
    pub fn time_span(&self) -> (f64, f64) {
        let first = self.samples[0].timestamp;
        let last = self.samples[self.samples.len() - 1].timestamp;
        (first, last)
    }

    /// Sample closest to `t`; ties go to the earlier sample.
    pub fn nearest(&self, t: f64) -> &StampedPose {
        // First sample at or after `t`.
        let after = self.samples.partition_point(|s| s.timestamp < t);
        if after == 0 {
            return &self.samples[0];
        }
        let before = &self.samples[after - 1];
        match self.samples.get(after) {
            Some(next) if next.timestamp - t < t - before.timestamp => next,
            _ => before,
        }
    }

    /// Pose at `t`, linearly interpolated between the bracketing samples.
    ///
    /// Heading is blended along the shorter arc.
    pub fn interpolate(&self, t: f64) -> Pose {
        let after = self.samples.partition_point(|s| s.timestamp < t);
        if after == 0 {
            return self.samples[0].pose;
        }
        let Some(next) = self.samples.get(after) else {
            return self.samples[self.samples.len() - 1].pose;
        };
        let prev = &self.samples[after - 1];

        let span = next.timestamp - prev.timestamp;
        if span <= 0.0 {
            return prev.pose;
        }
        let alpha = (t - prev.timestamp) / span;
        let (a, b) = (prev.pose, next.pose);
        Pose::new(
            a.x + alpha * (b.x - a.x),
            a.y + alpha * (b.y - a.y),
            normalize_angle(a.theta + alpha * normalize_angle(b.theta - a.theta)),
        )
    }

    /// Pose for a scan taken at `t` under the given association policy.
    pub fn resolve(&self, t: f64, association: PoseAssociation) -> Pose {
        match association {
            PoseAssociation::Nearest => self.nearest(t).pose,
            PoseAssociation::Interpolated => self.interpolate(t),
        }
    }
}
