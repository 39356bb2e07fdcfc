//! `occugrid-mapping` – occupancy-grid update engine.
//!
//! Folds recorded odometry and planar laser scans into a 2-D map whose
//! cells hold the log-odds that the patch of space they cover is occupied.
//!
//! # Modules
//!
//! - [`grid`] – [`OccupancyGrid`][grid::OccupancyGrid]: clamped log-odds
//!   cells plus the world ↔ cell transform
//!   ([`GridGeometry`][grid::GridGeometry]) and the read-only
//!   [`ProbabilitySnapshot`][grid::ProbabilitySnapshot] handed to renderers.
//! - [`beam_tracer`] – [`trace_beam`][beam_tracer::trace_beam]: pure
//!   Bresenham walk from a beam's origin to its endpoint, tagging each cell
//!   free or hit and truncating at the grid boundary.
//! - [`sensor_model`] – [`InverseSensorModel`][sensor_model::InverseSensorModel]:
//!   constant log-odds increment per [`CellRole`][sensor_model::CellRole].
//! - [`pose_track`] – [`PoseTrack`][pose_track::PoseTrack]: time-ordered
//!   poses with nearest and interpolated lookup.
//! - [`updater`] – [`Mapper`][updater::Mapper]: the per-scan, per-beam
//!   control loop that ties the pieces together.
//! - [`config`] – [`MapperConfig`][config::MapperConfig]: the immutable
//!   configuration value, validated before any scan is processed.
//! - [`log_odds`] – logit/logistic helpers and clamp bounds.

pub mod beam_tracer;
pub mod config;
pub mod grid;
pub mod log_odds;
pub mod pose_track;
pub mod sensor_model;
pub mod updater;

pub use config::{GridConfig, MapperConfig, ModelConfig, PoseAssociation, SensorConfig};
pub use grid::{GridCoord, GridGeometry, OccupancyGrid, ProbabilitySnapshot};
pub use pose_track::PoseTrack;
pub use sensor_model::{CellRole, InverseSensorModel};
pub use updater::{Mapper, RunStats, ScanProgress, ScanStats, build_map};
