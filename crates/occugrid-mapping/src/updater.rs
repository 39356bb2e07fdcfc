//! Grid Updater – the mapping control loop.
//!
//! For each scan, in timestamp order:
//!
//! 1. resolve the robot pose from the [`PoseTrack`];
//! 2. project every beam to its world endpoint;
//! 3. trace the beam with [`trace_beam`];
//! 4. add the [`InverseSensorModel`] increment for each traced cell.
//!
//! Beams within a scan are independent. Their updates are plain log-odds
//! additions, so the order in which beams are applied does not change the
//! result (up to float rounding, and as long as no cell hits a clamp bound).
//!
//! Nothing inside the loop can abort a run. Out-of-grid endpoints are
//! truncated, no-return beams only carry free-space evidence, and malformed
//! beams are skipped and counted. Only a bad configuration or pose track
//! stops a run, and both are rejected before the first scan.

use std::ops::ControlFlow;

use occugrid_types::{Beam, MapError, Pose, Scan, StampedPose};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::beam_tracer::trace_beam;
use crate::config::MapperConfig;
use crate::grid::{GridGeometry, OccupancyGrid};
use crate::log_odds::{LogOddsBounds, logit};
use crate::pose_track::PoseTrack;
use crate::sensor_model::{CellRole, InverseSensorModel};

// ────────────────────────────────────────────────────────────────────────────
// Statistics
// ────────────────────────────────────────────────────────────────────────────

/// Per-scan beam accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Beams examined, including skipped ones.
    pub beams: usize,
    /// Beams whose obstacle return landed inside the grid.
    pub hits: usize,
    /// Beams at or beyond max range (or the sentinel).
    pub no_returns: usize,
    /// Returns whose endpoint fell outside the grid.
    pub truncated: usize,
    /// Malformed beams (negative or non-finite range or angle).
    pub skipped: usize,
    /// Individual cell increments applied.
    pub cell_updates: usize,
}

impl ScanStats {
    fn absorb(&mut self, other: &ScanStats) {
        self.beams += other.beams;
        self.hits += other.hits;
        self.no_returns += other.no_returns;
        self.truncated += other.truncated;
        self.skipped += other.skipped;
        self.cell_updates += other.cell_updates;
    }
}

/// Whole-run accounting returned by [`Mapper::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub scans_processed: usize,
    pub empty_scans: usize,
    /// Scans with a non-finite timestamp.
    pub skipped_scans: usize,
    /// True when the observer stopped the run early.
    pub interrupted: bool,
    pub totals: ScanStats,
}

/// Progress report handed to the [`Mapper::run_with`] observer after each
/// scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanProgress {
    /// Position in processing (timestamp) order, starting at 0.
    pub index: usize,
    pub total: usize,
    pub timestamp: f64,
    pub pose: Pose,
    pub stats: ScanStats,
}

// ────────────────────────────────────────────────────────────────────────────
// Mapper
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum BeamReading {
    /// Obstacle detected at this range.
    Return(f64),
    /// Nothing detected; free space up to this range.
    NoReturn(f64),
    Malformed,
}

/// Folds scans into an [`OccupancyGrid`] under a fixed configuration.
///
/// # Example
///
/// ```rust
/// use occugrid_mapping::{Mapper, MapperConfig, PoseTrack};
/// use occugrid_mapping::grid::GridCoord;
/// use occugrid_types::{Beam, Pose, Scan, StampedPose};
///
/// let mut config = MapperConfig::default();
/// config.grid.width = 10;
/// config.grid.height = 10;
/// config.grid.resolution = 1.0;
/// config.grid.origin_x = 0.0;
/// config.grid.origin_y = 0.0;
/// config.sensor.max_range = 5.0;
///
/// let mapper = Mapper::new(config).unwrap();
/// let track = PoseTrack::new(vec![StampedPose::new(0.0, Pose::new(5.0, 5.0, 0.0))]).unwrap();
/// let scans = vec![Scan::new(0.0, vec![Beam::new(0.0, 3.0)])];
///
/// let mut grid = mapper.new_grid();
/// mapper.run(&track, &scans, &mut grid);
///
/// assert!(grid.probability(GridCoord::new(8, 5)).unwrap() > 0.5);
/// assert!(grid.probability(GridCoord::new(6, 5)).unwrap() < 0.5);
/// assert_eq!(grid.probability(GridCoord::new(2, 2)), Some(0.5));
/// ```
#[derive(Debug, Clone)]
pub struct Mapper {
    config: MapperConfig,
    model: InverseSensorModel,
    geometry: GridGeometry,
    bounds: LogOddsBounds,
}

impl Mapper {
    /// Validate `config` and build a mapper for it.
    pub fn new(config: MapperConfig) -> Result<Self, MapError> {
        config.validate()?;
        let g = &config.grid;
        let geometry = GridGeometry::new(g.origin(), g.resolution, g.width, g.height)?;
        Ok(Self {
            model: InverseSensorModel::from_config(&config.model)?,
            bounds: config.bounds()?,
            geometry,
            config,
        })
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn model(&self) -> &InverseSensorModel {
        &self.model
    }

    /// Fresh grid at the configured size, every cell at the prior.
    pub fn new_grid(&self) -> OccupancyGrid {
        OccupancyGrid::from_parts(self.geometry, self.bounds, logit(self.config.model.prior))
    }

    fn classify(&self, beam: &Beam) -> BeamReading {
        let sensor = &self.config.sensor;
        if !beam.range.is_finite() || beam.range < 0.0 || !beam.angle_offset.is_finite() {
            return BeamReading::Malformed;
        }
        if sensor.no_return_sentinel == Some(beam.range) || beam.range >= sensor.max_range {
            return BeamReading::NoReturn(sensor.max_range);
        }
        BeamReading::Return(beam.range)
    }

    /// Apply every beam of `scan`, taken from `pose`, to `grid`.
    pub fn apply_scan(&self, grid: &mut OccupancyGrid, pose: &Pose, scan: &Scan) -> ScanStats {
        let mut stats = ScanStats::default();
        let origin = pose.position();

        for (i, beam) in scan.beams.iter().enumerate() {
            stats.beams += 1;
            let (range, returned) = match self.classify(beam) {
                BeamReading::Return(range) => (range, true),
                BeamReading::NoReturn(range) => {
                    stats.no_returns += 1;
                    (range, false)
                }
                BeamReading::Malformed => {
                    debug!(beam = i, range = beam.range, angle = beam.angle_offset, "skipping malformed beam");
                    stats.skipped += 1;
                    continue;
                }
            };

            let endpoint = pose.project(beam.angle_offset, range);
            let cells = trace_beam(grid.geometry(), origin, endpoint, returned);

            match cells.last() {
                Some(last) if last.role == CellRole::Hit => stats.hits += 1,
                _ if returned => stats.truncated += 1,
                _ => {}
            }

            for cell in &cells {
                if grid.apply_increment(cell.coord, self.model.increment_for(cell.role)) {
                    stats.cell_updates += 1;
                }
            }
        }

        stats
    }

    /// Fold all `scans` into a fresh grid and hand the grid back.
    pub fn map(&self, track: &PoseTrack, scans: &[Scan]) -> (OccupancyGrid, RunStats) {
        let mut grid = self.new_grid();
        let stats = self.run(track, scans, &mut grid);
        (grid, stats)
    }

    /// Fold all `scans` into `grid` in timestamp order.
    ///
    /// The grid is updated in place, so a caller can keep accumulating into
    /// one map across several calls; [`map`][Self::map] returns a new one.
    pub fn run(&self, track: &PoseTrack, scans: &[Scan], grid: &mut OccupancyGrid) -> RunStats {
        self.run_with(track, scans, grid, |_, _| ControlFlow::Continue(()))
    }

    /// Like [`run`][Self::run], calling `observe` after every scan.
    ///
    /// Returning [`ControlFlow::Break`] stops the run; scans already applied
    /// stay in the grid.
    #[instrument(skip_all, fields(scans = scans.len(), poses = track.len(), association = %self.config.association))]
    pub fn run_with<F>(
        &self,
        track: &PoseTrack,
        scans: &[Scan],
        grid: &mut OccupancyGrid,
        mut observe: F,
    ) -> RunStats
    where
        F: FnMut(&ScanProgress, &OccupancyGrid) -> ControlFlow<()>,
    {
        let mut order: Vec<usize> = (0..scans.len()).collect();
        if !scans.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
            warn!("scans are not in timestamp order; sorting before processing");
            order.sort_by(|&a, &b| scans[a].timestamp.total_cmp(&scans[b].timestamp));
        }

        let (first, last) = track.time_span();
        let mut run = RunStats::default();

        for (index, &i) in order.iter().enumerate() {
            let scan = &scans[i];
            if !scan.timestamp.is_finite() {
                warn!(scan = i, "skipping scan with non-finite timestamp");
                run.skipped_scans += 1;
                continue;
            }
            if scan.timestamp < first || scan.timestamp > last {
                debug!(scan = i, timestamp = scan.timestamp, "scan lies outside the pose track");
            }

            let pose = track.resolve(scan.timestamp, self.config.association);
            let stats = self.apply_scan(grid, &pose, scan);
            if scan.is_empty() {
                run.empty_scans += 1;
            }
            run.scans_processed += 1;
            run.totals.absorb(&stats);
            debug!(scan = i, timestamp = scan.timestamp, hits = stats.hits, cells = stats.cell_updates, "scan applied");

            let progress = ScanProgress {
                index,
                total: order.len(),
                timestamp: scan.timestamp,
                pose,
                stats,
            };
            if observe(&progress, grid).is_break() {
                info!(processed = run.scans_processed, "mapping run stopped early");
                run.interrupted = true;
                break;
            }
        }

        info!(
            scans = run.scans_processed,
            beams = run.totals.beams,
            hits = run.totals.hits,
            no_returns = run.totals.no_returns,
            skipped = run.totals.skipped,
            "mapping run complete"
        );
        run
    }
}

/// Validate everything up front, then build the map in one pass.
///
/// Configuration errors are reported before pose-track errors.
pub fn build_map(
    config: MapperConfig,
    poses: Vec<StampedPose>,
    scans: &[Scan],
) -> Result<(OccupancyGrid, RunStats), MapError> {
    let mapper = Mapper::new(config)?;
    let track = PoseTrack::new(poses)?;
    Ok(mapper.map(&track, scans))
}
