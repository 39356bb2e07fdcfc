//! Occupancy grid storage and the world ↔ cell transform.
//!
//! # Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`GridCoord`]           | An in-bounds cell index `(x, y)`.                    |
//! | [`GridGeometry`]        | Origin, resolution and extent; pure coordinate math. |
//! | [`OccupancyGrid`]       | Clamped log-odds cells; the only mutable map state.  |
//! | [`ProbabilitySnapshot`] | Read-only probability array handed to renderers.     |
//!
//! Cells are stored row-major (`index = y * width + x`). Cell `(x, y)` covers
//! the half-open world square
//! `[origin.x + x·res, origin.x + (x+1)·res) × [origin.y + y·res, origin.y + (y+1)·res)`.

use occugrid_types::{MapError, Point2};
use serde::{Deserialize, Serialize};

use crate::config::MapperConfig;
use crate::log_odds::{LogOddsBounds, logistic, logit};

/// Most cells a grid may hold: the `f64` buffer must stay addressable.
pub const MAX_CELLS: usize = isize::MAX as usize / std::mem::size_of::<f64>();

// ────────────────────────────────────────────────────────────────────────────
// GridCoord
// ────────────────────────────────────────────────────────────────────────────

/// Column (`x`) and row (`y`) of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: usize,
    pub y: usize,
}

impl GridCoord {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GridGeometry
// ────────────────────────────────────────────────────────────────────────────

/// Placement and extent of a grid, without any cell data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    origin: Point2,
    resolution: f64,
    width: usize,
    height: usize,
}

impl GridGeometry {
    pub fn new(origin: Point2, resolution: f64, width: usize, height: usize) -> Result<Self, MapError> {
        if width == 0 || height == 0 {
            return Err(MapError::Configuration(format!(
                "grid dimensions must be positive (got {width}x{height})"
            )));
        }
        let fits = width
            .checked_mul(height)
            .is_some_and(|n| n <= MAX_CELLS);
        if !fits {
            return Err(MapError::Configuration(format!(
                "grid of {width}x{height} cells is too large"
            )));
        }
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(MapError::Configuration(format!(
                "resolution must be > 0 (got {resolution})"
            )));
        }
        if !origin.is_finite() {
            return Err(MapError::Configuration("grid origin must be finite".to_string()));
        }
        Ok(Self {
            origin,
            resolution,
            width,
            height,
        })
    }

    pub fn origin(&self) -> Point2 {
        self.origin
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Always `false`; a geometry has at least one cell.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Cell containing `point`, or `None` when it lies outside the grid.
    pub fn world_to_cell(&self, point: Point2) -> Option<GridCoord> {
        let (ix, iy) = self.world_to_cell_unbounded(point);
        self.cell_at(ix, iy)
    }

    /// `floor((point − origin) / resolution)` without a bounds check.
    ///
    /// Non-finite points map to `(0, 0)`; callers should filter them first.
    pub fn world_to_cell_unbounded(&self, point: Point2) -> (i64, i64) {
        let cx = ((point.x - self.origin.x) / self.resolution).floor();
        let cy = ((point.y - self.origin.y) / self.resolution).floor();
        (cx as i64, cy as i64)
    }

    /// Bounds-checked conversion from signed indices.
    pub fn cell_at(&self, ix: i64, iy: i64) -> Option<GridCoord> {
        if ix < 0 || iy < 0 {
            return None;
        }
        let (x, y) = (ix as usize, iy as usize);
        (x < self.width && y < self.height).then_some(GridCoord { x, y })
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    /// World position of the centre of `coord`.
    pub fn cell_center(&self, coord: GridCoord) -> Point2 {
        Point2::new(
            self.origin.x + (coord.x as f64 + 0.5) * self.resolution,
            self.origin.y + (coord.y as f64 + 0.5) * self.resolution,
        )
    }

    #[inline]
    fn index(&self, coord: GridCoord) -> usize {
        coord.y * self.width + coord.x
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OccupancyGrid
// ────────────────────────────────────────────────────────────────────────────

/// 2-D grid of clamped log-odds occupancy values.
///
/// Every stored value lies within the grid's [`LogOddsBounds`], so the
/// derived probability is always strictly inside `(0, 1)` and every cell can
/// still be moved by new evidence.
///
/// # Example
///
/// ```rust
/// use occugrid_mapping::grid::{GridCoord, GridGeometry, OccupancyGrid};
/// use occugrid_mapping::log_odds::LogOddsBounds;
/// use occugrid_types::Point2;
///
/// let geometry = GridGeometry::new(Point2::new(0.0, 0.0), 1.0, 10, 10).unwrap();
/// let bounds = LogOddsBounds::new(-4.0, 4.0).unwrap();
/// let mut grid = OccupancyGrid::new(geometry, 0.5, bounds).unwrap();
///
/// let cell = grid.geometry().world_to_cell(Point2::new(8.2, 5.9)).unwrap();
/// assert_eq!(cell, GridCoord::new(8, 5));
///
/// grid.apply_increment(cell, 100.0);
/// assert_eq!(grid.log_odds(cell), Some(4.0));
/// assert!(grid.probability(cell).unwrap() < 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    geometry: GridGeometry,
    bounds: LogOddsBounds,
    prior_log_odds: f64,
    cells: Vec<f64>,
}

impl OccupancyGrid {
    /// Create a grid with every cell at the log-odds of `prior`.
    pub fn new(geometry: GridGeometry, prior: f64, bounds: LogOddsBounds) -> Result<Self, MapError> {
        let prior_log_odds = prior_log_odds(prior, bounds)?;
        Ok(Self {
            geometry,
            bounds,
            prior_log_odds,
            cells: vec![prior_log_odds; geometry.len()],
        })
    }

    /// Build from parts that have already been validated together.
    pub(crate) fn from_parts(geometry: GridGeometry, bounds: LogOddsBounds, prior_log_odds: f64) -> Self {
        Self {
            geometry,
            bounds,
            prior_log_odds,
            cells: vec![prior_log_odds; geometry.len()],
        }
    }

    /// Validate `config` and build the grid it describes.
    pub fn from_config(config: &MapperConfig) -> Result<Self, MapError> {
        config.validate()?;
        let g = &config.grid;
        let geometry = GridGeometry::new(g.origin(), g.resolution, g.width, g.height)?;
        Self::new(geometry, config.model.prior, config.bounds()?)
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn bounds(&self) -> LogOddsBounds {
        self.bounds
    }

    /// Log-odds every cell started with.
    pub fn prior_log_odds(&self) -> f64 {
        self.prior_log_odds
    }

    /// Raw row-major log-odds values.
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    pub fn log_odds(&self, coord: GridCoord) -> Option<f64> {
        self.geometry
            .contains(coord)
            .then(|| self.cells[self.geometry.index(coord)])
    }

    /// Occupancy probability of `coord`, strictly inside `(0, 1)`.
    pub fn probability(&self, coord: GridCoord) -> Option<f64> {
        self.log_odds(coord).map(logistic)
    }

    /// Add `delta` to the cell's log-odds and clamp into the bounds.
    ///
    /// Returns `false` (and changes nothing) for out-of-bounds cells or a
    /// non-finite `delta`.
    pub fn apply_increment(&mut self, coord: GridCoord, delta: f64) -> bool {
        if !self.geometry.contains(coord) || !delta.is_finite() {
            return false;
        }
        let i = self.geometry.index(coord);
        self.cells[i] = self.bounds.clamp(self.cells[i] + delta);
        true
    }

    /// Reset every cell to the prior.
    pub fn reset(&mut self) {
        self.cells.fill(self.prior_log_odds);
    }

    /// Copy the current map out as probabilities.
    pub fn snapshot(&self) -> ProbabilitySnapshot {
        ProbabilitySnapshot {
            geometry: self.geometry,
            probabilities: self.cells.iter().copied().map(logistic).collect(),
        }
    }

    /// Count `(free, unknown, occupied)` cells.
    ///
    /// A cell is free below `free_below` and occupied above
    /// `occupied_above` (both probabilities); everything else is unknown.
    pub fn count_cells(&self, free_below: f64, occupied_above: f64) -> (usize, usize, usize) {
        let (mut free, mut unknown, mut occupied) = (0, 0, 0);
        for &l in &self.cells {
            let p = logistic(l);
            if p < free_below {
                free += 1;
            } else if p > occupied_above {
                occupied += 1;
            } else {
                unknown += 1;
            }
        }
        (free, unknown, occupied)
    }
}

/// Log-odds of `prior`, which must lie strictly inside `(0, 1)` and map
/// into `bounds`.
pub fn prior_log_odds(prior: f64, bounds: LogOddsBounds) -> Result<f64, MapError> {
    if !(prior > 0.0 && prior < 1.0) {
        return Err(MapError::Configuration(format!(
            "prior must lie strictly between 0 and 1 (got {prior})"
        )));
    }
    let l = logit(prior);
    if !bounds.contains(l) {
        return Err(MapError::Configuration(format!(
            "prior log-odds {l:.3} falls outside [{}, {}]",
            bounds.min(),
            bounds.max()
        )));
    }
    Ok(l)
}

// ────────────────────────────────────────────────────────────────────────────
// ProbabilitySnapshot
// ────────────────────────────────────────────────────────────────────────────

/// Occupancy probabilities copied out of an [`OccupancyGrid`].
///
/// This is the only contract renderers depend on: a `width × height`
/// row-major array where row 0 is the lowest world Y.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilitySnapshot {
    geometry: GridGeometry,
    probabilities: Vec<f64>,
}

impl ProbabilitySnapshot {
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn width(&self) -> usize {
        self.geometry.width
    }

    pub fn height(&self) -> usize {
        self.geometry.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        let coord = GridCoord::new(x, y);
        self.geometry
            .contains(coord)
            .then(|| self.probabilities[self.geometry.index(coord)])
    }

    /// Row-major probabilities.
    pub fn as_slice(&self) -> &[f64] {
        &self.probabilities
    }

    /// Rows from lowest to highest world Y.
    pub fn rows(&self) -> impl DoubleEndedIterator<Item = &[f64]> + '_ {
        self.probabilities.chunks_exact(self.geometry.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(w: usize, h: usize) -> GridGeometry {
        GridGeometry::new(Point2::new(0.0, 0.0), 1.0, w, h).unwrap()
    }

    fn grid(w: usize, h: usize) -> OccupancyGrid {
        OccupancyGrid::new(geometry(w, h), 0.5, LogOddsBounds::new(-5.0, 5.0).unwrap()).unwrap()
    }

    // ── geometry ────────────────────────────────────────────────────────────

    #[test]
    fn geometry_rejects_bad_inputs() {
        let o = Point2::new(0.0, 0.0);
        assert!(GridGeometry::new(o, 1.0, 0, 5).is_err());
        assert!(GridGeometry::new(o, 0.0, 5, 5).is_err());
        assert!(GridGeometry::new(o, -0.1, 5, 5).is_err());
        assert!(GridGeometry::new(Point2::new(f64::NAN, 0.0), 1.0, 5, 5).is_err());
    }

    #[test]
    fn world_to_cell_floors_relative_to_origin() {
        let g = GridGeometry::new(Point2::new(-2.0, 1.0), 0.5, 8, 8).unwrap();
        assert_eq!(g.world_to_cell(Point2::new(-2.0, 1.0)), Some(GridCoord::new(0, 0)));
        assert_eq!(g.world_to_cell(Point2::new(-0.01, 1.49)), Some(GridCoord::new(3, 0)));
        assert_eq!(g.world_to_cell(Point2::new(1.99, 4.99)), Some(GridCoord::new(7, 7)));
    }

    #[test]
    fn world_to_cell_out_of_bounds() {
        let g = geometry(10, 10);
        assert_eq!(g.world_to_cell(Point2::new(-0.001, 5.0)), None);
        assert_eq!(g.world_to_cell(Point2::new(10.0, 5.0)), None);
        assert_eq!(g.world_to_cell(Point2::new(5.0, 10.0)), None);
        assert_eq!(g.world_to_cell_unbounded(Point2::new(-0.5, 12.0)), (-1, 12));
    }

    #[test]
    fn cell_center_is_mid_square() {
        let g = GridGeometry::new(Point2::new(1.0, 1.0), 0.5, 4, 4).unwrap();
        let c = g.cell_center(GridCoord::new(2, 1));
        assert!((c.x - 2.25).abs() < 1e-12);
        assert!((c.y - 1.75).abs() < 1e-12);
        assert_eq!(g.world_to_cell(c), Some(GridCoord::new(2, 1)));
    }

    // ── grid ────────────────────────────────────────────────────────────────

    #[test]
    fn new_grid_holds_prior_everywhere() {
        let geometry = geometry(3, 2);
        let bounds = LogOddsBounds::new(-5.0, 5.0).unwrap();
        let g = OccupancyGrid::new(geometry, 0.3, bounds).unwrap();
        let expected = logit(0.3);
        assert_eq!(g.cells().len(), 6);
        assert!(g.cells().iter().all(|&l| l == expected));
        assert!((g.probability(GridCoord::new(2, 1)).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn new_grid_rejects_degenerate_prior() {
        let bounds = LogOddsBounds::new(-5.0, 5.0).unwrap();
        assert!(OccupancyGrid::new(geometry(2, 2), 0.0, bounds).is_err());
        assert!(OccupancyGrid::new(geometry(2, 2), 1.0, bounds).is_err());
        assert!(OccupancyGrid::new(geometry(2, 2), 0.999, bounds).is_err());
    }

    #[test]
    fn apply_increment_accumulates_and_clamps() {
        let mut g = grid(4, 4);
        let c = GridCoord::new(1, 2);
        assert!(g.apply_increment(c, 1.5));
        assert!(g.apply_increment(c, 1.5));
        assert_eq!(g.log_odds(c), Some(3.0));
        g.apply_increment(c, 10.0);
        assert_eq!(g.log_odds(c), Some(5.0));
        g.apply_increment(c, -100.0);
        assert_eq!(g.log_odds(c), Some(-5.0));
        // Saturated cell still responds to opposite evidence.
        g.apply_increment(c, 1.0);
        assert_eq!(g.log_odds(c), Some(-4.0));
    }

    #[test]
    fn apply_increment_ignores_invalid_targets() {
        let mut g = grid(4, 4);
        let before = g.clone();
        assert!(!g.apply_increment(GridCoord::new(4, 0), 1.0));
        assert!(!g.apply_increment(GridCoord::new(0, 0), f64::NAN));
        assert_eq!(g, before);
    }

    #[test]
    fn probability_never_reaches_extremes() {
        let geometry = geometry(1, 1);
        let bounds = LogOddsBounds::new(-30.0, 30.0).unwrap();
        let mut g = OccupancyGrid::new(geometry, 0.5, bounds).unwrap();
        let c = GridCoord::new(0, 0);
        for _ in 0..1000 {
            g.apply_increment(c, 5.0);
        }
        let p = g.probability(c).unwrap();
        assert!(p > 0.5 && p < 1.0);
        for _ in 0..2000 {
            g.apply_increment(c, -5.0);
        }
        let p = g.probability(c).unwrap();
        assert!(p > 0.0 && p < 0.5);
    }

    #[test]
    fn reset_restores_prior() {
        let mut g = grid(3, 3);
        g.apply_increment(GridCoord::new(1, 1), 2.0);
        g.reset();
        assert!(g.cells().iter().all(|&l| l == 0.0));
    }

    #[test]
    fn count_cells_by_threshold() {
        let mut g = grid(3, 1);
        g.apply_increment(GridCoord::new(0, 0), -2.0);
        g.apply_increment(GridCoord::new(2, 0), 2.0);
        assert_eq!(g.count_cells(0.4, 0.6), (1, 1, 1));
    }

    // ── snapshot ────────────────────────────────────────────────────────────

    #[test]
    fn snapshot_mirrors_grid_layout() {
        let mut g = grid(3, 2);
        g.apply_increment(GridCoord::new(2, 1), 3.0);
        let snap = g.snapshot();
        assert_eq!((snap.width(), snap.height()), (3, 2));
        assert_eq!(snap.get(0, 0), Some(0.5));
        assert!(snap.get(2, 1).unwrap() > 0.9);
        assert_eq!(snap.get(3, 0), None);

        let rows: Vec<&[f64]> = snap.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][2], snap.get(2, 1).unwrap());
    }
}
