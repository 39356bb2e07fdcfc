//! Discrete beam tracing.
//!
//! Turns a continuous beam (origin → endpoint, world frame) into the ordered
//! cells it crosses, tagged with the [`CellRole`] each plays. Tracing is a
//! pure function of the grid geometry; applying the result to the log-odds
//! map is the updater's job.
//!
//! # Algorithm
//!
//! Both endpoints are floored to cell indices and joined with Bresenham's
//! integer line walk:
//!
//! ```text
//! From (0,0) to (7,3):
//!
//!     3 │              ●
//!     2 │        ● ●
//!     1 │    ● ●
//!     0 ● ●
//!       └────────────────
//!        0 1 2 3 4 5 6 7
//! ```
//!
//! Every step moves at most one cell along each axis, so the path is
//! 8-connected and never revisits a cell. On an error tie the X step is
//! decided before the Y step, which makes the walk reproducible.
//!
//! The world segment is first clipped to the grid rectangle (Liang–Barsky),
//! so the walk only ever sees in-grid indices. A beam that starts outside
//! the grid contributes the contiguous run of cells it crosses, and one that
//! leaves the grid is cut at the boundary.

use occugrid_types::Point2;

use crate::grid::{GridCoord, GridGeometry};
use crate::sensor_model::CellRole;

/// One cell on a traced beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracedCell {
    pub coord: GridCoord,
    pub role: CellRole,
}

/// Trace a beam from `origin` to `endpoint`.
///
/// The returned cells run from the origin's cell towards the endpoint's cell.
/// They are all [`CellRole::Free`], except that the last one is
/// [`CellRole::Hit`] when `returned` is set **and** the endpoint cell lies
/// inside the grid. A beam that leaves the grid is truncated at the boundary
/// and carries no hit.
///
/// # Example
///
/// ```rust
/// use occugrid_mapping::beam_tracer::trace_beam;
/// use occugrid_mapping::grid::{GridCoord, GridGeometry};
/// use occugrid_mapping::sensor_model::CellRole;
/// use occugrid_types::Point2;
///
/// let g = GridGeometry::new(Point2::new(0.0, 0.0), 1.0, 10, 10).unwrap();
/// let cells = trace_beam(&g, Point2::new(5.0, 5.0), Point2::new(8.0, 5.0), true);
///
/// let coords: Vec<_> = cells.iter().map(|c| (c.coord.x, c.coord.y)).collect();
/// assert_eq!(coords, vec![(5, 5), (6, 5), (7, 5), (8, 5)]);
/// assert_eq!(cells[3].role, CellRole::Hit);
/// assert!(cells[..3].iter().all(|c| c.role == CellRole::Free));
/// ```
pub fn trace_beam(
    geometry: &GridGeometry,
    origin: Point2,
    endpoint: Point2,
    returned: bool,
) -> Vec<TracedCell> {
    if !origin.is_finite() || !endpoint.is_finite() {
        return Vec::new();
    }
    let Some((t0, t1)) = clip_to_grid(geometry, origin, endpoint) else {
        return Vec::new();
    };

    let end_cell = geometry.world_to_cell(endpoint);
    let start = match geometry.world_to_cell(origin) {
        Some(c) => (c.x as i64, c.y as i64),
        None => clamped_cell(geometry, lerp(origin, endpoint, t0)),
    };
    let end = match end_cell {
        Some(c) => (c.x as i64, c.y as i64),
        None => clamped_cell(geometry, lerp(origin, endpoint, t1)),
    };

    let mut cells: Vec<TracedCell> = BresenhamLine::new(start, end)
        .filter_map(|(ix, iy)| geometry.cell_at(ix, iy))
        .map(|coord| TracedCell {
            coord,
            role: CellRole::Free,
        })
        .collect();

    if returned
        && end_cell.is_some()
        && let Some(last) = cells.last_mut()
    {
        last.role = CellRole::Hit;
    }

    cells
}

/// Liang–Barsky clip of the segment `a → b` against the grid rectangle.
///
/// Returns the parameter interval `[t0, t1] ⊆ [0, 1]` of the part inside
/// the grid. The upper and right edges are exclusive, like the cells.
fn clip_to_grid(geometry: &GridGeometry, a: Point2, b: Point2) -> Option<(f64, f64)> {
    let min = geometry.origin();
    let max_x = min.x + geometry.width() as f64 * geometry.resolution();
    let max_y = min.y + geometry.height() as f64 * geometry.resolution();
    let (dx, dy) = (b.x - a.x, b.y - a.y);

    // (p, q, edge is exclusive)
    let edges = [
        (-dx, a.x - min.x, false),
        (dx, max_x - a.x, true),
        (-dy, a.y - min.y, false),
        (dy, max_y - a.y, true),
    ];

    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q, exclusive) in edges {
        if p == 0.0 {
            if q < 0.0 || (exclusive && q <= 0.0) {
                return None;
            }
        } else {
            let t = q / p;
            if p < 0.0 {
                t0 = t0.max(t);
            } else {
                t1 = t1.min(t);
            }
        }
    }
    (t0 <= t1).then_some((t0, t1))
}

fn lerp(a: Point2, b: Point2, t: f64) -> Point2 {
    Point2::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y))
}

/// Cell of a point on (or within rounding of) the grid rectangle.
fn clamped_cell(geometry: &GridGeometry, point: Point2) -> (i64, i64) {
    let (ix, iy) = geometry.world_to_cell_unbounded(point);
    (
        ix.clamp(0, geometry.width() as i64 - 1),
        iy.clamp(0, geometry.height() as i64 - 1),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// BresenhamLine
// ────────────────────────────────────────────────────────────────────────────

/// Iterator over the integer cells of a Bresenham line, both ends inclusive.
#[derive(Debug, Clone)]
pub struct BresenhamLine {
    x: i64,
    y: i64,
    end_x: i64,
    end_y: i64,
    dx: i64,
    dy: i64,
    sx: i64,
    sy: i64,
    err: i64,
    done: bool,
}

impl BresenhamLine {
    pub fn new(start: (i64, i64), end: (i64, i64)) -> Self {
        let dx = (end.0 - start.0).abs();
        let dy = (end.1 - start.1).abs();
        Self {
            x: start.0,
            y: start.1,
            end_x: end.0,
            end_y: end.1,
            dx,
            dy,
            sx: if start.0 < end.0 { 1 } else { -1 },
            sy: if start.1 < end.1 { 1 } else { -1 },
            err: dx - dy,
            done: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let current = (self.x, self.y);
        if self.x == self.end_x && self.y == self.end_y {
            self.done = true;
            return Some(current);
        }

        let e2 = 2 * self.err;
        if e2 > -self.dy {
            self.err -= self.dy;
            self.x += self.sx;
        }
        if e2 < self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }

        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = (self.end_x - self.x).abs().max((self.end_y - self.y).abs()) as usize + 1;
        (remaining, Some(remaining))
    }
}
