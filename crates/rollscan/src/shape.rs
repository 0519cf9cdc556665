//! Shape descriptors: perimeter, circularity, major axis.
//!
//! The perimeter is traced along the paper pixels surrounding a hole with
//! a Moore neighborhood walk. A stair-stepped trace overestimates the true
//! contour, so the summed path length is scaled by an empirical 0.95.

use crate::grid::{PixelGrid, PixelState};
use crate::holes::HoleRecord;

/// Empirical correction from stair-stepped trace length to true perimeter.
const TRACE_CORRECTION: f64 = 0.95;

const SQRT_2: f64 = std::f64::consts::SQRT_2;

/// Moore neighborhood offsets as `(dcol, drow)`, clockwise from east.
const DELTA: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Compute perimeter, circularity and major axis for every hole.
///
/// Holes whose boundary trace leaves the image keep `perimeter = None` and
/// are skipped for the derived descriptors, not deleted.
pub fn compute_descriptors(grid: &PixelGrid, holes: &mut [HoleRecord], max_steps: usize) {
    for hole in holes.iter_mut() {
        match trace_perimeter(grid, hole, max_steps) {
            Some(perimeter) => {
                hole.perimeter = Some(perimeter);
                if perimeter > 0.0 {
                    hole.circularity =
                        4.0 * std::f64::consts::PI * hole.area as f64 / (perimeter * perimeter);
                }
                hole.major_axis_deg = major_axis(grid, hole);
            }
            None => {
                tracing::warn!(
                    "perimeter trace left the image for hole at ({}, {})",
                    hole.entry.0,
                    hole.entry.1
                );
                hole.perimeter = None;
            }
        }
    }
}

/// Trace the boundary of `hole` and return the corrected path length.
///
/// The walk starts at the first paper pixel left of the hole's entry point
/// and steps around the 8-connected boundary until the start point and its
/// successor repeat. Diagonal steps contribute √2, orthogonal steps 1.
fn trace_perimeter(grid: &PixelGrid, hole: &HoleRecord, max_steps: usize) -> Option<f64> {
    let (row, entry_col) = hole.entry;
    let mut start_col = None;
    for c in (0..=entry_col).rev() {
        if grid.get(row, c) == PixelState::Paper {
            start_col = Some(c);
            break;
        }
    }
    let start = (row as i64, start_col? as i64);

    let mut current = start;
    let mut direction = next_boundary_point(grid, &mut current, 0)?;
    let successor = current;
    let mut done = start == successor;

    let mut sum = 0.0;
    let mut steps = 0usize;
    while !done {
        let previous = current;
        direction = (direction + 6) % 8;
        direction = next_boundary_point(grid, &mut current, direction)?;
        done = current == successor && previous == start;
        if !done {
            sum += if direction % 2 == 1 { SQRT_2 } else { 1.0 };
        }
        steps += 1;
        if steps >= max_steps {
            tracing::warn!("perimeter trace exceeded {max_steps} steps; truncating");
            break;
        }
    }
    Some(TRACE_CORRECTION * sum)
}

/// Advance one Moore step: rotate clockwise past hole pixels, then move
/// into the first non-hole neighbor. `None` when the walk leaves the image.
fn next_boundary_point(grid: &PixelGrid, point: &mut (i64, i64), mut dir: usize) -> Option<usize> {
    for _ in 0..7 {
        let c = point.1 + DELTA[dir].0;
        let r = point.0 + DELTA[dir].1;
        if r < 0 || c < 0 || r as usize >= grid.rows() || c as usize >= grid.cols() {
            return None;
        }
        if grid.get(r as usize, c as usize) == PixelState::Hole {
            dir = (dir + 1) % 8;
        } else {
            point.0 = r;
            point.1 = c;
            break;
        }
    }
    Some(dir)
}

/// Central image moment of order `(p, q)` over the hole pixels.
fn central_moment(grid: &PixelGrid, hole: &HoleRecord, p: i32, q: i32) -> f64 {
    let (cr, cc) = hole.centroid;
    let mut moment = 0.0;
    for r in hole.bbox.min_row..=hole.bbox.max_row {
        for c in hole.bbox.min_col..=hole.bbox.max_col {
            if !grid.in_bounds(r, c) || grid.get(r, c) != PixelState::Hole {
                continue;
            }
            moment += (c as f64 - cc).powi(p) * (r as f64 - cr).powi(q);
        }
    }
    moment
}

/// Principal-axis angle in degrees, 0° = vertical, from second-order
/// central moments.
fn major_axis(grid: &PixelGrid, hole: &HoleRecord) -> f64 {
    let m11 = central_moment(grid, hole, 1, 1);
    let m20 = central_moment(grid, hole, 2, 0);
    let m02 = central_moment(grid, hole, 0, 2);

    let denom = m20 - m02;
    if denom.abs() < f64::EPSILON && m11.abs() < f64::EPSILON {
        return 0.0;
    }
    let angle = 0.5 * (2.0 * m11 / denom).atan();
    angle.to_degrees()
}
