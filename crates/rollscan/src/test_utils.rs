//! Shared synthetic-roll builders for unit tests.

use image::{GrayImage, Luma};

use crate::grid::{PixelGrid, PixelState};

/// Grid with paper in columns `[left_edge, right_edge)` and exposed
/// scanner bed elsewhere.
pub(crate) fn paper_grid(rows: usize, cols: usize, left_edge: usize, right_edge: usize) -> PixelGrid {
    let mut grid = PixelGrid::filled(rows, cols, PixelState::NonPaper);
    for r in 0..rows {
        for c in left_edge..right_edge.min(cols) {
            grid.set(r, c, PixelState::Paper);
        }
    }
    grid
}

/// Punch a rectangular hole (non-paper) into the grid.
pub(crate) fn punch_rect(grid: &mut PixelGrid, row: usize, col: usize, height: usize, width: usize) {
    for r in row..(row + height).min(grid.rows()) {
        for c in col..(col + width).min(grid.cols()) {
            grid.set(r, c, PixelState::NonPaper);
        }
    }
}

/// Grid shaped like the start of a roll: a short extra-narrow pre-leader,
/// a narrow leader down to `taper_end`, then the full-width roll.
pub(crate) fn tapered_roll_grid(rows: usize, cols: usize, taper_end: usize) -> PixelGrid {
    let mut grid = PixelGrid::filled(rows, cols, PixelState::NonPaper);
    let preleader_end = taper_end.min(rows) * 3 / 10;
    for r in 0..rows {
        let (left, right) = if r < preleader_end {
            (cols * 3 / 8, cols * 5 / 8)
        } else if r < taper_end {
            (cols / 4, cols * 3 / 4)
        } else {
            (cols / 12, cols - cols / 12)
        };
        for c in left..right {
            grid.set(r, c, PixelState::Paper);
        }
    }
    grid
}

/// Parametric synthetic scan for end-to-end pipeline tests.
pub(crate) struct RollSketch {
    /// Image height in rows.
    pub rows: usize,
    /// Image width in columns.
    pub cols: usize,
    /// Rows before any paper appears.
    pub preleader_end: usize,
    /// Rows of narrow leader paper.
    pub leader_end: usize,
    /// Tracker-bar pitch in pixels.
    pub separation: f64,
    /// Tracker-bar phase in pixels.
    pub offset: f64,
    /// Punched holes as `(track, start_row)`; each is 20 rows by 6 cols.
    pub holes: Vec<(usize, usize)>,
}

impl RollSketch {
    pub(crate) const HOLE_HEIGHT: usize = 20;
    pub(crate) const HOLE_WIDTH: usize = 6;

    /// Render the sketch to a brightness image: paper dark, bed bright.
    pub(crate) fn render(&self) -> GrayImage {
        let mut img = GrayImage::from_pixel(self.cols as u32, self.rows as u32, Luma([255u8]));
        for r in self.preleader_end..self.rows {
            let (left, right) = if r < self.leader_end {
                (self.cols * 3 / 20, self.cols * 17 / 20)
            } else {
                (self.cols / 20, self.cols - self.cols / 20)
            };
            for c in left..right {
                img.put_pixel(c as u32, r as u32, Luma([100u8]));
            }
        }
        for &(track, start) in &self.holes {
            let center = self.offset + track as f64 * self.separation;
            let col0 = (center - Self::HOLE_WIDTH as f64 / 2.0).round() as usize;
            for r in start..start + Self::HOLE_HEIGHT {
                for c in col0..col0 + Self::HOLE_WIDTH {
                    if r < self.rows && c < self.cols {
                        img.put_pixel(c as u32, r as u32, Luma([255u8]));
                    }
                }
            }
        }
        img
    }
}
