//! Pixel-state grid and brightness classification.
//!
//! The grid is the single shared mutable resource of one analysis run.
//! Segmentation is destructive: a pixel's state is overwritten as it is
//! classified into a more specific category, and the grid doubles as the
//! visited-set for the flood-fill stages.

use image::GrayImage;

/// Classification of one pixel.
///
/// The set is closed; every match over it is exhaustive, so an unhandled
/// state is a compile error rather than a silent fall-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum PixelState {
    /// Paper of the roll.
    Paper,
    /// Bright (exposed scanner bed) pixel not yet attributed to anything.
    NonPaper,
    /// Swept margin area beside the paper.
    Margin,
    /// Margin area guaranteed free of roll content for the whole scan.
    HardMargin,
    /// Pre-leader region before the leader proper.
    Preleader,
    /// Leader region before the music starts.
    Leader,
    /// Non-paper between the leader boundary and the first music hole.
    PostLeader,
    /// Non-paper after the last music hole.
    PostMusic,
    /// Pixel of an accepted music hole.
    Hole,
    /// Dust speck too small to be a hole.
    Antidust,
    /// Pixel of an edge tear.
    Tear,
    /// Pixel of a hole rejected by the width filter.
    BadHole,
    /// Pixel of a hole rejected by the skew filter.
    BadHoleSkewed,
    /// Pixel of a hole rejected by the aspect filter.
    BadHoleAspect,
}

/// Rows×cols grid of pixel states, row-major.
#[derive(Debug, Clone)]
pub struct PixelGrid {
    rows: usize,
    cols: usize,
    data: Vec<PixelState>,
}

impl PixelGrid {
    /// Grid of the given dimensions, uniformly `state`.
    pub fn filled(rows: usize, cols: usize, state: PixelState) -> Self {
        Self {
            rows,
            cols,
            data: vec![state; rows * cols],
        }
    }

    /// Number of rows (scan direction, time axis).
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (across the paper).
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// True when `(row, col)` is inside the grid.
    #[inline]
    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// State at `(row, col)`. Panics when out of bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> PixelState {
        debug_assert!(self.in_bounds(row, col));
        self.data[row * self.cols + col]
    }

    /// Overwrite the state at `(row, col)`. Panics when out of bounds.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, state: PixelState) {
        debug_assert!(self.in_bounds(row, col));
        self.data[row * self.cols + col] = state;
    }

    /// Count pixels matching `state` in the half-open row/col window.
    pub fn count_in(
        &self,
        rows: std::ops::Range<usize>,
        cols: std::ops::Range<usize>,
        state: PixelState,
    ) -> u64 {
        let mut n = 0u64;
        for r in rows {
            if r >= self.rows {
                break;
            }
            for c in cols.clone() {
                if c >= self.cols {
                    break;
                }
                if self.get(r, c) == state {
                    n += 1;
                }
            }
        }
        n
    }
}

/// Classify a brightness image into paper and non-paper.
///
/// Pixels at or above `threshold` read as exposed scanner bed showing
/// through a hole or beside the paper; everything darker is paper.
pub fn classify(gray: &GrayImage, threshold: u8) -> PixelGrid {
    let (w, h) = gray.dimensions();
    let rows = h as usize;
    let cols = w as usize;
    let mut grid = PixelGrid::filled(rows, cols, PixelState::Paper);
    for r in 0..rows {
        for c in 0..cols {
            let v = gray.get_pixel(c as u32, r as u32)[0];
            if v >= threshold {
                grid.set(r, c, PixelState::NonPaper);
            }
        }
    }
    grid
}
