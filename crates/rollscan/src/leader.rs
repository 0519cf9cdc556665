//! Leader and pre-leader detection.
//!
//! The leader is recognized from the margin taper: the roll is narrower at
//! its start, so the top-of-image margin averages sit wider on the bass
//! side and narrower on the treble side than the bottom-of-image averages.
//! Any other arrangement is unsupported and fatal.

use crate::config::LeaderConfig;
use crate::error::{AnalysisError, Result};
use crate::grid::{PixelGrid, PixelState};
use crate::margins::Margins;
use crate::smoothing::{max_value_index, mean_of};

/// Row boundaries of the leader sections.
#[derive(Debug, Clone, Copy)]
pub struct LeaderBounds {
    /// Boundary between the pre-leader and the leader.
    pub preleader_row: usize,
    /// Boundary between the leader and the music region.
    pub leader_row: usize,
}

/// Locate the leader and pre-leader boundaries and mark their regions.
pub fn analyze(grid: &mut PixelGrid, margins: &Margins, cfg: &LeaderConfig) -> Result<LeaderBounds> {
    let rows = grid.rows();
    let window = cfg.edge_average_window.min(rows);
    if rows < 2 * window || window == 0 {
        return Err(AnalysisError::ImageTooShort { rows });
    }

    let left = margins.left_f64();
    let right = margins.right_f64();

    let top_left = mean_of(&left, 0, window);
    let top_right = mean_of(&right, 0, window);
    let bot_start = rows - 1 - window;
    let bot_left = mean_of(&left, bot_start, window);
    let bot_right = mean_of(&right, bot_start, window);

    if top_left > bot_left && top_right < bot_right {
        // leader at the top, the supported orientation
    } else if top_left < bot_left && top_right > bot_right {
        return Err(AnalysisError::BottomLeader);
    } else {
        return Err(AnalysisError::OrientationUndetermined);
    }

    let left_boundary = find_boundary(&left, bot_left * cfg.margin_growth, true, cfg)?;
    let right_boundary = find_boundary(&right, bot_right / cfg.margin_growth, false, cfg)?;
    let leader_row = (left_boundary + right_boundary) / 2;

    mark_region(grid, 0, leader_row, PixelState::Leader);

    let preleader_row = extract_preleader(margins, grid.cols(), leader_row, cfg);
    mark_region(grid, 0, preleader_row + 1, PixelState::Preleader);

    Ok(LeaderBounds {
        preleader_row,
        leader_row,
    })
}

/// Threshold one margin curve and find the changepoint row.
///
/// `wide_side` selects the comparison sense: on the bass side the leader
/// margin sits above the cutoff, on the treble side below it.
fn find_boundary(curve: &[f64], cutoff: f64, wide_side: bool, cfg: &LeaderConfig) -> Result<usize> {
    let search = cfg.search_length.min(curve.len());
    let mut status = vec![0u32; search];
    for (i, s) in status.iter_mut().enumerate() {
        let on = if wide_side {
            curve[i] > cutoff
        } else {
            curve[i] < cutoff
        };
        if on {
            *s = 1;
        }
    }
    changepoint(&status, cfg.window).ok_or(AnalysisError::LeaderNotFound {
        search_length: search,
        window: cfg.window,
    })
}

/// Windowed-majority changepoint in a binary signal.
///
/// Returns the first index where ≥90% of the trailing window sits on one
/// side and ≤10% of the leading window on the other, in either direction.
pub fn changepoint(status: &[u32], window: usize) -> Option<usize> {
    if window == 0 || status.len() < 2 * window + 2 {
        return None;
    }
    let hi = (9 * window) / 10;
    let lo = window / 10;

    let mut above: u32 = status[..window].iter().sum();
    let mut below: u32 = status[window..2 * window].iter().sum();

    for i in window + 1..status.len() - 1 - window {
        above += status[i];
        above -= status[i - window - 1];
        below += status[i + window];
        below -= status[i - 1];
        if above as usize > hi && (below as usize) < lo {
            return Some(i);
        }
        if (above as usize) < lo && below as usize > hi {
            return Some(i);
        }
    }
    None
}

/// Row of maximal margin encroachment inside the leader, expanded while
/// following rows stay within the tolerance of that maximum.
fn extract_preleader(margins: &Margins, cols: usize, leader_row: usize, cfg: &LeaderConfig) -> usize {
    if leader_row == 0 {
        return 0;
    }
    let mut marginsum = vec![0u64; leader_row];
    for (i, m) in marginsum.iter_mut().enumerate().skip(cfg.start_guard) {
        let left = margins.left[i].max(0) as u64;
        let right = margins.right[i].clamp(0, cols as i64) as u64;
        *m = left + cols as u64 - right;
    }
    let position = max_value_index(&marginsum);
    let floor = marginsum[position].saturating_sub(cfg.preleader_tolerance);

    let mut posadj = position;
    while posadj < leader_row && marginsum[posadj] > floor {
        posadj += 1;
    }
    posadj
}

/// Reclassify every non-paper pixel of `[start, end)` rows as `state`.
pub fn mark_region(grid: &mut PixelGrid, start: usize, end: usize, state: PixelState) {
    let end = end.min(grid.rows());
    for r in start..end {
        for c in 0..grid.cols() {
            if grid.get(r, c) != PixelState::Paper {
                grid.set(r, c, state);
            }
        }
    }
}
