//! Edge-tear detection and margin repair.
//!
//! Tears show up as abrupt but contiguous margin deviations on one side
//! while the other side stays stable. The detector compares margin curves
//! smoothed at three time constants, repairs the torn side toward the
//! stable side plus the historical paper width, and reclassifies the
//! vacated pixels as tear. Several refine passes converge the margin
//! estimate before margin-attached runs are extracted into records.

use crate::config::TearConfig;
use crate::grid::{PixelGrid, PixelState};
use crate::holes::Bbox;
use crate::margins::Margins;
use crate::smoothing::exponential_smoothing;

/// Which paper edge a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left edge of the image.
    Bass,
    /// Right edge of the image.
    Treble,
}

/// One significant edge tear.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TearRecord {
    /// Bounding box of the torn area.
    pub bbox: Bbox,
    /// Torn area in pixels.
    pub area: u64,
    /// Edge the tear belongs to.
    pub side: Side,
    /// Report identifier, assigned late.
    pub id: Option<String>,
}

/// Tears split at the image midline.
#[derive(Debug, Default)]
pub struct TearOutcome {
    /// Tears on the bass (left) edge.
    pub bass: Vec<TearRecord>,
    /// Tears on the treble (right) edge.
    pub treble: Vec<TearRecord>,
}

/// Margin curves at the three smoothing time constants.
struct MarginCurves {
    fast_left: Vec<f64>,
    fast_right: Vec<f64>,
    medium_left: Vec<f64>,
    medium_right: Vec<f64>,
    slow_left: Vec<f64>,
    slow_right: Vec<f64>,
}

impl MarginCurves {
    fn compute(margins: &Margins, cfg: &TearConfig) -> Self {
        let make = |src: &[i64], gain: f64| {
            let mut v: Vec<f64> = src.iter().map(|&x| x as f64).collect();
            exponential_smoothing(&mut v, gain);
            v
        };
        Self {
            fast_left: make(&margins.left, cfg.fast_gain),
            fast_right: make(&margins.right, cfg.fast_gain),
            medium_left: make(&margins.left, cfg.medium_gain),
            medium_right: make(&margins.right, cfg.medium_gain),
            slow_left: make(&margins.left, cfg.slow_gain),
            slow_right: make(&margins.right, cfg.slow_gain),
        }
    }
}

/// Per-row stability classification of the margin curves.
struct Stability {
    region: Vec<bool>,
    left: Vec<bool>,
    right: Vec<bool>,
    average_width: f64,
}

fn classify_stability(
    margins: &Margins,
    curves: &MarginCurves,
    first_music_row: usize,
    cfg: &TearConfig,
) -> Stability {
    let rows = margins.left.len();
    let mut region = vec![true; rows];
    let mut left = vec![true; rows];
    let mut right = vec![true; rows];
    let mut sum = 0.0;
    let mut counter = 0usize;

    for r in 0..rows {
        let fwidth = margins.width(r) as f64;
        let swidth = curves.slow_right[r] - curves.slow_left[r];
        if (swidth - fwidth).abs() > cfg.width_deviation {
            region[r] = false;
        } else if r > first_music_row {
            sum += swidth;
            counter += 1;
        }
        if (curves.fast_left[r] - curves.slow_left[r]).abs() > cfg.width_deviation {
            left[r] = false;
        }
        if (curves.fast_right[r] - curves.slow_right[r]).abs() > cfg.width_deviation {
            right[r] = false;
        }
    }

    let average_width = if counter > 0 {
        sum / counter as f64
    } else {
        (0..rows).map(|r| margins.width(r) as f64).sum::<f64>() / rows.max(1) as f64
    };

    Stability {
        region,
        left,
        right,
        average_width,
    }
}

/// Expand unstable runs forward and backward to bridge gaps.
fn expand_unstable(stable: &mut [bool], expansion: usize) {
    let rows = stable.len();
    if expansion == 0 || rows <= expansion + 2 {
        return;
    }

    let mut sr = vec![true; rows];
    let mut r = 1;
    while r < rows - expansion - 1 {
        if !stable[r] {
            sr[r] = false;
        }
        if !stable[r] && stable[r + 1] {
            for s in 0..expansion {
                if r + s >= rows {
                    break;
                }
                sr[r + s] = false;
            }
            r += expansion.saturating_sub(1);
        }
        r += 1;
    }

    let mut r = rows - 1;
    while r > expansion {
        if !sr[r] {
            stable[r] = false;
        }
        if !sr[r] && sr[r - 1] {
            for s in 0..expansion {
                if s > r {
                    break;
                }
                stable[r - s] = false;
            }
            r -= expansion.saturating_sub(1);
        }
        r -= 1;
    }
}

/// Full tear analysis over the music region.
pub fn analyze(
    grid: &mut PixelGrid,
    margins: &mut Margins,
    first_music_row: usize,
    cfg: &TearConfig,
) -> TearOutcome {
    let rows = grid.rows();
    let cols = grid.cols();
    if rows == 0 || cols < 4 {
        return TearOutcome::default();
    }

    let curves = MarginCurves::compute(margins, cfg);
    let mut stability = classify_stability(margins, &curves, first_music_row, cfg);
    expand_unstable(&mut stability.region, cfg.run_expansion);

    // Pull the torn side toward the stable side plus the historical width,
    // reclassifying the vacated margin as tear.
    for r in first_music_row..rows {
        if stability.left[r] && !stability.right[r] {
            let edge = (curves.slow_left[r] + stability.average_width) as i64;
            margins.right[r] = edge;
            let mut c = edge.clamp(0, cols as i64 - 1);
            while c > 0 && grid.get(r, c as usize) == PixelState::Margin {
                grid.set(r, c as usize, PixelState::Tear);
                backfill_up(grid, r, c as usize, first_music_row);
                c -= 1;
            }
        }
        if stability.right[r] && !stability.left[r] {
            let edge = (curves.slow_right[r] - stability.average_width) as i64;
            margins.left[r] = edge;
            let mut c = (cols / 2) as i64;
            while c >= edge.max(0) {
                if grid.get(r, c as usize) == PixelState::Margin {
                    grid.set(r, c as usize, PixelState::Tear);
                    backfill_up(grid, r, c as usize, first_music_row);
                }
                c -= 1;
            }
        }
    }

    // Two marking passes against refreshed curves tighten the estimate.
    for _ in 0..2 {
        let curves = MarginCurves::compute(margins, cfg);
        mark_left_tears(grid, margins, &stability.region, &curves, first_music_row, cfg);
        mark_right_tears(grid, margins, &stability.region, &curves, first_music_row, cfg);
    }

    // Final fill between the margin index and the slow edge.
    let curves = MarginCurves::compute(margins, cfg);
    for r in first_music_row..rows {
        if stability.region[r] {
            continue;
        }
        let slow_l = curves.slow_left[r] as i64;
        if slow_l < margins.left[r] {
            let mut c = margins.left[r].clamp(0, cols as i64 - 1);
            while c >= slow_l.max(0) {
                if grid.get(r, c as usize) != PixelState::Paper {
                    grid.set(r, c as usize, PixelState::Tear);
                    margins.left[r] = c;
                }
                c -= 1;
            }
        }
        let slow_r = curves.slow_right[r] as i64;
        if slow_r > margins.right[r] {
            let mut c = margins.right[r].clamp(0, cols as i64 - 1);
            while c <= slow_r.min(cols as i64 - 1) {
                if grid.get(r, c as usize) != PixelState::Paper {
                    grid.set(r, c as usize, PixelState::Tear);
                    margins.right[r] = c;
                }
                c += 1;
            }
        }
    }

    describe_tears(grid, margins, cfg)
}

/// Convert margin pixels straight above a new tear pixel; dust shadows
/// leave margin columns hanging over the torn area.
fn backfill_up(grid: &mut PixelGrid, row: usize, col: usize, floor: usize) {
    let mut rr = row;
    while rr > floor {
        rr -= 1;
        if grid.get(rr, col) == PixelState::Margin {
            grid.set(rr, col, PixelState::Tear);
        } else {
            break;
        }
    }
}

fn mark_left_tears(
    grid: &mut PixelGrid,
    margins: &mut Margins,
    stable_region: &[bool],
    curves: &MarginCurves,
    first_music_row: usize,
    cfg: &TearConfig,
) {
    let rows = grid.rows();
    let cols = grid.cols();
    for r in first_music_row..rows {
        if stable_region[r] {
            continue;
        }
        if curves.medium_left[r] < curves.slow_left[r] + cfg.marking_offset {
            continue;
        }
        let slow = curves.slow_left[r] as i64;
        if margins.left[r] > slow {
            margins.left[r] = slow;
        }
        let mut c = slow.max(0);
        while (c as usize) < cols / 2 {
            if grid.get(r, c as usize) == PixelState::Margin {
                grid.set(r, c as usize, PixelState::Tear);
            }
            c += 1;
        }
    }
}

fn mark_right_tears(
    grid: &mut PixelGrid,
    margins: &mut Margins,
    stable_region: &[bool],
    curves: &MarginCurves,
    first_music_row: usize,
    cfg: &TearConfig,
) {
    let rows = grid.rows();
    let cols = grid.cols();
    for r in first_music_row..rows {
        if stable_region[r] {
            continue;
        }
        if curves.medium_right[r] > curves.slow_right[r] + cfg.marking_offset {
            continue;
        }
        let slow = (curves.slow_right[r] as i64).min(cols as i64 - 1);
        if margins.right[r] < slow {
            margins.right[r] = slow;
        }
        let mut c = (cols / 2) as i64;
        while c < slow {
            if grid.get(r, c as usize) == PixelState::Margin {
                grid.set(r, c as usize, PixelState::Tear);
            }
            c += 1;
        }
    }
}

/// Extract margin-attached tear runs into records, folding narrow runs
/// back into the margin.
fn describe_tears(grid: &mut PixelGrid, margins: &mut Margins, cfg: &TearConfig) -> TearOutcome {
    let rows = grid.rows();
    let cols = grid.cols();
    let mut out = TearOutcome::default();

    let mut r = 0;
    while r < rows {
        if row_has_tear(grid, r, 0, cols / 2) {
            let (maxr, record) = process_band(grid, margins, r, 0, cols / 2, Side::Bass, cfg);
            if let Some(t) = record {
                out.bass.push(t);
            }
            r = maxr + 1;
        } else {
            r += 1;
        }
    }

    let mut r = 0;
    while r < rows {
        if row_has_tear(grid, r, cols / 2, cols) {
            let (maxr, record) = process_band(grid, margins, r, cols / 2, cols, Side::Treble, cfg);
            if let Some(t) = record {
                out.treble.push(t);
            }
            r = maxr + 1;
        } else {
            r += 1;
        }
    }
    out
}

fn row_has_tear(grid: &PixelGrid, row: usize, start: usize, end: usize) -> bool {
    (start..end).any(|c| grid.get(row, c) == PixelState::Tear)
}

/// Accumulate the contiguous row band of tear pixels starting at `startrow`.
fn process_band(
    grid: &mut PixelGrid,
    margins: &mut Margins,
    startrow: usize,
    colstart: usize,
    colend: usize,
    side: Side,
    cfg: &TearConfig,
) -> (usize, Option<TearRecord>) {
    let rows = grid.rows();
    let mut area = 0u64;
    let mut minc = usize::MAX;
    let mut maxc = 0usize;
    let mut maxr = startrow;

    for r in startrow..rows {
        let mut hastear = false;
        for c in colstart..colend {
            if grid.get(r, c) != PixelState::Tear {
                continue;
            }
            hastear = true;
            area += 1;
            minc = minc.min(c);
            maxc = maxc.max(c);
        }
        if !hastear {
            break;
        }
        maxr = r;
        if area > cfg.max_fill {
            tracing::warn!("tear at row {startrow} exceeded {} pixels; truncated", cfg.max_fill);
            break;
        }
    }

    if area == 0 {
        return (maxr, None);
    }
    let width = maxc - minc + 1;

    if width <= cfg.fold_width {
        fold_band(grid, margins, startrow, maxr, minc, maxc, side);
        return (maxr, None);
    }
    if area < cfg.min_area || width < cfg.min_width {
        return (maxr, None);
    }

    let record = TearRecord {
        bbox: Bbox {
            min_row: startrow,
            min_col: minc,
            max_row: maxr,
            max_col: maxc,
        },
        area,
        side,
        id: None,
    };
    (maxr, Some(record))
}

/// Fold a narrow tear band back into the margin, restoring the margin
/// index it displaced.
fn fold_band(
    grid: &mut PixelGrid,
    margins: &mut Margins,
    minr: usize,
    maxr: usize,
    minc: usize,
    maxc: usize,
    side: Side,
) {
    for r in minr..=maxr {
        for c in minc..=maxc {
            if grid.get(r, c) != PixelState::Tear {
                continue;
            }
            grid.set(r, c, PixelState::Margin);
            match side {
                Side::Bass => {
                    if margins.left[r] < c as i64 {
                        margins.left[r] = c as i64;
                    }
                }
                Side::Treble => {
                    if margins.right[r] > c as i64 {
                        margins.right[r] = c as i64;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::margins;
    use crate::test_utils::paper_grid;

    /// Paper in [20, 180) of a 200-wide grid, with an optional left-edge
    /// bite (paper missing down to `depth` columns) over `bite_rows`.
    fn grid_with_left_bite(
        rows: usize,
        bite_start: usize,
        bite_len: usize,
        depth: usize,
    ) -> (PixelGrid, Margins) {
        let mut grid = paper_grid(rows, 200, 20, 180);
        for r in bite_start..bite_start + bite_len {
            for c in 20..20 + depth {
                grid.set(r, c, crate::grid::PixelState::NonPaper);
            }
        }
        let mut m = margins::trace_raw(&mut grid);
        margins::waterfall(&mut grid, &mut m);
        (grid, m)
    }

    #[test]
    fn wide_bite_produces_one_bass_tear() {
        let (mut grid, mut m) = grid_with_left_bite(2000, 1000, 40, 30);
        let out = analyze(&mut grid, &mut m, 100, &TearConfig::default());
        assert_eq!(out.bass.len(), 1, "expected exactly one bass tear");
        assert!(out.treble.is_empty());

        let tear = &out.bass[0];
        assert_eq!(tear.side, Side::Bass);
        assert!((990..=1010).contains(&tear.bbox.min_row));
        assert!((1030..=1050).contains(&tear.bbox.max_row));
        assert!(tear.area >= 40 * 25);

        // margin estimate repaired toward the true edge
        for r in 1000..1040 {
            assert!(m.left[r] <= 25, "row {r} margin {} not repaired", m.left[r]);
            assert!(m.left[r] <= m.right[r]);
        }
    }

    #[test]
    fn narrow_blip_is_folded_back() {
        let (mut grid, mut m) = grid_with_left_bite(2000, 1500, 5, 8);
        let out = analyze(&mut grid, &mut m, 100, &TearConfig::default());
        assert!(out.bass.is_empty(), "blip must fold back into the margin");
        assert!(out.treble.is_empty());
        for r in 0..2000 {
            assert!(m.left[r] <= m.right[r]);
        }
    }

    #[test]
    fn clean_roll_has_no_tears() {
        let mut grid = paper_grid(1500, 200, 20, 180);
        let mut m = margins::trace_raw(&mut grid);
        margins::waterfall(&mut grid, &mut m);
        let out = analyze(&mut grid, &mut m, 100, &TearConfig::default());
        assert!(out.bass.is_empty());
        assert!(out.treble.is_empty());
    }
}
