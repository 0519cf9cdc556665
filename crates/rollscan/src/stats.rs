//! Roll-level statistics: dust census, roll width, soft margins.

use crate::grid::{PixelGrid, PixelState};
use crate::margins::{HardMargins, Margins};

/// Dust census of the hard-margin dead zones, in parts per million.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct DustScores {
    /// Bass-side dead zone score.
    pub bass: f64,
    /// Treble-side dead zone score.
    pub treble: f64,
    /// Mean of the two sides.
    pub combined: f64,
}

/// Count dust in both hard-margin zones over the music region.
///
/// Paper pixels inside a dead zone are dust. Unclassified non-paper also
/// counts: the zone should contain none, so its presence means heavy dust
/// shadowing.
pub fn dust_scores(
    grid: &PixelGrid,
    hard: &HardMargins,
    first_music_row: usize,
    last_music_row: usize,
) -> DustScores {
    let bass = zone_score(grid, first_music_row, last_music_row, 0, hard.left);
    let treble = zone_score(
        grid,
        first_music_row,
        last_music_row,
        hard.right,
        grid.cols().saturating_sub(1),
    );
    DustScores {
        bass,
        treble,
        combined: ((bass + treble) / 2.0).round(),
    }
}

fn zone_score(
    grid: &PixelGrid,
    startrow: usize,
    endrow: usize,
    startcol: usize,
    endcol: usize,
) -> f64 {
    if endrow < startrow || endcol < startcol {
        return 0.0;
    }
    let mut counter = 0u64;
    for r in startrow..=endrow.min(grid.rows().saturating_sub(1)) {
        for c in startcol..=endcol.min(grid.cols().saturating_sub(1)) {
            match grid.get(r, c) {
                PixelState::Paper | PixelState::NonPaper => counter += 1,
                _ => {}
            }
        }
    }
    let area = (endcol - startcol + 1) as f64 * (endrow - startrow + 1) as f64;
    (counter as f64 / area * 1_000_000.0).round()
}

/// Mean paper width over the music region.
pub fn average_roll_width(margins: &Margins, first_music_row: usize, last_music_row: usize) -> f64 {
    if last_music_row < first_music_row {
        return 0.0;
    }
    let end = last_music_row.min(margins.left.len().saturating_sub(1));
    let count = end - first_music_row + 1;
    let sum: i64 = (first_music_row..=end).map(|r| margins.width(r)).sum();
    sum as f64 / count as f64
}

/// Largest distance from the left hard margin to the roll edge over the
/// music region.
pub fn soft_margin_left_max(
    margins: &Margins,
    hard: &HardMargins,
    first_music_row: usize,
    last_music_row: usize,
) -> i64 {
    let end = last_music_row.min(margins.left.len().saturating_sub(1));
    (first_music_row..=end)
        .map(|r| margins.left[r] - hard.left as i64)
        .max()
        .unwrap_or(0)
        .max(0)
}

/// Largest distance from the right hard margin to the roll edge over the
/// music region.
pub fn soft_margin_right_max(
    margins: &Margins,
    hard: &HardMargins,
    first_music_row: usize,
    last_music_row: usize,
) -> i64 {
    let end = last_music_row.min(margins.right.len().saturating_sub(1));
    (first_music_row..=end)
        .map(|r| hard.right as i64 - margins.right[r])
        .max()
        .unwrap_or(0)
        .max(0)
}

/// Mean summed soft-margin width over the music region.
pub fn average_soft_margin_total(
    margins: &Margins,
    hard: &HardMargins,
    cols: usize,
    first_music_row: usize,
    last_music_row: usize,
) -> f64 {
    if last_music_row < first_music_row {
        return 0.0;
    }
    let hard_left_width = hard.left as i64;
    let hard_right_width = cols as i64 - hard.right as i64;
    let end = last_music_row.min(margins.left.len().saturating_sub(1));
    let count = end - first_music_row + 1;
    let mut sum = 0.0;
    for r in first_music_row..=end {
        let left_width = margins.left[r];
        if hard_left_width < left_width {
            sum += (left_width - hard_left_width) as f64;
        }
        let right_width = cols as i64 - margins.right[r];
        if hard_right_width < right_width {
            sum += (right_width - hard_right_width) as f64;
        }
    }
    sum / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dust_scores_count_paper_in_dead_zones() {
        let mut grid = PixelGrid::filled(100, 100, PixelState::HardMargin);
        for r in 0..100 {
            for c in 10..90 {
                grid.set(r, c, PixelState::Paper);
            }
        }
        // one dust fleck in the bass dead zone
        grid.set(50, 5, PixelState::Paper);
        let hard = HardMargins { left: 9, right: 90 };
        let scores = dust_scores(&grid, &hard, 0, 99);
        assert!(scores.bass > 0.0);
        assert_eq!(scores.treble, 0.0);
        assert!((scores.combined - (scores.bass / 2.0).round()).abs() <= 1.0);
    }

    #[test]
    fn clean_zones_score_zero() {
        let grid = PixelGrid::filled(50, 50, PixelState::HardMargin);
        let hard = HardMargins { left: 10, right: 40 };
        let scores = dust_scores(&grid, &hard, 0, 49);
        assert_eq!(scores.bass, 0.0);
        assert_eq!(scores.treble, 0.0);
    }

    #[test]
    fn roll_width_and_soft_margins() {
        let margins = Margins {
            left: vec![10; 100],
            right: vec![90; 100],
        };
        let hard = HardMargins { left: 8, right: 92 };
        assert!((average_roll_width(&margins, 10, 89) - 80.0).abs() < 1e-12);
        assert_eq!(soft_margin_left_max(&margins, &hard, 10, 89), 2);
        assert_eq!(soft_margin_right_max(&margins, &hard, 10, 89), 2);
        let avg = average_soft_margin_total(&margins, &hard, 100, 10, 89);
        assert!((avg - 4.0).abs() < 1e-12);
    }
}
