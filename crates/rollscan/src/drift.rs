//! Lateral drift correction.
//!
//! The roll wanders slowly left and right as it passes through the
//! scanner. Smoothing both margin curves and subtracting their long-run
//! averages yields a per-row correction that straightens hole columns.

use crate::config::DriftConfig;
use crate::margins::Margins;
use crate::smoothing::{exponential_smoothing, mean_of};

/// Per-row horizontal correction in pixels.
///
/// Zero outside the analyzed music region.
#[derive(Debug, Clone)]
pub struct DriftTable {
    values: Vec<f64>,
}

impl DriftTable {
    /// All-zero table for `rows` rows.
    pub fn zeros(rows: usize) -> Self {
        Self {
            values: vec![0.0; rows],
        }
    }

    /// Correction at `row` (0.0 past the end of the table).
    #[inline]
    pub fn at(&self, row: usize) -> f64 {
        self.values.get(row).copied().unwrap_or(0.0)
    }

    /// Number of rows covered.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(row, correction)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().copied().enumerate()
    }
}

/// Build the drift table from the current margin curves.
///
/// Run twice per analysis: once before hole extraction and again after
/// tear reclassification has cleaned the margin curves.
pub fn generate(margins: &Margins, leader_row: usize, cfg: &DriftConfig) -> DriftTable {
    let rows = margins.left.len();
    let mut lmargin = margins.left_f64();
    let mut rmargin = margins.right_f64();
    exponential_smoothing(&mut lmargin, cfg.gain);
    exponential_smoothing(&mut rmargin, cfg.gain);

    let start = (leader_row + cfg.region_guard).min(rows);
    let end = rows.saturating_sub(cfg.region_guard).max(start);
    let length = end - start;

    let lavg = mean_of(&lmargin, start, length);
    let ravg = mean_of(&rmargin, start, length);

    let mut values = vec![0.0; rows];
    for r in start..end {
        values[r] = -((lmargin[r] - lavg) + (rmargin[r] - ravg)) / 2.0;
    }
    DriftTable { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drifting_margins(rows: usize) -> Margins {
        // both edges wander together: +4 px by the end of the roll
        let mut left = Vec::with_capacity(rows);
        let mut right = Vec::with_capacity(rows);
        for r in 0..rows {
            let wander = 4.0 * r as f64 / rows as f64;
            left.push(10 + wander as i64);
            right.push(110 + wander as i64);
        }
        Margins { left, right }
    }

    #[test]
    fn drift_is_zero_outside_music_region() {
        let margins = drifting_margins(1000);
        let cfg = DriftConfig {
            gain: 0.01,
            region_guard: 100,
        };
        let table = generate(&margins, 50, &cfg);
        for r in 0..150 {
            assert_eq!(table.at(r), 0.0);
        }
        for r in 900..1000 {
            assert_eq!(table.at(r), 0.0);
        }
    }

    #[test]
    fn drift_opposes_common_margin_motion() {
        let margins = drifting_margins(2000);
        let cfg = DriftConfig {
            gain: 0.05,
            region_guard: 100,
        };
        let table = generate(&margins, 0, &cfg);
        // early rows sit left of average, so the correction pushes right
        assert!(table.at(150) > 0.0);
        // late rows sit right of average, so the correction pushes left
        assert!(table.at(1850) < 0.0);
        // correction stays within the total wander
        for (_, v) in table.iter() {
            assert!(v.abs() <= 4.0 + 1e-9);
        }
    }

    #[test]
    fn stable_margins_need_no_correction() {
        let margins = Margins {
            left: vec![20; 800],
            right: vec![220; 800],
        };
        let table = generate(&margins, 10, &DriftConfig::default());
        for (_, v) in table.iter() {
            assert!(v.abs() < 1e-9);
        }
    }
}
