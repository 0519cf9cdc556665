//! Serializable analysis report.
//!
//! The report carries everything downstream consumers need: scalar
//! geometry, the accepted and rejected hole sets, tears per side, shifts,
//! a compacted drift table, and the MIDI-ready note list.

use crate::holes::HoleRecord;
use crate::notes::{self, NoteEvent};
use crate::pipeline::RollAnalysis;
use crate::shifts::ShiftRecord;
use crate::stats::{self, DustScores};
use crate::tears::TearRecord;

/// Scalar geometry of the analyzed roll.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GeometrySummary {
    /// Image width in pixels.
    pub image_width: usize,
    /// Image length in pixels.
    pub image_length: usize,
    /// Roll family the analysis assumed.
    pub roll_type: String,
    /// Average paper width over the music region.
    pub roll_width: f64,
    /// Width of the bass hard margin.
    pub hard_margin_bass: usize,
    /// Width of the treble hard margin.
    pub hard_margin_treble: usize,
    /// Maximum bass-side soft margin width.
    pub max_bass_drift: i64,
    /// Maximum treble-side soft margin width.
    pub max_treble_drift: i64,
    /// Average summed soft-margin width.
    pub avg_soft_margin_sum: f64,
    /// Pre-leader/leader boundary row.
    pub preleader_row: usize,
    /// Leader/music boundary row.
    pub leader_row: usize,
    /// First music hole row.
    pub first_hole_row: usize,
    /// Last music hole row.
    pub last_hole_row: usize,
    /// Rows after the last music hole.
    pub end_margin: usize,
    /// Rows between the first and last music holes.
    pub musical_length: usize,
    /// Accepted music holes.
    pub musical_hole_count: usize,
    /// Note attacks among the accepted holes.
    pub musical_note_count: usize,
    /// Average accepted-hole width.
    pub avg_hole_width: f64,
    /// Dust regions found during extraction.
    pub antidust_count: usize,
    /// Rejected holes in the report.
    pub bad_hole_count: usize,
    /// Bass-side tears.
    pub bass_tear_count: usize,
    /// Treble-side tears.
    pub treble_tear_count: usize,
    /// Lateral shifts.
    pub shift_count: usize,
    /// Estimated tracker-bar pitch in pixels.
    pub hole_separation: f64,
    /// Estimated tracker-bar phase in pixels.
    pub hole_offset: f64,
    /// Mapped tracker positions (detected estimate).
    pub tracker_hole_count: usize,
    /// Scan resolution the analysis assumed.
    pub pixels_per_inch: f64,
}

/// One compacted drift sample.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct DriftSample {
    /// Image row.
    pub row: usize,
    /// Correction in pixels to straighten the roll at that row.
    pub correction: f64,
}

/// Full analysis report.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RollReport {
    /// Scalar geometry.
    pub geometry: GeometrySummary,
    /// Dust census per side.
    pub dust: DustScores,
    /// Accepted holes, ordered by row.
    pub holes: Vec<HoleRecord>,
    /// Rejected holes with reasons, largest first.
    pub bad_holes: Vec<HoleRecord>,
    /// Bass-side tears, largest first.
    pub bass_tears: Vec<TearRecord>,
    /// Treble-side tears, largest first.
    pub treble_tears: Vec<TearRecord>,
    /// Lateral shifts, largest magnitude first.
    pub shifts: Vec<ShiftRecord>,
    /// Drift table, sampled where the correction moves by 0.1px.
    pub drift: Vec<DriftSample>,
    /// MIDI-ready note list.
    pub notes: Vec<NoteEvent>,
}

impl RollAnalysis {
    /// Assemble the serializable report for this run.
    pub fn report(&self) -> RollReport {
        let rows = self.grid.rows();
        let cols = self.grid.cols();
        let have_music = self.first_music_row < rows && self.last_music_row >= self.first_music_row;

        let mut accepted: Vec<HoleRecord> =
            self.holes.iter().filter(|h| h.music).cloned().collect();
        accepted.sort_by_key(|h| h.bbox.min_row);

        let mut bad_holes: Vec<HoleRecord> = self
            .holes
            .iter()
            .filter(|h| !h.music && h.bbox.min_row >= self.bad_hole_floor)
            .cloned()
            .collect();
        // large dust near the music region is worth reporting too
        let antidust_floor = self.first_music_row.saturating_sub(100);
        bad_holes.extend(
            self.antidust
                .iter()
                .filter(|h| {
                    h.area >= self.config.antidust_report_area && h.bbox.min_row >= antidust_floor
                })
                .cloned(),
        );
        bad_holes.sort_by(|a, b| b.area.cmp(&a.area));
        for (i, hole) in bad_holes.iter_mut().enumerate() {
            hole.id = Some(format!("bad{:03}", i + 1));
        }

        let mut bass_tears = self.tears.bass.clone();
        bass_tears.sort_by(|a, b| b.area.cmp(&a.area));
        for (i, tear) in bass_tears.iter_mut().enumerate() {
            tear.id = Some(format!("basstear{:03}", i + 1));
        }
        let mut treble_tears = self.tears.treble.clone();
        treble_tears.sort_by(|a, b| b.area.cmp(&a.area));
        for (i, tear) in treble_tears.iter_mut().enumerate() {
            tear.id = Some(format!("trebletear{:03}", i + 1));
        }

        let mut shifts: Vec<ShiftRecord> = self.shifts.clone();
        shifts.sort_by(|a, b| b.magnitude.abs().partial_cmp(&a.magnitude.abs()).unwrap());
        for (i, shift) in shifts.iter_mut().enumerate() {
            shift.id = Some(format!("shift{:03}", i + 1));
        }

        let dust = if have_music {
            stats::dust_scores(&self.grid, &self.hard, self.first_music_row, self.last_music_row)
        } else {
            DustScores::default()
        };

        let (roll_width, soft_left, soft_right, soft_avg) = if have_music {
            (
                stats::average_roll_width(&self.margins, self.first_music_row, self.last_music_row),
                stats::soft_margin_left_max(
                    &self.margins,
                    &self.hard,
                    self.first_music_row,
                    self.last_music_row,
                ),
                stats::soft_margin_right_max(
                    &self.margins,
                    &self.hard,
                    self.first_music_row,
                    self.last_music_row,
                ),
                stats::average_soft_margin_total(
                    &self.margins,
                    &self.hard,
                    cols,
                    self.first_music_row,
                    self.last_music_row,
                ),
            )
        } else {
            (0.0, 0, 0, 0.0)
        };

        let note_list = notes::note_events(&self.holes);
        let drift_samples = self.drift_samples();

        let geometry = GeometrySummary {
            image_width: cols,
            image_length: rows,
            roll_type: self.config.roll_type.kind.name().to_string(),
            roll_width: round2(roll_width),
            hard_margin_bass: self.hard.left,
            hard_margin_treble: cols.saturating_sub(self.hard.right),
            max_bass_drift: soft_left,
            max_treble_drift: soft_right,
            avg_soft_margin_sum: round2(soft_avg),
            preleader_row: self.bounds.preleader_row,
            leader_row: self.bounds.leader_row,
            first_hole_row: if have_music { self.first_music_row } else { 0 },
            last_hole_row: if have_music { self.last_music_row } else { 0 },
            end_margin: if have_music {
                rows.saturating_sub(self.last_music_row + 1)
            } else {
                0
            },
            musical_length: if have_music {
                self.last_music_row - self.first_music_row
            } else {
                0
            },
            musical_hole_count: accepted.len(),
            musical_note_count: note_list.len(),
            avg_hole_width: round2(notes::average_hole_width(&self.holes)),
            antidust_count: self.antidust.len(),
            bad_hole_count: bad_holes.len(),
            bass_tear_count: bass_tears.len(),
            treble_tear_count: treble_tears.len(),
            shift_count: shifts.len(),
            hole_separation: self.model.map(|m| m.separation).unwrap_or(0.0),
            hole_offset: self.model.map(|m| m.offset).unwrap_or(0.0),
            tracker_hole_count: self
                .mapping
                .as_ref()
                .map(|m| m.tracker_hole_count())
                .unwrap_or(0),
            pixels_per_inch: self.config.pixels_per_inch,
        };

        RollReport {
            geometry,
            dust,
            holes: accepted,
            bad_holes,
            bass_tears,
            treble_tears,
            shifts,
            drift: drift_samples,
            notes: note_list,
        }
    }

    /// Compact the drift table to rows where the correction moved by at
    /// least a tenth of a pixel.
    fn drift_samples(&self) -> Vec<DriftSample> {
        let mut samples = Vec::new();
        if self.first_music_row >= self.grid.rows() {
            return samples;
        }
        let mut last = f64::NAN;
        for row in self.first_music_row..self.last_music_row.min(self.drift.len()) {
            let correction = (self.drift.at(row) * 10.0).round() / 10.0;
            if correction != last {
                samples.push(DriftSample { row, correction });
                last = correction;
            }
        }
        samples
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
