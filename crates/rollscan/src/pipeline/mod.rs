//! High-level analysis pipeline.
//!
//! This module is the glue layer that wires the stages together:
//! classify → margins → leader → hard margins → drift → holes → tears →
//! shifts → refined drift → descriptors → tracker model → MIDI mapping →
//! validation → note grouping.
//!
//! Algorithmic primitives live in the stage modules; this layer owns the
//! stage order, the shared pixel grid, and the assembled state.

mod run;

use image::GrayImage;

use crate::config::RollConfig;
use crate::drift::DriftTable;
use crate::error::Result;
use crate::grid::{self, PixelGrid};
use crate::holes::HoleRecord;
use crate::keymap::MidiMapping;
use crate::leader::LeaderBounds;
use crate::margins::{HardMargins, Margins};
use crate::shifts::ShiftRecord;
use crate::tears::TearOutcome;
use crate::tracker::{CentroidHistogram, TrackTable, TrackerModel};

/// Complete state of one analysis run.
///
/// The pixel grid is owned here for the lifetime of the run; every stage
/// mutates it in place through a borrow.
#[derive(Debug)]
pub struct RollAnalysis {
    /// Configuration the run was made with.
    pub config: RollConfig,
    /// The classified (and progressively recolored) pixel grid.
    pub grid: PixelGrid,
    /// Final per-row margin boundaries.
    pub margins: Margins,
    /// Leader and pre-leader boundaries.
    pub bounds: LeaderBounds,
    /// Hard margin dead zones.
    pub hard: HardMargins,
    /// Refined drift table.
    pub drift: DriftTable,
    /// Every extracted hole, accepted and rejected.
    pub holes: Vec<HoleRecord>,
    /// Dust regions.
    pub antidust: Vec<HoleRecord>,
    /// First row of accepted music.
    pub first_music_row: usize,
    /// Last row of accepted music.
    pub last_music_row: usize,
    /// Rejected holes earlier than this row are dropped from reports.
    pub bad_hole_floor: usize,
    /// Edge tears per side.
    pub tears: TearOutcome,
    /// Lateral shifts.
    pub shifts: Vec<ShiftRecord>,
    /// Estimated tracker-bar geometry, when holes were found.
    pub model: Option<TrackerModel>,
    /// Holes bucketed per track.
    pub table: TrackTable,
    /// Track-to-MIDI mapping, when holes were found.
    pub mapping: Option<MidiMapping>,
    /// Centroid histograms kept for diagnostics.
    pub histogram: Option<CentroidHistogram>,
}

/// Pipeline entry point: configuration in, analysis out.
#[derive(Debug, Clone)]
pub struct RollAnalyzer {
    config: RollConfig,
}

impl RollAnalyzer {
    /// Analyzer with the given configuration.
    pub fn new(config: RollConfig) -> Self {
        Self { config }
    }

    /// The analyzer's configuration.
    pub fn config(&self) -> &RollConfig {
        &self.config
    }

    /// Classify a brightness image and run the full pipeline.
    pub fn analyze_image(&self, gray: &GrayImage) -> Result<RollAnalysis> {
        let grid = grid::classify(gray, self.config.brightness_threshold);
        self.analyze_grid(grid)
    }

    /// Run the full pipeline on an already-classified grid.
    pub fn analyze_grid(&self, grid: PixelGrid) -> Result<RollAnalysis> {
        run::run(grid, self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LeaderConfig;
    use crate::grid::PixelState;
    use crate::test_utils::RollSketch;

    fn sketch() -> RollSketch {
        let mut holes = Vec::new();
        // one isolated hole per track, several rows deep
        for track in 5..=40usize {
            for i in 0..8usize {
                holes.push((track, 500 + i * 380 + track * 7));
            }
        }
        // a close pair on track 12 that must chain into one note
        holes.push((12, 3650));
        holes.push((12, 3674));
        RollSketch {
            rows: 4000,
            cols: 400,
            preleader_end: 80,
            leader_end: 400,
            separation: 9.0,
            offset: 4.0,
            holes,
        }
    }

    fn test_config() -> RollConfig {
        RollConfig {
            leader: LeaderConfig {
                search_length: 1000,
                window: 50,
                edge_average_window: 200,
                ..LeaderConfig::default()
            },
            ..RollConfig::default()
        }
    }

    #[test]
    fn full_pipeline_on_synthetic_roll() {
        let sketch = sketch();
        let img = sketch.render();
        let analyzer = RollAnalyzer::new(test_config());
        let analysis = analyzer.analyze_image(&img).expect("pipeline should succeed");

        // leader geometry
        assert!(
            (380..=420).contains(&analysis.bounds.leader_row),
            "leader row {} not near 400",
            analysis.bounds.leader_row
        );
        assert!(
            (60..=110).contains(&analysis.bounds.preleader_row),
            "preleader row {} not near 80",
            analysis.bounds.preleader_row
        );
        assert_eq!(analysis.hard.left, 19);
        assert_eq!(analysis.hard.right, 380);

        // margins stay ordered through the whole pipeline
        for r in analysis.bounds.leader_row..analysis.grid.rows() {
            assert!(
                analysis.margins.left[r] <= analysis.margins.right[r],
                "margins crossed at row {r}"
            );
        }

        // every punched hole extracted and accepted
        assert_eq!(analysis.holes.len(), sketch.holes.len());
        assert!(analysis.holes.iter().all(|h| h.music));
        assert!(analysis.tears.bass.is_empty());
        assert!(analysis.tears.treble.is_empty());
        assert!(analysis.shifts.is_empty());

        // tracker model recovers the layout
        let model = analysis.model.expect("model should be estimated");
        assert!(
            (model.separation - 9.0).abs() / 9.0 < 0.005,
            "separation {} too far from 9.0",
            model.separation
        );
        let wrapped = (model.offset - 4.0).rem_euclid(model.separation);
        assert!(
            wrapped.min(model.separation - wrapped) < 1.0,
            "offset {} too far from 4.0",
            model.offset
        );

        // track assignment is total and consistent with the model
        for hole in &analysis.holes {
            assert!(hole.track > 0 && hole.track < analysis.table.len());
            let predicted = model.position(hole.track) - analysis.drift.at(hole.bbox.min_row);
            assert!(
                (predicted - hole.centroid.1).abs() <= model.separation / 2.0 + 1.0,
                "hole at {:?} inconsistent with track {}",
                hole.centroid,
                hole.track
            );
        }

        // MIDI mapping covers every accepted hole
        let mapping = analysis.mapping.as_ref().expect("mapping should exist");
        for hole in analysis.holes.iter().filter(|h| h.music) {
            let key = hole.midi_key.expect("accepted hole has a key") as usize;
            assert_eq!(mapping.midi_to_track[key], hole.track);
        }

        // the close pair chains: one fewer note than holes
        let notes = crate::notes::note_events(&analysis.holes);
        assert_eq!(notes.len(), sketch.holes.len() - 1);
        assert!(notes.windows(2).all(|w| w[0].start_row <= w[1].start_row));

        // hole pixels survive as hole state, leader got marked
        let (hr, hc) = analysis.holes[0].entry;
        assert_eq!(analysis.grid.get(hr, hc), PixelState::Hole);
        assert_eq!(analysis.grid.get(200, 0), PixelState::Leader);
    }

    #[test]
    fn report_serializes() {
        let sketch = sketch();
        let img = sketch.render();
        let analyzer = RollAnalyzer::new(test_config());
        let analysis = analyzer.analyze_image(&img).unwrap();
        let report = analysis.report();

        assert_eq!(report.geometry.image_length, 4000);
        assert_eq!(report.geometry.image_width, 400);
        assert_eq!(report.holes.len(), sketch.holes.len());
        assert!(report.bad_holes.is_empty());
        assert!(report.geometry.musical_note_count > 0);

        let json = serde_json::to_string(&report).expect("report is serializable");
        assert!(json.contains("\"hole_separation\""));
    }
}
