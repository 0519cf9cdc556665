//! rollscan — player-piano roll scan analyzer.
//!
//! Converts a scanned roll image into a structured description of the
//! roll's geometry and musical content. The pipeline stages are:
//!
//! 1. **Classify** – brightness threshold into paper / non-paper.
//! 2. **Margins** – raw edge sweep plus four-direction waterfall fill to
//!    defeat dust.
//! 3. **Leader** – orientation check, leader/pre-leader changepoints,
//!    hard margin dead zones.
//! 4. **Drift** – exponentially smoothed margin curves give a per-row
//!    lateral correction (coarse pass, refined after tear repair).
//! 5. **Holes** – iterative 8-connected flood fill into hole and dust
//!    records.
//! 6. **Tears / shifts** – multi-time-constant margin analysis localizes
//!    paper damage and whole-roll translations.
//! 7. **Shape** – Moore boundary perimeter, circularity, principal axis.
//! 8. **Tracker bar** – spectral spacing estimate, phase offset, track
//!    assignment.
//! 9. **MIDI mapping / validation** – track-to-key table, edge and
//!    geometry rejection with auditable reasons, note grouping,
//!    snakebite accents.
//!
//! # Public API
//! [`RollAnalyzer`] runs the pipeline from a [`RollConfig`]; the result
//! is a [`RollAnalysis`] whose [`RollAnalysis::report`] produces the
//! serializable [`RollReport`].

pub mod config;
pub mod drift;
pub mod error;
pub mod grid;
pub mod holes;
pub mod keymap;
pub mod leader;
pub mod margins;
pub mod notes;
pub mod overlay;
pub mod pipeline;
pub mod report;
pub mod shape;
pub mod shifts;
pub mod smoothing;
pub mod stats;
pub mod tears;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{RollConfig, RollKind, RollTypeSpec};
pub use error::{AnalysisError, Result};
pub use grid::{PixelGrid, PixelState};
pub use holes::{HoleRecord, RejectReason};
pub use notes::NoteEvent;
pub use pipeline::{RollAnalysis, RollAnalyzer};
pub use report::RollReport;
pub use shifts::ShiftRecord;
pub use tears::{Side, TearRecord};
pub use tracker::TrackerModel;
