//! Track-to-MIDI-key mapping and hole validation.
//!
//! The populated track range is constrained to stay inside the hard
//! margins plus a tracker-to-edge tolerance, then mapped to a contiguous
//! MIDI key range centered so the middle track lands on the E4/F4
//! boundary. Holes outside the surviving range, or with impossible
//! geometry, move to the rejected set with a reason.

use crate::config::RollConfig;
use crate::drift::DriftTable;
use crate::error::{AnalysisError, Result};
use crate::grid::{PixelGrid, PixelState};
use crate::holes::{clear_region, HoleRecord, RejectReason};
use crate::margins::Margins;
use crate::tracker::{TrackTable, TrackerModel};

/// MIDI key 64 sits on the E4/F4 boundary; the middle track is pinned there.
const MIDDLE_KEY: usize = 64;

/// Warn above this many detected tracks; abort above
/// [`ORGAN_TRACK_LIMIT`].
const WIDE_TRACK_WARNING: usize = 100;

/// More tracks than this means an organ roll, which is unsupported.
const ORGAN_TRACK_LIMIT: usize = 105;

/// Result of the track-to-key mapping.
#[derive(Debug, Clone)]
pub struct MidiMapping {
    /// Track index per MIDI key; 0 is the unused sentinel.
    pub midi_to_track: Vec<usize>,
    /// Leftmost mapped track.
    pub leftmost_track: usize,
    /// Rightmost mapped track.
    pub rightmost_track: usize,
    /// Expected column of the leftmost populated track.
    pub first_hole_position: f64,
    /// Expected column of the rightmost populated track.
    pub last_hole_position: f64,
}

impl MidiMapping {
    /// Number of mapped tracker positions.
    pub fn tracker_hole_count(&self) -> usize {
        self.midi_to_track.iter().filter(|&&t| t != 0).count()
    }

    /// MIDI key for `track`, when the track is mapped.
    pub fn key_for_track(&self, track: usize) -> Option<u8> {
        self.midi_to_track
            .iter()
            .position(|&t| t == track)
            .map(|key| key as u8)
    }
}

/// Map populated tracks to MIDI keys.
pub fn analyze(
    table: &TrackTable,
    margins: &Margins,
    model: &TrackerModel,
    first_music_row: usize,
    cfg: &RollConfig,
) -> Result<MidiMapping> {
    let count = table.len();
    let positions: Vec<f64> = (0..count).map(|i| model.position(i)).collect();

    let first_hole_position = (0..count)
        .find(|&i| !table.tracks[i].is_empty())
        .map(|i| positions[i])
        .unwrap_or(0.0);
    let last_hole_position = (0..count)
        .rev()
        .find(|&i| !table.tracks[i].is_empty())
        .map(|i| positions[i])
        .unwrap_or(0.0);

    // constrain the mapped range to the paper at the first music hole
    let r = first_music_row.min(margins.left.len().saturating_sub(1));
    let edge_pad = cfg.min_tracker_edge() * model.separation;
    let leftmin = margins.left[r] as f64 + edge_pad;
    let mut leftmost = 0usize;
    for (i, &p) in positions.iter().enumerate() {
        if p > leftmin {
            leftmost = i;
            break;
        }
    }
    let rightmin = margins.right[r] as f64 - edge_pad;
    let mut rightmost = count.saturating_sub(1);
    for i in (1..count).rev() {
        if positions[i] < rightmin {
            rightmost = i;
            break;
        }
    }

    // grow by one when a populated track sits just outside
    if rightmost + 1 < count && !table.tracks[rightmost + 1].is_empty() {
        rightmost += 1;
    }
    if leftmost > 0 && !table.tracks[leftmost - 1].is_empty() {
        leftmost -= 1;
    }
    // shrink when both extremes are silent
    if table.tracks[rightmost].is_empty() && table.tracks[leftmost].is_empty() {
        leftmost += 1;
        rightmost = rightmost.saturating_sub(1);
    }
    let leftmost = leftmost.min(rightmost);

    let holecount = rightmost - leftmost + 1;
    if holecount > WIDE_TRACK_WARNING {
        tracing::warn!("detected track count is quite large: {holecount}");
    }
    if holecount > ORGAN_TRACK_LIMIT {
        return Err(AnalysisError::TooManyTracks(holecount));
    }

    let f4split = (rightmost - leftmost) / 2 + leftmost;
    let adjustment = MIDDLE_KEY as i64 - f4split as i64;

    let mut midi_to_track = vec![0usize; 128];
    for track in leftmost..=rightmost {
        let key = track as i64 + adjustment;
        if (0..128).contains(&key) {
            midi_to_track[key as usize] = track;
        } else {
            tracing::warn!("track {track} maps outside the MIDI key range; dropped");
        }
    }

    // 65-hole rolls sit a whole step lower; re-map the table up two keys
    let detected = midi_to_track.iter().filter(|&&t| t != 0).count();
    if detected == 65 {
        for key in (2..128).rev() {
            midi_to_track[key] = midi_to_track[key - 2];
        }
        midi_to_track[0] = 0;
        midi_to_track[1] = 0;
    }

    Ok(MidiMapping {
        midi_to_track,
        leftmost_track: leftmost,
        rightmost_track: rightmost,
        first_hole_position,
        last_hole_position,
    })
}

/// Stamp MIDI keys onto the holes of every mapped track.
pub fn assign_midi_keys(holes: &mut [HoleRecord], table: &TrackTable, mapping: &MidiMapping) {
    for (key, &track) in mapping.midi_to_track.iter().enumerate() {
        if track == 0 {
            continue;
        }
        if let Some(indices) = table.tracks.get(track) {
            for &idx in indices {
                holes[idx].midi_key = Some(key as u8);
            }
        }
    }
}

/// Reject non-circular holes whose major axis leans past the cutoff.
///
/// Runs before track assignment; a leaning hole is a rip or die cut, not
/// music.
pub fn invalidate_skewed(grid: &mut PixelGrid, holes: &mut [HoleRecord], cfg: &RollConfig) {
    for hole in holes.iter_mut() {
        if !hole.music || hole.perimeter.is_none() {
            continue;
        }
        if hole.circularity > cfg.circularity_threshold {
            // too round for the axis estimate to mean anything
            continue;
        }
        if hole.major_axis_deg.abs() < cfg.major_axis_cutoff_deg {
            continue;
        }
        clear_region(grid, hole.entry, PixelState::BadHoleSkewed);
        hole.reject(RejectReason::Skewed);
    }
}

/// Reject holes outside the mapped track range or with impossible widths.
pub fn invalidate_edge_holes(
    grid: &mut PixelGrid,
    holes: &mut [HoleRecord],
    mapping: &MidiMapping,
    model: &TrackerModel,
    cfg: &RollConfig,
) {
    let mintrack = mapping
        .midi_to_track
        .iter()
        .copied()
        .filter(|&t| t != 0)
        .min()
        .unwrap_or(0);
    let maxtrack = mapping
        .midi_to_track
        .iter()
        .copied()
        .filter(|&t| t != 0)
        .max()
        .unwrap_or(0);
    let maxwidth = (model.separation * cfg.max_hole_width_ratio + 0.5) as usize;

    for hole in holes.iter_mut() {
        if !hole.music {
            continue;
        }
        if hole.track == 0 {
            clear_region(grid, hole.entry, PixelState::Antidust);
            hole.reject(RejectReason::Strange);
            continue;
        }
        if hole.track < mintrack {
            clear_region(grid, hole.entry, PixelState::Antidust);
            hole.reject(RejectReason::BassMargin);
            continue;
        }
        if hole.track > maxtrack {
            clear_region(grid, hole.entry, PixelState::Antidust);
            hole.reject(RejectReason::TrebleMargin);
            continue;
        }
        if hole.bbox.width() >= maxwidth {
            clear_region(grid, hole.entry, PixelState::BadHole);
            hole.reject(RejectReason::Wide);
            continue;
        }
        let aspect = hole.bbox.width() as f64 / hole.bbox.height().max(1) as f64;
        if aspect > cfg.aspect_ratio_threshold {
            // wider than long never happens for a real music hole
            clear_region(grid, hole.entry, PixelState::BadHoleAspect);
            hole.reject(RejectReason::Aspect);
        }
    }
}

/// Reject holes whose centroid sits too far from the track line.
///
/// Off by default; the centering of real rolls is loose enough that this
/// filter costs more than it saves. Kept as a tunable.
pub fn invalidate_off_tracker(
    grid: &mut PixelGrid,
    holes: &mut [HoleRecord],
    drift: &DriftTable,
    model: &TrackerModel,
    cfg: &RollConfig,
) {
    if !cfg.notes.off_track_filter {
        return;
    }
    let max_offset = cfg.notes.off_track_tolerance * model.separation;
    for hole in holes.iter_mut() {
        if !hole.music || hole.track == 0 {
            continue;
        }
        let trackpos = model.position(hole.track) - drift.at(hole.bbox.min_row);
        let offset = (trackpos - hole.centroid.1).abs();
        if offset > max_offset {
            clear_region(grid, hole.entry, PixelState::BadHole);
            hole.reject(RejectReason::Uncentered);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holes::Bbox;
    use crate::tracker::TrackMeaning;

    fn hole_at(track: usize, col: f64, width: usize, height: usize) -> HoleRecord {
        HoleRecord {
            bbox: Bbox {
                min_row: 500,
                min_col: col as usize,
                max_row: 500 + height,
                max_col: col as usize + width,
            },
            entry: (500, col as usize),
            area: (width * height) as u64,
            centroid: (505.0, col),
            perimeter: Some(30.0),
            circularity: 0.9,
            major_axis_deg: 0.0,
            track,
            midi_key: None,
            attack: false,
            off_row: 0,
            snakebite: false,
            lead_drift: 0.0,
            trail_drift: 0.0,
            music: true,
            reason: None,
            id: None,
        }
    }

    /// 40-track synthetic layout: separation 9, offset 4, all populated.
    fn synthetic_table(model: &TrackerModel, holes: &mut Vec<HoleRecord>) -> TrackTable {
        let count = 40;
        let mut table = TrackTable {
            tracks: vec![Vec::new(); count],
            meaning: vec![TrackMeaning::Unknown; count],
        };
        for track in 2..count - 2 {
            let col = model.position(track);
            holes.push(hole_at(track, col, 6, 12));
            let idx = holes.len() - 1;
            table.tracks[track].push(idx);
        }
        table
    }

    fn test_margins(rows: usize) -> Margins {
        Margins {
            left: vec![10; rows],
            right: vec![360; rows],
        }
    }

    #[test]
    fn mapping_is_contiguous_and_centered() {
        let model = TrackerModel {
            separation: 9.0,
            offset: 4.0,
        };
        let mut holes = Vec::new();
        let table = synthetic_table(&model, &mut holes);
        let margins = test_margins(1000);
        let cfg = RollConfig::default();
        let mapping = analyze(&table, &margins, &model, 500, &cfg).unwrap();

        assert_eq!(mapping.leftmost_track, 2);
        assert_eq!(mapping.rightmost_track, 39);
        let mapped: Vec<usize> = mapping
            .midi_to_track
            .iter()
            .copied()
            .filter(|&t| t != 0)
            .collect();
        assert_eq!(mapped.len(), 38);
        // contiguous ascending tracks
        for pair in mapped.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
        // middle track sits on the E4/F4 boundary
        let f4split = (39 - 2) / 2 + 2;
        assert_eq!(mapping.midi_to_track[MIDDLE_KEY], f4split);
    }

    #[test]
    fn keys_are_stamped_on_holes() {
        let model = TrackerModel {
            separation: 9.0,
            offset: 4.0,
        };
        let mut holes = Vec::new();
        let table = synthetic_table(&model, &mut holes);
        let margins = test_margins(1000);
        let cfg = RollConfig::default();
        let mapping = analyze(&table, &margins, &model, 500, &cfg).unwrap();
        assign_midi_keys(&mut holes, &table, &mapping);

        for hole in &holes {
            let key = hole.midi_key.expect("every mapped hole gets a key");
            assert_eq!(mapping.midi_to_track[key as usize], hole.track);
        }
    }

    #[test]
    fn too_many_tracks_is_fatal() {
        let model = TrackerModel {
            separation: 9.0,
            offset: 4.0,
        };
        let count = 120;
        let mut table = TrackTable {
            tracks: vec![Vec::new(); count],
            meaning: vec![TrackMeaning::Unknown; count],
        };
        let mut holes = Vec::new();
        for track in 1..count {
            holes.push(hole_at(track, model.position(track), 6, 12));
            let idx = holes.len() - 1;
            table.tracks[track].push(idx);
        }
        let margins = Margins {
            left: vec![0; 1000],
            right: vec![1200; 1000],
        };
        let cfg = RollConfig::default();
        match analyze(&table, &margins, &model, 500, &cfg) {
            Err(AnalysisError::TooManyTracks(n)) => assert!(n > ORGAN_TRACK_LIMIT),
            other => panic!("expected TooManyTracks, got {other:?}"),
        }
    }

    #[test]
    fn rejection_reasons_partition_holes() {
        let model = TrackerModel {
            separation: 9.0,
            offset: 4.0,
        };
        let mut holes = Vec::new();
        let table = synthetic_table(&model, &mut holes);
        // a strange hole, one outside each margin, one too wide, one squat
        holes.push(hole_at(0, 4.0, 6, 12));
        holes.push(hole_at(1, model.position(1), 6, 12));
        holes.push(hole_at(45, model.position(45), 6, 12));
        holes.push(hole_at(20, model.position(20), 30, 40));
        holes.push(hole_at(21, model.position(21), 10, 4));

        let margins = test_margins(1000);
        let cfg = RollConfig::default();
        let mapping = analyze(&table, &margins, &model, 500, &cfg).unwrap();
        let mut grid = crate::grid::PixelGrid::filled(1000, 400, PixelState::Paper);
        invalidate_edge_holes(&mut grid, &mut holes, &mapping, &model, &cfg);

        let rejected: Vec<&HoleRecord> = holes.iter().filter(|h| !h.music).collect();
        assert_eq!(rejected.len(), 5);
        for hole in &rejected {
            assert!(hole.reason.is_some(), "rejected hole without reason");
        }
        let reasons: Vec<RejectReason> = rejected.iter().map(|h| h.reason.unwrap()).collect();
        assert!(reasons.contains(&RejectReason::Strange));
        assert!(reasons.contains(&RejectReason::BassMargin));
        assert!(reasons.contains(&RejectReason::TrebleMargin));
        assert!(reasons.contains(&RejectReason::Wide));
        assert!(reasons.contains(&RejectReason::Aspect));
        // accepted holes carry no reason
        for hole in holes.iter().filter(|h| h.music) {
            assert!(hole.reason.is_none());
        }
    }

    #[test]
    fn skew_filter_spares_round_holes() {
        let mut grid = crate::grid::PixelGrid::filled(1000, 400, PixelState::Paper);
        let cfg = RollConfig::default();
        let mut holes = vec![hole_at(5, 49.0, 6, 12), hole_at(6, 58.0, 6, 12)];
        holes[0].circularity = 0.9; // round: exempt even when leaning
        holes[0].major_axis_deg = 40.0;
        holes[1].circularity = 0.2;
        holes[1].major_axis_deg = 20.0; // elongated and leaning: rejected
        invalidate_skewed(&mut grid, &mut holes, &cfg);
        assert!(holes[0].music);
        assert!(!holes[1].music);
        assert_eq!(holes[1].reason, Some(RejectReason::Skewed));
    }
}
