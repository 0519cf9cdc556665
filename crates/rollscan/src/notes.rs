//! Note grouping, hole identifiers, and the snakebite accent scan.

use crate::config::NoteConfig;
use crate::holes::HoleRecord;
use crate::keymap::MidiMapping;
use crate::tracker::{TrackMeaning, TrackTable};

/// One playable note, ready for MIDI track assignment.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NoteEvent {
    /// Row of the note attack.
    pub start_row: usize,
    /// Row where the note releases.
    pub end_row: usize,
    /// MIDI key of the note.
    pub midi_key: u8,
    /// Tracker position that produced the note.
    pub track: usize,
    /// True when the note comes from a snakebite accent track.
    pub snakebite: bool,
}

/// Average bounding-box width of the accepted holes.
pub fn average_hole_width(holes: &[HoleRecord]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for hole in holes.iter().filter(|h| h.music) {
        sum += hole.bbox.width() as f64;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Chain consecutive holes of each track into notes.
///
/// A gap below `group_scale` times the average hole width continues the
/// previous note; the chained hole extends that note's off row instead of
/// starting its own attack.
pub fn group_holes(holes: &mut [HoleRecord], table: &TrackTable, cfg: &NoteConfig) {
    let length = average_hole_width(holes) * cfg.group_scale;

    for indices in &table.tracks {
        let mut last_attack: Option<usize> = None;
        let mut prev_end: Option<usize> = None;
        for &idx in indices {
            if !holes[idx].music {
                continue;
            }
            let start = holes[idx].bbox.min_row;
            let end = holes[idx].bbox.max_row;
            match prev_end {
                Some(prev) if start.saturating_sub(prev) as f64 <= length => {
                    holes[idx].attack = false;
                    if let Some(a) = last_attack {
                        holes[a].off_row = end;
                    }
                }
                _ => {
                    holes[idx].attack = true;
                    holes[idx].off_row = end;
                    last_attack = Some(idx);
                }
            }
            prev_end = Some(end);
        }
    }
}

/// Identify snakebite accent pairs.
///
/// Looks for exactly four tracks clearly narrower than the rest, forming
/// two adjacent pairs. Anything else leaves the table untouched; the
/// heuristic is deliberately conservative.
pub fn analyze_snakebites(holes: &mut [HoleRecord], table: &mut TrackTable) {
    let mut sortlist: Vec<(f64, usize)> = Vec::new();
    for (track, indices) in table.tracks.iter().enumerate() {
        let mut sum = 0.0;
        let mut count = 0usize;
        for &idx in indices {
            if !holes[idx].music {
                continue;
            }
            sum += holes[idx].bbox.width() as f64;
            count += 1;
        }
        if count > 0 {
            sortlist.push((sum / count as f64, track));
        }
    }
    if sortlist.len() < 2 {
        return;
    }
    sortlist.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    // last index of the narrow group, found at the width ratio break
    let mut split = 0usize;
    for i in 0..sortlist.len() - 1 {
        if sortlist[i].0 / sortlist[i + 1].0 <= 0.75 {
            split = i;
            break;
        }
    }
    if split == 0 {
        // no clearly narrower group: no accents
        return;
    }
    if split != 3 {
        // require two pairs; anything else is noise
        return;
    }

    // the four narrow tracks must pair up as adjacent columns
    let mut pairing = [0usize; 4];
    for i in 0..4 {
        if pairing[i] != 0 {
            continue;
        }
        for j in i + 1..4 {
            if pairing[j] != 0 {
                continue;
            }
            let a = sortlist[i].1 as i64;
            let b = sortlist[j].1 as i64;
            if (a - b).abs() == 1 {
                pairing[i] = j + 1;
                pairing[j] = i + 1;
                break;
            }
        }
    }
    if pairing.iter().any(|&p| p == 0) {
        return;
    }

    for &(_, track) in &sortlist[..4] {
        table.meaning[track] = TrackMeaning::Snakebite;
        for &idx in &table.tracks[track] {
            holes[idx].snakebite = true;
        }
    }
}

/// Assign report identifiers `K<key>_N<n>` to accepted holes, numbered
/// per track in row order.
pub fn assign_hole_ids(holes: &mut [HoleRecord], table: &TrackTable, mapping: &MidiMapping) {
    for (key, &track) in mapping.midi_to_track.iter().enumerate() {
        if track == 0 {
            continue;
        }
        let Some(indices) = table.tracks.get(track) else {
            continue;
        };
        let mut counter = 1usize;
        for &idx in indices {
            if !holes[idx].music {
                continue;
            }
            holes[idx].id = Some(format!("K{key}_N{counter}"));
            counter += 1;
        }
    }
}

/// Collect the note list from the grouped holes, ordered by start row.
pub fn note_events(holes: &[HoleRecord]) -> Vec<NoteEvent> {
    let mut notes: Vec<NoteEvent> = holes
        .iter()
        .filter(|h| h.music && h.attack)
        .map(|h| NoteEvent {
            start_row: h.bbox.min_row,
            end_row: h.off_row,
            midi_key: h.midi_key.unwrap_or(0),
            track: h.track,
            snakebite: h.snakebite,
        })
        .collect();
    notes.sort_by_key(|n| n.start_row);
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holes::Bbox;

    fn hole(track: usize, start: usize, len: usize, width: usize) -> HoleRecord {
        HoleRecord {
            bbox: Bbox {
                min_row: start,
                min_col: 50,
                max_row: start + len,
                max_col: 50 + width,
            },
            entry: (start, 50),
            area: (len * width) as u64,
            centroid: (start as f64 + len as f64 / 2.0, 52.0),
            perimeter: Some(30.0),
            circularity: 0.9,
            major_axis_deg: 0.0,
            track,
            midi_key: Some(60),
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

    fn table_of(holes: &[HoleRecord], count: usize) -> TrackTable {
        let mut table = TrackTable {
            tracks: vec![Vec::new(); count],
            meaning: vec![TrackMeaning::Unknown; count],
        };
        for (idx, h) in holes.iter().enumerate() {
            table.tracks[h.track].push(idx);
        }
        table
    }

    #[test]
    fn close_holes_chain_into_one_note() {
        // three holes, gaps of 5 rows, average width 8 → chain threshold ~11
        let mut holes = vec![
            hole(3, 100, 20, 8),
            hole(3, 125, 20, 8),
            hole(3, 150, 20, 8),
            // far-away fourth hole starts its own note
            hole(3, 400, 20, 8),
        ];
        let table = table_of(&holes, 8);
        group_holes(&mut holes, &table, &NoteConfig::default());

        assert!(holes[0].attack);
        assert!(!holes[1].attack);
        assert!(!holes[2].attack);
        assert!(holes[3].attack);
        // first attack's off time extends to the chain's end
        assert_eq!(holes[0].off_row, 170);
        assert_eq!(holes[3].off_row, 420);

        let notes = note_events(&holes);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].start_row, 100);
        assert_eq!(notes[0].end_row, 170);
        assert_eq!(notes[1].start_row, 400);
    }

    #[test]
    fn snakebite_needs_two_adjacent_pairs() {
        // tracks 2+3 and 6+7 narrow (width 4), the rest width 10
        let mut holes = Vec::new();
        for track in 1..10usize {
            let width = if matches!(track, 2 | 3 | 6 | 7) { 4 } else { 10 };
            holes.push(hole(track, 100 * track, 20, width));
            holes.push(hole(track, 100 * track + 40, 20, width));
        }
        let mut table = table_of(&holes, 12);
        analyze_snakebites(&mut holes, &mut table);

        for &track in &[2usize, 3, 6, 7] {
            assert_eq!(table.meaning[track], TrackMeaning::Snakebite);
            for &idx in &table.tracks[track] {
                assert!(holes[idx].snakebite);
            }
        }
        assert_eq!(table.meaning[1], TrackMeaning::Unknown);
    }

    #[test]
    fn snakebite_rejects_unpaired_narrow_tracks() {
        // four narrow tracks but 2, 4, 6, 8 are not adjacent pairs
        let mut holes = Vec::new();
        for track in 1..10usize {
            let width = if matches!(track, 2 | 4 | 6 | 8) { 4 } else { 10 };
            holes.push(hole(track, 100 * track, 20, width));
        }
        let mut table = table_of(&holes, 12);
        analyze_snakebites(&mut holes, &mut table);
        assert!(table.meaning.iter().all(|&m| m == TrackMeaning::Unknown));
    }

    #[test]
    fn snakebite_rejects_wrong_count() {
        // only two narrow tracks: conservative no-op
        let mut holes = Vec::new();
        for track in 1..10usize {
            let width = if matches!(track, 2 | 3) { 4 } else { 10 };
            holes.push(hole(track, 100 * track, 20, width));
        }
        let mut table = table_of(&holes, 12);
        analyze_snakebites(&mut holes, &mut table);
        assert!(table.meaning.iter().all(|&m| m == TrackMeaning::Unknown));
    }

    #[test]
    fn uniform_tracks_have_no_snakebites() {
        let mut holes = Vec::new();
        for track in 1..10usize {
            holes.push(hole(track, 100 * track, 20, 8));
        }
        let mut table = table_of(&holes, 12);
        analyze_snakebites(&mut holes, &mut table);
        assert!(table.meaning.iter().all(|&m| m == TrackMeaning::Unknown));
    }

    #[test]
    fn hole_ids_number_per_track() {
        let mut holes = vec![hole(3, 100, 20, 8), hole(3, 200, 20, 8), hole(5, 150, 20, 8)];
        let table = table_of(&holes, 8);
        let mut midi_to_track = vec![0usize; 128];
        midi_to_track[60] = 3;
        midi_to_track[62] = 5;
        let mapping = MidiMapping {
            midi_to_track,
            leftmost_track: 3,
            rightmost_track: 5,
            first_hole_position: 0.0,
            last_hole_position: 0.0,
        };
        assign_hole_ids(&mut holes, &table, &mapping);
        assert_eq!(holes[0].id.as_deref(), Some("K60_N1"));
        assert_eq!(holes[1].id.as_deref(), Some("K60_N2"));
        assert_eq!(holes[2].id.as_deref(), Some("K62_N1"));
    }
}
