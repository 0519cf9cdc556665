//! Standard MIDI File export.
//!
//! Notes land on four parallel tracks: bass notes, treble notes, and the
//! two expression registers. Expression channels are muted with a volume
//! controller; they drive the playback emulation, not audible notes. Row
//! numbers map directly to ticks, and a slow tempo ramp compensates for
//! the paper take-up spool speeding the roll up over its length.

use std::path::Path;

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use rollscan::RollReport;

use crate::CliResult;

/// Ticks per quarter note of the exported file.
const TPQ: u16 = 510;

/// Rows between tempo-ramp updates.
const TEMPO_STEP_TICKS: u32 = 3600;

/// Per-step slowdown factor of the tick clock.
const ACCELERATION: f64 = 1.0004;

/// Keys below this are bass expression holes.
const BASS_EXPRESSION_SPLIT: u8 = 25;
/// Keys below this are bass notes; above, treble notes.
const REGISTER_SPLIT: u8 = 65;
/// Keys at or above this are treble expression holes.
const TREBLE_EXPRESSION_SPLIT: u8 = 104;

/// Write the report's note list as a 5-track SMF.
pub fn write_midi(report: &RollReport, path: &Path) -> CliResult<()> {
    let notes = &report.notes;
    if notes.is_empty() {
        tracing::warn!("no notes to export; writing an empty MIDI file");
    }

    let min_row = notes.iter().map(|n| n.start_row).min().unwrap_or(0);
    let max_tick = notes
        .iter()
        .map(|n| n.end_row.saturating_sub(min_row) as u32)
        .max()
        .unwrap_or(0);

    // absolute-tick event lists: tempo + 4 note tracks
    let mut tracks: Vec<Vec<(u32, TrackEventKind)>> = vec![Vec::new(); 5];

    // mute the expression registers, pan bass left and treble right
    tracks[3].push((0, controller(3, 7, 0)));
    tracks[4].push((0, controller(4, 7, 0)));
    tracks[1].push((0, controller(1, 10, 32)));
    tracks[2].push((0, controller(2, 10, 96)));

    for note in notes {
        let (track, channel, velocity) = if note.midi_key < BASS_EXPRESSION_SPLIT {
            (3usize, 3u8, 1u8)
        } else if note.midi_key < REGISTER_SPLIT {
            (1, 1, 64)
        } else if note.midi_key < TREBLE_EXPRESSION_SPLIT {
            (2, 2, 64)
        } else {
            (4, 4, 1)
        };
        let on = (note.start_row - min_row) as u32;
        let off = note.end_row.saturating_sub(min_row) as u32;
        if off <= on {
            tracing::warn!(
                "note on key {} at row {} has no duration; skipped",
                note.midi_key,
                note.start_row
            );
            continue;
        }
        tracks[track].push((
            on,
            TrackEventKind::Midi {
                channel: u4::from(channel),
                message: MidiMessage::NoteOn {
                    key: u7::from(note.midi_key),
                    vel: u7::from(velocity),
                },
            },
        ));
        tracks[track].push((
            off,
            TrackEventKind::Midi {
                channel: u4::from(channel),
                message: MidiMessage::NoteOff {
                    key: u7::from(note.midi_key),
                    vel: u7::from(0u8),
                },
            },
        ));
    }

    // tempo ramp on the conductor track
    let mut timevalue = 1.0f64;
    let mut curtick = 0u32;
    while curtick <= max_tick {
        let uspq = (1_000_000.0 * timevalue) as u32;
        tracks[0].push((curtick, TrackEventKind::Meta(MetaMessage::Tempo(u24::from(uspq)))));
        curtick += TEMPO_STEP_TICKS;
        timevalue /= ACCELERATION;
    }

    let smf_tracks: Vec<Vec<TrackEvent>> = tracks.into_iter().map(to_delta_track).collect();
    let smf = Smf {
        header: Header::new(Format::Parallel, Timing::Metrical(u15::from(TPQ))),
        tracks: smf_tracks,
    };
    smf.save(path)?;
    Ok(())
}

fn controller(channel: u8, controller: u8, value: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::from(channel),
        message: MidiMessage::Controller {
            controller: u7::from(controller),
            value: u7::from(value),
        },
    }
}

/// Sort an absolute-tick event list and convert it to delta times.
fn to_delta_track(mut events: Vec<(u32, TrackEventKind)>) -> Vec<TrackEvent> {
    events.sort_by_key(|&(tick, _)| tick);
    let mut out = Vec::with_capacity(events.len() + 1);
    let mut last = 0u32;
    for (tick, kind) in events {
        out.push(TrackEvent {
            delta: u28::from(tick - last),
            kind,
        });
        last = tick;
    }
    out.push(TrackEvent {
        delta: u28::from(0u32),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    out
}
