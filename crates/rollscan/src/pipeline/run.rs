//! Stage orchestration for one analysis run.

use super::RollAnalysis;
use crate::config::RollConfig;
use crate::drift;
use crate::error::Result;
use crate::grid::{PixelGrid, PixelState};
use crate::holes;
use crate::keymap;
use crate::leader;
use crate::margins;
use crate::notes;
use crate::shifts;
use crate::tears;
use crate::tracker;

pub(super) fn run(mut grid: PixelGrid, config: RollConfig) -> Result<RollAnalysis> {
    let rows = grid.rows();

    tracing::debug!("tracing margins");
    let mut m = margins::trace_raw(&mut grid);
    margins::waterfall(&mut grid, &mut m);

    tracing::debug!("locating leader");
    let bounds = leader::analyze(&mut grid, &m, &config.leader)?;

    let hard = margins::analyze_hard(&mut grid, &m, bounds.leader_row, config.leader.end_guard);
    tracing::debug!(
        "leader at row {}, hard margins [{}, {}]",
        bounds.leader_row,
        hard.left,
        hard.right
    );

    // coarse pass; superseded after tear reclassification cleans the curves
    let coarse_drift = drift::generate(&m, bounds.leader_row, &config.drift);
    let coarse_span = coarse_drift
        .iter()
        .map(|(_, v)| v.abs())
        .fold(0.0f64, f64::max);
    tracing::debug!("coarse drift span {:.2}px", coarse_span);

    tracing::debug!("extracting holes");
    let extraction = holes::extract(&mut grid, &hard, bounds.leader_row, &config);
    let holes::Extraction {
        holes: mut hole_records,
        antidust,
        mut first_music_row,
        last_music_row,
    } = extraction;
    tracing::info!(
        "extracted {} holes, {} dust regions",
        hole_records.len(),
        antidust.len()
    );

    let tear_outcome = tears::analyze(&mut grid, &mut m, first_music_row.min(rows), &config.tear);
    tracing::info!(
        "tears: {} bass, {} treble",
        tear_outcome.bass.len(),
        tear_outcome.treble.len()
    );

    let shift_records = shifts::analyze(&m, first_music_row.min(rows), &config.shift);

    // refined drift now that tear pixels are out of the margin curves
    let drift_table = drift::generate(&m, bounds.leader_row, &config.drift);

    tracing::debug!("computing shape descriptors");
    crate::shape::compute_descriptors(&grid, &mut hole_records, config.max_perimeter_steps);
    keymap::invalidate_skewed(&mut grid, &mut hole_records, &config);

    if first_music_row < rows {
        leader::mark_region(
            &mut grid,
            bounds.leader_row + 1,
            first_music_row,
            PixelState::PostLeader,
        );
        leader::mark_region(&mut grid, last_music_row + 1, rows, PixelState::PostMusic);
    }

    // tracker-bar model from the corrected centroid histogram
    let histogram = tracker::centroid_histogram(&hole_records, &drift_table, grid.cols());
    let model = tracker::estimate_separation(&histogram.corrected, &config.spectral).map(|sep| {
        let clusters = tracker::weighted_clusters(&histogram.corrected);
        let offset = tracker::estimate_offset(&clusters, sep);
        tracker::TrackerModel {
            separation: sep,
            offset,
        }
    });

    let mut table = tracker::TrackTable::default();
    let mut mapping = None;
    if let Some(model) = &model {
        tracing::info!(
            "tracker model: separation {:.3}px, offset {:.2}px",
            model.separation,
            model.offset
        );
        table = tracker::assign_tracks(&mut hole_records, &drift_table, model, grid.cols());

        let map = keymap::analyze(&table, &m, model, first_music_row.min(rows - 1), &config)?;
        keymap::assign_midi_keys(&mut hole_records, &table, &map);
        keymap::invalidate_edge_holes(&mut grid, &mut hole_records, &map, model, &config);
        keymap::invalidate_off_tracker(&mut grid, &mut hole_records, &drift_table, model, &config);
        mapping = Some(map);
    } else {
        tracing::warn!("no periodic hole pattern found; skipping track assignment");
    }

    // invalidation may have emptied the top of the roll
    let mut bad_hole_floor = first_music_row;
    if let Some(new_first) = hole_records
        .iter()
        .filter(|h| h.music)
        .map(|h| h.bbox.min_row)
        .min()
    {
        if new_first > first_music_row {
            first_music_row = new_first;
            bad_hole_floor = new_first;
            leader::mark_region(
                &mut grid,
                bounds.leader_row + 1,
                first_music_row,
                PixelState::PostLeader,
            );
        }
    }

    for hole in hole_records.iter_mut() {
        hole.lead_drift = drift_table.at(hole.bbox.min_row);
        hole.trail_drift = drift_table.at(hole.bbox.max_row);
    }

    if let Some(map) = &mapping {
        notes::assign_hole_ids(&mut hole_records, &table, map);
    }
    notes::group_holes(&mut hole_records, &table, &config.notes);
    notes::analyze_snakebites(&mut hole_records, &mut table);

    Ok(RollAnalysis {
        config,
        grid,
        margins: m,
        bounds,
        hard,
        drift: drift_table,
        holes: hole_records,
        antidust,
        first_music_row,
        last_music_row,
        bad_hole_floor,
        tears: tear_outcome,
        shifts: shift_records,
        model,
        table,
        mapping,
        histogram: Some(histogram),
    })
}
