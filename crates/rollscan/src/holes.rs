//! Connected-component hole extraction.
//!
//! Every unvisited non-paper pixel between the hard margins and below the
//! leader boundary seeds an 8-connected flood fill. The grid doubles as
//! the visited set: a pixel is recolored the moment it is enqueued, so no
//! pixel is processed twice. Fills use an explicit work list; a fail-safe
//! cap bounds the pops of a single fill.

use crate::config::RollConfig;
use crate::grid::{PixelGrid, PixelState};
use crate::margins::HardMargins;

/// Why a hole was excluded from the accepted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RejectReason {
    /// Region too small to be a music hole.
    #[serde(rename = "small")]
    Small,
    /// Track index resolved to the unassigned sentinel.
    #[serde(rename = "strange")]
    Strange,
    /// Track lies outside the valid range on the bass side.
    #[serde(rename = "bass margin")]
    BassMargin,
    /// Track lies outside the valid range on the treble side.
    #[serde(rename = "treble margin")]
    TrebleMargin,
    /// Hole wider than the tracker-relative maximum.
    #[serde(rename = "wide")]
    Wide,
    /// Width/height ratio too large for a music hole.
    #[serde(rename = "aspect")]
    Aspect,
    /// Non-circular hole with an off-vertical major axis.
    #[serde(rename = "skewed")]
    Skewed,
    /// Centroid too far from its track line.
    #[serde(rename = "uncentered")]
    Uncentered,
}

impl RejectReason {
    /// Report string for this reason.
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::Small => "small",
            RejectReason::Strange => "strange",
            RejectReason::BassMargin => "bass margin",
            RejectReason::TrebleMargin => "treble margin",
            RejectReason::Wide => "wide",
            RejectReason::Aspect => "aspect",
            RejectReason::Skewed => "skewed",
            RejectReason::Uncentered => "uncentered",
        }
    }
}

/// Bounding box in row/col pixel coordinates, inclusive corners.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Bbox {
    /// Topmost row touched by the region.
    pub min_row: usize,
    /// Leftmost column touched by the region.
    pub min_col: usize,
    /// Bottommost row touched by the region.
    pub max_row: usize,
    /// Rightmost column touched by the region.
    pub max_col: usize,
}

impl Bbox {
    /// Row extent (`max_row - min_row`).
    #[inline]
    pub fn height(&self) -> usize {
        self.max_row - self.min_row
    }

    /// Column extent (`max_col - min_col`).
    #[inline]
    pub fn width(&self) -> usize {
        self.max_col - self.min_col
    }
}

/// One punched region, refined by later stages and never destroyed:
/// invalidated holes keep their record with a reject reason.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HoleRecord {
    /// Bounding box of the region.
    pub bbox: Bbox,
    /// Pixel that triggered the flood fill.
    pub entry: (usize, usize),
    /// Region area in pixels.
    pub area: u64,
    /// Area-weighted centroid (row, col).
    pub centroid: (f64, f64),
    /// Traced perimeter length; `None` when the trace ran off the image.
    pub perimeter: Option<f64>,
    /// `4π·area / perimeter²`; zero until descriptors are computed.
    pub circularity: f64,
    /// Principal-axis angle in degrees, 0° = vertical.
    pub major_axis_deg: f64,
    /// Assigned tracker position; 0 is the unassigned sentinel.
    pub track: usize,
    /// Assigned MIDI key.
    pub midi_key: Option<u8>,
    /// True when this hole starts a note.
    pub attack: bool,
    /// Row where the note chained from this hole releases.
    pub off_row: usize,
    /// True when this hole belongs to a snakebite accent pair.
    pub snakebite: bool,
    /// Drift correction at the leading edge.
    pub lead_drift: f64,
    /// Drift correction at the trailing edge.
    pub trail_drift: f64,
    /// True while the hole counts as genuine music.
    pub music: bool,
    /// Set when the hole is invalidated.
    pub reason: Option<RejectReason>,
    /// Report identifier, assigned late.
    pub id: Option<String>,
}

impl HoleRecord {
    fn from_region(region: RegionStats) -> Self {
        Self {
            bbox: region.bbox,
            entry: region.entry,
            area: region.area,
            centroid: (
                region.row_sum / region.area as f64,
                region.col_sum / region.area as f64,
            ),
            perimeter: None,
            circularity: 0.0,
            major_axis_deg: 0.0,
            track: 0,
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

    /// Invalidate this hole with `reason`.
    pub fn reject(&mut self, reason: RejectReason) {
        self.music = false;
        self.track = 0;
        self.reason = Some(reason);
    }
}

struct RegionStats {
    bbox: Bbox,
    entry: (usize, usize),
    area: u64,
    row_sum: f64,
    col_sum: f64,
}

/// Result of the extraction scan.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Regions large enough to be music holes.
    pub holes: Vec<HoleRecord>,
    /// Dust regions, kept for the report.
    pub antidust: Vec<HoleRecord>,
    /// Topmost row of any accepted hole (rows when none found).
    pub first_music_row: usize,
    /// Bottommost row of any accepted hole.
    pub last_music_row: usize,
}

/// Flood-fill every unvisited non-paper region between the hard margins.
pub fn extract(
    grid: &mut PixelGrid,
    hard: &HardMargins,
    leader_row: usize,
    cfg: &RollConfig,
) -> Extraction {
    let rows = grid.rows();
    let startcol = hard.left + 1;
    let endcol = hard.right.min(grid.cols());

    let mut out = Extraction {
        first_music_row: rows,
        last_music_row: 0,
        ..Extraction::default()
    };

    for r in leader_row..rows {
        for c in startcol..endcol {
            if grid.get(r, c) != PixelState::NonPaper {
                continue;
            }
            let Some(region) = fill_region(grid, r, c, cfg.max_hole_fill) else {
                continue;
            };
            let mut hole = HoleRecord::from_region(region);
            if hole.area > cfg.min_hole_area {
                if hole.bbox.min_row < out.first_music_row {
                    out.first_music_row = hole.bbox.min_row;
                }
                if hole.bbox.max_row > out.last_music_row {
                    out.last_music_row = hole.bbox.max_row;
                }
                out.holes.push(hole);
            } else {
                clear_region(grid, hole.entry, PixelState::Antidust);
                hole.reject(RejectReason::Small);
                out.antidust.push(hole);
            }
            if out.holes.len() > cfg.max_hole_count {
                tracing::warn!(
                    "too many holes, giving up after {}",
                    cfg.max_hole_count
                );
                return out;
            }
        }
    }
    out
}

const NEIGHBORS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Fill one 8-connected non-paper region, recoloring it as hole pixels.
///
/// Returns `None` when the fail-safe pop cap fires; the partial region is
/// recolored to dust and discarded.
fn fill_region(grid: &mut PixelGrid, row: usize, col: usize, max_fill: usize) -> Option<RegionStats> {
    let mut stats = RegionStats {
        bbox: Bbox {
            min_row: row,
            min_col: col,
            max_row: row,
            max_col: col,
        },
        entry: (row, col),
        area: 0,
        row_sum: 0.0,
        col_sum: 0.0,
    };

    let mut stack = vec![(row, col)];
    grid.set(row, col, PixelState::Hole);

    let mut pops = 0usize;
    while let Some((r, c)) = stack.pop() {
        pops += 1;
        if pops > max_fill {
            tracing::warn!(
                "flood fill at ({row}, {col}) exceeded {max_fill} pops; region abandoned"
            );
            clear_region(grid, (row, col), PixelState::Antidust);
            return None;
        }

        stats.area += 1;
        stats.row_sum += r as f64;
        stats.col_sum += c as f64;
        if r < stats.bbox.min_row {
            stats.bbox.min_row = r;
        }
        if c < stats.bbox.min_col {
            stats.bbox.min_col = c;
        }
        if r > stats.bbox.max_row {
            stats.bbox.max_row = r;
        }
        if c > stats.bbox.max_col {
            stats.bbox.max_col = c;
        }

        for (dr, dc) in NEIGHBORS {
            let nr = r as i64 + dr;
            let nc = c as i64 + dc;
            if nr < 0 || nc < 0 {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if !grid.in_bounds(nr, nc) {
                continue;
            }
            if grid.get(nr, nc) == PixelState::NonPaper {
                grid.set(nr, nc, PixelState::Hole);
                stack.push((nr, nc));
            }
        }
    }
    Some(stats)
}

/// Recolor the connected region at `entry` to `state`.
///
/// The fill target is whatever state the entry pixel currently has; the
/// fill is bounded by that target, so no work cap is needed.
pub fn clear_region(grid: &mut PixelGrid, entry: (usize, usize), state: PixelState) {
    let (row, col) = entry;
    if !grid.in_bounds(row, col) {
        return;
    }
    let target = grid.get(row, col);
    if target == state {
        return;
    }
    let mut stack = vec![(row, col)];
    grid.set(row, col, state);
    while let Some((r, c)) = stack.pop() {
        for (dr, dc) in NEIGHBORS {
            let nr = r as i64 + dr;
            let nc = c as i64 + dc;
            if nr < 0 || nc < 0 {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if !grid.in_bounds(nr, nc) {
                continue;
            }
            if grid.get(nr, nc) == target {
                grid.set(nr, nc, state);
                stack.push((nr, nc));
            }
        }
    }
}
