//! Pipeline configuration and per-roll-family constant tables.

/// Leader/pre-leader detection controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LeaderConfig {
    /// Rows scanned from the top of the image for the leader boundary.
    pub search_length: usize,
    /// Half-width of the majority-vote window used by the changepoint finder.
    pub window: usize,
    /// Rows averaged at the top and bottom of the image for orientation and
    /// reference margin levels.
    pub edge_average_window: usize,
    /// Margin-growth factor applied to the reference level to build the
    /// binary changepoint signal.
    pub margin_growth: f64,
    /// How far the margin-encroachment sum may fall below its maximum while
    /// still being counted as pre-leader.
    pub preleader_tolerance: u64,
    /// Rows skipped at the very start of the scan (scanner artifacts).
    pub start_guard: usize,
    /// Rows excluded at the end of the image when locating hard margins.
    pub end_guard: usize,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            search_length: 4096 * 4,
            window: 100,
            edge_average_window: 4096,
            margin_growth: 1.05,
            preleader_tolerance: 20,
            start_guard: 10,
            end_guard: 1000,
        }
    }
}

/// Drift-correction smoothing controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Exponential smoothing gain applied to both margin curves.
    pub gain: f64,
    /// Rows excluded after the leader boundary and before the image end when
    /// averaging the smoothed curves.
    pub region_guard: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            gain: 0.01,
            region_guard: 100,
        }
    }
}

/// Edge-tear detection controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TearConfig {
    /// Smoothing gain of the near-raw margin curve.
    pub fast_gain: f64,
    /// Smoothing gain of the medium margin curve.
    pub medium_gain: f64,
    /// Smoothing gain of the long-trend margin curve.
    pub slow_gain: f64,
    /// Deviation between raw and long-trend paper width that marks a row
    /// unstable.
    pub width_deviation: f64,
    /// Rows an unstable run is expanded forward and backward to bridge gaps.
    pub run_expansion: usize,
    /// Offset added to the long-trend margin when re-marking tear pixels.
    pub marking_offset: f64,
    /// Tears narrower than this (columns) are folded back into the margin.
    pub fold_width: usize,
    /// Minimum column width of a reported tear.
    pub min_width: usize,
    /// Minimum pixel area of a reported tear.
    pub min_area: u64,
    /// Fail-safe cap on accumulated tear area per record.
    pub max_fill: u64,
}

impl Default for TearConfig {
    fn default() -> Self {
        Self {
            fast_gain: 0.100,
            medium_gain: 0.050,
            slow_gain: 0.001,
            width_deviation: 5.0,
            run_expansion: 300,
            marking_offset: 10.0,
            fold_width: 10,
            min_width: 30,
            min_area: 30,
            max_fill: 100_000,
        }
    }
}

/// Lateral-shift detection controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShiftConfig {
    /// Half-width of the row window for the margin difference signal.
    pub window: usize,
    /// Minimum per-side movement (pixels) for a row to score.
    pub movement_threshold: f64,
    /// Maximum allowed divergence between the two sides' movement.
    pub divergence_limit: f64,
    /// Minimum run length (rows) of a recorded shift.
    pub min_run: usize,
    /// Rows before the first music hole included in the search.
    pub lead_in: usize,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            window: 50,
            movement_threshold: 3.0,
            divergence_limit: 3.0,
            min_run: 30,
            lead_in: 100,
        }
    }
}

/// Tracker-bar periodicity estimation controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Histogram bins fed to the transform (columns beyond this are ignored).
    pub histogram_bins: usize,
    /// Zero-padding factor; the DFT length is `histogram_bins * pad_factor`.
    pub pad_factor: usize,
    /// Lowest spectral bin considered when searching for the peak.
    pub min_bin: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            histogram_bins: 4096,
            pad_factor: 16,
            min_bin: 50,
        }
    }
}

/// Note-grouping and track-validation controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NoteConfig {
    /// Gap scale: holes closer than `group_scale * average hole width` chain
    /// into one note.
    pub group_scale: f64,
    /// Maximum centroid distance from the track line, as a fraction of the
    /// hole separation, before a hole counts as uncentered.
    pub off_track_tolerance: f64,
    /// Enable the uncentered-hole filter. Off by default: real rolls are
    /// centered loosely enough that it rejects good holes.
    pub off_track_filter: bool,
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            group_scale: 1.37,
            off_track_tolerance: 0.25,
            off_track_filter: false,
        }
    }
}

/// Roll families with known tracker-bar geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollKind {
    /// Welte-Mignon T-100 (red) roll.
    WelteRed,
    /// Welte-Mignon T-98 (green) roll.
    WelteGreen,
    /// Welte-Mignon Licensee roll.
    WelteLicensee,
    /// Aeolian Duo-Art roll.
    DuoArt,
    /// 88-note standard roll (9 holes per inch).
    Standard88,
    /// 65-note roll (6 holes per inch).
    Standard65,
}

impl RollKind {
    /// Stable lower-case name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            RollKind::WelteRed => "welte-red",
            RollKind::WelteGreen => "welte-green",
            RollKind::WelteLicensee => "welte-licensee",
            RollKind::DuoArt => "duo-art",
            RollKind::Standard88 => "88-note",
            RollKind::Standard65 => "65-note",
        }
    }
}

/// Track-number/MIDI anchor for one section of the tracker bar.
///
/// `track` is 1-based from the bass edge; `midi` is the key produced by the
/// first hole of the section.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct SectionAnchor {
    /// First tracker position of the section, counted from the bass side.
    pub track: u32,
    /// MIDI key of that position.
    pub midi: u8,
}

/// Constant table for one roll family.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RollTypeSpec {
    /// Which family this table describes.
    pub kind: RollKind,
    /// Number of sensing positions on the tracker bar.
    pub tracker_holes: u32,
    /// First MIDI key on the bass side of the paper.
    pub bass_midi: u8,
    /// First MIDI key on the treble side of the paper.
    pub treble_midi: u8,
    /// Bass expression section anchor.
    pub bass_expression: SectionAnchor,
    /// Bass note section anchor.
    pub bass_notes: SectionAnchor,
    /// Treble note section anchor.
    pub treble_notes: SectionAnchor,
    /// Treble expression section anchor.
    pub treble_expression: SectionAnchor,
    /// Rewind hole position (1-based from bass) and its MIDI key.
    pub rewind: Option<SectionAnchor>,
    /// Minimum distance between the outermost tracker line and the paper
    /// edge, in units of the hole separation.
    pub min_tracker_edge: f64,
}

impl RollTypeSpec {
    /// Welte-Mignon T-100 (red) constants.
    pub fn welte_red() -> Self {
        Self {
            kind: RollKind::WelteRed,
            tracker_holes: 100,
            bass_midi: 14,
            treble_midi: 113,
            bass_expression: SectionAnchor { track: 1, midi: 14 },
            bass_notes: SectionAnchor { track: 11, midi: 24 },
            treble_notes: SectionAnchor { track: 54, midi: 67 },
            treble_expression: SectionAnchor { track: 91, midi: 104 },
            rewind: Some(SectionAnchor { track: 91, midi: 104 }),
            min_tracker_edge: 1.6,
        }
    }

    /// Welte-Mignon T-98 (green) constants.
    pub fn welte_green() -> Self {
        Self {
            kind: RollKind::WelteGreen,
            tracker_holes: 98,
            bass_midi: 16,
            treble_midi: 113,
            bass_expression: SectionAnchor { track: 1, midi: 16 },
            bass_notes: SectionAnchor { track: 6, midi: 21 },
            treble_notes: SectionAnchor { track: 52, midi: 67 },
            treble_expression: SectionAnchor { track: 94, midi: 109 },
            rewind: Some(SectionAnchor { track: 1, midi: 16 }),
            min_tracker_edge: 1.6,
        }
    }

    /// Welte-Mignon Licensee constants.
    pub fn welte_licensee() -> Self {
        Self {
            kind: RollKind::WelteLicensee,
            tracker_holes: 98,
            bass_midi: 16,
            treble_midi: 113,
            bass_expression: SectionAnchor { track: 1, midi: 16 },
            bass_notes: SectionAnchor { track: 9, midi: 24 },
            treble_notes: SectionAnchor { track: 52, midi: 67 },
            treble_expression: SectionAnchor { track: 89, midi: 104 },
            rewind: Some(SectionAnchor { track: 89, midi: 104 }),
            min_tracker_edge: 1.6,
        }
    }

    /// Aeolian Duo-Art constants.
    pub fn duo_art() -> Self {
        Self {
            kind: RollKind::DuoArt,
            tracker_holes: 98,
            bass_midi: 16,
            treble_midi: 64,
            bass_expression: SectionAnchor { track: 1, midi: 16 },
            bass_notes: SectionAnchor { track: 10, midi: 25 },
            treble_notes: SectionAnchor { track: 49, midi: 64 },
            treble_expression: SectionAnchor { track: 90, midi: 105 },
            rewind: Some(SectionAnchor { track: 1, midi: 16 }),
            min_tracker_edge: 1.6,
        }
    }

    /// 88-note standard roll.
    pub fn standard_88() -> Self {
        Self {
            kind: RollKind::Standard88,
            tracker_holes: 88,
            bass_midi: 21,
            treble_midi: 108,
            bass_expression: SectionAnchor { track: 1, midi: 21 },
            bass_notes: SectionAnchor { track: 1, midi: 21 },
            treble_notes: SectionAnchor { track: 45, midi: 65 },
            treble_expression: SectionAnchor { track: 88, midi: 108 },
            rewind: None,
            min_tracker_edge: 0.5,
        }
    }

    /// 65-note roll.
    pub fn standard_65() -> Self {
        Self {
            kind: RollKind::Standard65,
            tracker_holes: 65,
            bass_midi: 27,
            treble_midi: 91,
            bass_expression: SectionAnchor { track: 1, midi: 27 },
            bass_notes: SectionAnchor { track: 1, midi: 27 },
            treble_notes: SectionAnchor { track: 33, midi: 59 },
            treble_expression: SectionAnchor { track: 65, midi: 91 },
            rewind: None,
            min_tracker_edge: 0.5,
        }
    }

    /// Constant table for the given family.
    pub fn for_kind(kind: RollKind) -> Self {
        match kind {
            RollKind::WelteRed => Self::welte_red(),
            RollKind::WelteGreen => Self::welte_green(),
            RollKind::WelteLicensee => Self::welte_licensee(),
            RollKind::DuoArt => Self::duo_art(),
            RollKind::Standard88 => Self::standard_88(),
            RollKind::Standard65 => Self::standard_65(),
        }
    }
}

impl Default for RollTypeSpec {
    fn default() -> Self {
        Self::standard_88()
    }
}

/// Top-level analysis configuration.
///
/// Build with [`RollConfig::for_roll_type`] to pick up the family's tracker
/// geometry, then override individual fields as needed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RollConfig {
    /// Brightness at or above which a pixel reads as exposed scanner bed
    /// rather than paper.
    pub brightness_threshold: u8,
    /// Regions at or below this area are dust, not holes.
    pub min_hole_area: u64,
    /// Dust regions at or above this area are still reported as bad holes.
    pub antidust_report_area: u64,
    /// Fail-safe cap on flood-fill work per region.
    pub max_hole_fill: usize,
    /// Hole extraction stops after this many regions.
    pub max_hole_count: usize,
    /// Widest music hole, in units of the hole separation.
    pub max_hole_width_ratio: f64,
    /// Maximum width/height ratio of a music hole.
    pub aspect_ratio_threshold: f64,
    /// Holes rounder than this are exempt from the skew test.
    pub circularity_threshold: f64,
    /// Major-axis angle (degrees from vertical) beyond which a non-round
    /// hole is rejected.
    pub major_axis_cutoff_deg: f64,
    /// Scan resolution, used only for reporting.
    pub pixels_per_inch: f64,
    /// Perimeter-trace work cap.
    pub max_perimeter_steps: usize,
    /// Leader detection controls.
    pub leader: LeaderConfig,
    /// Drift smoothing controls.
    pub drift: DriftConfig,
    /// Tear detection controls.
    pub tear: TearConfig,
    /// Shift detection controls.
    pub shift: ShiftConfig,
    /// Tracker-spacing estimation controls.
    pub spectral: SpectralConfig,
    /// Note grouping and validation controls.
    pub notes: NoteConfig,
    /// Roll-family constant table.
    pub roll_type: RollTypeSpec,
}

impl RollConfig {
    /// Configuration with the named family's constants applied.
    pub fn for_roll_type(kind: RollKind) -> Self {
        Self {
            roll_type: RollTypeSpec::for_kind(kind),
            ..Self::default()
        }
    }

    /// Minimum tracker-to-edge distance in units of the hole separation.
    pub fn min_tracker_edge(&self) -> f64 {
        self.roll_type.min_tracker_edge
    }
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: 249,
            min_hole_area: 100,
            antidust_report_area: 50,
            max_hole_fill: 300_000,
            max_hole_count: 100_000,
            max_hole_width_ratio: 1.5,
            aspect_ratio_threshold: 1.25,
            circularity_threshold: 0.4,
            major_axis_cutoff_deg: 13.0,
            pixels_per_inch: 300.0,
            max_perimeter_steps: 100_000,
            leader: LeaderConfig::default(),
            drift: DriftConfig::default(),
            tear: TearConfig::default(),
            shift: ShiftConfig::default(),
            spectral: SpectralConfig::default(),
            notes: NoteConfig::default(),
            roll_type: RollTypeSpec::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stable() {
        let cfg = RollConfig::default();
        assert_eq!(cfg.brightness_threshold, 249);
        assert_eq!(cfg.min_hole_area, 100);
        assert_eq!(cfg.max_hole_fill, 300_000);
        assert!((cfg.aspect_ratio_threshold - 1.25).abs() < 1e-12);
        assert!((cfg.circularity_threshold - 0.4).abs() < 1e-12);
        assert_eq!(cfg.spectral.histogram_bins * cfg.spectral.pad_factor, 65536);
    }

    #[test]
    fn welte_red_table_matches_reference() {
        let spec = RollTypeSpec::welte_red();
        assert_eq!(spec.tracker_holes, 100);
        assert_eq!(spec.bass_midi, 14);
        assert_eq!(spec.treble_midi, 113);
        assert_eq!(spec.bass_notes.track, 11);
        assert_eq!(spec.bass_notes.midi, 24);
        assert_eq!(spec.treble_expression.track, 91);
        assert!((spec.min_tracker_edge - 1.6).abs() < 1e-12);
    }

    #[test]
    fn for_roll_type_applies_family() {
        let cfg = RollConfig::for_roll_type(RollKind::DuoArt);
        assert_eq!(cfg.roll_type.kind, RollKind::DuoArt);
        assert_eq!(cfg.roll_type.tracker_holes, 98);
        assert!((cfg.min_tracker_edge() - 1.6).abs() < 1e-12);
    }
}
