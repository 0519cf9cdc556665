//! Fatal analysis errors.
//!
//! Only unrecoverable geometry failures surface here; local anomalies
//! (abandoned fills, invalid perimeters, rejected holes) are recorded on the
//! affected records and logged instead.

/// Unrecoverable failure of the roll-geometry pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The leader/roll changepoint could not be located in the search window.
    #[error("could not find leader boundary (searched {search_length} rows, window {window})")]
    LeaderNotFound {
        /// Number of rows scanned from the top of the image.
        search_length: usize,
        /// Half-width of the majority-vote window.
        window: usize,
    },

    /// The leader is at the bottom of the image. Rolls must be scanned with
    /// the leader first; reversed scans are not supported.
    #[error("leader is at the bottom of the image (reversed scan not supported)")]
    BottomLeader,

    /// Margin averages do not match either supported orientation, usually a
    /// partial roll or a scan without visible leader taper.
    #[error("cannot determine roll orientation from margin averages")]
    OrientationUndetermined,

    /// More tracker positions were detected than any supported roll family
    /// carries (organ rolls are not handled).
    #[error("detected {0} tracker positions; rolls with more than 105 are not supported")]
    TooManyTracks(usize),

    /// The image is too short to carry a leader plus a music region.
    #[error("image too short for analysis ({rows} rows)")]
    ImageTooShort {
        /// Total rows in the scan.
        rows: usize,
    },
}

/// Convenience alias used by the pipeline stages.
pub type Result<T> = std::result::Result<T, AnalysisError>;
