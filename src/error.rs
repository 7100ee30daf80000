use thiserror::Error;

/// Failures raised while resolving subjects or rebuilding their signals.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("subject {0} not found in 'index' column")]
    SubjectNotFound(i64),

    /// Window numbers did not form a single run with step 1.
    /// `deltas` holds the distinct consecutive differences that were seen.
    #[error("window numbers are not contiguous (distinct steps: {deltas:?})")]
    NonContiguousWindows { deltas: Vec<i64> },

    #[error("no window numbers to build a timeline from")]
    EmptyWindows,

    #[error("no sampling frequency registered for feature '{0}'")]
    UnknownFeature(String),

    #[error("store has no column '{0}'")]
    MissingColumn(String),

    #[error("rows {start}..{end} are out of bounds for a store of {len} rows")]
    RowRangeOutOfBounds { start: usize, end: usize, len: usize },

    #[error("'index_absolute' holds an invalid offset {0}")]
    InvalidOffset(i64),

    #[error("{samples} samples cannot be paired with a timeline of {timeline} points")]
    LengthMismatch { samples: usize, timeline: usize },

    #[error("sampling frequency must be positive, got {0}")]
    InvalidFrequency(u32),

    #[error("column '{column}' has {found} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("unknown sleep stage code {0}")]
    UnknownStage(i64),

    #[error("store read failed: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, AccessError>;
