use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, Result};

/// Column holding the subject identifier of each row.
pub const INDEX: &str = "index";
/// Column holding the global row offset of each row.
pub const INDEX_ABSOLUTE: &str = "index_absolute";
/// Column holding the window sequence number of each row.
pub const INDEX_WINDOW: &str = "index_window";

/// Names that are bookkeeping columns rather than signal features.
pub const INDEX_COLUMNS: [&str; 3] = [INDEX, INDEX_ABSOLUTE, INDEX_WINDOW];

// ---------------------------------------------------------------------------
// WindowStore – read-only columnar access
// ---------------------------------------------------------------------------

/// A read-only store of windowed signals, one row per (subject, window).
///
/// Rows of all subjects are concatenated; each feature column holds one
/// fixed-length block of samples per row.
pub trait WindowStore {
    /// Number of rows in the store.
    fn num_rows(&self) -> usize;

    /// The full `index` column.
    fn subject_index(&self) -> Result<Cow<'_, [i64]>>;

    /// The full `index_absolute` column.
    fn absolute_index(&self) -> Result<Cow<'_, [i64]>>;

    /// `index_window` over `rows`.
    fn window_index(&self, rows: Range<usize>) -> Result<Vec<i64>>;

    /// Sample blocks of `feature` over `rows`, one block per row.
    fn feature_blocks(&self, feature: &str, rows: Range<usize>) -> Result<Vec<Vec<f64>>>;

    /// Names of the feature columns, sorted.
    fn feature_names(&self) -> Vec<String>;
}

/// Fail unless `rows` lies within a store of `len` rows.
pub fn check_rows(rows: &Range<usize>, len: usize) -> Result<()> {
    if rows.start > rows.end || rows.end > len {
        return Err(AccessError::RowRangeOutOfBounds {
            start: rows.start,
            end: rows.end,
            len,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// InMemoryStore – every column loaded up front
// ---------------------------------------------------------------------------

/// A store whose columns live entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    index: Vec<i64>,
    index_absolute: Vec<i64>,
    index_window: Vec<i64>,
    features: BTreeMap<String, Vec<Vec<f64>>>,
}

impl InMemoryStore {
    /// Build a store from its three bookkeeping columns, which must have the
    /// same length.
    pub fn new(index: Vec<i64>, index_absolute: Vec<i64>, index_window: Vec<i64>) -> Result<Self> {
        let expected = index.len();
        for (column, found) in [
            (INDEX_ABSOLUTE, index_absolute.len()),
            (INDEX_WINDOW, index_window.len()),
        ] {
            if found != expected {
                return Err(AccessError::ColumnLength {
                    column: column.to_string(),
                    expected,
                    found,
                });
            }
        }
        Ok(Self {
            index,
            index_absolute,
            index_window,
            features: BTreeMap::new(),
        })
    }

    /// Add (or replace) a feature column.
    pub fn with_feature(mut self, name: impl Into<String>, blocks: Vec<Vec<f64>>) -> Result<Self> {
        let name = name.into();
        if blocks.len() != self.index.len() {
            return Err(AccessError::ColumnLength {
                column: name,
                expected: self.index.len(),
                found: blocks.len(),
            });
        }
        self.features.insert(name, blocks);
        Ok(self)
    }
}

impl WindowStore for InMemoryStore {
    fn num_rows(&self) -> usize {
        self.index.len()
    }

    fn subject_index(&self) -> Result<Cow<'_, [i64]>> {
        Ok(Cow::Borrowed(&self.index))
    }

    fn absolute_index(&self) -> Result<Cow<'_, [i64]>> {
        Ok(Cow::Borrowed(&self.index_absolute))
    }

    fn window_index(&self, rows: Range<usize>) -> Result<Vec<i64>> {
        check_rows(&rows, self.num_rows())?;
        Ok(self.index_window[rows].to_vec())
    }

    fn feature_blocks(&self, feature: &str, rows: Range<usize>) -> Result<Vec<Vec<f64>>> {
        let column = self
            .features
            .get(feature)
            .ok_or_else(|| AccessError::MissingColumn(feature.to_string()))?;
        check_rows(&rows, column.len())?;
        Ok(column[rows].to_vec())
    }

    fn feature_names(&self) -> Vec<String> {
        self.features.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// SleepStage / LabelTable – per-window labels
// ---------------------------------------------------------------------------

/// Hypnogram label of one 30-second window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum SleepStage {
    Wake,
    N1,
    N2,
    N3,
    Rem,
}

impl TryFrom<i64> for SleepStage {
    type Error = AccessError;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            0 => Ok(SleepStage::Wake),
            1 => Ok(SleepStage::N1),
            2 => Ok(SleepStage::N2),
            3 => Ok(SleepStage::N3),
            4 => Ok(SleepStage::Rem),
            other => Err(AccessError::UnknownStage(other)),
        }
    }
}

impl From<SleepStage> for i64 {
    fn from(stage: SleepStage) -> Self {
        match stage {
            SleepStage::Wake => 0,
            SleepStage::N1 => 1,
            SleepStage::N2 => 2,
            SleepStage::N3 => 3,
            SleepStage::Rem => 4,
        }
    }
}

impl fmt::Display for SleepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SleepStage::Wake => "Wake",
            SleepStage::N1 => "N1",
            SleepStage::N2 => "N2",
            SleepStage::N3 => "N3",
            SleepStage::Rem => "REM",
        };
        f.write_str(name)
    }
}

/// Sleep-stage labels keyed by absolute row offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTable {
    labels: BTreeMap<usize, SleepStage>,
}

impl LabelTable {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, offset: usize) -> Option<SleepStage> {
        self.labels.get(&offset).copied()
    }

    /// Labels whose offset falls in `range`, both ends included.
    /// Offsets with no label are skipped.
    pub fn slice_inclusive(&self, range: RangeInclusive<usize>) -> Vec<(usize, SleepStage)> {
        if range.is_empty() {
            return Vec::new();
        }
        self.labels
            .range(range)
            .map(|(offset, stage)| (*offset, *stage))
            .collect()
    }
}

impl FromIterator<(usize, SleepStage)> for LabelTable {
    fn from_iter<I: IntoIterator<Item = (usize, SleepStage)>>(iter: I) -> Self {
        LabelTable {
            labels: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeSeries / FeatureSignals – extraction results
// ---------------------------------------------------------------------------

/// Samples paired with their offset from the start of the first window.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    index: Vec<Duration>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(index: Vec<Duration>, values: Vec<f64>) -> Result<Self> {
        if index.len() != values.len() {
            return Err(AccessError::LengthMismatch {
                samples: values.len(),
                timeline: index.len(),
            });
        }
        Ok(Self { index, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index(&self) -> &[Duration] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (Duration, f64)> + '_ {
        self.index.iter().copied().zip(self.values.iter().copied())
    }
}

/// A subject's feature, either as stored or stitched into one series.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureSignals {
    /// One sample block per window, in row order.
    Blocks(Vec<Vec<f64>>),
    /// All blocks concatenated and indexed by time offset.
    Series(TimeSeries),
}

impl FeatureSignals {
    /// All samples in order, regardless of representation.
    pub fn flat_values(&self) -> Vec<f64> {
        match self {
            FeatureSignals::Blocks(blocks) => blocks.concat(),
            FeatureSignals::Series(series) => series.values.clone(),
        }
    }
}
