//! Subject lookup and signal extraction over a [`WindowStore`].
//!
//! Every subject's rows are assumed to be contiguous in the store. The
//! boundary search only looks at the first and last matching row, so
//! interleaved subjects would silently produce a range covering foreign rows.

use std::collections::BTreeSet;
use std::ops::{Range, RangeInclusive};

use crate::config::FrequencyTable;
use crate::data::model::{FeatureSignals, LabelTable, SleepStage, TimeSeries, WindowStore};
use crate::error::{AccessError, Result};
use crate::timeline::{full_timeline_len, make_full_timeline};

/// Absolute row range of one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundaries {
    /// `start..end + 1`, for slicing row-addressed columns.
    Slice(Range<usize>),
    /// `start..=end`, for label lookups that include both ends.
    Inclusive(RangeInclusive<usize>),
}

impl Boundaries {
    /// The half-open form, whichever variant this is.
    pub fn as_range(&self) -> Range<usize> {
        match self {
            Boundaries::Slice(r) => r.clone(),
            Boundaries::Inclusive(r) => *r.start()..*r.end() + 1,
        }
    }

    /// The inclusive form, whichever variant this is.
    ///
    /// An empty slice maps to the empty range `1..=0`.
    pub fn as_inclusive(&self) -> RangeInclusive<usize> {
        match self {
            Boundaries::Slice(r) if r.is_empty() => 1..=0,
            Boundaries::Slice(r) => r.start..=r.end - 1,
            Boundaries::Inclusive(r) => r.clone(),
        }
    }
}

/// Distinct subject identifiers in ascending order.
pub fn get_subject_ids<S: WindowStore + ?Sized>(store: &S) -> Result<BTreeSet<i64>> {
    Ok(store.subject_index()?.iter().copied().collect())
}

/// Locate `subject_id`'s rows and map them to absolute offsets.
///
/// With `ready_to_use` the result is [`Boundaries::Slice`], otherwise
/// [`Boundaries::Inclusive`].
pub fn get_subject_boundaries<S: WindowStore + ?Sized>(
    store: &S,
    subject_id: i64,
    ready_to_use: bool,
) -> Result<Boundaries> {
    let (start, end) = subject_offsets(store, subject_id)?;
    log::debug!("subject {subject_id}: absolute rows {start}..={end}");
    Ok(if ready_to_use {
        Boundaries::Slice(start..end + 1)
    } else {
        Boundaries::Inclusive(start..=end)
    })
}

/// First and last absolute offsets of `subject_id`, both inclusive.
fn subject_offsets<S: WindowStore + ?Sized>(store: &S, subject_id: i64) -> Result<(usize, usize)> {
    let sids = store.subject_index()?;
    let first = sids
        .iter()
        .position(|&sid| sid == subject_id)
        .ok_or(AccessError::SubjectNotFound(subject_id))?;
    // A first match guarantees a last one.
    let last = sids
        .iter()
        .rposition(|&sid| sid == subject_id)
        .unwrap_or(first);

    let absolute = store.absolute_index()?;
    Ok((offset_at(&absolute, first)?, offset_at(&absolute, last)?))
}

fn offset_at(absolute: &[i64], row: usize) -> Result<usize> {
    let raw = *absolute.get(row).ok_or(AccessError::RowRangeOutOfBounds {
        start: row,
        end: row + 1,
        len: absolute.len(),
    })?;
    usize::try_from(raw).map_err(|_| AccessError::InvalidOffset(raw))
}

/// The per-window sample blocks of `feature` for `subject_id`, in row order.
pub fn get_subject_feature_blocks<S: WindowStore + ?Sized>(
    store: &S,
    subject_id: i64,
    feature: &str,
) -> Result<Vec<Vec<f64>>> {
    let rows = get_subject_boundaries(store, subject_id, true)?.as_range();
    store.feature_blocks(feature, rows)
}

/// `feature` for `subject_id` stitched into a single series.
///
/// Window numbers over the subject's rows must be contiguous, and the
/// subject's first window must be window 0 so samples and timeline line up.
pub fn get_subject_feature_timeseries<S: WindowStore + ?Sized>(
    store: &S,
    frequencies: &FrequencyTable,
    subject_id: i64,
    feature: &str,
) -> Result<TimeSeries> {
    let rows = get_subject_boundaries(store, subject_id, true)?.as_range();
    let samples = store.feature_blocks(feature, rows.clone())?.concat();

    let frequency = frequencies.frequency(feature)?;
    let windows = store.window_index(rows)?;
    let expected = full_timeline_len(&windows, frequency)?;
    if expected != samples.len() {
        return Err(AccessError::LengthMismatch {
            samples: samples.len(),
            timeline: expected,
        });
    }
    log::debug!(
        "subject {subject_id} '{feature}': {} windows, {} samples at {frequency} Hz",
        windows.len(),
        samples.len()
    );

    TimeSeries::new(make_full_timeline(&windows, frequency)?, samples)
}

/// Either the raw blocks or the stitched series, depending on `as_timeseries`.
pub fn get_subject_feature_signals<S: WindowStore + ?Sized>(
    store: &S,
    frequencies: &FrequencyTable,
    subject_id: i64,
    feature: &str,
    as_timeseries: bool,
) -> Result<FeatureSignals> {
    if as_timeseries {
        get_subject_feature_timeseries(store, frequencies, subject_id, feature)
            .map(FeatureSignals::Series)
    } else {
        get_subject_feature_blocks(store, subject_id, feature).map(FeatureSignals::Blocks)
    }
}

/// Labels of `subject_id`'s windows, keyed by absolute offset.
///
/// `labels` must be keyed by the same absolute offsets as the store.
pub fn get_subject_sleep_stage<S: WindowStore + ?Sized>(
    subject_id: i64,
    store: &S,
    labels: &LabelTable,
) -> Result<Vec<(usize, SleepStage)>> {
    let range = get_subject_boundaries(store, subject_id, false)?.as_inclusive();
    Ok(labels.slice_inclusive(range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::InMemoryStore;

    fn scenario_store() -> InMemoryStore {
        InMemoryStore::new(vec![1, 1, 2, 2, 2], vec![0, 1, 2, 3, 4], vec![0, 1, 0, 1, 2])
            .unwrap()
            .with_feature(
                "pulse",
                vec![
                    vec![0.0, 0.1],
                    vec![0.2, 0.3],
                    vec![1.0, 1.1],
                    vec![1.2, 1.3],
                    vec![1.4, 1.5],
                ],
            )
            .unwrap()
    }

    fn frequencies() -> FrequencyTable {
        // 1 Hz: 30 samples per window
        [("pulse", 1)].into_iter().collect()
    }

    #[test]
    fn subject_ids_are_distinct_and_sorted() {
        let store = InMemoryStore::new(vec![3, 3, 1, 2, 2], vec![0, 1, 2, 3, 4], vec![0; 5]).unwrap();
        let ids: Vec<i64> = get_subject_ids(&store).unwrap().into_iter().collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn boundaries_of_second_subject() {
        let store = scenario_store();
        assert_eq!(
            get_subject_boundaries(&store, 2, true).unwrap(),
            Boundaries::Slice(2..5)
        );
        assert_eq!(
            get_subject_boundaries(&store, 2, false).unwrap(),
            Boundaries::Inclusive(2..=4)
        );
    }

    #[test]
    fn slice_length_matches_row_count() {
        let store = scenario_store();
        for (sid, rows) in [(1, 2), (2, 3)] {
            let b = get_subject_boundaries(&store, sid, true).unwrap();
            assert_eq!(b.as_range().len(), rows);
            assert_eq!(b.as_inclusive(), b.as_range().start..=b.as_range().end - 1);
        }
    }

    #[test]
    fn empty_slice_has_empty_inclusive_form() {
        let b = Boundaries::Slice(0..0);
        assert!(b.as_inclusive().is_empty());
        assert!(b.as_range().is_empty());
        assert!(Boundaries::Slice(4..4).as_inclusive().is_empty());
        assert_eq!(Boundaries::Slice(4..5).as_inclusive(), 4..=4);
    }

    #[test]
    fn boundaries_go_through_absolute_offsets() {
        let store = InMemoryStore::new(vec![7, 7, 8], vec![100, 101, 102], vec![0, 1, 0]).unwrap();
        assert_eq!(
            get_subject_boundaries(&store, 8, true).unwrap(),
            Boundaries::Slice(102..103)
        );
    }

    #[test]
    fn absent_subject_is_an_error() {
        let store = scenario_store();
        assert!(matches!(
            get_subject_boundaries(&store, 9, true),
            Err(AccessError::SubjectNotFound(9))
        ));
        assert!(matches!(
            get_subject_feature_signals(&store, &frequencies(), 9, "pulse", false),
            Err(AccessError::SubjectNotFound(9))
        ));
    }

    #[test]
    fn negative_offset_is_an_error() {
        let store = InMemoryStore::new(vec![1], vec![-1], vec![0]).unwrap();
        assert!(matches!(
            get_subject_boundaries(&store, 1, true),
            Err(AccessError::InvalidOffset(-1))
        ));
    }

    #[test]
    fn raw_blocks_are_returned_unchanged() {
        let store = scenario_store();
        let signals = get_subject_feature_signals(&store, &frequencies(), 2, "pulse", false).unwrap();
        assert_eq!(
            signals,
            FeatureSignals::Blocks(vec![vec![1.0, 1.1], vec![1.2, 1.3], vec![1.4, 1.5]])
        );
    }

    #[test]
    fn timeseries_needs_matching_block_size() {
        // 1 Hz means 30 samples per window, but blocks only hold two.
        let store = scenario_store();
        assert!(matches!(
            get_subject_feature_signals(&store, &frequencies(), 1, "pulse", true),
            Err(AccessError::LengthMismatch {
                samples: 4,
                timeline: 60
            })
        ));
    }

    #[test]
    fn timeseries_stitches_windows() {
        let blocks: Vec<Vec<f64>> = (0..3)
            .map(|w| (0..30).map(|i| (w * 30 + i) as f64).collect())
            .collect();
        let store = InMemoryStore::new(vec![5, 5, 5], vec![0, 1, 2], vec![0, 1, 2])
            .unwrap()
            .with_feature("pulse", blocks.clone())
            .unwrap();

        let series = get_subject_feature_timeseries(&store, &frequencies(), 5, "pulse").unwrap();
        assert_eq!(series.len(), 30 * 3);
        assert_eq!(series.values(), blocks.concat().as_slice());
        assert_eq!(
            *series.index().last().unwrap(),
            std::time::Duration::from_secs(90)
        );
    }

    #[test]
    fn gap_in_windows_is_fatal() {
        let store = InMemoryStore::new(vec![5, 5, 5], vec![0, 1, 2], vec![0, 1, 3])
            .unwrap()
            .with_feature("pulse", vec![vec![0.0; 30]; 3])
            .unwrap();
        assert!(matches!(
            get_subject_feature_timeseries(&store, &frequencies(), 5, "pulse"),
            Err(AccessError::NonContiguousWindows { .. })
        ));
    }

    #[test]
    fn one_window_subject_cannot_be_stitched() {
        let store = InMemoryStore::new(vec![4, 5, 5], vec![0, 1, 2], vec![0, 0, 1])
            .unwrap()
            .with_feature("pulse", vec![vec![0.0; 30]; 3])
            .unwrap();
        assert!(matches!(
            get_subject_feature_timeseries(&store, &frequencies(), 4, "pulse"),
            Err(AccessError::NonContiguousWindows { deltas }) if deltas.is_empty()
        ));
        // raw blocks are still available
        assert_eq!(
            get_subject_feature_blocks(&store, 4, "pulse").unwrap().len(),
            1
        );
    }

    #[test]
    fn far_window_numbers_fail_before_building_timeline() {
        // globally numbered windows would need a timeline of ~3e10 points
        let first = 1_000_000_000;
        let store = InMemoryStore::new(vec![5, 5], vec![0, 1], vec![first, first + 1])
            .unwrap()
            .with_feature("pulse", vec![vec![0.0; 30]; 2])
            .unwrap();
        assert!(matches!(
            get_subject_feature_timeseries(&store, &frequencies(), 5, "pulse"),
            Err(AccessError::LengthMismatch { samples: 60, .. })
        ));
    }

    #[test]
    fn unknown_feature_frequency() {
        let store = InMemoryStore::new(vec![5], vec![0], vec![0])
            .unwrap()
            .with_feature("eeg", vec![vec![0.0; 30]])
            .unwrap();
        assert!(matches!(
            get_subject_feature_timeseries(&store, &frequencies(), 5, "eeg"),
            Err(AccessError::UnknownFeature(_))
        ));
    }

    #[test]
    fn sleep_stages_use_inclusive_range() {
        let store = scenario_store();
        let labels: LabelTable = [
            (0, SleepStage::Wake),
            (1, SleepStage::N1),
            (2, SleepStage::N2),
            (3, SleepStage::N3),
            (4, SleepStage::Rem),
            (5, SleepStage::Wake),
        ]
        .into_iter()
        .collect();

        let stages = get_subject_sleep_stage(2, &store, &labels).unwrap();
        assert_eq!(
            stages,
            vec![(2, SleepStage::N2), (3, SleepStage::N3), (4, SleepStage::Rem)]
        );
    }
}
