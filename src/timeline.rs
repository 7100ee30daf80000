use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{AccessError, Result};

/// Length of one window, in seconds.
pub const WINDOW_SECONDS: u64 = 30;

const NANOS_PER_SEC: u128 = 1_000_000_000;

// ---------------------------------------------------------------------------
// Timelines
// ---------------------------------------------------------------------------

/// Offsets for a signal sampled at `frequency` Hz over a single window.
///
/// Returns `frequency * 30` points evenly spaced from 0 s to 30 s, both ends
/// included.
pub fn make_timeline(frequency: u32) -> Vec<Duration> {
    evenly_spaced(
        Duration::from_secs(WINDOW_SECONDS),
        frequency as usize * WINDOW_SECONDS as usize,
    )
}

/// Offsets covering every window up to and including the last one in
/// `windows`, at `frequency` Hz.
///
/// `windows` must already be sorted and form a single run with step 1.
/// The timeline always starts at window 0, so it holds
/// `frequency * 30 * (last + 1)` points spanning `0..=30 * (last + 1)` seconds.
pub fn make_full_timeline(windows: &[i64], frequency: u32) -> Result<Vec<Duration>> {
    let (n_windows, periods) = full_timeline_shape(windows, frequency)?;
    let span = Duration::from_secs(WINDOW_SECONDS * n_windows);
    log::debug!("full timeline: {n_windows} windows at {frequency} Hz, {periods} points");
    Ok(evenly_spaced(span, periods))
}

/// Number of points [`make_full_timeline`] would produce, without building it.
pub fn full_timeline_len(windows: &[i64], frequency: u32) -> Result<usize> {
    full_timeline_shape(windows, frequency).map(|(_, periods)| periods)
}

/// Validated `(windows spanned, points)` of a full timeline.
fn full_timeline_shape(windows: &[i64], frequency: u32) -> Result<(u64, usize)> {
    check_contiguous(windows)?;
    if frequency == 0 {
        return Err(AccessError::InvalidFrequency(frequency));
    }

    // check_contiguous rejects empty input
    let last = windows[windows.len() - 1];
    let too_large = || AccessError::InvalidOffset(last);

    let n_windows = last
        .checked_add(1)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(too_large)?;
    // the span in seconds must fit a Duration, the point count a usize
    WINDOW_SECONDS.checked_mul(n_windows).ok_or_else(too_large)?;
    let periods = usize::try_from(n_windows)
        .ok()
        .and_then(|n| n.checked_mul(frequency as usize * WINDOW_SECONDS as usize))
        .ok_or_else(too_large)?;
    Ok((n_windows, periods))
}

/// Verify that `windows` increase by exactly one at every step.
///
/// There must be exactly one distinct step and it must be 1, so a single
/// window (no steps at all) is rejected.
pub fn check_contiguous(windows: &[i64]) -> Result<()> {
    if windows.is_empty() {
        return Err(AccessError::EmptyWindows);
    }

    let mut deltas = BTreeSet::new();
    for w in windows.windows(2) {
        match w[1].checked_sub(w[0]) {
            Some(d) => {
                deltas.insert(d);
            }
            None => {
                log::warn!("window step {} -> {} overflows", w[0], w[1]);
                return Err(AccessError::NonContiguousWindows {
                    deltas: deltas.into_iter().collect(),
                });
            }
        }
    }

    if deltas.len() == 1 && deltas.contains(&1) {
        return Ok(());
    }
    log::warn!("window numbers are not contiguous: steps {deltas:?}");
    Err(AccessError::NonContiguousWindows {
        deltas: deltas.into_iter().collect(),
    })
}

/// `periods` points from zero to `end` inclusive, at nanosecond resolution.
fn evenly_spaced(end: Duration, periods: usize) -> Vec<Duration> {
    match periods {
        0 => Vec::new(),
        1 => vec![Duration::ZERO],
        n => {
            let total = end.as_nanos();
            let steps = (n - 1) as u128;
            (0..n)
                .map(|i| {
                    let nanos = i as u128 * total / steps;
                    Duration::new(
                        (nanos / NANOS_PER_SEC) as u64,
                        (nanos % NANOS_PER_SEC) as u32,
                    )
                })
                .collect()
        }
    }
}
