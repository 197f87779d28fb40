// =============================================================================
// Multi-Timeframe Alignment — backward as-of join with staleness tolerance
// =============================================================================
//
// Every child (fastest) bar receives the oscillator value of the most recent
// parent bar whose timestamp is at or before the child timestamp, provided the
// parent bar is no older than that parent's tolerance.  Anything older is
// treated as stale and left absent.
//
// Both parents are walked with forward-only cursors while the child series is
// iterated once, so a merge costs O(child + parent1 + parent2).
// =============================================================================

use chrono::Duration;
use serde::Serialize;
use tracing::debug;

use crate::error::{AlignmentError, SeriesRole};
use crate::indicators::OscillatorSeries;
use crate::market_data::Candle;

/// One parent observation fed into the aligner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentBar {
    pub timestamp: i64,
    pub value: Option<f64>,
}

impl ParentBar {
    #[cfg(test)]
    pub fn new(timestamp: i64, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }

    /// Flatten an oscillator series into aligner input.
    pub fn from_series(series: &OscillatorSeries) -> Vec<Self> {
        series
            .points()
            .map(|(timestamp, value)| Self { timestamp, value })
            .collect()
    }
}

/// Maximum age of a parent bar relative to the child bar it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerances {
    pub parent1: Duration,
    pub parent2: Duration,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            parent1: Duration::minutes(60),
            parent2: Duration::minutes(15),
        }
    }
}

/// A child bar with both parent oscillators attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlignedRow {
    pub timestamp: i64,
    pub candle: Candle,
    pub child: Option<f64>,
    pub parent1: Option<f64>,
    pub parent2: Option<f64>,
}

/// Convenience wrapper over [`align`] for three oscillator series.
pub fn align_series(
    child: &OscillatorSeries,
    parent1: &OscillatorSeries,
    parent2: &OscillatorSeries,
    tolerances: Tolerances,
) -> Result<Vec<AlignedRow>, AlignmentError> {
    align(
        child,
        &ParentBar::from_series(parent1),
        &ParentBar::from_series(parent2),
        tolerances,
    )
}

/// Merge both parents onto the child timeline.
///
/// Parents must be sorted ascending; an out-of-order parent is rejected with
/// [`AlignmentError::Unsorted`].  Equal parent timestamps are allowed and the
/// later entry wins.  The child ordering is guaranteed by its `Series`.
pub fn align(
    child: &OscillatorSeries,
    parent1: &[ParentBar],
    parent2: &[ParentBar],
    tolerances: Tolerances,
) -> Result<Vec<AlignedRow>, AlignmentError> {
    ensure_sorted(parent1, SeriesRole::Parent1)?;
    ensure_sorted(parent2, SeriesRole::Parent2)?;

    let mut cursor1 = AsofCursor::new(parent1, tolerances.parent1);
    let mut cursor2 = AsofCursor::new(parent2, tolerances.parent2);

    let rows: Vec<AlignedRow> = child
        .candles()
        .iter()
        .zip(child.values())
        .map(|(candle, &value)| AlignedRow {
            timestamp: candle.timestamp,
            candle: *candle,
            child: value,
            parent1: cursor1.value_at(candle.timestamp),
            parent2: cursor2.value_at(candle.timestamp),
        })
        .collect();

    debug!(
        rows = rows.len(),
        with_parent1 = rows.iter().filter(|r| r.parent1.is_some()).count(),
        with_parent2 = rows.iter().filter(|r| r.parent2.is_some()).count(),
        "alignment complete"
    );

    Ok(rows)
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Forward-only as-of lookup over a sorted parent slice.
struct AsofCursor<'a> {
    bars: &'a [ParentBar],
    /// Index of the first bar strictly after the last queried timestamp.
    next: usize,
    tolerance_ms: i64,
}

impl<'a> AsofCursor<'a> {
    fn new(bars: &'a [ParentBar], tolerance: Duration) -> Self {
        Self {
            bars,
            next: 0,
            tolerance_ms: tolerance.num_milliseconds(),
        }
    }

    /// Queries must arrive with non-decreasing `at`.
    fn value_at(&mut self, at: i64) -> Option<f64> {
        while self.next < self.bars.len() && self.bars[self.next].timestamp <= at {
            self.next += 1;
        }
        let latest = self.bars.get(self.next.checked_sub(1)?)?;
        if at - latest.timestamp <= self.tolerance_ms {
            latest.value
        } else {
            None
        }
    }
}

fn ensure_sorted(bars: &[ParentBar], role: SeriesRole) -> Result<(), AlignmentError> {
    match bars
        .windows(2)
        .position(|w| w[1].timestamp < w[0].timestamp)
    {
        Some(i) => Err(AlignmentError::Unsorted {
            role,
            index: i + 1,
            previous: bars[i].timestamp,
            timestamp: bars[i + 1].timestamp,
        }),
        None => Ok(()),
    }
}
