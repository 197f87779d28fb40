// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the SMA of the first `period`
//          gains / losses.  The first RSI value lands on index `period`.
// Step 3 — Apply Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Output is aligned 1:1 with the input closes; indices `0..period` are `None`
// (warm-up).
// =============================================================================

use crate::market_data::{Candle, Series};

/// RSI value reported for a perfectly flat run (no gains and no losses).
pub const FLAT_RSI: f64 = 50.0;

/// A candle series annotated with one oscillator value per candle.
#[derive(Debug, Clone, PartialEq)]
pub struct OscillatorSeries {
    series: Series,
    values: Vec<Option<f64>>,
}

impl OscillatorSeries {
    /// Run the oscillator over `series`.
    ///
    /// Fewer than `period + 1` candles (or `period == 0`) is the
    /// insufficient-data case: every value is `None`, nothing panics.
    pub fn compute(series: &Series, period: usize) -> Self {
        let values = calculate_rsi(&series.closes(), period);
        Self {
            series: series.clone(),
            values,
        }
    }

    pub fn candles(&self) -> &[Candle] {
        self.series.candles()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Most recent oscillator value, if defined.
    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    /// `(timestamp, value)` pairs in series order.
    pub fn points(&self) -> impl Iterator<Item = (i64, Option<f64>)> + '_ {
        self.series
            .candles()
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.timestamp, *v))
    }
}

/// Compute RSI for `closes`, one slot per close.
///
/// # Edge cases
/// - `period == 0` or `closes.len() < period + 1` => all `None`
/// - average loss zero with gains => 100.0
/// - average gain zero with losses => 0.0
/// - both zero (flat price) => [`FLAT_RSI`]
/// - a non-finite delta after warm-up (e.g. a NaN close) => `None` for the
///   bars it touches; smoothing skips it
/// - a non-finite delta inside the seed window => all `None`
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return result;
    }

    // --- Compute price deltas ------------------------------------------------
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    // --- Seed averages with SMA of first `period` deltas ---------------------
    let (sum_gain, sum_loss) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| (g + gain_of(d), l + loss_of(d)));

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    result[period] = rsi_from_averages(avg_gain, avg_loss);

    // --- Wilder's smoothing for subsequent values ----------------------------
    // deltas[i - 1] is the change into close i.
    for i in (period + 1)..closes.len() {
        let delta = deltas[i - 1];
        if !delta.is_finite() {
            continue;
        }
        avg_gain = (avg_gain * (period_f - 1.0) + gain_of(delta)) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss_of(delta)) / period_f;
        result[i] = rsi_from_averages(avg_gain, avg_loss);
    }

    result
}

// =============================================================================
// Internal helpers
// =============================================================================

// NaN passes through so a bad seed window poisons the averages instead of
// reading as "no movement".
fn gain_of(delta: f64) -> f64 {
    if delta.is_nan() || delta > 0.0 {
        delta
    } else {
        0.0
    }
}

fn loss_of(delta: f64) -> f64 {
    if delta.is_nan() {
        delta
    } else if delta < 0.0 {
        -delta
    } else {
        0.0
    }
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        FLAT_RSI
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi)
    } else {
        None
    }
}
