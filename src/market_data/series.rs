use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar.
///
/// `timestamp` places the bar on its series timeline, in epoch milliseconds.
/// Exchange klines are keyed by their close boundary (open time + interval),
/// the instant the bar's values become final, so the as-of join never pairs a
/// child bar with a parent bar that is still open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Green bar: close strictly above open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Red bar: close strictly below open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

// ---------------------------------------------------------------------------
// Series -- validated, strictly ascending candle sequence
// ---------------------------------------------------------------------------

/// Candles ordered by strictly increasing timestamp.  Gaps and irregular
/// cadence are allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    candles: Vec<Candle>,
}

impl Series {
    /// Validate ordering and wrap `candles`.
    pub fn new(candles: Vec<Candle>) -> Result<Self, SeriesError> {
        for (index, pair) in candles.windows(2).enumerate() {
            let (previous, timestamp) = (pair[0].timestamp, pair[1].timestamp);
            if timestamp == previous {
                return Err(SeriesError::DuplicateTimestamp {
                    index: index + 1,
                    timestamp,
                });
            }
            if timestamp < previous {
                return Err(SeriesError::NotAscending {
                    index: index + 1,
                    previous,
                    timestamp,
                });
            }
        }
        Ok(Self { candles })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(timestamp: i64, close: f64) -> Candle {
        Candle::new(timestamp, close, close + 1.0, close - 1.0, close, 10.0)
    }

    #[test]
    fn accepts_irregular_ascending_timestamps() {
        let series = Series::new(vec![bar(0, 1.0), bar(60_000, 2.0), bar(600_000, 3.0)])
            .expect("ascending series");
        assert_eq!(series.candles().len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.candles()[2].timestamp, 600_000);
    }

    #[test]
    fn rejects_duplicate_timestamp() {
        let err = Series::new(vec![bar(0, 1.0), bar(0, 2.0)]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::DuplicateTimestamp {
                index: 1,
                timestamp: 0
            }
        );
    }

    #[test]
    fn rejects_descending_timestamp() {
        let err = Series::new(vec![bar(0, 1.0), bar(120_000, 2.0), bar(60_000, 3.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::NotAscending { index: 2, .. }));
    }

    #[test]
    fn empty_series_is_valid() {
        let series = Series::new(Vec::new()).unwrap();
        assert!(series.candles().is_empty());
    }

    #[test]
    fn candle_direction() {
        let green = Candle::new(0, 100.0, 102.0, 99.0, 101.0, 1.0);
        let red = Candle::new(0, 100.0, 101.0, 98.0, 99.0, 1.0);
        let doji = Candle::new(0, 100.0, 101.0, 99.0, 100.0, 1.0);
        assert!(green.is_bullish() && !green.is_bearish());
        assert!(red.is_bearish() && !red.is_bullish());
        assert!(!doji.is_bullish() && !doji.is_bearish());
    }
}
