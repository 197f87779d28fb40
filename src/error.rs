// =============================================================================
// Typed errors for the scanning core
// =============================================================================
//
// The pure pipeline (series construction, alignment, per-symbol scan) reports
// caller contract breaches through these enums.  Driver code (config, HTTP,
// Telegram) keeps using `anyhow` and wraps these when they bubble up.

use thiserror::Error;

/// Which of the three inputs of a unit of work an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesRole {
    Child,
    Parent1,
    Parent2,
}

impl std::fmt::Display for SeriesRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Child => write!(f, "child"),
            Self::Parent1 => write!(f, "parent1"),
            Self::Parent2 => write!(f, "parent2"),
        }
    }
}

/// Raised when a candle sequence breaks the strictly-ascending invariant.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("timestamp {timestamp} at index {index} precedes the previous timestamp {previous}")]
    NotAscending {
        index: usize,
        previous: i64,
        timestamp: i64,
    },

    #[error("duplicate timestamp {timestamp} at index {index}")]
    DuplicateTimestamp { index: usize, timestamp: i64 },
}

/// Raised by the time aligner when a parent input is out of order.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("{role} series is not sorted: timestamp {timestamp} at index {index} precedes {previous}")]
    Unsorted {
        role: SeriesRole,
        index: usize,
        previous: i64,
        timestamp: i64,
    },
}

/// Failure of a single (symbol) unit of work.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{symbol}: invalid {role} series: {source}")]
    InvalidSeries {
        symbol: String,
        role: SeriesRole,
        #[source]
        source: SeriesError,
    },

    #[error("{symbol}: {source}")]
    Alignment {
        symbol: String,
        #[source]
        source: AlignmentError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_series() {
        let err = AlignmentError::Unsorted {
            role: SeriesRole::Parent2,
            index: 3,
            previous: 2_000,
            timestamp: 1_000,
        };
        assert!(err.to_string().starts_with("parent2 series is not sorted"));

        let scan = ScanError::InvalidSeries {
            symbol: "BTCUSDT".into(),
            role: SeriesRole::Child,
            source: SeriesError::DuplicateTimestamp {
                index: 1,
                timestamp: 60_000,
            },
        };
        assert_eq!(
            scan.to_string(),
            "BTCUSDT: invalid child series: duplicate timestamp 60000 at index 1"
        );
    }
}
