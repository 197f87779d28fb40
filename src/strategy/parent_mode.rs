// =============================================================================
// Parent Mode — trend context from the two slower timeframes
// =============================================================================
//
// Strict:   parent1 AND parent2 beyond the threshold on the current bar.
// Relaxed:  parent1 beyond the threshold on the current bar; parent2 judged by
//           the most recent bar in the trailing lookback that is beyond either
//           threshold.  Both must point the same way.
//
// LONG needs values strictly above `long`, SHORT strictly below `short`.
// An absent value never qualifies.

use serde::Serialize;

use crate::alignment::AlignedRow;
use crate::signals::TradeMode;

use super::trailing_window;

/// Trend context derived from the parent timeframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParentMode {
    Long,
    Short,
    Neutral,
}

impl ParentMode {
    pub fn trade_mode(self) -> Option<TradeMode> {
        match self {
            Self::Long => Some(TradeMode::Long),
            Self::Short => Some(TradeMode::Short),
            Self::Neutral => None,
        }
    }
}

/// Bullish / bearish oscillator levels for the parent tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub long: f64,
    pub short: f64,
}

impl Thresholds {
    /// Classify a single oscillator reading.
    pub fn classify(&self, value: Option<f64>) -> ParentMode {
        match value {
            Some(v) if v > self.long => ParentMode::Long,
            Some(v) if v < self.short => ParentMode::Short,
            _ => ParentMode::Neutral,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            long: 60.0,
            short: 40.0,
        }
    }
}

/// Decides the parent mode at `rows[index]`.
pub trait ParentModePolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `index` must be in bounds; rows before it are available as history.
    fn evaluate(&self, rows: &[AlignedRow], index: usize) -> ParentMode;
}

// =============================================================================
// Strict
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct StrictParentMode {
    thresholds: Thresholds,
}

impl StrictParentMode {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl ParentModePolicy for StrictParentMode {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn evaluate(&self, rows: &[AlignedRow], index: usize) -> ParentMode {
        let row = &rows[index];
        let p1 = self.thresholds.classify(row.parent1);
        let p2 = self.thresholds.classify(row.parent2);
        if p1 == p2 {
            p1
        } else {
            ParentMode::Neutral
        }
    }
}

// =============================================================================
// Relaxed
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct RelaxedParentMode {
    thresholds: Thresholds,
    lookback: usize,
}

impl RelaxedParentMode {
    pub fn new(thresholds: Thresholds, lookback: usize) -> Self {
        Self {
            thresholds,
            lookback,
        }
    }

    /// Mode of the newest bar in the window whose parent2 crossed a threshold.
    fn recent_parent2_mode(&self, rows: &[AlignedRow], index: usize) -> ParentMode {
        trailing_window(rows, index, self.lookback)
            .iter()
            .rev()
            .map(|r| self.thresholds.classify(r.parent2))
            .find(|m| *m != ParentMode::Neutral)
            .unwrap_or(ParentMode::Neutral)
    }
}

impl ParentModePolicy for RelaxedParentMode {
    fn name(&self) -> &'static str {
        "relaxed"
    }

    fn evaluate(&self, rows: &[AlignedRow], index: usize) -> ParentMode {
        let p1 = self.thresholds.classify(rows[index].parent1);
        if p1 == ParentMode::Neutral {
            return ParentMode::Neutral;
        }
        if self.recent_parent2_mode(rows, index) == p1 {
            p1
        } else {
            ParentMode::Neutral
        }
    }
}
