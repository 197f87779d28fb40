// =============================================================================
// Condition Evaluator — per-row signal state machine
// =============================================================================
//
// For every aligned row with a defined child oscillator:
//   1. ENTRY    parent mode is LONG/SHORT and the child trigger fires in that
//               direction.
//   2. WARNING  parent2 > long and child <= warning_long_level   (LONG)
//               parent2 < short and child >= warning_short_level (SHORT)
//   3. EXIT     parent2 >= long and child >= long                (LONG)
//               parent2 <= short and child <= short              (SHORT)
//
// Rows without a child value are "no decision".  The evaluator is pure: the
// same rows always produce the same signals.

use std::ops::Range;

use tracing::debug;

use crate::alignment::AlignedRow;
use crate::runtime_config::{ChildPolicyKind, ParentPolicyKind, StrategyParams};
use crate::signals::{OscillatorSnapshot, Signal, SignalKind, TradeMode};

use super::child_trigger::{ChildTriggerPolicy, DipConfirmTrigger, SwingPivotTrigger};
use super::parent_mode::{ParentMode, ParentModePolicy, RelaxedParentMode, StrictParentMode, Thresholds};

/// Child levels that raise an early warning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarningLevels {
    pub long: f64,
    pub short: f64,
}

impl Default for WarningLevels {
    fn default() -> Self {
        Self {
            long: 42.0,
            short: 58.0,
        }
    }
}

pub struct ConditionEvaluator {
    parent_policy: Box<dyn ParentModePolicy>,
    child_policy: Box<dyn ChildTriggerPolicy>,
    thresholds: Thresholds,
    warning: WarningLevels,
}

impl ConditionEvaluator {
    pub fn new(
        parent_policy: Box<dyn ParentModePolicy>,
        child_policy: Box<dyn ChildTriggerPolicy>,
        thresholds: Thresholds,
        warning: WarningLevels,
    ) -> Self {
        Self {
            parent_policy,
            child_policy,
            thresholds,
            warning,
        }
    }

    /// Build the evaluator selected by `params`.
    pub fn from_params(params: &StrategyParams) -> Self {
        let thresholds = Thresholds {
            long: params.threshold_long,
            short: params.threshold_short,
        };

        let parent_policy: Box<dyn ParentModePolicy> = match params.parent_policy {
            ParentPolicyKind::Strict => Box::new(StrictParentMode::new(thresholds)),
            ParentPolicyKind::Relaxed => {
                Box::new(RelaxedParentMode::new(thresholds, params.parent_lookback))
            }
        };

        let child_policy: Box<dyn ChildTriggerPolicy> = match params.child_policy {
            ChildPolicyKind::DipConfirm => Box::new(DipConfirmTrigger {
                support_low: params.support_low,
                support_high: params.support_high,
                resistance_low: params.resistance_low,
                resistance_high: params.resistance_high,
                lookback: params.child_lookback,
            }),
            ChildPolicyKind::SwingPivot => Box::new(SwingPivotTrigger {
                long_cap: params.pivot_long_cap,
                short_floor: params.pivot_short_floor,
            }),
        };

        Self::new(
            parent_policy,
            child_policy,
            thresholds,
            WarningLevels {
                long: params.warning_long_level,
                short: params.warning_short_level,
            },
        )
    }

    /// `"<parent>/<child>"`, for logs.
    pub fn describe(&self) -> String {
        format!("{}/{}", self.parent_policy.name(), self.child_policy.name())
    }

    pub fn parent_mode(&self, rows: &[AlignedRow], index: usize) -> ParentMode {
        self.parent_policy.evaluate(rows, index)
    }

    /// Signals for `rows[index]`, in ENTRY, WARNING, EXIT order.
    pub fn evaluate_row(&self, symbol: &str, rows: &[AlignedRow], index: usize) -> Vec<Signal> {
        let row = &rows[index];
        let Some(child) = row.child else {
            return Vec::new();
        };

        let make = |kind: SignalKind, mode: TradeMode| Signal {
            symbol: symbol.to_string(),
            kind,
            mode,
            timestamp: row.timestamp,
            price: row.candle.close,
            snapshot: OscillatorSnapshot {
                child,
                parent1: row.parent1,
                parent2: row.parent2,
            },
        };

        let mut signals = Vec::new();

        if let Some(mode) = self.parent_mode(rows, index).trade_mode() {
            if self.child_policy.evaluate(rows, index, mode) {
                signals.push(make(SignalKind::Entry, mode));
            }
        }

        if let Some(parent2) = row.parent2 {
            if let Some(mode) = self.warning_mode(parent2, child) {
                signals.push(make(SignalKind::Warning, mode));
            }
            if let Some(mode) = self.exit_mode(parent2, child) {
                signals.push(make(SignalKind::Exit, mode));
            }
        }

        if !signals.is_empty() {
            debug!(symbol, timestamp = row.timestamp, count = signals.len(), "row produced signals");
        }
        signals
    }

    /// Evaluate every index in `range` (clamped to `rows`).
    pub fn evaluate_range(&self, symbol: &str, rows: &[AlignedRow], range: Range<usize>) -> Vec<Signal> {
        let end = range.end.min(rows.len());
        (range.start.min(end)..end)
            .flat_map(|i| self.evaluate_row(symbol, rows, i))
            .collect()
    }

    fn warning_mode(&self, parent2: f64, child: f64) -> Option<TradeMode> {
        if parent2 > self.thresholds.long && child <= self.warning.long {
            Some(TradeMode::Long)
        } else if parent2 < self.thresholds.short && child >= self.warning.short {
            Some(TradeMode::Short)
        } else {
            None
        }
    }

    fn exit_mode(&self, parent2: f64, child: f64) -> Option<TradeMode> {
        if parent2 >= self.thresholds.long && child >= self.thresholds.long {
            Some(TradeMode::Long)
        } else if parent2 <= self.thresholds.short && child <= self.thresholds.short {
            Some(TradeMode::Short)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionEvaluator")
            .field("parent_policy", &self.parent_policy.name())
            .field("child_policy", &self.child_policy.name())
            .field("thresholds", &self.thresholds)
            .field("warning", &self.warning)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Candle;

    fn row(child: Option<f64>, parent1: Option<f64>, parent2: Option<f64>, green: bool) -> AlignedRow {
        let (open, close) = if green { (100.0, 101.0) } else { (101.0, 100.0) };
        AlignedRow {
            timestamp: 1_000,
            candle: Candle::new(1_000, open, 102.0, 99.0, close, 1.0),
            child,
            parent1,
            parent2,
        }
    }

    fn kinds(signals: &[Signal]) -> Vec<(SignalKind, TradeMode)> {
        signals.iter().map(|s| (s.kind, s.mode)).collect()
    }

    fn default_evaluator() -> ConditionEvaluator {
        ConditionEvaluator::from_params(&StrategyParams::default())
    }

    #[test]
    fn long_entry_on_dip_with_aligned_parents() {
        let rows = vec![
            row(Some(50.0), Some(65.0), Some(62.0), true),
            row(Some(39.0), Some(65.0), Some(62.0), true),
        ];
        let signals = default_evaluator().evaluate_row("NIFTY", &rows, 1);
        // The dip also sits below the bullish warning level.
        assert_eq!(
            kinds(&signals),
            vec![(SignalKind::Entry, TradeMode::Long), (SignalKind::Warning, TradeMode::Long)]
        );
        let entry = &signals[0];
        assert_eq!(entry.symbol, "NIFTY");
        assert_eq!(entry.timestamp, 1_000);
        assert!((entry.price - 101.0).abs() < f64::EPSILON);
        assert_eq!(entry.snapshot.child, 39.0);
        assert_eq!(entry.snapshot.parent1, Some(65.0));
        assert_eq!(entry.snapshot.parent2, Some(62.0));
    }

    #[test]
    fn neutral_parents_block_entry() {
        let rows = vec![row(Some(39.0), Some(65.0), Some(55.0), true)];
        let signals = default_evaluator().evaluate_row("NIFTY", &rows, 0);
        assert!(signals.iter().all(|s| s.kind != SignalKind::Entry));
    }

    #[test]
    fn short_entry_after_rally_rejection() {
        let rows = vec![
            row(Some(62.0), Some(35.0), Some(38.0), true),
            row(Some(55.0), Some(35.0), Some(38.0), false),
        ];
        let signals = default_evaluator().evaluate_row("SBIN", &rows, 1);
        assert_eq!(kinds(&signals), vec![(SignalKind::Entry, TradeMode::Short)]);
    }

    #[test]
    fn bearish_warning_when_child_nears_upper_threshold() {
        let rows = vec![row(Some(58.0), Some(50.0), Some(39.0), true)];
        let signals = default_evaluator().evaluate_row("SBIN", &rows, 0);
        assert_eq!(kinds(&signals), vec![(SignalKind::Warning, TradeMode::Short)]);
    }

    #[test]
    fn warning_boundaries() {
        let e = default_evaluator();
        // parent2 exactly at the threshold is not "strongly trending".
        assert!(e.evaluate_row("X", &[row(Some(42.0), None, Some(60.0), true)], 0)
            .iter()
            .all(|s| s.kind != SignalKind::Warning));
        assert_eq!(
            kinds(&e.evaluate_row("X", &[row(Some(42.0), None, Some(60.1), true)], 0)),
            vec![(SignalKind::Warning, TradeMode::Long)]
        );
        assert!(e.evaluate_row("X", &[row(Some(42.1), None, Some(70.0), true)], 0).is_empty());
        assert!(e.evaluate_row("X", &[row(Some(57.9), None, Some(30.0), true)], 0).is_empty());
    }

    #[test]
    fn exit_on_shared_overextension() {
        let e = default_evaluator();
        assert_eq!(
            kinds(&e.evaluate_row("X", &[row(Some(60.0), None, Some(60.0), true)], 0)),
            vec![(SignalKind::Exit, TradeMode::Long)]
        );
        assert_eq!(
            kinds(&e.evaluate_row("X", &[row(Some(40.0), None, Some(40.0), true)], 0)),
            vec![(SignalKind::Exit, TradeMode::Short)]
        );
        assert!(e.evaluate_row("X", &[row(Some(59.9), None, Some(75.0), true)], 0).is_empty());
    }

    #[test]
    fn missing_child_is_no_decision() {
        let rows = vec![row(None, Some(65.0), Some(65.0), true)];
        assert!(default_evaluator().evaluate_row("X", &rows, 0).is_empty());
    }

    #[test]
    fn missing_parent2_suppresses_warning_and_exit() {
        let rows = vec![row(Some(70.0), Some(70.0), None, true)];
        assert!(default_evaluator().evaluate_row("X", &rows, 0).is_empty());
    }

    #[test]
    fn swing_pivot_policy_from_params() {
        let params = StrategyParams {
            child_policy: ChildPolicyKind::SwingPivot,
            ..StrategyParams::default()
        };
        let e = ConditionEvaluator::from_params(&params);
        assert_eq!(e.describe(), "strict/swing-pivot");

        let rows = vec![
            row(Some(50.0), Some(65.0), Some(62.0), false),
            row(Some(45.0), Some(65.0), Some(62.0), false),
            row(Some(52.0), Some(65.0), Some(62.0), false),
        ];
        assert_eq!(
            kinds(&e.evaluate_row("X", &rows, 2)),
            vec![(SignalKind::Entry, TradeMode::Long)]
        );
    }

    #[test]
    fn relaxed_policy_from_params() {
        let params = StrategyParams {
            parent_policy: ParentPolicyKind::Relaxed,
            ..StrategyParams::default()
        };
        let e = ConditionEvaluator::from_params(&params);
        assert_eq!(e.describe(), "relaxed/dip-confirm");

        let rows = vec![
            row(Some(50.0), Some(65.0), Some(63.0), true),
            row(Some(39.0), Some(65.0), Some(58.0), true),
        ];
        assert_eq!(e.parent_mode(&rows, 1), ParentMode::Long);
        assert_eq!(
            kinds(&e.evaluate_row("X", &rows, 1)),
            vec![(SignalKind::Entry, TradeMode::Long)]
        );
    }

    #[test]
    fn evaluate_range_clamps_and_preserves_order() {
        let rows = vec![
            row(Some(60.0), None, Some(65.0), true),
            row(Some(50.0), None, Some(50.0), true),
            row(Some(40.0), None, Some(35.0), true),
        ];
        let signals = default_evaluator().evaluate_range("X", &rows, 0..10);
        assert_eq!(
            kinds(&signals),
            vec![(SignalKind::Exit, TradeMode::Long), (SignalKind::Exit, TradeMode::Short)]
        );
        assert!(default_evaluator().evaluate_range("X", &rows, 5..10).is_empty());
    }
}
