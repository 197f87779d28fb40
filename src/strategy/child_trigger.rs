// =============================================================================
// Child Trigger — entry timing on the fastest timeframe
// =============================================================================
//
// Dip-and-confirm
//   LONG:  some bar in the trailing window has the child oscillator inside the
//          support band [support_low, support_high], and the bar after it or
//          the current bar closed green.
//   SHORT: an earlier bar in the window reached resistance_high or more, the
//          current value is below resistance_low, and either the first bar
//          after the latest rally bar or the current bar closed red.
//
// Swing-pivot
//   LONG:  v[t-1] < v[t-2], v[t-1] < v[t], v[t-1] < long_cap
//   SHORT: v[t-1] > v[t-2], v[t-1] > v[t], v[t-1] > short_floor
//   No candle colour requirement.

use crate::alignment::AlignedRow;
use crate::signals::TradeMode;

use super::trailing_window;

/// Decides whether the child timeframe triggers an entry in `mode` at
/// `rows[index]`.
pub trait ChildTriggerPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, rows: &[AlignedRow], index: usize, mode: TradeMode) -> bool;
}

// =============================================================================
// Dip-and-confirm
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DipConfirmTrigger {
    pub support_low: f64,
    pub support_high: f64,
    pub resistance_low: f64,
    pub resistance_high: f64,
    /// Bars before the current one included in the window.
    pub lookback: usize,
}

impl Default for DipConfirmTrigger {
    fn default() -> Self {
        Self {
            support_low: 38.0,
            support_high: 40.0,
            resistance_low: 60.0,
            resistance_high: 60.0,
            lookback: 5,
        }
    }
}

impl DipConfirmTrigger {
    fn in_support(&self, value: Option<f64>) -> bool {
        value.is_some_and(|v| self.support_low <= v && v <= self.support_high)
    }

    fn long_trigger(&self, rows: &[AlignedRow], index: usize) -> bool {
        let current_green = rows[index].candle.is_bullish();
        let window = trailing_window(rows, index, self.lookback);
        window.iter().enumerate().rev().any(|(i, r)| {
            self.in_support(r.child)
                && (current_green || window.get(i + 1).is_some_and(|next| next.candle.is_bullish()))
        })
    }

    fn short_trigger(&self, rows: &[AlignedRow], index: usize) -> bool {
        let current = &rows[index];
        if !current.child.is_some_and(|v| v < self.resistance_low) {
            return false;
        }

        let window = trailing_window(rows, index, self.lookback);
        let last = window.len() - 1;
        let Some(rally) = window[..last]
            .iter()
            .rposition(|r| r.child.is_some_and(|v| v >= self.resistance_high))
        else {
            return false;
        };

        // rally < last, so the cross-back bar is always inside the window.
        current.candle.is_bearish() || window[rally + 1].candle.is_bearish()
    }
}

impl ChildTriggerPolicy for DipConfirmTrigger {
    fn name(&self) -> &'static str {
        "dip-confirm"
    }

    fn evaluate(&self, rows: &[AlignedRow], index: usize, mode: TradeMode) -> bool {
        match mode {
            TradeMode::Long => self.long_trigger(rows, index),
            TradeMode::Short => self.short_trigger(rows, index),
        }
    }
}

// =============================================================================
// Swing-pivot
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPivotTrigger {
    pub long_cap: f64,
    pub short_floor: f64,
}

impl Default for SwingPivotTrigger {
    fn default() -> Self {
        Self {
            long_cap: 55.0,
            short_floor: 45.0,
        }
    }
}

impl ChildTriggerPolicy for SwingPivotTrigger {
    fn name(&self) -> &'static str {
        "swing-pivot"
    }

    fn evaluate(&self, rows: &[AlignedRow], index: usize, mode: TradeMode) -> bool {
        if index < 2 {
            return false;
        }
        let (Some(before), Some(pivot), Some(after)) =
            (rows[index - 2].child, rows[index - 1].child, rows[index].child)
        else {
            return false;
        };

        match mode {
            TradeMode::Long => pivot < before && pivot < after && pivot < self.long_cap,
            TradeMode::Short => pivot > before && pivot > after && pivot > self.short_floor,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Candle;

    fn green(child: f64) -> AlignedRow {
        bar(child, 100.0, 101.0)
    }

    fn red(child: f64) -> AlignedRow {
        bar(child, 101.0, 100.0)
    }

    fn bar(child: f64, open: f64, close: f64) -> AlignedRow {
        AlignedRow {
            timestamp: 0,
            candle: Candle::new(0, open, open.max(close), open.min(close), close, 1.0),
            child: Some(child),
            parent1: Some(65.0),
            parent2: Some(65.0),
        }
    }

    // ---- dip-confirm LONG --------------------------------------------------

    #[test]
    fn dip_on_green_current_bar_triggers() {
        let rows = vec![green(50.0), green(45.0), green(39.0)];
        assert!(DipConfirmTrigger::default().evaluate(&rows, 2, TradeMode::Long));
    }

    #[test]
    fn dip_on_red_current_bar_does_not_trigger() {
        let rows = vec![green(50.0), green(45.0), red(39.0)];
        assert!(!DipConfirmTrigger::default().evaluate(&rows, 2, TradeMode::Long));
    }

    #[test]
    fn earlier_red_dip_confirmed_by_green_current_bar() {
        let rows = vec![red(39.5), red(41.0), green(43.0)];
        assert!(DipConfirmTrigger::default().evaluate(&rows, 2, TradeMode::Long));
    }

    #[test]
    fn green_dip_bar_alone_does_not_confirm() {
        let rows = vec![green(38.0), red(41.0), red(43.0)];
        assert!(!DipConfirmTrigger::default().evaluate(&rows, 2, TradeMode::Long));
    }

    #[test]
    fn green_bar_after_dip_confirms_on_red_current_bar() {
        let rows = vec![red(38.0), green(41.0), red(43.0)];
        assert!(DipConfirmTrigger::default().evaluate(&rows, 2, TradeMode::Long));
    }

    #[test]
    fn support_band_is_inclusive() {
        let trigger = DipConfirmTrigger::default();
        assert!(trigger.evaluate(&[green(38.0)], 0, TradeMode::Long));
        assert!(trigger.evaluate(&[green(40.0)], 0, TradeMode::Long));
        assert!(!trigger.evaluate(&[green(37.99)], 0, TradeMode::Long));
        assert!(!trigger.evaluate(&[green(40.01)], 0, TradeMode::Long));
    }

    #[test]
    fn dip_outside_window_is_ignored() {
        // Default lookback 5 => rows[index-5..=index].
        let mut rows = vec![green(39.0)];
        rows.extend((0..6).map(|_| green(50.0)));
        let trigger = DipConfirmTrigger::default();
        assert!(!trigger.evaluate(&rows, 6, TradeMode::Long));
        assert!(trigger.evaluate(&rows, 5, TradeMode::Long));
    }

    // ---- dip-confirm SHORT -------------------------------------------------

    #[test]
    fn rally_then_red_cross_back_triggers_short() {
        let rows = vec![green(55.0), green(61.0), red(58.0)];
        assert!(DipConfirmTrigger::default().evaluate(&rows, 2, TradeMode::Short));
    }

    #[test]
    fn rally_level_is_inclusive_and_cross_back_exclusive() {
        let trigger = DipConfirmTrigger::default();
        assert!(trigger.evaluate(&[green(60.0), red(59.9)], 1, TradeMode::Short));
        assert!(!trigger.evaluate(&[green(60.0), red(60.0)], 1, TradeMode::Short));
        assert!(!trigger.evaluate(&[green(59.9), red(55.0)], 1, TradeMode::Short));
    }

    #[test]
    fn red_cross_back_bar_confirms_green_current_bar() {
        let rows = vec![green(63.0), red(57.0), green(56.0)];
        assert!(DipConfirmTrigger::default().evaluate(&rows, 2, TradeMode::Short));
    }

    #[test]
    fn short_needs_a_red_bar() {
        let rows = vec![green(63.0), green(57.0), green(56.0)];
        assert!(!DipConfirmTrigger::default().evaluate(&rows, 2, TradeMode::Short));
    }

    #[test]
    fn current_bar_alone_cannot_be_the_rally() {
        assert!(!DipConfirmTrigger::default().evaluate(&[red(65.0)], 0, TradeMode::Short));
    }

    #[test]
    fn missing_child_values_never_trigger() {
        let mut rows = vec![green(39.0), green(39.0)];
        rows[0].child = None;
        rows[1].child = None;
        let trigger = DipConfirmTrigger::default();
        assert!(!trigger.evaluate(&rows, 1, TradeMode::Long));
        assert!(!trigger.evaluate(&rows, 1, TradeMode::Short));
    }

    // ---- swing-pivot -------------------------------------------------------

    #[test]
    fn swing_low_below_cap_is_long_pivot() {
        let rows = vec![red(50.0), red(45.0), red(52.0)];
        let trigger = SwingPivotTrigger::default();
        assert!(trigger.evaluate(&rows, 2, TradeMode::Long));
        assert!(!trigger.evaluate(&rows, 2, TradeMode::Short));
    }

    #[test]
    fn swing_low_at_cap_is_rejected() {
        let rows = vec![green(60.0), green(55.0), green(58.0)];
        assert!(!SwingPivotTrigger::default().evaluate(&rows, 2, TradeMode::Long));
    }

    #[test]
    fn swing_high_above_floor_is_short_pivot() {
        let rows = vec![green(44.0), green(50.0), green(47.0)];
        let trigger = SwingPivotTrigger::default();
        assert!(trigger.evaluate(&rows, 2, TradeMode::Short));
        assert!(!trigger.evaluate(&rows, 2, TradeMode::Long));
    }

    #[test]
    fn swing_high_at_floor_is_rejected() {
        let rows = vec![green(40.0), green(45.0), green(42.0)];
        assert!(!SwingPivotTrigger::default().evaluate(&rows, 2, TradeMode::Short));
    }

    #[test]
    fn flat_middle_is_not_a_pivot() {
        let rows = vec![green(45.0), green(45.0), green(52.0)];
        assert!(!SwingPivotTrigger::default().evaluate(&rows, 2, TradeMode::Long));
    }

    #[test]
    fn pivot_needs_three_defined_bars() {
        let trigger = SwingPivotTrigger::default();
        let rows = vec![green(50.0), green(45.0)];
        assert!(!trigger.evaluate(&rows, 1, TradeMode::Long));

        let mut rows = vec![green(50.0), green(45.0), green(52.0)];
        rows[0].child = None;
        assert!(!trigger.evaluate(&rows, 2, TradeMode::Long));
    }
}
