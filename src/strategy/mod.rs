// =============================================================================
// Strategy Module
// =============================================================================
//
// Parent mode policies, child trigger policies and the evaluator that turns
// aligned rows into ENTRY / WARNING / EXIT signals.

pub mod child_trigger;
pub mod evaluator;
pub mod parent_mode;

pub use evaluator::ConditionEvaluator;

use crate::alignment::AlignedRow;

/// `rows[index]` plus up to `lookback` rows before it.
pub(crate) fn trailing_window(rows: &[AlignedRow], index: usize, lookback: usize) -> &[AlignedRow] {
    &rows[index.saturating_sub(lookback)..=index]
}
