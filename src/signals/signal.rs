// =============================================================================
// Signal records produced by the condition evaluator
// =============================================================================

use serde::{Deserialize, Serialize};

/// What a signal asks the operator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    /// Parents aligned and the child timeframe triggered.
    Entry,
    /// Child oscillator drifting toward the opposite threshold.
    Warning,
    /// Parent2 and child both stretched in the same direction.
    Exit,
}

impl SignalKind {
    /// Entries always go out; the rest are rate-limited.
    pub fn is_throttled(self) -> bool {
        !matches!(self, Self::Entry)
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry => write!(f, "ENTRY"),
            Self::Warning => write!(f, "WARNING"),
            Self::Exit => write!(f, "EXIT"),
        }
    }
}

/// Direction a signal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeMode {
    Long,
    Short,
}

impl std::fmt::Display for TradeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Oscillator readings at the bar that produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorSnapshot {
    pub child: f64,
    pub parent1: Option<f64>,
    pub parent2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub kind: SignalKind,
    pub mode: TradeMode,
    /// Child bar close boundary, epoch milliseconds.
    pub timestamp: i64,
    /// Child bar close.
    pub price: f64,
    pub snapshot: OscillatorSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_entries_bypass_throttle() {
        assert!(!SignalKind::Entry.is_throttled());
        assert!(SignalKind::Warning.is_throttled());
        assert!(SignalKind::Exit.is_throttled());
    }

    #[test]
    fn serialises_with_upper_case_tags() {
        let signal = Signal {
            symbol: "ETHUSDT".into(),
            kind: SignalKind::Warning,
            mode: TradeMode::Short,
            timestamp: 1_700_000_000_000,
            price: 2_000.5,
            snapshot: OscillatorSnapshot {
                child: 58.2,
                parent1: None,
                parent2: Some(35.0),
            },
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["kind"], "WARNING");
        assert_eq!(json["mode"], "SHORT");
        assert!(json["snapshot"]["parent1"].is_null());
    }
}
