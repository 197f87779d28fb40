// =============================================================================
// Signal Emitter — per (symbol, kind) alert throttling
// =============================================================================
//
// ENTRY signals always pass.  WARNING and EXIT signals are dropped when the
// same (symbol, kind) pair went out less than `min_interval` earlier, measured
// on the signals' own bar timestamps so replays throttle the same way live
// scans do.  State lives only as long as the process.

use std::collections::HashMap;

use chrono::Duration;
use tracing::debug;

use super::signal::{Signal, SignalKind};

/// Last emission time per (symbol, kind).  Owned by the caller and handed to
/// [`SignalEmitter`] on every call.
#[derive(Debug, Clone, Default)]
pub struct ThrottleState {
    last_emitted: HashMap<(String, SignalKind), i64>,
}

impl ThrottleState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn last_emitted(&self, symbol: &str, kind: SignalKind) -> Option<i64> {
        self.last_emitted.get(&(symbol.to_string(), kind)).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.last_emitted.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.last_emitted.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SignalEmitter {
    min_interval_ms: i64,
}

impl SignalEmitter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval_ms: min_interval.num_milliseconds(),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(secs as i64))
    }

    /// Decide whether `signal` goes out, updating `state` when it does.
    pub fn admit(&self, state: &mut ThrottleState, signal: &Signal) -> bool {
        if !signal.kind.is_throttled() {
            return true;
        }

        let key = (signal.symbol.clone(), signal.kind);
        if let Some(&last) = state.last_emitted.get(&key) {
            let elapsed = signal.timestamp - last;
            if elapsed < self.min_interval_ms {
                debug!(
                    symbol = %signal.symbol,
                    kind = %signal.kind,
                    elapsed_ms = elapsed,
                    "alert throttled"
                );
                return false;
            }
        }

        state.last_emitted.insert(key, signal.timestamp);
        true
    }

    /// Keep the signals that pass [`admit`](Self::admit), in order.
    pub fn filter(&self, state: &mut ThrottleState, signals: Vec<Signal>) -> Vec<Signal> {
        signals
            .into_iter()
            .filter(|s| self.admit(state, s))
            .collect()
    }
}

impl Default for SignalEmitter {
    fn default() -> Self {
        Self::from_secs(900)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::signal::{OscillatorSnapshot, TradeMode};

    const SECOND: i64 = 1_000;

    fn signal(symbol: &str, kind: SignalKind, timestamp: i64) -> Signal {
        Signal {
            symbol: symbol.into(),
            kind,
            mode: TradeMode::Long,
            timestamp,
            price: 100.0,
            snapshot: OscillatorSnapshot {
                child: 41.0,
                parent1: Some(62.0),
                parent2: Some(65.0),
            },
        }
    }

    #[test]
    fn warning_is_throttled_then_released() {
        let emitter = SignalEmitter::from_secs(900);
        let mut state = ThrottleState::new();
        let t0 = 1_700_000_000_000;

        assert!(emitter.admit(&mut state, &signal("SBIN", SignalKind::Warning, t0)));
        assert!(!emitter.admit(&mut state, &signal("SBIN", SignalKind::Warning, t0 + 100 * SECOND)));
        assert!(emitter.admit(&mut state, &signal("SBIN", SignalKind::Warning, t0 + 901 * SECOND)));
        assert_eq!(state.last_emitted("SBIN", SignalKind::Warning), Some(t0 + 901 * SECOND));
    }

    #[test]
    fn suppressed_alert_does_not_reset_clock() {
        let emitter = SignalEmitter::from_secs(900);
        let mut state = ThrottleState::new();
        assert!(emitter.admit(&mut state, &signal("SBIN", SignalKind::Exit, 0)));
        assert!(!emitter.admit(&mut state, &signal("SBIN", SignalKind::Exit, 800 * SECOND)));
        assert!(emitter.admit(&mut state, &signal("SBIN", SignalKind::Exit, 900 * SECOND)));
    }

    #[test]
    fn entries_are_never_throttled() {
        let emitter = SignalEmitter::default();
        let mut state = ThrottleState::new();
        for i in 0..5 {
            assert!(emitter.admit(&mut state, &signal("INFY", SignalKind::Entry, i * SECOND)));
        }
        assert!(state.is_empty());
    }

    #[test]
    fn keys_are_independent_per_symbol_and_kind() {
        let emitter = SignalEmitter::default();
        let mut state = ThrottleState::new();
        let batch = vec![
            signal("INFY", SignalKind::Warning, 0),
            signal("INFY", SignalKind::Exit, 0),
            signal("TCS", SignalKind::Warning, 0),
            signal("INFY", SignalKind::Warning, 10 * SECOND),
        ];
        let out = emitter.filter(&mut state, batch);
        assert_eq!(out.len(), 3);
        assert_eq!(state.len(), 3);
        assert!(out.iter().all(|s| s.timestamp == 0));
    }
}
