// =============================================================================
// Signals Module
// =============================================================================
//
// Signal records and the throttling emitter that sits between the condition
// evaluator and the notification sink.

pub mod emitter;
pub mod signal;

pub use emitter::{SignalEmitter, ThrottleState};
pub use signal::{OscillatorSnapshot, Signal, SignalKind, TradeMode};
