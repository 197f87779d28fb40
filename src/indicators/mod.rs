// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free oscillator math.  Values are `Option<f64>` so callers
// are forced to handle warm-up and numerical-edge-case bars.

pub mod rsi;

pub use rsi::OscillatorSeries;
