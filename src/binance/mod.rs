// =============================================================================
// Binance Module
// =============================================================================

pub mod client;

pub use client::BinanceClient;
