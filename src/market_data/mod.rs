pub mod series;

// Re-export the core data types for convenient access (e.g. `use crate::market_data::Candle`).
pub use series::{Candle, Series};
