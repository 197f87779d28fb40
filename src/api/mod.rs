// =============================================================================
// API Module — keep-alive HTTP surface
// =============================================================================

pub mod rest;

pub use rest::{router, ApiState};
