// =============================================================================
// REST Endpoints — Axum 0.7
// =============================================================================
//
//   GET /               plain-text liveness check for uptime pingers
//   GET /api/v1/health  JSON status with the latest scan statistics
//
// Both endpoints are public and read-only.
// =============================================================================

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::runtime_config::ScanWindow;
use crate::scanner::ScanStats;

/// Read-only state shared with the HTTP handlers.
#[derive(Debug)]
pub struct ApiState {
    pub started_at: DateTime<Utc>,
    pub symbols: Vec<String>,
    pub scan_window: ScanWindow,
    pub stats: Arc<RwLock<ScanStats>>,
}

impl ApiState {
    pub fn new(symbols: Vec<String>, scan_window: ScanWindow, stats: Arc<RwLock<ScanStats>>) -> Self {
        Self {
            started_at: Utc::now(),
            symbols,
            scan_window,
            stats,
        }
    }

    fn health(&self) -> HealthResponse {
        let now = Utc::now();
        HealthResponse {
            status: "ok",
            server_time: now.timestamp_millis(),
            uptime_secs: (now - self.started_at).num_seconds().max(0),
            symbols: self.symbols.len(),
            scan_window: self.scan_window,
            stats: self.stats.read().clone(),
        }
    }
}

// =============================================================================
// Router construction
// =============================================================================

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/api/v1/health", get(health))
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

async fn liveness() -> &'static str {
    "RSI alignment scanner is running"
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    uptime_secs: i64,
    symbols: usize,
    scan_window: ScanWindow,
    stats: ScanStats,
}

async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.health())
}
