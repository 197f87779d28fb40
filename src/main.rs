// =============================================================================
// RSI Alignment Scanner — Main Entry Point
// =============================================================================
//
// SCANNER_MODE=live  (default) scans every `scan_interval_secs` and serves the
//                    keep-alive endpoint until Ctrl-C.
// SCANNER_MODE=today replays every bar of the latest UTC session once and
//                    exits.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod alignment;
mod api;
mod binance;
mod error;
mod indicators;
mod market_data;
mod notifier;
mod runtime_config;
mod scanner;
mod signals;
mod strategy;

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::ApiState;
use crate::binance::BinanceClient;
use crate::notifier::TelegramNotifier;
use crate::runtime_config::{RuntimeConfig, ScanWindow};
use crate::scanner::Scanner;

const CONFIG_PATH: &str = "scanner_config.json";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Live,
    Today,
}

impl RunMode {
    fn from_env() -> anyhow::Result<Self> {
        match std::env::var("SCANNER_MODE") {
            Err(_) => Ok(Self::Live),
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "" | "live" => Ok(Self::Live),
                "today" => Ok(Self::Today),
                other => bail!("unknown SCANNER_MODE '{other}' (expected 'live' or 'today')"),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("RSI alignment scanner starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_symbol_override(std::env::var("SCANNER_SYMBOLS").ok());
    config.validate().context("invalid scanner configuration")?;

    let mode = RunMode::from_env()?;
    info!(
        symbols = ?config.symbols,
        parent1 = %config.intervals.parent1,
        parent2 = %config.intervals.parent2,
        child = %config.intervals.child,
        ?mode,
        "Configuration ready"
    );

    // ── 2. Collaborators ─────────────────────────────────────────────────
    let client = BinanceClient::new()?;
    let notifier = TelegramNotifier::from_env(config.intervals.clone())?;
    let symbols = config.symbols.clone();
    let scan_window = config.scan_window;
    let scanner = Arc::new(Scanner::new(config, client, notifier));

    // ── 3. One-shot replay ───────────────────────────────────────────────
    if mode == RunMode::Today {
        let summary = scanner.run_cycle(ScanWindow::LastSession).await;
        info!(
            scanned = summary.scanned,
            signals = summary.signals,
            "Session replay complete"
        );
        return Ok(());
    }

    // ── 4. Keep-alive API server ─────────────────────────────────────────
    let bind_addr = std::env::var("SCANNER_BIND_ADDR").unwrap_or_else(|_| {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        format!("0.0.0.0:{port}")
    });

    let api_state = Arc::new(ApiState::new(symbols, scan_window, scanner.stats()));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, api::router(api_state)).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 5. Scan loop ─────────────────────────────────────────────────────
    let scan_handle = {
        let scanner = Arc::clone(&scanner);
        tokio::spawn(async move { scanner.run_forever().await })
    };

    // ── 6. Shutdown ──────────────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    scan_handle.abort();

    Ok(())
}
