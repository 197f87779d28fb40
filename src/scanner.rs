// =============================================================================
// Scanner — per-symbol pipeline and the periodic scan cycle
// =============================================================================
//
// Pure part (`evaluate_symbol`):
//   candles ─► Series ─► OscillatorSeries ─► align ─► ConditionEvaluator
//   over the rows selected by the scan window and not evaluated before.
//
// Driver part (`Scanner`):
//   for each symbol: fetch child / parent1 / parent2 klines (paced, retried),
//   evaluate the bars that closed since the previous cycle, throttle through
//   the shared ThrottleState, notify.  A failing symbol is logged and the
//   cycle moves on.
// =============================================================================

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alignment::{align_series, AlignedRow};
use crate::binance::BinanceClient;
use crate::error::{ScanError, SeriesRole};
use crate::indicators::OscillatorSeries;
use crate::market_data::{Candle, Series};
use crate::notifier::TelegramNotifier;
use crate::runtime_config::{RuntimeConfig, ScanWindow, StrategyParams};
use crate::signals::{Signal, SignalEmitter, ThrottleState};
use crate::strategy::ConditionEvaluator;

// =============================================================================
// Unit of work
// =============================================================================

/// Raw candles for one symbol, oldest first.
#[derive(Debug, Clone, Default)]
pub struct SymbolCandles {
    pub child: Vec<Candle>,
    pub parent1: Vec<Candle>,
    pub parent2: Vec<Candle>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Evaluated {
        symbol: String,
        /// Aligned rows built from the child series.
        rows: usize,
        /// Rows inside the scan window.
        evaluated: usize,
        /// Timestamp of the newest aligned row.
        last_timestamp: i64,
        signals: Vec<Signal>,
    },
    /// One of the three series came back empty.
    Skipped { symbol: String, missing: SeriesRole },
}

/// Run one symbol through the whole core pipeline.
///
/// Only rows newer than `after` are evaluated (all rows when `None`).  No
/// throttling happens here; the returned signals are every condition that
/// matched inside the window.
pub fn evaluate_symbol(
    symbol: &str,
    data: SymbolCandles,
    params: &StrategyParams,
    evaluator: &ConditionEvaluator,
    window: ScanWindow,
    after: Option<i64>,
) -> Result<ScanOutcome, ScanError> {
    let missing = [
        (SeriesRole::Child, data.child.is_empty()),
        (SeriesRole::Parent1, data.parent1.is_empty()),
        (SeriesRole::Parent2, data.parent2.is_empty()),
    ]
    .into_iter()
    .find_map(|(role, empty)| empty.then_some(role));

    if let Some(role) = missing {
        info!(symbol, series = %role, "no candles, skipping symbol");
        return Ok(ScanOutcome::Skipped {
            symbol: symbol.to_string(),
            missing: role,
        });
    }

    let rows = build_rows(symbol, data, params)?;
    let last_timestamp = rows.last().map_or(i64::MIN, |r| r.timestamp);

    let range = window_range(&rows, window, after);
    let evaluated = range.len();
    let signals = evaluator.evaluate_range(symbol, &rows, range);

    debug!(
        symbol,
        rows = rows.len(),
        evaluated,
        signals = signals.len(),
        "symbol evaluated"
    );

    Ok(ScanOutcome::Evaluated {
        symbol: symbol.to_string(),
        rows: rows.len(),
        evaluated,
        last_timestamp,
        signals,
    })
}

/// Oscillators for all three series, merged onto the child timeline.
fn build_rows(symbol: &str, data: SymbolCandles, params: &StrategyParams) -> Result<Vec<AlignedRow>, ScanError> {
    let child = build_series(symbol, SeriesRole::Child, data.child)?;
    let parent1 = build_series(symbol, SeriesRole::Parent1, data.parent1)?;
    let parent2 = build_series(symbol, SeriesRole::Parent2, data.parent2)?;

    let child = OscillatorSeries::compute(&child, params.period);
    let parent1 = OscillatorSeries::compute(&parent1, params.period);
    let parent2 = OscillatorSeries::compute(&parent2, params.period);

    debug!(
        symbol,
        child_rsi = ?child.last_value(),
        parent1_rsi = ?parent1.last_value(),
        parent2_rsi = ?parent2.last_value(),
        "oscillators computed"
    );

    align_series(&child, &parent1, &parent2, params.tolerances()).map_err(|source| {
        ScanError::Alignment {
            symbol: symbol.to_string(),
            source,
        }
    })
}

fn build_series(symbol: &str, role: SeriesRole, candles: Vec<Candle>) -> Result<Series, ScanError> {
    Series::new(candles).map_err(|source| ScanError::InvalidSeries {
        symbol: symbol.to_string(),
        role,
        source,
    })
}

/// Indices of `rows` evaluated under `window`.  Earlier rows still serve as
/// lookback history.
///
/// With `after`, rows at or before that timestamp are never evaluated again.
/// `LatestBar` then widens to every row after it, so bars that closed while a
/// cycle was delayed still get evaluated.
pub fn window_range(rows: &[AlignedRow], window: ScanWindow, after: Option<i64>) -> Range<usize> {
    let len = rows.len();
    let base = match window {
        ScanWindow::Full => 0..len,
        ScanWindow::LatestBar => len.saturating_sub(1)..len,
        ScanWindow::LastSession => {
            let Some(last) = rows.last().and_then(|r| session_date(r.timestamp)) else {
                return len..len;
            };
            let start = rows
                .iter()
                .position(|r| session_date(r.timestamp) == Some(last))
                .unwrap_or(len);
            start..len
        }
    };

    let Some(after) = after else {
        return base;
    };
    // Child rows are strictly ascending.
    let first_new = rows.partition_point(|r| r.timestamp <= after);
    let start = match window {
        ScanWindow::LatestBar => first_new,
        ScanWindow::Full | ScanWindow::LastSession => base.start.max(first_new),
    };
    start..len
}

/// UTC date of the session a row belongs to.  Rows are keyed by their close
/// boundary, so a bar closing exactly at midnight still counts for the day it
/// traded in.
fn session_date(ms: i64) -> Option<NaiveDate> {
    Utc.timestamp_millis_opt(ms - 1).single().map(|dt| dt.date_naive())
}

/// Newest row already evaluated, per symbol.
#[derive(Debug, Clone, Default)]
pub struct BarCursor {
    last_evaluated: HashMap<String, i64>,
}

impl BarCursor {
    pub fn after(&self, symbol: &str) -> Option<i64> {
        self.last_evaluated.get(symbol).copied()
    }

    /// Move the cursor forward; it never moves back.
    pub fn advance(&mut self, symbol: &str, timestamp: i64) {
        self.last_evaluated
            .entry(symbol.to_string())
            .and_modify(|t| *t = (*t).max(timestamp))
            .or_insert(timestamp);
    }
}

// =============================================================================
// Scan statistics
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_cycle_duration_ms: u64,
    pub symbols_scanned: usize,
    pub symbols_skipped: usize,
    pub symbols_failed: usize,
    pub last_cycle_signals: usize,
    pub total_signals: u64,
}

/// Per-cycle tally, folded into [`ScanStats`] when the cycle ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub scanned: usize,
    pub skipped: usize,
    pub failed: usize,
    pub signals: usize,
}

impl ScanStats {
    pub fn record_cycle(&mut self, summary: CycleSummary, duration: Duration) {
        self.cycles += 1;
        self.last_cycle_at = Some(Utc::now());
        self.last_cycle_duration_ms = duration.as_millis() as u64;
        self.symbols_scanned = summary.scanned;
        self.symbols_skipped = summary.skipped;
        self.symbols_failed = summary.failed;
        self.last_cycle_signals = summary.signals;
        self.total_signals += summary.signals as u64;
    }
}

// =============================================================================
// Scanner (driver)
// =============================================================================

pub struct Scanner {
    config: RuntimeConfig,
    client: BinanceClient,
    notifier: TelegramNotifier,
    evaluator: ConditionEvaluator,
    emitter: SignalEmitter,
    throttle: Arc<Mutex<ThrottleState>>,
    cursor: Mutex<BarCursor>,
    stats: Arc<RwLock<ScanStats>>,
}

impl Scanner {
    pub fn new(config: RuntimeConfig, client: BinanceClient, notifier: TelegramNotifier) -> Self {
        let evaluator = ConditionEvaluator::from_params(&config.strategy);
        let emitter = SignalEmitter::from_secs(config.strategy.throttle_interval_secs);
        info!(policy = %evaluator.describe(), symbols = config.symbols.len(), "scanner ready");

        Self {
            config,
            client,
            notifier,
            evaluator,
            emitter,
            throttle: Arc::new(Mutex::new(ThrottleState::new())),
            cursor: Mutex::new(BarCursor::default()),
            stats: Arc::new(RwLock::new(ScanStats::default())),
        }
    }

    /// Shared handle for the health endpoint.
    pub fn stats(&self) -> Arc<RwLock<ScanStats>> {
        Arc::clone(&self.stats)
    }

    /// Scan every `scan_interval_secs` until the task is dropped.
    pub async fn run_forever(&self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.scan_interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.run_cycle(self.config.scan_window).await;
        }
    }

    /// One pass over all configured symbols.
    pub async fn run_cycle(&self, window: ScanWindow) -> CycleSummary {
        let started = Instant::now();
        info!(symbols = self.config.symbols.len(), %window, "starting scan cycle");

        let mut summary = CycleSummary::default();
        for symbol in &self.config.symbols {
            match self.scan_symbol(symbol, window).await {
                Ok(ScanOutcome::Evaluated { signals, .. }) => {
                    summary.scanned += 1;
                    summary.signals += self.dispatch(signals).await;
                }
                Ok(ScanOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(symbol = %symbol, error = %e, "symbol scan failed");
                }
            }
        }

        let elapsed = started.elapsed();
        self.stats.write().record_cycle(summary, elapsed);
        info!(
            scanned = summary.scanned,
            skipped = summary.skipped,
            failed = summary.failed,
            signals = summary.signals,
            elapsed_ms = elapsed.as_millis() as u64,
            "scan cycle complete"
        );
        summary
    }

    async fn scan_symbol(&self, symbol: &str, window: ScanWindow) -> Result<ScanOutcome> {
        let data = self.fetch_symbol(symbol).await?;
        let after = self.cursor.lock().after(symbol);
        let outcome = evaluate_symbol(
            symbol,
            data,
            &self.config.strategy,
            &self.evaluator,
            window,
            after,
        )?;

        if let ScanOutcome::Evaluated { last_timestamp, evaluated, .. } = &outcome {
            if *evaluated == 0 {
                debug!(symbol, "no new closed bar since last cycle");
            }
            self.cursor.lock().advance(symbol, *last_timestamp);
        }
        Ok(outcome)
    }

    async fn fetch_symbol(&self, symbol: &str) -> Result<SymbolCandles> {
        let intervals = &self.config.intervals;
        let child = self.fetch_paced(symbol, &intervals.child).await?;
        let parent1 = self.fetch_paced(symbol, &intervals.parent1).await?;
        let parent2 = self.fetch_paced(symbol, &intervals.parent2).await?;
        Ok(SymbolCandles {
            child,
            parent1,
            parent2,
        })
    }

    async fn fetch_paced(&self, symbol: &str, interval: &str) -> Result<Vec<Candle>> {
        let candles = self
            .client
            .get_klines_with_retry(
                symbol,
                interval,
                self.config.kline_limit,
                self.config.closed_candles_only,
                self.config.fetch_retries,
            )
            .await;
        tokio::time::sleep(Duration::from_millis(self.config.request_pacing_ms)).await;
        candles
    }

    /// Throttle and deliver.  Returns the number of signals sent on.
    async fn dispatch(&self, signals: Vec<Signal>) -> usize {
        let admitted = {
            let mut throttle = self.throttle.lock();
            self.emitter.filter(&mut throttle, signals)
        };

        for signal in &admitted {
            info!(
                symbol = %signal.symbol,
                kind = %signal.kind,
                mode = %signal.mode,
                price = signal.price,
                child_rsi = signal.snapshot.child,
                "*** SIGNAL ***"
            );
            if let Err(e) = self.notifier.notify(signal).await {
                error!(symbol = %signal.symbol, error = %e, "failed to deliver signal");
            }
        }
        admitted.len()
    }
}
