// =============================================================================
// Runtime Configuration — scanner settings with per-field defaults
// =============================================================================
//
// Every tunable lives here: which symbols to scan, which intervals make up the
// parent/child stack, how the driver paces its requests, and the full
// threshold set of the condition evaluator.
//
// All fields carry `#[serde(default)]` so that adding new fields never breaks
// loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{ensure, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::alignment::Tolerances;

/// Upper bound for a parent staleness tolerance (one week).
const MAX_TOLERANCE_MINS: i64 = 7 * 24 * 60;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "XRPUSDT".to_string(),
        "SOLUSDT".to_string(),
    ]
}

fn default_kline_limit() -> u32 {
    300
}

fn default_scan_interval_secs() -> u64 {
    300
}

fn default_request_pacing_ms() -> u64 {
    400
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_period() -> usize {
    14
}

fn default_threshold_long() -> f64 {
    60.0
}

fn default_threshold_short() -> f64 {
    40.0
}

fn default_support_low() -> f64 {
    38.0
}

fn default_support_high() -> f64 {
    40.0
}

fn default_resistance() -> f64 {
    60.0
}

fn default_parent_lookback() -> usize {
    10
}

fn default_child_lookback() -> usize {
    5
}

fn default_parent_tolerance_1_mins() -> i64 {
    60
}

fn default_parent_tolerance_2_mins() -> i64 {
    15
}

fn default_throttle_interval_secs() -> u64 {
    900
}

fn default_pivot_long_cap() -> f64 {
    55.0
}

fn default_pivot_short_floor() -> f64 {
    45.0
}

fn default_warning_long_level() -> f64 {
    42.0
}

fn default_warning_short_level() -> f64 {
    58.0
}

// =============================================================================
// Enumerations
// =============================================================================

/// How the parent trend mode is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParentPolicyKind {
    /// Both parents beyond the threshold on the current bar.
    #[default]
    Strict,
    /// Parent1 on the current bar, parent2 anywhere in the trailing lookback.
    Relaxed,
}

/// How the child entry trigger is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChildPolicyKind {
    /// Support/resistance dip with a directional confirmation candle.
    #[default]
    DipConfirm,
    /// Three-bar oscillator pivot.
    SwingPivot,
}

/// Which aligned rows a scan evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanWindow {
    /// Only the most recent bar (live scanning).
    #[default]
    LatestBar,
    /// Every bar on the UTC date of the most recent bar.
    LastSession,
    /// Every bar.
    Full,
}

impl std::fmt::Display for ScanWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LatestBar => write!(f, "latest_bar"),
            Self::LastSession => write!(f, "last_session"),
            Self::Full => write!(f, "full"),
        }
    }
}

// =============================================================================
// Intervals
// =============================================================================

/// Kline intervals for the parent1 / parent2 / child stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervals {
    pub parent1: String,
    pub parent2: String,
    pub child: String,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            parent1: "1h".to_string(),
            parent2: "15m".to_string(),
            child: "5m".to_string(),
        }
    }
}

// =============================================================================
// StrategyParams
// =============================================================================

/// Thresholds and policy selection for the condition evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Oscillator window length.
    #[serde(default = "default_period")]
    pub period: usize,

    /// Bullish parent threshold (strictly above).
    #[serde(default = "default_threshold_long")]
    pub threshold_long: f64,

    /// Bearish parent threshold (strictly below).
    #[serde(default = "default_threshold_short")]
    pub threshold_short: f64,

    /// Child support band for long dips, inclusive both ends.
    #[serde(default = "default_support_low")]
    pub support_low: f64,
    #[serde(default = "default_support_high")]
    pub support_high: f64,

    /// Child must fall back below this after a rally (short dips).
    #[serde(default = "default_resistance")]
    pub resistance_low: f64,
    /// Child rally level, reached at or above (short dips).
    #[serde(default = "default_resistance")]
    pub resistance_high: f64,

    /// Bars before the current one scanned by the relaxed parent policy.
    #[serde(default = "default_parent_lookback")]
    pub parent_lookback: usize,

    /// Bars before the current one scanned by the dip-confirm trigger.
    #[serde(default = "default_child_lookback")]
    pub child_lookback: usize,

    /// Staleness tolerance for parent1 bars, minutes.
    #[serde(default = "default_parent_tolerance_1_mins")]
    pub parent_tolerance_1_mins: i64,

    /// Staleness tolerance for parent2 bars, minutes.
    #[serde(default = "default_parent_tolerance_2_mins")]
    pub parent_tolerance_2_mins: i64,

    /// Minimum gap between repeated WARNING/EXIT alerts per symbol.
    #[serde(default = "default_throttle_interval_secs")]
    pub throttle_interval_secs: u64,

    #[serde(default)]
    pub parent_policy: ParentPolicyKind,

    #[serde(default)]
    pub child_policy: ChildPolicyKind,

    /// Long pivot low must sit strictly below this.
    #[serde(default = "default_pivot_long_cap")]
    pub pivot_long_cap: f64,

    /// Short pivot high must sit strictly above this.
    #[serde(default = "default_pivot_short_floor")]
    pub pivot_short_floor: f64,

    /// Bullish early warning when the child is at or below this.
    #[serde(default = "default_warning_long_level")]
    pub warning_long_level: f64,

    /// Bearish early warning when the child is at or above this.
    #[serde(default = "default_warning_short_level")]
    pub warning_short_level: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            period: default_period(),
            threshold_long: default_threshold_long(),
            threshold_short: default_threshold_short(),
            support_low: default_support_low(),
            support_high: default_support_high(),
            resistance_low: default_resistance(),
            resistance_high: default_resistance(),
            parent_lookback: default_parent_lookback(),
            child_lookback: default_child_lookback(),
            parent_tolerance_1_mins: default_parent_tolerance_1_mins(),
            parent_tolerance_2_mins: default_parent_tolerance_2_mins(),
            throttle_interval_secs: default_throttle_interval_secs(),
            parent_policy: ParentPolicyKind::default(),
            child_policy: ChildPolicyKind::default(),
            pivot_long_cap: default_pivot_long_cap(),
            pivot_short_floor: default_pivot_short_floor(),
            warning_long_level: default_warning_long_level(),
            warning_short_level: default_warning_short_level(),
        }
    }
}

impl StrategyParams {
    pub fn tolerances(&self) -> Tolerances {
        Tolerances {
            parent1: Duration::minutes(self.parent_tolerance_1_mins),
            parent2: Duration::minutes(self.parent_tolerance_2_mins),
        }
    }

    /// Reject threshold sets that would make the evaluator meaningless.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.period > 0, "period must be positive");
        ensure!(
            self.threshold_short < self.threshold_long,
            "threshold_short ({}) must be below threshold_long ({})",
            self.threshold_short,
            self.threshold_long
        );
        ensure!(
            self.support_low <= self.support_high,
            "support_low ({}) must not exceed support_high ({})",
            self.support_low,
            self.support_high
        );
        ensure!(
            self.resistance_low <= self.resistance_high,
            "resistance_low ({}) must not exceed resistance_high ({})",
            self.resistance_low,
            self.resistance_high
        );
        for (name, mins) in [
            ("parent_tolerance_1_mins", self.parent_tolerance_1_mins),
            ("parent_tolerance_2_mins", self.parent_tolerance_2_mins),
        ] {
            ensure!(
                (0..=MAX_TOLERANCE_MINS).contains(&mins),
                "{name} ({mins}) must be within 0..={MAX_TOLERANCE_MINS}"
            );
        }
        Ok(())
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Universe -----------------------------------------------------------

    /// Symbols scanned every cycle.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    #[serde(default)]
    pub intervals: Intervals,

    // --- Driver -------------------------------------------------------------

    /// Candles requested per interval.
    #[serde(default = "default_kline_limit")]
    pub kline_limit: u32,

    /// Seconds between scan cycles.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Sleep between consecutive data requests.
    #[serde(default = "default_request_pacing_ms")]
    pub request_pacing_ms: u64,

    /// Attempts per kline request before the symbol is skipped.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    #[serde(default)]
    pub scan_window: ScanWindow,

    /// Drop the still-forming candle of every interval.
    #[serde(default = "default_true")]
    pub closed_candles_only: bool,

    // --- Strategy -----------------------------------------------------------

    #[serde(default)]
    pub strategy: StrategyParams,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            intervals: Intervals::default(),
            kline_limit: default_kline_limit(),
            scan_interval_secs: default_scan_interval_secs(),
            request_pacing_ms: default_request_pacing_ms(),
            fetch_retries: default_fetch_retries(),
            scan_window: ScanWindow::default(),
            closed_candles_only: true,
            strategy: StrategyParams::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            scan_window = %config.scan_window,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Apply `SCANNER_SYMBOLS` (comma separated) when set.
    pub fn apply_symbol_override(&mut self, raw: Option<String>) {
        if let Some(syms) = raw {
            let parsed: Vec<String> = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.symbols = parsed;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.symbols.is_empty(), "at least one symbol is required");
        ensure!(self.fetch_retries > 0, "fetch_retries must be at least 1");
        self.strategy
            .validate()
            .context("invalid strategy parameters")
    }
}
