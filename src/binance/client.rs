// =============================================================================
// Binance Market Data Client — public kline endpoint
// =============================================================================
//
// Only unauthenticated market data is used, so there is no API key and no
// request signing.  Every fetch can optionally drop the still-forming candle
// (close time in the future) and is retried with a linear back-off before the
// caller gives up on the symbol.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::market_data::Candle;

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Back-off step between retries; attempt `n` sleeps `n * RETRY_STEP`.
const RETRY_STEP: Duration = Duration::from_millis(500);

/// Binance REST client for public market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at another host (testnet, proxy, mock server).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(%base_url, "BinanceClient initialised");

        Ok(Self { base_url, client })
    }

    /// GET /api/v3/klines.
    ///
    /// Array indices in the response:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, ...
    ///
    /// With `closed_only`, candles whose close time is after `now` are dropped.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        closed_only: bool,
    ) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /api/v3/klines returned {}: {}", status, body);
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let candles = parse_klines(&body, closed_only.then_some(now_ms))?;

        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    /// [`get_klines`](Self::get_klines) with up to `attempts` tries.
    ///
    /// Returns the last error once every attempt has failed.
    pub async fn get_klines_with_retry(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        closed_only: bool,
        attempts: u32,
    ) -> Result<Vec<Candle>> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.get_klines(symbol, interval, limit, closed_only).await {
                Ok(candles) => return Ok(candles),
                Err(e) if attempt < attempts => {
                    warn!(
                        symbol,
                        interval,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "kline fetch failed, retrying"
                    );
                    tokio::time::sleep(RETRY_STEP * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "klines {symbol}/{interval} failed after {attempts} attempts"
                    )))
                }
            }
        }
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Response parsing
// -----------------------------------------------------------------------------

/// Parse Binance's array-of-arrays kline payload.
///
/// Candles are keyed by their close boundary (`closeTime + 1`, i.e. the next
/// bar's open time).  Entries shorter than 7 elements are skipped with a
/// warning.  When `closed_before` is set, candles closing after it are
/// dropped.
pub fn parse_klines(body: &serde_json::Value, closed_before: Option<i64>) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;

        if arr.len() < 7 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = arr[0].as_i64().context("kline open time is not an integer")?;
        let close_time = arr[6].as_i64().context("kline close time is not an integer")?;
        if closed_before.is_some_and(|now| close_time > now) {
            debug!(open_time, close_time, "dropping forming candle");
            continue;
        }

        candles.push(Candle::new(
            close_time + 1,
            parse_str_f64(&arr[1])?,
            parse_str_f64(&arr[2])?,
            parse_str_f64(&arr[3])?,
            parse_str_f64(&arr[4])?,
            parse_str_f64(&arr[5])?,
        ));
    }
    Ok(candles)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kline(open_time: i64, close: &str) -> serde_json::Value {
        json!([
            open_time, "100.0", "102.5", "99.5", close, "12.5",
            open_time + 299_999, "1250.0", 42, "6.0", "600.0", "0"
        ])
    }

    #[test]
    fn parses_string_encoded_prices() {
        let body = json!([kline(0, "101.25"), kline(300_000, "100.75")]);
        let candles = parse_klines(&body, None).unwrap();
        assert_eq!(candles.len(), 2);
        // Keyed by close boundary.
        assert_eq!(candles[0].timestamp, 300_000);
        assert!((candles[0].close - 101.25).abs() < 1e-10);
        assert!((candles[0].high - 102.5).abs() < 1e-10);
        assert!((candles[1].volume - 12.5).abs() < 1e-10);
        assert_eq!(candles[1].timestamp, 600_000);
    }

    #[test]
    fn forming_candle_is_dropped() {
        let body = json!([kline(0, "101"), kline(300_000, "102")]);
        // Second candle closes at 599_999.
        let candles = parse_klines(&body, Some(599_998)).unwrap();
        assert_eq!(candles.len(), 1);

        let candles = parse_klines(&body, Some(599_999)).unwrap();
        assert_eq!(candles.len(), 2);
    }

    #[test]
    fn short_entries_are_skipped() {
        let body = json!([[0, "1", "1", "1"], kline(300_000, "1")]);
        let candles = parse_klines(&body, None).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 600_000);
    }

    #[test]
    fn non_array_body_is_an_error() {
        let body = json!({"code": -1121, "msg": "Invalid symbol."});
        assert!(parse_klines(&body, None).is_err());
    }

    #[test]
    fn bad_price_is_an_error() {
        let body = json!([[0, "abc", "1", "1", "1", "1", 299_999]]);
        assert!(parse_klines(&body, None).is_err());
    }

    #[test]
    fn numeric_prices_are_accepted() {
        assert!((parse_str_f64(&json!(3.5)).unwrap() - 3.5).abs() < 1e-10);
        assert!((parse_str_f64(&json!("3.5")).unwrap() - 3.5).abs() < 1e-10);
        assert!(parse_str_f64(&json!(null)).is_err());
    }
}
