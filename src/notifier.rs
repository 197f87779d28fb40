// =============================================================================
// Telegram Notifier — the only place signals are turned into text
// =============================================================================
//
// Messages are sent with `parse_mode = HTML` through the Bot API
// `sendMessage` endpoint.  When the bot token or chat id is missing (or still
// a `your_...` placeholder) the notifier is disabled: it warns once at start-up
// and from then on only logs each signal.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use tracing::{error, info, warn};

use crate::runtime_config::Intervals;
use crate::signals::{Signal, SignalKind, TradeMode};

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Clone)]
struct Credentials {
    bot_token: String,
    chat_id: String,
}

#[derive(Clone)]
pub struct TelegramNotifier {
    credentials: Option<Credentials>,
    intervals: Intervals,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: Option<String>, chat_id: Option<String>, intervals: Intervals) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        let credentials = match (bot_token, chat_id) {
            (Some(bot_token), Some(chat_id))
                if is_configured(&bot_token) && is_configured(&chat_id) =>
            {
                Some(Credentials { bot_token, chat_id })
            }
            _ => {
                warn!("Telegram credentials not configured, signals will only be logged");
                None
            }
        };

        Ok(Self {
            credentials,
            intervals,
            client,
        })
    }

    /// Read `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`.
    pub fn from_env(intervals: Intervals) -> Result<Self> {
        Self::new(
            std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            std::env::var("TELEGRAM_CHAT_ID").ok(),
            intervals,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Deliver one signal.  A disabled notifier logs it and returns `Ok`.
    pub async fn notify(&self, signal: &Signal) -> Result<()> {
        let text = format_signal(signal, &self.intervals);

        let Some(creds) = &self.credentials else {
            info!(
                symbol = %signal.symbol,
                kind = %signal.kind,
                mode = %signal.mode,
                price = signal.price,
                "signal (telegram disabled)"
            );
            return Ok(());
        };

        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, creds.bot_token);
        let payload = serde_json::json!({
            "chat_id": creds.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("POST sendMessage request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(%status, %body, "Telegram rejected alert");
            anyhow::bail!("Telegram sendMessage returned {}: {}", status, body);
        }

        info!(symbol = %signal.symbol, kind = %signal.kind, "Telegram alert sent");
        Ok(())
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("enabled", &self.is_enabled())
            .field("credentials", &"<redacted>")
            .finish()
    }
}

fn is_configured(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.starts_with("your_")
}

// =============================================================================
// Formatting
// =============================================================================

/// Render a signal as a Telegram HTML message.
pub fn format_signal(signal: &Signal, intervals: &Intervals) -> String {
    let (icon, title, action) = match (signal.kind, signal.mode) {
        (SignalKind::Entry, TradeMode::Long) => (
            "🟢",
            "LONG ENTRY",
            "Look for a buy entry above the signal candle high.",
        ),
        (SignalKind::Entry, TradeMode::Short) => (
            "🔴",
            "SHORT ENTRY",
            "Look for a sell entry below the signal candle low.",
        ),
        (SignalKind::Warning, TradeMode::Long) => (
            "⚠️",
            "LONG WARNING",
            "Child momentum is fading against a bullish trend.",
        ),
        (SignalKind::Warning, TradeMode::Short) => (
            "⚠️",
            "SHORT WARNING",
            "Child momentum is rising against a bearish trend.",
        ),
        (SignalKind::Exit, TradeMode::Long) => (
            "🏁",
            "LONG EXIT",
            "Child and parent are both overbought. Consider booking profit.",
        ),
        (SignalKind::Exit, TradeMode::Short) => (
            "🏁",
            "SHORT EXIT",
            "Child and parent are both oversold. Consider booking profit.",
        ),
    };

    format!(
        "{icon} <b>{title} - {symbol}</b>\n\n\
💰 <b>Price:</b> <code>{price:.4}</code>\n\
⏰ <b>Time:</b> <code>{time}</code>\n\n\
📊 <b>RSI</b>\n\
• Child ({child_iv}): <code>{child}</code>\n\
• Parent 1 ({p1_iv}): <code>{p1}</code>\n\
• Parent 2 ({p2_iv}): <code>{p2}</code>\n\n\
⚡ {action}",
        symbol = signal.symbol,
        price = signal.price,
        time = format_timestamp(signal.timestamp),
        child_iv = intervals.child,
        child = format_value(Some(signal.snapshot.child)),
        p1_iv = intervals.parent1,
        p1 = format_value(signal.snapshot.parent1),
        p2_iv = intervals.parent2,
        p2 = format_value(signal.snapshot.parent2),
    )
}

fn format_timestamp(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => ms.to_string(),
    }
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "n/a".to_string(),
    }
}
