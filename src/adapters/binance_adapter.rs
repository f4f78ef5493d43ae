//! Binance public klines adapter.
//!
//! Fetches `/api/v3/klines` with a blocking client. Rate-limit responses
//! (HTTP 429) back off exponentially; transport and other HTTP failures
//! pause for the base delay before the next attempt.

use crate::domain::candle::{Candle, retain_recent};
use crate::domain::config::MarketDataConfig;
use crate::domain::error::BandtraderError;
use crate::domain::interval::Interval;
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

/// Attempt budget and backoff schedule for one fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after a rate-limited attempt `attempt` (zero-based).
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Delay after a transport or HTTP failure.
    pub fn failure_delay(&self) -> Duration {
        self.base_delay
    }
}

pub struct BinanceAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl BinanceAdapter {
    pub fn new(config: &MarketDataConfig) -> Result<Self, BandtraderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("bandtrader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BandtraderError::ConfigInvalid {
                section: "market_data".to_string(),
                key: "provider".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                base_delay: config.backoff,
            },
        })
    }

    fn klines_url(&self) -> String {
        format!("{}/api/v3/klines", self.base_url)
    }

    fn fetch_with_retry(
        &self,
        asset: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, BandtraderError> {
        let url = self.klines_url();
        let limit = limit.to_string();
        let mut last_error = String::from("no attempts made");

        for attempt in 0..self.retry.max_attempts {
            let is_last = attempt + 1 == self.retry.max_attempts;
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("symbol", asset),
                    ("interval", interval.as_str()),
                    ("limit", limit.as_str()),
                ])
                .send();

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = "rate limited".to_string();
                        let delay = self.retry.rate_limit_delay(attempt);
                        tracing::warn!(asset, attempt, ?delay, "rate limited, backing off");
                        if !is_last {
                            std::thread::sleep(delay);
                        }
                        continue;
                    }

                    if !status.is_success() {
                        last_error = format!("HTTP {status}");
                    } else {
                        match resp.json::<Vec<Vec<Value>>>() {
                            Ok(rows) if !rows.is_empty() => return parse_klines(asset, &rows),
                            Ok(_) => last_error = "empty kline response".to_string(),
                            Err(e) => last_error = format!("failed to decode klines: {e}"),
                        }
                    }
                }
                Err(e) => last_error = e.to_string(),
            }

            tracing::warn!(asset, attempt, error = %last_error, "kline fetch failed");
            if !is_last {
                std::thread::sleep(self.retry.failure_delay());
            }
        }

        Err(BandtraderError::FetchFailure {
            asset: asset.to_string(),
            reason: last_error,
        })
    }
}

impl MarketDataPort for BinanceAdapter {
    fn fetch_candles(
        &self,
        asset: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, BandtraderError> {
        let candles = self.fetch_with_retry(asset, interval, limit)?;
        Ok(retain_recent(candles, limit))
    }
}

/// Decode kline rows: `[open_time_ms, "open", "high", "low", "close", "volume", ...]`.
pub fn parse_klines(asset: &str, rows: &[Vec<Value>]) -> Result<Vec<Candle>, BandtraderError> {
    let malformed = |reason: String| BandtraderError::FetchFailure {
        asset: asset.to_string(),
        reason,
    };

    let mut candles = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.len() < 6 {
            return Err(malformed(format!("kline {i} has {} fields", row.len())));
        }
        let millis = row[0]
            .as_i64()
            .ok_or_else(|| malformed(format!("kline {i} has no open time")))?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| malformed(format!("kline {i} open time out of range")))?;

        let number = |idx: usize, column: &str| -> Result<f64, BandtraderError> {
            let parsed = match &row[idx] {
                Value::String(s) => s.parse::<f64>().ok(),
                Value::Number(n) => n.as_f64(),
                _ => None,
            };
            parsed.ok_or_else(|| malformed(format!("kline {i} has invalid {column}")))
        };

        candles.push(Candle {
            timestamp,
            open: number(1, "open")?,
            high: number(2, "high")?,
            low: number(3, "low")?,
            close: number(4, "close")?,
            volume: number(5, "volume")?,
        });
    }

    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}
