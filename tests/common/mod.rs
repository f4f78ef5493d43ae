#![allow(dead_code)]

use bandtrader::domain::candle::Candle;
use bandtrader::domain::config::EngineConfig;
use bandtrader::domain::engine::Engine;
use bandtrader::domain::error::BandtraderError;
use bandtrader::domain::interval::Interval;
use bandtrader::ports::market_data_port::MarketDataPort;
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory market data whose series can be changed between cycles.
pub struct MockMarketData {
    data: RwLock<HashMap<String, Vec<Candle>>>,
    errors: RwLock<HashMap<String, String>>,
    pub calls: AtomicUsize,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            errors: RwLock::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_candles(self, asset: &str, candles: Vec<Candle>) -> Self {
        self.set_candles(asset, candles);
        self
    }

    pub fn set_error(&self, asset: &str, reason: &str) {
        self.errors
            .write()
            .unwrap()
            .insert(asset.to_string(), reason.to_string());
    }

    pub fn clear_error(&self, asset: &str) {
        self.errors.write().unwrap().remove(asset);
    }

    pub fn set_candles(&self, asset: &str, candles: Vec<Candle>) {
        self.data.write().unwrap().insert(asset.to_string(), candles);
    }

    /// Append one bar closing at `close` after the asset's latest bar.
    pub fn push_close(&self, asset: &str, close: f64) {
        let mut data = self.data.write().unwrap();
        let series = data.entry(asset.to_string()).or_default();
        let timestamp = series
            .last()
            .map(|c| c.timestamp + Duration::hours(1))
            .unwrap_or_else(start_time);
        series.push(candle_at(timestamp, close));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_candles(
        &self,
        asset: &str,
        _interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, BandtraderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.errors.read().unwrap().get(asset) {
            return Err(BandtraderError::FetchFailure {
                asset: asset.to_string(),
                reason: reason.clone(),
            });
        }
        let series = self
            .data
            .read()
            .unwrap()
            .get(asset)
            .cloned()
            .unwrap_or_default();
        let skip = series.len().saturating_sub(limit);
        Ok(series.into_iter().skip(skip).collect())
    }
}

pub fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn candle_at(timestamp: chrono::DateTime<Utc>, close: f64) -> Candle {
    Candle {
        timestamp,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
    }
}

/// Hourly candles with open = high = low = close.
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| candle_at(start_time() + Duration::hours(i as i64), close))
        .collect()
}

/// Closes alternating 100 / 101, which keeps price inside the bands.
pub fn oscillating(n: usize) -> Vec<f64> {
    (0..n).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect()
}

/// 59 quiet bars then a close at `last`, far outside the band.
pub fn breakout_to(last: f64) -> Vec<f64> {
    let mut closes = oscillating(59);
    closes.push(last);
    closes
}

pub fn engine_config(assets: &[&str]) -> EngineConfig {
    EngineConfig {
        assets: assets.iter().map(|a| a.to_string()).collect(),
        ..EngineConfig::default()
    }
}

pub fn make_engine(assets: &[&str], data: Arc<MockMarketData>) -> Engine {
    Engine::new(engine_config(assets), data).unwrap()
}
