//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::indicator_helpers::IndicatorParams;
use crate::domain::interval::Interval;
use crate::domain::ledger;
use crate::domain::universe::default_assets;

pub const DEFAULT_FEE_RATE: f64 = 0.001;
pub const DEFAULT_MIN_BARS: usize = 50;
pub const DEFAULT_HISTORY_LIMIT: usize = 250;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Ordered asset universe.
    pub assets: Vec<String>,
    pub interval: Interval,
    pub indicators: IndicatorParams,
    pub fee_rate: f64,
    pub ledger_capacity: usize,
    /// Histories shorter than this produce an `ERROR` snapshot.
    pub min_bars: usize,
    /// Number of candles requested per asset per cycle.
    pub history_limit: usize,
    /// Size of the per-asset worker pool.
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            assets: default_assets(),
            interval: Interval::OneHour,
            indicators: IndicatorParams::default(),
            fee_rate: DEFAULT_FEE_RATE,
            ledger_capacity: ledger::DEFAULT_CAPACITY,
            min_bars: DEFAULT_MIN_BARS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Csv,
    Binance,
}

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Where candles come from and how hard to try.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataConfig {
    pub provider: Provider,
    pub csv_dir: PathBuf,
    pub base_url: String,
    pub max_attempts: u32,
    /// Base delay of the exponential backoff after a rate-limit response.
    pub backoff: Duration,
    pub timeout: Duration,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        MarketDataConfig {
            provider: Provider::Csv,
            csv_dir: PathBuf::from("data"),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_attempts: 3,
            backoff: Duration::from_millis(1000),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebConfig {
    pub listen: String,
    /// Seconds between background cycles.
    pub refresh_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        WebConfig {
            listen: "127.0.0.1:8080".to_string(),
            refresh_secs: 60,
        }
    }
}
