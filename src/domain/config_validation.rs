//! Configuration validation.
//!
//! Validates the `[engine]`, `[market_data]` and `[web]` sections and builds
//! their typed configs. Missing keys fall back to the documented defaults;
//! present but out-of-range values are rejected.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::config::{EngineConfig, MarketDataConfig, Provider, WebConfig};
use crate::domain::error::BandtraderError;
use crate::domain::indicator_helpers::IndicatorParams;
use crate::domain::interval::Interval;
use crate::domain::universe::{default_assets, parse_assets};
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "engine";
const MARKET_DATA: &str = "market_data";
const WEB: &str = "web";

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, BandtraderError> {
    let defaults = EngineConfig::default();

    let assets = validate_assets(config)?;
    let interval = validate_interval(config)?;

    let band_length = validate_count(config, "band_length", defaults.indicators.band_length, 2)?;
    let band_width_x100 = validate_band_width(config)?;
    let rsi_period = validate_count(config, "rsi_period", defaults.indicators.rsi_period, 1)?;
    let atr_period = validate_count(config, "atr_period", defaults.indicators.atr_period, 1)?;
    let fee_rate = validate_fee_rate(config, defaults.fee_rate)?;
    let ledger_capacity = validate_count(config, "ledger_capacity", defaults.ledger_capacity, 1)?;
    let min_bars = validate_count(config, "min_bars", defaults.min_bars, 2)?;
    let history_limit = validate_count(config, "history_limit", defaults.history_limit, 2)?;
    let workers = validate_count(config, "workers", defaults.workers, 1)?;

    if min_bars <= band_length {
        return Err(invalid(
            "min_bars",
            "min_bars must exceed band_length so two band values exist",
        ));
    }
    if history_limit < min_bars {
        return Err(invalid("history_limit", "history_limit must be at least min_bars"));
    }

    Ok(EngineConfig {
        assets,
        interval,
        indicators: IndicatorParams {
            band_length,
            band_width_x100,
            rsi_period,
            atr_period,
        },
        fee_rate,
        ledger_capacity,
        min_bars,
        history_limit,
        workers,
    })
}

pub fn build_market_data_config(
    config: &dyn ConfigPort,
) -> Result<MarketDataConfig, BandtraderError> {
    let defaults = MarketDataConfig::default();

    let provider = match config.get_string(MARKET_DATA, "provider").as_deref() {
        None | Some("csv") => Provider::Csv,
        Some("binance") => Provider::Binance,
        Some(other) => {
            return Err(invalid_in(
                MARKET_DATA,
                "provider",
                &format!("unknown provider '{other}', expected csv or binance"),
            ));
        }
    };

    let csv_dir = config
        .get_string(MARKET_DATA, "csv_dir")
        .map(PathBuf::from)
        .unwrap_or(defaults.csv_dir);

    let base_url = config
        .get_string(MARKET_DATA, "base_url")
        .unwrap_or(defaults.base_url);
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(invalid_in(
            MARKET_DATA,
            "base_url",
            "base_url must start with http:// or https://",
        ));
    }

    let max_attempts = config.get_int(MARKET_DATA, "max_attempts", defaults.max_attempts as i64);
    if !(1..=10).contains(&max_attempts) {
        return Err(invalid_in(
            MARKET_DATA,
            "max_attempts",
            "max_attempts must be between 1 and 10",
        ));
    }

    let backoff_ms = config.get_int(
        MARKET_DATA,
        "backoff_ms",
        defaults.backoff.as_millis() as i64,
    );
    if backoff_ms < 0 {
        return Err(invalid_in(
            MARKET_DATA,
            "backoff_ms",
            "backoff_ms must not be negative",
        ));
    }

    let timeout_secs = config.get_int(
        MARKET_DATA,
        "timeout_secs",
        defaults.timeout.as_secs() as i64,
    );
    if timeout_secs < 1 {
        return Err(invalid_in(
            MARKET_DATA,
            "timeout_secs",
            "timeout_secs must be at least 1",
        ));
    }

    Ok(MarketDataConfig {
        provider,
        csv_dir,
        base_url: base_url.trim_end_matches('/').to_string(),
        max_attempts: max_attempts as u32,
        backoff: Duration::from_millis(backoff_ms as u64),
        timeout: Duration::from_secs(timeout_secs as u64),
    })
}

pub fn build_web_config(config: &dyn ConfigPort) -> Result<WebConfig, BandtraderError> {
    let defaults = WebConfig::default();

    let listen = config.get_string(WEB, "listen").unwrap_or(defaults.listen);
    if listen.parse::<std::net::SocketAddr>().is_err() {
        return Err(invalid_in(
            WEB,
            "listen",
            "listen must be a socket address such as 127.0.0.1:8080",
        ));
    }

    let refresh_secs = config.get_int(WEB, "refresh_secs", defaults.refresh_secs as i64);
    if refresh_secs < 1 {
        return Err(invalid_in(
            WEB,
            "refresh_secs",
            "refresh_secs must be at least 1",
        ));
    }

    Ok(WebConfig {
        listen,
        refresh_secs: refresh_secs as u64,
    })
}

fn invalid(key: &str, reason: &str) -> BandtraderError {
    invalid_in(SECTION, key, reason)
}

fn invalid_in(section: &str, key: &str, reason: &str) -> BandtraderError {
    BandtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_assets(config: &dyn ConfigPort) -> Result<Vec<String>, BandtraderError> {
    match config.get_string(SECTION, "assets") {
        None => Ok(default_assets()),
        Some(list) => parse_assets(&list).map_err(|e| invalid("assets", &e.to_string())),
    }
}

fn validate_interval(config: &dyn ConfigPort) -> Result<Interval, BandtraderError> {
    match config.get_string(SECTION, "interval") {
        None => Ok(Interval::default()),
        Some(s) => s.parse::<Interval>().map_err(|e| invalid("interval", &e.to_string())),
    }
}

fn validate_count(
    config: &dyn ConfigPort,
    key: &str,
    default: usize,
    minimum: usize,
) -> Result<usize, BandtraderError> {
    let value = config.get_int(SECTION, key, default as i64);
    if value < minimum as i64 {
        return Err(invalid(key, &format!("{key} must be at least {minimum}")));
    }
    Ok(value as usize)
}

/// Band multiplier in hundredths; finer values are rejected rather than rounded.
fn validate_band_width(config: &dyn ConfigPort) -> Result<u32, BandtraderError> {
    let value = config.get_double(SECTION, "band_width", 1.0);
    if !value.is_finite() || !(0.01..=10.0).contains(&value) {
        return Err(invalid("band_width", "band_width must be between 0.01 and 10"));
    }
    let hundredths = value * 100.0;
    if (hundredths - hundredths.round()).abs() > 1e-6 {
        return Err(invalid("band_width", "band_width must be a multiple of 0.01"));
    }
    Ok(hundredths.round() as u32)
}

fn validate_fee_rate(config: &dyn ConfigPort, default: f64) -> Result<f64, BandtraderError> {
    let value = config.get_double(SECTION, "fee_rate", default);
    if !value.is_finite() || !(0.0..0.5).contains(&value) {
        return Err(invalid("fee_rate", "fee_rate must be between 0 and 0.5"));
    }
    Ok(value)
}
