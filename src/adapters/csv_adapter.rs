//! CSV file market data adapter.
//!
//! Reads `<dir>/<ASSET>_<interval>.csv` with the header
//! `timestamp,open,high,low,close,volume`, timestamps in epoch milliseconds.

use crate::domain::candle::{Candle, retain_recent};
use crate::domain::error::BandtraderError;
use crate::domain::interval::Interval;
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, asset: &str, interval: Interval) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", asset, interval))
    }
}

fn parse_field(
    record: &csv::StringRecord,
    index: usize,
    column: &str,
    asset: &str,
) -> Result<f64, BandtraderError> {
    let raw = record.get(index).ok_or_else(|| BandtraderError::FetchFailure {
        asset: asset.to_string(),
        reason: format!("missing {} column", column),
    })?;
    raw.trim().parse().map_err(|e| BandtraderError::FetchFailure {
        asset: asset.to_string(),
        reason: format!("invalid {} value '{}': {}", column, raw, e),
    })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_candles(
        &self,
        asset: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, BandtraderError> {
        let path = self.csv_path(asset, interval);
        let content = fs::read_to_string(&path).map_err(|e| BandtraderError::FetchFailure {
            asset: asset.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| BandtraderError::FetchFailure {
                asset: asset.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let millis = record
                .get(0)
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| BandtraderError::FetchFailure {
                    asset: asset.to_string(),
                    reason: "missing or invalid timestamp column".into(),
                })?;
            let timestamp = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
                BandtraderError::FetchFailure {
                    asset: asset.to_string(),
                    reason: format!("timestamp out of range: {}", millis),
                }
            })?;

            candles.push(Candle {
                timestamp,
                open: parse_field(&record, 1, "open", asset)?,
                high: parse_field(&record, 2, "high", asset)?,
                low: parse_field(&record, 3, "low", asset)?,
                close: parse_field(&record, 4, "close", asset)?,
                volume: parse_field(&record, 5, "volume", asset)?,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(retain_recent(candles, limit))
    }
}
