//! Per-evaluation indicator bundle computed from one candle history.

use crate::domain::candle::Candle;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::stddev::calculate_stddev;
use crate::domain::indicator::{Bands, IndicatorError, IndicatorSeries};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    pub band_length: usize,
    pub band_width_x100: u32,
    pub rsi_period: usize,
    pub atr_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            band_length: 20,
            band_width_x100: 100,
            rsi_period: 14,
            atr_period: 14,
        }
    }
}

/// Indicator series aligned index-for-index with the candle history.
#[derive(Debug, Clone)]
pub struct IndicatorSnapshot {
    pub sma: IndicatorSeries,
    pub stddev: IndicatorSeries,
    pub bollinger: IndicatorSeries,
    pub rsi: IndicatorSeries,
    pub atr: IndicatorSeries,
}

impl IndicatorSnapshot {
    /// Bands for the bar before the latest and the latest bar.
    pub fn last_two_bands(&self) -> Option<(Bands, Bands)> {
        let n = self.bollinger.len();
        if n < 2 {
            return None;
        }
        Some((self.bollinger.bands_at(n - 2)?, self.bollinger.bands_at(n - 1)?))
    }
}

pub fn compute_indicators(
    bars: &[Candle],
    params: &IndicatorParams,
) -> Result<IndicatorSnapshot, IndicatorError> {
    let bollinger = calculate_bollinger(bars, params.band_length, params.band_width_x100)?;
    Ok(IndicatorSnapshot {
        sma: calculate_sma(bars, params.band_length),
        stddev: calculate_stddev(bars, params.band_length),
        bollinger,
        rsi: calculate_rsi(bars, params.rsi_period),
        atr: calculate_atr(bars, params.atr_period),
    })
}
