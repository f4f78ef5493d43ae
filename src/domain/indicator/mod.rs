//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values aligned with its candles
//!
//! Every calculation returns one point per input candle. Points inside the
//! warm-up window carry `valid == false`.

pub mod atr;
pub mod bollinger;
pub mod rsi;
pub mod sma;
pub mod stddev;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndicatorError {
    #[error("need at least {required} bars, have {bars}")]
    InsufficientData { bars: usize, required: usize },

    #[error("invalid period {0}")]
    InvalidPeriod(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger { upper: f64, middle: f64, lower: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Stddev(usize),
    Rsi(usize),
    Atr(usize),
    Bollinger { period: usize, width_x100: u32 },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

/// Upper, middle and lower band at one index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The scalar value at `index`, if the point is past warm-up.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }

    /// The band triple at `index`, if the point is past warm-up.
    pub fn bands_at(&self, index: usize) -> Option<Bands> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value:
                    IndicatorValue::Bollinger {
                        upper,
                        middle,
                        lower,
                    },
                ..
            }) => Some(Bands {
                upper: *upper,
                middle: *middle,
                lower: *lower,
            }),
            _ => None,
        }
    }

    pub fn last_simple(&self) -> Option<f64> {
        self.values.len().checked_sub(1).and_then(|i| self.simple_at(i))
    }
}

/// Mean of the closing prices in `window`.
pub(crate) fn mean_close(window: &[crate::domain::candle::Candle]) -> f64 {
    window.iter().map(|c| c.close).sum::<f64>() / window.len() as f64
}

/// Sample standard deviation (n - 1 denominator) of the closing prices in `window`.
pub(crate) fn sample_stddev_close(window: &[crate::domain::candle::Candle], mean: f64) -> f64 {
    let n = window.len();
    if n < 2 {
        return f64::NAN;
    }
    let sum_sq: f64 = window
        .iter()
        .map(|c| {
            let diff = c.close - mean;
            diff * diff
        })
        .sum();
    (sum_sq / (n - 1) as f64).sqrt()
}
