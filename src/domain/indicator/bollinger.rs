//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the sample standard deviation (divides by N-1).
//!
//! Default parameters: period=20, multiplier=1.0
//! Warmup: first (period-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{
    IndicatorError, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, mean_close,
    sample_stddev_close,
};

pub fn calculate_bollinger(
    bars: &[Candle],
    period: usize,
    width_x100: u32,
) -> Result<IndicatorSeries, IndicatorError> {
    if period < 2 {
        return Err(IndicatorError::InvalidPeriod(period));
    }
    if bars.len() < period {
        return Err(IndicatorError::InsufficientData {
            bars: bars.len(),
            required: period,
        });
    }

    let mut values = Vec::with_capacity(bars.len());
    let warmup = period - 1;
    let mult = width_x100 as f64 / 100.0;

    for (i, bar) in bars.iter().enumerate() {
        let valid = i >= warmup;

        let (upper, middle, lower) = if valid {
            let window = &bars[i + 1 - period..=i];
            let middle_val = mean_close(window);
            let stddev = sample_stddev_close(window, middle_val);
            (
                middle_val + mult * stddev,
                middle_val,
                middle_val - mult * stddev,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            },
        });
    }

    Ok(IndicatorSeries {
        indicator_type: IndicatorType::Bollinger { period, width_x100 },
        values,
    })
}
