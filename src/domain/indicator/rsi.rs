//! RSI (Relative Strength Index) indicator.
//!
//! Average gain and loss are simple rolling means over the last n price
//! changes, not Wilder's exponential smoothing:
//! - change[0] = 0 (no previous close)
//! - avg_gain[i] = mean(max(change, 0) over the window ending at i)
//! - avg_loss[i] = mean(max(-change, 0) over the window ending at i)
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / (avg_loss + 1e-10)))
//!
//! Warmup: first (n-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

const LOSS_EPSILON: f64 = 1e-10;

pub fn calculate_rsi(bars: &[Candle], period: usize) -> IndicatorSeries {
    let mut gains = Vec::with_capacity(bars.len());
    let mut losses = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let change = if i == 0 {
            0.0
        } else {
            bar.close - bars[i - 1].close
        };
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut values = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let valid = period > 0 && i + 1 >= period;
        let rsi = if valid {
            let start = i + 1 - period;
            let avg_gain = gains[start..=i].iter().sum::<f64>() / period as f64;
            let avg_loss = losses[start..=i].iter().sum::<f64>() / period as f64;
            let rs = avg_gain / (avg_loss + LOSS_EPSILON);
            100.0 - (100.0 / (1.0 + rs))
        } else {
            0.0
        };

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: IndicatorValue::Simple(rsi),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}
