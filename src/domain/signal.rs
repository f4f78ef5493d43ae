//! Band breakout detection over the latest two bars.

use crate::domain::indicator::Bands;

/// Relative distance from the moving average that counts as "at the mean".
pub const NEAR_MEAN_THRESHOLD: f64 = 0.002;

/// The two-bar window a breakout decision is made from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarWindow {
    pub previous_close: f64,
    pub current_close: f64,
    pub previous_bands: Bands,
    pub current_bands: Bands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Breakout {
    pub new_buy: bool,
    pub new_sell: bool,
    pub near_mean: bool,
}

impl Breakout {
    pub fn detect(window: &BarWindow) -> Self {
        let prev = window.previous_close;
        let curr = window.current_close;
        let sma = window.current_bands.middle;

        Breakout {
            new_buy: prev <= window.previous_bands.upper && curr > window.current_bands.upper,
            new_sell: prev >= window.previous_bands.lower && curr < window.current_bands.lower,
            near_mean: ((curr - sma).abs() / sma) < NEAR_MEAN_THRESHOLD,
        }
    }

    pub fn any(&self) -> bool {
        self.new_buy || self.new_sell
    }
}
