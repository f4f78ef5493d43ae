//! Per-asset snapshot published after every evaluation cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::PositionInfo;

/// Quote currency suffix stripped from symbols for display.
pub const QUOTE_SUFFIX: &str = "USDT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
    Error,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Neutral => "NEUTRAL",
            Signal::Error => "ERROR",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub asset: String,
    pub price: f64,
    pub percent_change: f64,
    pub rsi: f64,
    pub atr: f64,
    pub signal: Signal,
    pub reason: String,
    pub position: Option<PositionInfo>,
}

impl AssetSnapshot {
    /// Placeholder for an asset whose evaluation could not run.
    pub fn error(symbol: &str, reason: impl Into<String>) -> Self {
        AssetSnapshot {
            asset: display_symbol(symbol).to_string(),
            price: 0.0,
            percent_change: 0.0,
            rsi: 0.0,
            atr: 0.0,
            signal: Signal::Error,
            reason: reason.into(),
            position: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.signal == Signal::Error
    }
}

pub fn display_symbol(symbol: &str) -> &str {
    symbol.strip_suffix(QUOTE_SUFFIX).unwrap_or(symbol)
}

pub fn round_dp(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
