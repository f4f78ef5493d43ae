//! Performance statistics over the trade ledger.
//!
//! Statistics are recomputed from scratch over whatever the ledger currently
//! retains. They are unweighted and non-annualized, and the drawdown is taken
//! on the cumulative sum of percentage P&L rather than a compounded equity
//! curve.

use serde::{Deserialize, Serialize};

use super::ledger::TradeLedger;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
}

impl PerformanceSummary {
    pub fn compute(ledger: &TradeLedger) -> Self {
        Self::from_pnls(&ledger.pnls())
    }

    pub fn from_pnls(pnls: &[f64]) -> Self {
        if pnls.is_empty() {
            return PerformanceSummary::default();
        }

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;

        for &pnl in pnls {
            if pnl > 0.0 {
                winning_trades += 1;
                total_wins += pnl;
            } else if pnl < 0.0 {
                losing_trades += 1;
                total_losses += pnl;
            }
        }

        let total_trades = pnls.len();
        let total_pnl: f64 = pnls.iter().sum();

        let avg_win = if winning_trades > 0 {
            total_wins / winning_trades as f64
        } else {
            0.0
        };

        let avg_loss = if losing_trades > 0 {
            total_losses / losing_trades as f64
        } else {
            0.0
        };

        let profit_factor = if losing_trades > 0 && total_losses != 0.0 {
            total_wins / total_losses.abs()
        } else {
            0.0
        };

        PerformanceSummary {
            total_trades,
            winning_trades,
            losing_trades,
            total_pnl,
            win_rate: winning_trades as f64 / total_trades as f64 * 100.0,
            avg_win,
            avg_loss,
            profit_factor,
            sharpe_ratio: compute_sharpe(pnls),
            max_drawdown: compute_drawdown(pnls),
        }
    }
}

/// mean / population stddev × sqrt(n); 0 for fewer than two trades or no dispersion.
fn compute_sharpe(pnls: &[f64]) -> f64 {
    if pnls.len() < 2 {
        return 0.0;
    }

    let n = pnls.len() as f64;
    let mean = pnls.iter().sum::<f64>() / n;
    let variance = pnls.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * n.sqrt()
    } else {
        0.0
    }
}

/// Largest gap between the running peak of cumulative P&L and its current value.
fn compute_drawdown(pnls: &[f64]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for &pnl in pnls {
        cumulative += pnl;
        peak = peak.max(cumulative);
        max_dd = max_dd.max(peak - cumulative);
    }

    max_dd
}
