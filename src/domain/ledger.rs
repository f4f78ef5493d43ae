//! Fixed-capacity record of closed trades.
//!
//! Appending past capacity evicts the oldest trade, so anything derived from
//! the ledger only sees the most recent `capacity` trades.

use std::collections::VecDeque;

use super::position::Trade;

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeLedger {
    trades: VecDeque<Trade>,
    capacity: usize,
}

impl TradeLedger {
    pub fn new(capacity: usize) -> Self {
        TradeLedger {
            trades: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Append a trade, returning the evicted oldest trade when full.
    pub fn record(&mut self, trade: Trade) -> Option<Trade> {
        if self.capacity == 0 {
            return Some(trade);
        }
        let evicted = if self.trades.len() == self.capacity {
            self.trades.pop_front()
        } else {
            None
        };
        self.trades.push_back(trade);
        evicted
    }

    /// All retained trades, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter()
    }

    /// The most recent `k` trades, oldest first.
    pub fn recent(&self, k: usize) -> Vec<Trade> {
        let skip = self.trades.len().saturating_sub(k);
        self.trades.iter().skip(skip).cloned().collect()
    }

    pub fn pnls(&self) -> Vec<f64> {
        self.trades.iter().map(|t| t.net_pnl_percent).collect()
    }
}

impl Default for TradeLedger {
    fn default() -> Self {
        TradeLedger::new(DEFAULT_CAPACITY)
    }
}
