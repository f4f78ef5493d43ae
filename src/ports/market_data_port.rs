//! Market data port trait.

use crate::domain::candle::Candle;
use crate::domain::error::BandtraderError;
use crate::domain::interval::Interval;

/// Source of chronological candle histories.
///
/// Implementations are shared across the engine's worker pool, hence the
/// `Send + Sync` bound. Retries and timeouts are the implementation's
/// concern; the engine calls `fetch_candles` once per asset per cycle.
pub trait MarketDataPort: Send + Sync {
    /// Return at most `limit` candles for `asset`, oldest first.
    fn fetch_candles(
        &self,
        asset: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, BandtraderError>;
}
