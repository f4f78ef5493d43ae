//! Evaluation cycle.
//!
//! An [`Engine`] owns every piece of mutable trading state (per-asset
//! snapshots, open positions, the trade ledger and its performance summary)
//! as one immutable [`EngineState`] batch. A cycle clones the current batch,
//! evaluates every asset against the copy and swaps the result in with a
//! single write, so readers only ever see whole cycles.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::domain::candle::{Candle, retain_recent};
use crate::domain::config::EngineConfig;
use crate::domain::error::BandtraderError;
use crate::domain::indicator_helpers::{IndicatorParams, compute_indicators};
use crate::domain::interval::Interval;
use crate::domain::ledger::TradeLedger;
use crate::domain::metrics::PerformanceSummary;
use crate::domain::position::{Position, PositionMachine, Trade};
use crate::domain::signal::{BarWindow, Breakout};
use crate::domain::snapshot::{AssetSnapshot, display_symbol, round_dp};
use crate::ports::market_data_port::MarketDataPort;

/// RSI reported when the series has no valid value yet.
const NEUTRAL_RSI: f64 = 50.0;

/// One published batch of engine state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineState {
    /// Completed cycles since start.
    pub cycle: u64,
    pub interval: Interval,
    pub updated_at: Option<DateTime<Utc>>,
    /// Latest snapshot per configured asset symbol.
    pub snapshots: BTreeMap<String, AssetSnapshot>,
    #[serde(skip)]
    pub positions: HashMap<String, Position>,
    #[serde(skip)]
    pub ledger: TradeLedger,
    pub performance: PerformanceSummary,
}

impl EngineState {
    fn empty(config: &EngineConfig) -> Self {
        EngineState {
            cycle: 0,
            interval: config.interval,
            updated_at: None,
            snapshots: BTreeMap::new(),
            positions: HashMap::new(),
            ledger: TradeLedger::new(config.ledger_capacity),
            performance: PerformanceSummary::default(),
        }
    }
}

/// Result of evaluating one asset, merged back in universe order.
struct AssetOutcome {
    asset: String,
    snapshot: AssetSnapshot,
    position: Option<Position>,
    closed: Option<Trade>,
}

/// Everything the position logic needs from one candle history.
struct MarketView {
    window: BarWindow,
    percent_change: f64,
    rsi: Option<f64>,
    atr: Option<f64>,
}

pub struct Engine {
    config: EngineConfig,
    market_data: Arc<dyn MarketDataPort>,
    state: RwLock<Arc<EngineState>>,
    cycle_lock: Mutex<()>,
    pool: Option<rayon::ThreadPool>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        market_data: Arc<dyn MarketDataPort>,
    ) -> Result<Self, BandtraderError> {
        let pool = if config.workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .thread_name(|i| format!("bandtrader-worker-{i}"))
                .build()
                .map_err(|e| BandtraderError::ConfigInvalid {
                    section: "engine".to_string(),
                    key: "workers".to_string(),
                    reason: e.to_string(),
                })?;
            Some(pool)
        } else {
            None
        };

        let state = Arc::new(EngineState::empty(&config));
        Ok(Engine {
            config,
            market_data,
            state: RwLock::new(state),
            cycle_lock: Mutex::new(()),
            pool,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The most recently published state batch.
    pub fn state(&self) -> Arc<EngineState> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn snapshots(&self) -> BTreeMap<String, AssetSnapshot> {
        self.state().snapshots.clone()
    }

    /// The last `k` closed trades, oldest first.
    pub fn recent_trades(&self, k: usize) -> Vec<Trade> {
        self.state().ledger.recent(k)
    }

    pub fn performance(&self) -> PerformanceSummary {
        self.state().performance.clone()
    }

    /// Evaluate every configured asset on `interval` and publish the result.
    ///
    /// Cycles are serialized; a second caller blocks until the running cycle
    /// has published.
    pub fn run_cycle(&self, interval: Interval) -> Arc<EngineState> {
        let _cycle = self.cycle_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.state();
        let mut next = (*current).clone();
        let now = Utc::now();

        tracing::info!(
            cycle = next.cycle + 1,
            %interval,
            assets = self.config.assets.len(),
            "starting evaluation cycle"
        );

        let jobs: Vec<(String, Option<Position>)> = self
            .config
            .assets
            .iter()
            .map(|asset| (asset.clone(), next.positions.remove(asset)))
            .collect();

        let outcomes: Vec<AssetOutcome> = match &self.pool {
            Some(pool) => pool.install(|| {
                jobs.into_par_iter()
                    .map(|(asset, position)| self.evaluate_asset(asset, position, interval, now))
                    .collect()
            }),
            None => jobs
                .into_iter()
                .map(|(asset, position)| self.evaluate_asset(asset, position, interval, now))
                .collect(),
        };

        let mut closed = 0usize;
        let mut errors = 0usize;
        for outcome in outcomes {
            if outcome.snapshot.is_error() {
                errors += 1;
            }
            if let Some(trade) = outcome.closed {
                closed += 1;
                tracing::info!(
                    asset = %trade.asset,
                    direction = %trade.direction,
                    exit_reason = %trade.exit_reason,
                    net_pnl_percent = trade.net_pnl_percent,
                    "trade closed"
                );
                next.ledger.record(trade);
                next.performance = PerformanceSummary::compute(&next.ledger);
            }
            match outcome.position {
                Some(position) => {
                    next.positions.insert(outcome.asset.clone(), position);
                }
                None => {
                    next.positions.remove(&outcome.asset);
                }
            }
            next.snapshots.insert(outcome.asset, outcome.snapshot);
        }

        next.cycle += 1;
        next.interval = interval;
        next.updated_at = Some(now);

        let published = Arc::new(next);
        {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::clone(&published);
        }

        tracing::info!(
            cycle = published.cycle,
            trades_closed = closed,
            errors,
            open_positions = published.positions.len(),
            "evaluation cycle complete"
        );
        published
    }

    fn evaluate_asset(
        &self,
        asset: String,
        position: Option<Position>,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> AssetOutcome {
        let view = match self.market_view(&asset, interval) {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(asset = %asset, error = %e, "asset evaluation failed");
                let snapshot = AssetSnapshot::error(&asset, e.snapshot_reason());
                return AssetOutcome {
                    asset,
                    snapshot,
                    position,
                    closed: None,
                };
            }
        };

        let breakout = Breakout::detect(&view.window);
        if breakout.any() {
            tracing::debug!(
                asset = %asset,
                new_buy = breakout.new_buy,
                new_sell = breakout.new_sell,
                close = view.window.current_close,
                "band breakout"
            );
        }

        let price = view.window.current_close;
        let mut machine = PositionMachine::new(asset.as_str(), position, self.config.fee_rate);
        let evaluation = machine.evaluate(price, &breakout, now);

        let snapshot = AssetSnapshot {
            asset: display_symbol(&asset).to_string(),
            price: round_dp(price, 8),
            percent_change: round_dp(view.percent_change, 2),
            rsi: view.rsi.map_or(NEUTRAL_RSI, |v| round_dp(v, 2)),
            atr: view.atr.map_or(0.0, |v| round_dp(v, 4)),
            signal: evaluation.signal,
            reason: evaluation.reason,
            position: evaluation.position,
        };

        AssetOutcome {
            asset,
            snapshot,
            position: machine.into_position(),
            closed: evaluation.closed,
        }
    }

    fn market_view(&self, asset: &str, interval: Interval) -> Result<MarketView, BandtraderError> {
        let candles = self
            .market_data
            .fetch_candles(asset, interval, self.config.history_limit)
            .map_err(|e| match e {
                e @ BandtraderError::FetchFailure { .. } => e,
                other => BandtraderError::FetchFailure {
                    asset: asset.to_string(),
                    reason: other.to_string(),
                },
            })?;
        let candles = retain_recent(candles, self.config.history_limit);

        if candles.len() < self.config.min_bars {
            return Err(BandtraderError::InsufficientData {
                asset: asset.to_string(),
                bars: candles.len(),
                minimum: self.config.min_bars,
            });
        }

        build_view(asset, &candles, &self.config.indicators)
    }
}

fn build_view(
    asset: &str,
    candles: &[Candle],
    params: &IndicatorParams,
) -> Result<MarketView, BandtraderError> {
    let calc_failure = |reason: String| BandtraderError::CalcFailure {
        asset: asset.to_string(),
        reason,
    };

    let indicators = compute_indicators(candles, params)
        .map_err(|e| calc_failure(e.to_string()))?;
    let (previous_bands, current_bands) = indicators
        .last_two_bands()
        .ok_or_else(|| calc_failure("bands undefined for the latest two bars".to_string()))?;

    let n = candles.len();
    let previous_close = candles[n - 2].close;
    let current_close = candles[n - 1].close;
    if !current_close.is_finite() || previous_close == 0.0 || current_bands.middle == 0.0 {
        return Err(calc_failure("degenerate price history".to_string()));
    }

    Ok(MarketView {
        window: BarWindow {
            previous_close,
            current_close,
            previous_bands,
            current_bands,
        },
        percent_change: (current_close - previous_close) / previous_close * 100.0,
        rsi: indicators.rsi.last_simple(),
        atr: indicators.atr.last_simple(),
    })
}
