//! Per-asset position state machine.
//!
//! An asset is FLAT (no [`Position`]) or holds exactly one LONG or SHORT
//! position. [`PositionMachine::evaluate`] applies, in order: extreme
//! tracking, stop management, the stop check, the mean-revert exit and the
//! reversal rule. Every close produces a [`Trade`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::BandtraderError;
use crate::domain::signal::Breakout;
use crate::domain::snapshot::{Signal, round_dp};

/// Initial stop distance and trailing distance, as a fraction of price.
pub const STOP_DISTANCE: f64 = 0.02;
/// Unrealized P&L (percent) at which the trailing stop arms.
pub const TRAILING_ARM_PCT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    pub fn signal(self) -> Signal {
        match self {
            Direction::Long => Signal::Buy,
            Direction::Short => Signal::Sell,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopType {
    Initial,
    Trailing,
}

impl fmt::Display for StopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopType::Initial => f.write_str("Initial"),
            StopType::Trailing => f.write_str("Trailing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Stop,
    Trailing,
    #[serde(rename = "SMA")]
    Sma,
    Reversal,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Stop => f.write_str("Stop"),
            ExitReason::Trailing => f.write_str("Trailing"),
            ExitReason::Sma => f.write_str("SMA"),
            ExitReason::Reversal => f.write_str("Reversal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub highest_since_entry: f64,
    pub lowest_since_entry: f64,
    pub stop_loss: f64,
    pub stop_type: StopType,
}

impl Position {
    /// Open a position at `price` with its initial stop.
    pub fn open(
        direction: Direction,
        price: f64,
        entry_time: DateTime<Utc>,
    ) -> Result<Self, BandtraderError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(BandtraderError::InvalidPosition {
                reason: format!("entry price must be positive and finite, got {price}"),
            });
        }
        Ok(Position {
            direction,
            entry_price: price,
            entry_time,
            highest_since_entry: price,
            lowest_since_entry: price,
            stop_loss: initial_stop(direction, price),
            stop_type: StopType::Initial,
        })
    }

    /// Gross unrealized P&L in percent of entry price.
    pub fn unrealized_pnl_pct(&self, price: f64) -> f64 {
        match self.direction {
            Direction::Long => (price - self.entry_price) / self.entry_price * 100.0,
            Direction::Short => (self.entry_price - price) / self.entry_price * 100.0,
        }
    }

    pub fn should_stop_out(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price <= self.stop_loss,
            Direction::Short => price >= self.stop_loss,
        }
    }

    fn track_extremes(&mut self, price: f64) {
        self.highest_since_entry = self.highest_since_entry.max(price);
        self.lowest_since_entry = self.lowest_since_entry.min(price);
    }

    /// Arm or ratchet the trailing stop. The stored stop never loosens: once
    /// a trailing level is set it stays in force even if P&L falls back
    /// below the arming threshold.
    fn manage_stop(&mut self, pnl_pct: f64) {
        if pnl_pct >= TRAILING_ARM_PCT {
            let candidate = match self.direction {
                Direction::Long => self.highest_since_entry * (1.0 - STOP_DISTANCE),
                Direction::Short => self.lowest_since_entry * (1.0 + STOP_DISTANCE),
            };
            self.stop_loss = tighter_stop(self.direction, self.stop_loss, candidate);
            self.stop_type = StopType::Trailing;
        } else if self.stop_type == StopType::Initial {
            self.stop_loss = initial_stop(self.direction, self.entry_price);
        }
    }

    fn exit_reason_for_stop(&self) -> ExitReason {
        match self.stop_type {
            StopType::Initial => ExitReason::Stop,
            StopType::Trailing => ExitReason::Trailing,
        }
    }

    fn close(
        &self,
        asset: &str,
        exit_price: f64,
        reason: ExitReason,
        fee_rate: f64,
        closed_at: DateTime<Utc>,
    ) -> Trade {
        Trade {
            asset: asset.to_string(),
            direction: self.direction,
            entry_price: self.entry_price,
            exit_price,
            net_pnl_percent: net_pnl_percent(self.unrealized_pnl_pct(exit_price), fee_rate),
            exit_reason: reason,
            entry_time: self.entry_time,
            closed_at,
        }
    }

    fn info(&self, pnl_pct: f64) -> PositionInfo {
        PositionInfo {
            direction: self.direction,
            entry_price: self.entry_price,
            pnl: round_dp(pnl_pct, 2),
            current_stop: self.stop_loss,
            stop_type: self.stop_type,
        }
    }
}

pub fn initial_stop(direction: Direction, price: f64) -> f64 {
    match direction {
        Direction::Long => price * (1.0 - STOP_DISTANCE),
        Direction::Short => price * (1.0 + STOP_DISTANCE),
    }
}

fn tighter_stop(direction: Direction, current: f64, candidate: f64) -> f64 {
    match direction {
        Direction::Long => current.max(candidate),
        Direction::Short => current.min(candidate),
    }
}

/// Gross P&L minus the round-trip fee, both in percentage points.
pub fn net_pnl_percent(gross_pnl_pct: f64, fee_rate: f64) -> f64 {
    gross_pnl_pct - fee_rate * 2.0 * 100.0
}

/// Immutable record of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub asset: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub net_pnl_percent: f64,
    pub exit_reason: ExitReason,
    pub entry_time: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

/// Status of an open position as reported in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub direction: Direction,
    pub entry_price: f64,
    pub pnl: f64,
    pub current_stop: f64,
    pub stop_type: StopType,
}

/// Outcome of one evaluation of a [`PositionMachine`].
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub signal: Signal,
    pub reason: String,
    pub position: Option<PositionInfo>,
    pub closed: Option<Trade>,
}

/// Owns the (at most one) open position of a single asset.
#[derive(Debug, Clone)]
pub struct PositionMachine {
    asset: String,
    position: Option<Position>,
    fee_rate: f64,
}

impl PositionMachine {
    pub fn new(asset: impl Into<String>, position: Option<Position>, fee_rate: f64) -> Self {
        Self {
            asset: asset.into(),
            position,
            fee_rate,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn into_position(self) -> Option<Position> {
        self.position
    }

    /// Run one evaluation at `price` with the breakout flags of the latest bar.
    pub fn evaluate(&mut self, price: f64, breakout: &Breakout, now: DateTime<Utc>) -> Evaluation {
        match self.position.take() {
            Some(position) => self.evaluate_open(position, price, breakout, now),
            None => self.evaluate_flat(price, breakout, now),
        }
    }

    fn evaluate_flat(&mut self, price: f64, breakout: &Breakout, now: DateTime<Utc>) -> Evaluation {
        let direction = if breakout.new_buy {
            Direction::Long
        } else if breakout.new_sell {
            Direction::Short
        } else {
            return Evaluation {
                signal: Signal::Neutral,
                reason: "Between bands".to_string(),
                position: None,
                closed: None,
            };
        };

        match Position::open(direction, price, now) {
            Ok(position) => {
                tracing::info!(asset = %self.asset, %direction, price, "opened position");
                let info = position.info(0.0);
                self.position = Some(position);
                Evaluation {
                    signal: direction.signal(),
                    reason: format!("NEW {direction}"),
                    position: Some(info),
                    closed: None,
                }
            }
            Err(e) => {
                tracing::warn!(asset = %self.asset, error = %e, "skipped entry");
                Evaluation {
                    signal: Signal::Neutral,
                    reason: "Between bands".to_string(),
                    position: None,
                    closed: None,
                }
            }
        }
    }

    fn evaluate_open(
        &mut self,
        mut position: Position,
        price: f64,
        breakout: &Breakout,
        now: DateTime<Utc>,
    ) -> Evaluation {
        position.track_extremes(price);
        let pnl = position.unrealized_pnl_pct(price);
        position.manage_stop(pnl);

        if position.should_stop_out(price) {
            let reason = position.exit_reason_for_stop();
            let trade = self.record_close(&position, price, reason, now);
            let label = match reason {
                ExitReason::Trailing => "Closed",
                _ => "Stop hit",
            };
            return Evaluation {
                signal: Signal::Neutral,
                reason: format!("{label} (P&L: {:.2}%)", trade.net_pnl_percent),
                position: None,
                closed: Some(trade),
            };
        }

        if breakout.near_mean {
            let trade = self.record_close(&position, price, ExitReason::Sma, now);
            return Evaluation {
                signal: Signal::Neutral,
                reason: format!("Exit at SMA (P&L: {:.2}%)", trade.net_pnl_percent),
                position: None,
                closed: Some(trade),
            };
        }

        let reversed = match position.direction {
            Direction::Long => breakout.new_sell,
            Direction::Short => breakout.new_buy,
        };
        if reversed {
            let trade = self.record_close(&position, price, ExitReason::Reversal, now);
            let direction = position.direction.opposite();
            let reason = format!("Reversed (Prev: {:.2}%)", trade.net_pnl_percent);
            return match Position::open(direction, price, now) {
                Ok(next) => {
                    tracing::info!(asset = %self.asset, %direction, price, "reversed position");
                    let info = next.info(0.0);
                    self.position = Some(next);
                    Evaluation {
                        signal: direction.signal(),
                        reason,
                        position: Some(info),
                        closed: Some(trade),
                    }
                }
                Err(e) => {
                    tracing::warn!(asset = %self.asset, error = %e, "reversal entry skipped");
                    Evaluation {
                        signal: Signal::Neutral,
                        reason,
                        position: None,
                        closed: Some(trade),
                    }
                }
            };
        }

        let info = position.info(pnl);
        let evaluation = Evaluation {
            signal: position.direction.signal(),
            reason: format!("{} stop active", position.stop_type),
            position: Some(info),
            closed: None,
        };
        self.position = Some(position);
        evaluation
    }

    fn record_close(
        &self,
        position: &Position,
        price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Trade {
        let trade = position.close(&self.asset, price, reason, self.fee_rate, now);
        tracing::info!(
            asset = %self.asset,
            direction = %trade.direction,
            entry = trade.entry_price,
            exit = trade.exit_price,
            net_pnl = trade.net_pnl_percent,
            reason = %trade.exit_reason,
            "closed position"
        );
        trade
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const FEE: f64 = 0.001;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn quiet() -> Breakout {
        Breakout::default()
    }

    fn buy() -> Breakout {
        Breakout {
            new_buy: true,
            ..Breakout::default()
        }
    }

    fn sell() -> Breakout {
        Breakout {
            new_sell: true,
            ..Breakout::default()
        }
    }

    fn machine_with(direction: Direction, entry: f64) -> PositionMachine {
        let position = Position::open(direction, entry, now()).unwrap();
        PositionMachine::new("BTCUSDT", Some(position), FEE)
    }

    #[test]
    fn open_rejects_non_positive_price() {
        assert!(Position::open(Direction::Long, 0.0, now()).is_err());
        assert!(Position::open(Direction::Short, f64::NAN, now()).is_err());
    }

    #[test]
    fn open_long_sets_initial_stop() {
        let pos = Position::open(Direction::Long, 101.0, now()).unwrap();
        assert!((pos.stop_loss - 98.98).abs() < 1e-9);
        assert_eq!(pos.stop_type, StopType::Initial);
        assert_eq!(pos.direction, Direction::Long);
    }

    #[test]
    fn open_short_sets_initial_stop() {
        let pos = Position::open(Direction::Short, 100.0, now()).unwrap();
        assert!((pos.stop_loss - 102.0).abs() < 1e-9);
        assert_eq!(pos.direction, Direction::Short);
    }

    #[test]
    fn flat_stays_flat_between_bands() {
        let mut m = PositionMachine::new("BTCUSDT", None, FEE);
        let eval = m.evaluate(100.0, &quiet(), now());
        assert_eq!(eval.signal, Signal::Neutral);
        assert_eq!(eval.reason, "Between bands");
        assert!(eval.position.is_none());
        assert!(m.position().is_none());
    }

    #[test]
    fn flat_buy_breakout_opens_long() {
        let mut m = PositionMachine::new("BTCUSDT", None, FEE);
        let eval = m.evaluate(101.0, &buy(), now());

        assert_eq!(eval.signal, Signal::Buy);
        assert_eq!(eval.reason, "NEW LONG");
        let info = eval.position.unwrap();
        assert_eq!(info.direction, Direction::Long);
        assert!((info.entry_price - 101.0).abs() < f64::EPSILON);
        assert!((info.current_stop - 98.98).abs() < 1e-9);
        assert_eq!(info.stop_type, StopType::Initial);
        assert!(eval.closed.is_none());
    }

    #[test]
    fn flat_sell_breakout_opens_short() {
        let mut m = PositionMachine::new("ETHUSDT", None, FEE);
        let eval = m.evaluate(50.0, &sell(), now());
        assert_eq!(eval.signal, Signal::Sell);
        assert_eq!(eval.reason, "NEW SHORT");
        assert!((m.position().unwrap().stop_loss - 51.0).abs() < 1e-9);
    }

    #[test]
    fn initial_stop_hit_closes_long() {
        let mut m = machine_with(Direction::Long, 100.0);
        let eval = m.evaluate(97.5, &quiet(), now());

        let trade = eval.closed.unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Stop);
        assert!((trade.net_pnl_percent - (-2.5 - 0.2)).abs() < 1e-9);
        assert_eq!(eval.signal, Signal::Neutral);
        assert_eq!(eval.reason, "Stop hit (P&L: -2.70%)");
        assert!(m.position().is_none());
    }

    #[test]
    fn initial_stop_hit_closes_short() {
        let mut m = machine_with(Direction::Short, 100.0);
        let eval = m.evaluate(102.5, &quiet(), now());
        let trade = eval.closed.unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Stop);
        assert_eq!(trade.direction, Direction::Short);
        assert!((trade.net_pnl_percent - (-2.7)).abs() < 1e-9);
    }

    #[test]
    fn trailing_stop_scenario_long() {
        let mut m = machine_with(Direction::Long, 100.0);

        let eval = m.evaluate(105.0, &quiet(), now());
        assert!(eval.closed.is_none());
        assert_eq!(eval.reason, "Trailing stop active");
        let info = eval.position.unwrap();
        assert_eq!(info.stop_type, StopType::Trailing);
        assert!((info.current_stop - 102.9).abs() < 1e-9);
        assert!((info.pnl - 5.0).abs() < 1e-9);

        let eval = m.evaluate(102.8, &quiet(), now());
        let trade = eval.closed.unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Trailing);
        assert!((trade.net_pnl_percent - 2.6).abs() < 1e-9);
        assert_eq!(eval.reason, "Closed (P&L: 2.60%)");
        assert!(m.position().is_none());
    }

    #[test]
    fn trailing_stop_scenario_short() {
        let mut m = machine_with(Direction::Short, 100.0);

        let eval = m.evaluate(95.0, &quiet(), now());
        let info = eval.position.unwrap();
        assert_eq!(info.stop_type, StopType::Trailing);
        assert!((info.current_stop - 96.9).abs() < 1e-9);

        let eval = m.evaluate(97.0, &quiet(), now());
        let trade = eval.closed.unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Trailing);
        assert!((trade.net_pnl_percent - (3.0 - 0.2)).abs() < 1e-9);
    }

    #[test]
    fn armed_trailing_stop_never_loosens() {
        let mut m = machine_with(Direction::Long, 100.0);
        m.evaluate(101.5, &quiet(), now());
        let armed = m.position().unwrap().stop_loss;
        assert!((armed - 99.47).abs() < 1e-9);

        // P&L falls back under the arming threshold without touching the stop
        let eval = m.evaluate(100.5, &quiet(), now());
        assert!(eval.closed.is_none());
        let pos = m.position().unwrap();
        assert!((pos.stop_loss - armed).abs() < f64::EPSILON);
        assert_eq!(pos.stop_type, StopType::Trailing);
    }

    #[test]
    fn near_mean_closes_with_sma_reason() {
        let mut m = machine_with(Direction::Short, 100.0);
        let breakout = Breakout {
            near_mean: true,
            ..Breakout::default()
        };
        let eval = m.evaluate(99.5, &breakout, now());
        let trade = eval.closed.unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Sma);
        assert!((trade.net_pnl_percent - 0.3).abs() < 1e-9);
        assert_eq!(eval.reason, "Exit at SMA (P&L: 0.30%)");
        assert!(m.position().is_none());
    }

    #[test]
    fn stop_check_precedes_mean_exit() {
        let mut m = machine_with(Direction::Long, 100.0);
        let breakout = Breakout {
            near_mean: true,
            ..Breakout::default()
        };
        let eval = m.evaluate(97.0, &breakout, now());
        assert_eq!(eval.closed.unwrap().exit_reason, ExitReason::Stop);
    }

    #[test]
    fn opposite_breakout_reverses_long_to_short() {
        let mut m = machine_with(Direction::Long, 100.0);
        let eval = m.evaluate(99.0, &sell(), now());

        let trade = eval.closed.unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Reversal);
        assert_eq!(trade.direction, Direction::Long);
        assert!((trade.net_pnl_percent - (-1.2)).abs() < 1e-9);

        assert_eq!(eval.signal, Signal::Sell);
        assert_eq!(eval.reason, "Reversed (Prev: -1.20%)");
        let pos = m.position().unwrap();
        assert_eq!(pos.direction, Direction::Short);
        assert!((pos.entry_price - 99.0).abs() < f64::EPSILON);
        assert!((pos.stop_loss - 100.98).abs() < 1e-9);
        assert_eq!(pos.stop_type, StopType::Initial);
    }

    #[test]
    fn same_side_breakout_keeps_position() {
        let mut m = machine_with(Direction::Long, 100.0);
        let eval = m.evaluate(100.5, &buy(), now());
        assert!(eval.closed.is_none());
        assert_eq!(eval.signal, Signal::Buy);
        assert_eq!(eval.reason, "Initial stop active");
        assert_eq!(m.position().unwrap().entry_price, 100.0);
    }

    #[test]
    fn extremes_track_independently() {
        let mut m = machine_with(Direction::Long, 100.0);
        m.evaluate(99.0, &quiet(), now());
        m.evaluate(100.8, &quiet(), now());
        let pos = m.position().unwrap();
        assert!((pos.highest_since_entry - 100.8).abs() < f64::EPSILON);
        assert!((pos.lowest_since_entry - 99.0).abs() < f64::EPSILON);
    }

    #[test]
    fn net_pnl_deducts_round_trip_fee() {
        assert!((net_pnl_percent(2.8, 0.001) - 2.6).abs() < 1e-12);
        assert!((net_pnl_percent(0.0, 0.0025) - (-0.5)).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn long_stop_is_non_decreasing(
            moves in prop::collection::vec(-0.015f64..0.03, 1..60)
        ) {
            let mut m = machine_with(Direction::Long, 100.0);
            let mut price = 100.0;
            let mut last_stop = m.position().unwrap().stop_loss;
            for step in moves {
                price *= 1.0 + step;
                m.evaluate(price, &quiet(), now());
                match m.position() {
                    Some(pos) => {
                        prop_assert!(pos.stop_loss >= last_stop);
                        last_stop = pos.stop_loss;
                    }
                    None => break,
                }
            }
        }

        #[test]
        fn short_stop_is_non_increasing(
            moves in prop::collection::vec(-0.03f64..0.015, 1..60)
        ) {
            let mut m = machine_with(Direction::Short, 100.0);
            let mut price = 100.0;
            let mut last_stop = m.position().unwrap().stop_loss;
            for step in moves {
                price *= 1.0 + step;
                m.evaluate(price, &quiet(), now());
                match m.position() {
                    Some(pos) => {
                        prop_assert!(pos.stop_loss <= last_stop);
                        last_stop = pos.stop_loss;
                    }
                    None => break,
                }
            }
        }

        #[test]
        fn net_pnl_is_gross_minus_fee(exit in 50.0f64..150.0, fee in 0.0f64..0.01) {
            let pos = Position::open(Direction::Long, 100.0, now()).unwrap();
            let trade = pos.close("X", exit, ExitReason::Sma, fee, now());
            let gross = (exit - 100.0) / 100.0 * 100.0;
            prop_assert_eq!(trade.net_pnl_percent, gross - fee * 2.0 * 100.0);
        }
    }
}
