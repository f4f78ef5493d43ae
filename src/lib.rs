//! bandtrader: Bollinger band breakout signal engine.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. The evaluation cycle lives in
//! [`domain::engine`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
