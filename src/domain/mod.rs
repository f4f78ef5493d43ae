//! Core domain types and logic.

pub mod candle;
pub mod config;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod indicator_helpers;
pub mod interval;
pub mod ledger;
pub mod metrics;
pub mod position;
pub mod signal;
pub mod snapshot;
pub mod universe;
