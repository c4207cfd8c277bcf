//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod snapshot;
pub mod condition;
pub mod condition_eval;
pub mod scanner;
pub mod backtest;
pub mod metrics;
pub mod strategy;
pub mod opportunity;
pub mod universe;
pub mod config;
pub mod config_validation;
pub mod error;
