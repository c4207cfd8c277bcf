//! swingscan: technical-indicator scanner and next-bar backtester for daily
//! OHLCV data.
//!
//! Pure indicator, snapshot, scanner and backtest logic lives in [`domain`];
//! port traits in [`ports`]; file-backed implementations in [`adapters`].
//! [`orchestrator`] runs domain operations across a symbol universe in
//! batches with a TTL cache, and [`cli`] wires it all to the command line.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod orchestrator;
pub mod cli;
