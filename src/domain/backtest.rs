//! Next-bar backtest replay and cross-symbol aggregation.
//!
//! For every bar `i < n-1` whose signal is set, one trade is opened at
//! `close[i]` and closed at `close[i+1]`. No position is ever opened on the
//! final bar. Trades are independent; overlapping signals each produce a
//! trade.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Serialize;

use super::metrics::TradeStats;
use super::strategy::{BtstBreakout, SignalStrategy};
use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;

/// Bars needed before a symbol is backtested.
pub const MIN_BACKTEST_BARS: usize = 120;

/// Extra months fetched ahead of the test period for indicator warm-up.
pub const WARMUP_MONTHS: u32 = 4;

pub const MAX_MONTHS: u32 = 12;

pub const DEFAULT_CAPITAL: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub pnl_percent: f64,
    pub pnl_amount: f64,
    pub signal_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockBacktestResult {
    pub symbol: String,
    #[serde(flatten)]
    pub stats: TradeStats,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolReturn {
    pub symbol: String,
    pub total_return: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniverseBacktestResult {
    pub strategy: String,
    pub period_months: u32,
    pub stocks_analyzed: usize,
    pub stocks_with_trades: usize,
    #[serde(flatten)]
    pub stats: TradeStats,
    pub best_stock: Option<SymbolReturn>,
    pub worst_stock: Option<SymbolReturn>,
    /// Ranked by total return, best first.
    pub stock_results: Vec<StockBacktestResult>,
    /// Every trade, ascending by entry date.
    pub all_trades: Vec<Trade>,
}

/// Replay a precomputed signal series. Signals beyond `bars` are ignored.
pub fn replay_signals(
    bars: &[OhlcvBar],
    signals: &[bool],
    symbol: &str,
    capital: f64,
    label: &str,
) -> Vec<Trade> {
    bars.windows(2)
        .zip(signals)
        .filter(|(_, signal)| **signal)
        .map(|(pair, _)| {
            let (entry, exit) = (&pair[0], &pair[1]);
            let pnl_percent = (exit.close - entry.close) / entry.close * 100.0;
            Trade {
                symbol: symbol.to_string(),
                entry_date: entry.date,
                entry_price: entry.close,
                exit_date: exit.date,
                exit_price: exit.close,
                pnl_percent,
                pnl_amount: capital * pnl_percent / 100.0,
                signal_label: label.to_string(),
            }
        })
        .collect()
}

pub fn backtest_with_strategy(
    strategy: &dyn SignalStrategy,
    bars: &[OhlcvBar],
    symbol: &str,
    capital: f64,
) -> StockBacktestResult {
    let signals = strategy.signals(bars);
    let trades = replay_signals(bars, &signals, symbol, capital, strategy.name());
    StockBacktestResult {
        symbol: symbol.to_string(),
        stats: TradeStats::compute(&trades),
        trades,
    }
}

/// BTST breakout backtest with default thresholds.
pub fn backtest_symbol(bars: &[OhlcvBar], symbol: &str, capital: f64) -> StockBacktestResult {
    backtest_with_strategy(&BtstBreakout::default(), bars, symbol, capital)
}

pub fn validate_backtest_params(months: u32, capital: f64) -> Result<(), EngineError> {
    if !(1..=MAX_MONTHS).contains(&months) {
        return Err(EngineError::invalid(
            "months",
            format!("must be between 1 and {MAX_MONTHS}, got {months}"),
        ));
    }
    if !(capital.is_finite() && capital > 0.0) {
        return Err(EngineError::invalid(
            "capital",
            format!("must be positive, got {capital}"),
        ));
    }
    Ok(())
}

/// Bars-count guard applied before replaying one symbol.
pub fn check_backtest_bars(symbol: &str, bars: &[OhlcvBar]) -> Result<(), EngineError> {
    if bars.len() < MIN_BACKTEST_BARS {
        return Err(EngineError::InsufficientData {
            symbol: symbol.to_string(),
            bars: bars.len(),
            minimum: MIN_BACKTEST_BARS,
        });
    }
    Ok(())
}

fn by_total_return_desc(a: &StockBacktestResult, b: &StockBacktestResult) -> Ordering {
    b.stats
        .total_return
        .partial_cmp(&a.stats.total_return)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Combine per-symbol results into a universe summary.
pub fn aggregate_universe(
    strategy: &str,
    period_months: u32,
    mut stock_results: Vec<StockBacktestResult>,
) -> UniverseBacktestResult {
    stock_results.sort_by(by_total_return_desc);

    let mut all_trades: Vec<Trade> = stock_results
        .iter()
        .flat_map(|r| r.trades.iter().cloned())
        .collect();
    // stable: same-day trades keep symbol order
    all_trades.sort_by_key(|t| t.entry_date);

    let with_trades: Vec<&StockBacktestResult> = stock_results
        .iter()
        .filter(|r| r.stats.total_trades > 0)
        .collect();
    let to_return = |r: &&StockBacktestResult| SymbolReturn {
        symbol: r.symbol.clone(),
        total_return: r.stats.total_return,
    };
    let best_stock = with_trades.first().map(to_return);
    let worst_stock = with_trades.last().map(to_return);
    let stocks_with_trades = with_trades.len();

    UniverseBacktestResult {
        strategy: strategy.to_string(),
        period_months,
        stocks_analyzed: stock_results.len(),
        stocks_with_trades,
        stats: TradeStats::compute(&all_trades),
        best_stock,
        worst_stock,
        stock_results,
        all_trades,
    }
}
