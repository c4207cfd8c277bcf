//! Trade statistics.
//!
//! All returns are in percent of entry price. A trade with zero PnL counts as
//! losing.

use serde::Serialize;

use super::backtest::Trade;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_return: f64,
    pub total_return: f64,
    pub max_win: f64,
    pub max_loss: f64,
}

impl TradeStats {
    pub fn compute<'a, I>(trades: I) -> Self
    where
        I: IntoIterator<Item = &'a Trade>,
    {
        let mut total_trades = 0usize;
        let mut winning_trades = 0usize;
        let mut total_return = 0.0_f64;
        let mut max_win = f64::NEG_INFINITY;
        let mut max_loss = f64::INFINITY;

        for trade in trades {
            let pnl = trade.pnl_percent;
            total_trades += 1;
            if pnl > 0.0 {
                winning_trades += 1;
            }
            total_return += pnl;
            max_win = max_win.max(pnl);
            max_loss = max_loss.min(pnl);
        }

        if total_trades == 0 {
            return Self::default();
        }

        Self {
            total_trades,
            winning_trades,
            losing_trades: total_trades - winning_trades,
            win_rate: winning_trades as f64 / total_trades as f64 * 100.0,
            avg_return: total_return / total_trades as f64,
            total_return,
            max_win,
            max_loss,
        }
    }
}
