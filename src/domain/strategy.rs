//! Signal strategies for the next-bar backtest.
//!
//! A strategy maps a bar history to one boolean per bar: `true` means "enter
//! at this bar's close". Signals are pure functions of indicator arrays.

use crate::domain::indicator::{calculate_ema, calculate_rsi, calculate_sma, gt, value_at};
use crate::domain::ohlcv::{self, OhlcvBar};

pub trait SignalStrategy: Send + Sync {
    /// Short identifier, used as the trade signal label.
    fn name(&self) -> &str;

    /// Human-readable description of the entry rule.
    fn description(&self) -> String;

    /// Bars at the start of any history that never signal.
    fn warmup(&self) -> usize;

    fn signals(&self, bars: &[OhlcvBar]) -> Vec<bool>;
}

/// Buy-today-sell-tomorrow breakout.
///
/// close > EMA(ema_period), close > previous high, RSI > rsi_threshold,
/// volume > volume_multiple * SMA(volume, volume_period), close > SMA(sma_period),
/// close > min_price.
#[derive(Debug, Clone, PartialEq)]
pub struct BtstBreakout {
    pub ema_period: usize,
    pub sma_period: usize,
    pub rsi_period: usize,
    pub rsi_threshold: f64,
    pub volume_period: usize,
    pub volume_multiple: f64,
    pub min_price: f64,
}

impl Default for BtstBreakout {
    fn default() -> Self {
        Self {
            ema_period: 100,
            sma_period: 50,
            rsi_period: 14,
            rsi_threshold: 55.0,
            volume_period: 10,
            volume_multiple: 2.0,
            min_price: 100.0,
        }
    }
}

impl SignalStrategy for BtstBreakout {
    fn name(&self) -> &str {
        "BTST Breakout"
    }

    fn description(&self) -> String {
        format!(
            "BTST Breakout (Close>EMA{}, Close>PrevHigh, RSI>{}, Vol>{}xAvg{}, Close>SMA{}, Price>{})",
            self.ema_period,
            self.rsi_threshold,
            self.volume_multiple,
            self.volume_period,
            self.sma_period,
            self.min_price
        )
    }

    fn warmup(&self) -> usize {
        self.ema_period
            .max(self.sma_period)
            .max(self.rsi_period)
            .max(self.volume_period)
    }

    fn signals(&self, bars: &[OhlcvBar]) -> Vec<bool> {
        let closes = ohlcv::closes(bars);
        let volumes = ohlcv::volumes(bars);

        let ema = calculate_ema(&closes, self.ema_period);
        let sma = calculate_sma(&closes, self.sma_period);
        let rsi = calculate_rsi(&closes, self.rsi_period);
        let volume_sma = calculate_sma(&volumes, self.volume_period);
        let warmup = self.warmup();

        (0..bars.len())
            .map(|i| {
                if i < warmup || i == 0 {
                    return false;
                }
                let close = Some(closes[i]);
                let volume_floor = value_at(&volume_sma, i).map(|v| v * self.volume_multiple);

                gt(close, value_at(&ema, i))
                    && closes[i] > bars[i - 1].high
                    && rsi[i] > self.rsi_threshold
                    && gt(Some(volumes[i]), volume_floor)
                    && gt(close, value_at(&sma, i))
                    && closes[i] > self.min_price
            })
            .collect()
    }
}
