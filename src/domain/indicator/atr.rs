//! Average True Range.
//!
//! True range: max(high - low, |high - prev_close|, |low - prev_close|).
//!
//! Two flavours are provided. [`calculate_atr`] is the point value used by
//! snapshots: the plain mean of the trailing n true ranges. The series form
//! [`calculate_atr_series`] uses Wilder's smoothing and feeds Supertrend.

use super::Series;
use crate::domain::ohlcv::OhlcvBar;

/// Mean of the trailing `period` true ranges, or 0.0 with fewer than
/// `period + 1` bars.
pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> f64 {
    let n = highs.len().min(lows.len()).min(closes.len());
    if period == 0 || n < period + 1 {
        return 0.0;
    }

    let sum: f64 = (n - period..n)
        .map(|i| {
            let hl = highs[i] - lows[i];
            let hc = (highs[i] - closes[i - 1]).abs();
            let lc = (lows[i] - closes[i - 1]).abs();
            hl.max(hc).max(lc)
        })
        .sum();
    sum / period as f64
}

/// Wilder-smoothed ATR series.
///
/// TR of the first bar is its high-low range. Seed at `period-1` is the mean
/// of the first `period` TRs; afterwards atr = (prev * (n-1) + tr) / n.
pub fn calculate_atr_series(bars: &[OhlcvBar], period: usize) -> Series {
    if period == 0 {
        return vec![None; bars.len()];
    }

    let tr: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.range()
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let mut values = Vec::with_capacity(bars.len());
    let mut atr = 0.0;
    for (i, &t) in tr.iter().enumerate() {
        if i + 1 < period {
            values.push(None);
        } else if i + 1 == period {
            atr = tr[..period].iter().sum::<f64>() / period as f64;
            values.push(Some(atr));
        } else {
            atr = (atr * (period - 1) as f64 + t) / period as f64;
            values.push(Some(atr));
        }
    }

    values
}
