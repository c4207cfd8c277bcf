//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = (C[i] - EMA[i-1]) * k + EMA[i-1].
//! Warmup: first (n-1) values are undefined.

use super::Series;

pub fn calculate_ema(data: &[f64], period: usize) -> Series {
    if period == 0 {
        return vec![None; data.len()];
    }

    let mut values = Vec::with_capacity(data.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &value) in data.iter().enumerate() {
        if i < period - 1 {
            sum += value;
            values.push(None);
        } else if i == period - 1 {
            sum += value;
            ema = sum / period as f64;
            values.push(Some(ema));
        } else {
            ema = (value - ema) * k + ema;
            values.push(Some(ema));
        }
    }

    values
}
