//! Simple Moving Average.
//!
//! SMA[i] = mean(data[i-n+1..=i]). Warmup: first (n-1) values are undefined.

use super::Series;

pub fn calculate_sma(data: &[f64], period: usize) -> Series {
    if period == 0 {
        return vec![None; data.len()];
    }

    (0..data.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                let window = &data[i + 1 - period..=i];
                Some(window.iter().sum::<f64>() / period as f64)
            }
        })
        .collect()
}
