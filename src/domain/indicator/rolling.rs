//! Rolling window extremes. Warmup: first (n-1) values are undefined.

use super::Series;

pub fn rolling_max(data: &[f64], period: usize) -> Series {
    rolling_fold(data, period, f64::max)
}

pub fn rolling_min(data: &[f64], period: usize) -> Series {
    rolling_fold(data, period, f64::min)
}

fn rolling_fold(data: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Series {
    if period == 0 {
        return vec![None; data.len()];
    }

    (0..data.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                data[i + 1 - period..=i].iter().copied().reduce(pick)
            }
        })
        .collect()
}
