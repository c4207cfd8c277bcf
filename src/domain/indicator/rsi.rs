//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss:
//! - First average (index n): simple mean of the first n gains/losses
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Unlike the other series, RSI is never undefined. Indices before n hold
//! [`RSI_NEUTRAL`], so a short history reads as "neither overbought nor
//! oversold" rather than failing every threshold. Scanners keyed on RSI
//! thresholds around 50 can therefore see a biased value during warm-up;
//! the snapshot builder only reads the last value of a 200+ bar history.

/// Placeholder reported before the first Wilder average is available.
pub const RSI_NEUTRAL: f64 = 50.0;

pub fn calculate_rsi(data: &[f64], period: usize) -> Vec<f64> {
    let mut values = vec![RSI_NEUTRAL; data.len()];
    if period == 0 || data.len() <= period {
        return values;
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for pair in data.windows(2) {
        let change = pair[1] - pair[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    values[period] = rsi_from_averages(avg_gain, avg_loss);

    for i in (period + 1)..data.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i - 1]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i - 1]) / period as f64;
        values[i] = rsi_from_averages(avg_gain, avg_loss);
    }

    values
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
