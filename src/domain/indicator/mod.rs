//! Technical indicator implementations.
//!
//! Every series function takes an ordered slice and returns one entry per
//! input value. Warm-up positions are `None`, so any comparison against a
//! not-yet-defined value has to go through `Option` and can never pass by
//! accident. RSI is the exception: it uses a neutral placeholder, see [`rsi`].

pub mod atr;
pub mod ema;
pub mod rolling;
pub mod rsi;
pub mod sma;
pub mod supertrend;

pub use atr::{calculate_atr, calculate_atr_series};
pub use ema::calculate_ema;
pub use rolling::{rolling_max, rolling_min};
pub use rsi::{RSI_NEUTRAL, calculate_rsi};
pub use sma::calculate_sma;
pub use supertrend::{SupertrendPoint, TrendDirection, calculate_supertrend};

/// An indicator series; `None` marks positions that are not yet defined.
pub type Series = Vec<Option<f64>>;

/// The most recent defined value of a series, skipping trailing `None`s.
pub fn last_defined(series: &[Option<f64>]) -> Option<f64> {
    series.iter().rev().find_map(|v| *v)
}

/// Value at `index`, or `None` when out of range or undefined.
pub fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

/// `prev <= prev_ref && cur > cur_ref`: tie allowed on the prior bar only.
pub fn crossed_above(current: f64, previous: f64, current_ref: f64, previous_ref: f64) -> bool {
    previous <= previous_ref && current > current_ref
}

/// `prev >= prev_ref && cur < cur_ref`
pub fn crossed_below(current: f64, previous: f64, current_ref: f64, previous_ref: f64) -> bool {
    previous >= previous_ref && current < current_ref
}

/// `a > b`, false when either side is undefined.
pub fn gt(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a > b)
}

/// `a < b`, false when either side is undefined.
pub fn lt(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a < b)
}
