//! Hybrid Supertrend opportunity detection.
//!
//! Three Supertrends (factor/period 1/1, 2/2, 3/3) vote on the trend. A buy
//! fires on the bar where all three turn up while the close is above EMA50
//! and EMA200; a sell mirrors it. Only the last three bars are inspected.

use serde::Serialize;

use crate::domain::error::EngineError;
use crate::domain::indicator::{
    SupertrendPoint, TrendDirection, calculate_ema, calculate_supertrend, gt, lt, value_at,
};
use crate::domain::ohlcv::{self, OhlcvBar};

pub const MIN_OPPORTUNITY_BARS: usize = 200;

/// Bars at the end of the history searched for a fresh signal.
pub const SIGNAL_WINDOW: usize = 3;

pub const MAX_STRENGTH: u8 = 5;

const SUPERTRENDS: [(f64, usize); 3] = [(1.0, 1), (2.0, 2), (3.0, 3)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HybridTrend {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridBar {
    pub trend: HybridTrend,
    pub buy: bool,
    pub sell: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    /// Hybrid trend on the latest bar.
    pub trend: HybridTrend,
    pub strength: u8,
    /// 0 = signal on the latest bar, 1 = the bar before, ...
    pub signal_day: usize,
}

fn all_in(points: &[Option<SupertrendPoint>; 3], direction: TrendDirection) -> bool {
    points
        .iter()
        .all(|p| p.is_some_and(|p| p.direction == direction))
}

/// Per-bar hybrid trend and signals. Requires at least
/// [`MIN_OPPORTUNITY_BARS`]; shorter histories report neutral and no signals.
pub fn hybrid_signals(bars: &[OhlcvBar]) -> Vec<HybridBar> {
    let neutral = HybridBar {
        trend: HybridTrend::Neutral,
        buy: false,
        sell: false,
    };
    if bars.len() < MIN_OPPORTUNITY_BARS {
        return vec![neutral; bars.len()];
    }

    let closes = ohlcv::closes(bars);
    let ema50 = calculate_ema(&closes, 50);
    let ema200 = calculate_ema(&closes, 200);
    let supertrends: Vec<Vec<Option<SupertrendPoint>>> = SUPERTRENDS
        .iter()
        .map(|&(factor, period)| calculate_supertrend(bars, factor, period))
        .collect();

    let points_at = |i: usize| -> [Option<SupertrendPoint>; 3] {
        [supertrends[0][i], supertrends[1][i], supertrends[2][i]]
    };

    (0..bars.len())
        .map(|i| {
            let now = points_at(i);
            if now.iter().any(Option::is_none) {
                return neutral;
            }

            let bullish = all_in(&now, TrendDirection::Up);
            let bearish = all_in(&now, TrendDirection::Down);
            let (was_bullish, was_bearish) = match i.checked_sub(1) {
                Some(prev) => {
                    let before = points_at(prev);
                    (
                        all_in(&before, TrendDirection::Up),
                        all_in(&before, TrendDirection::Down),
                    )
                }
                None => (false, false),
            };

            let close = Some(closes[i]);
            let above = gt(close, value_at(&ema200, i)) && gt(close, value_at(&ema50, i));
            let below = lt(close, value_at(&ema200, i)) && lt(close, value_at(&ema50, i));

            HybridBar {
                trend: if bullish {
                    HybridTrend::Bullish
                } else if bearish {
                    HybridTrend::Bearish
                } else {
                    HybridTrend::Neutral
                },
                buy: bullish && !was_bullish && above,
                sell: bearish && !was_bearish && below,
            }
        })
        .collect()
}

/// 1 plus one point per factor agreeing with `side`, capped at [`MAX_STRENGTH`].
/// Undefined EMAs never add a point.
pub fn signal_strength(
    close: f64,
    ema20: Option<f64>,
    ema50: Option<f64>,
    ema200: Option<f64>,
    side: Side,
) -> u8 {
    let close = Some(close);
    let factors = match side {
        Side::Buy => [
            gt(close, ema20),
            gt(close, ema50),
            gt(close, ema200),
            gt(ema20, ema50),
        ],
        Side::Sell => [
            lt(close, ema20),
            lt(close, ema50),
            lt(close, ema200),
            lt(ema20, ema50),
        ],
    };
    let points = factors.iter().filter(|f| **f).count() as u8;
    (1 + points).min(MAX_STRENGTH)
}

/// First buy/sell signal within the last [`SIGNAL_WINDOW`] bars, oldest first.
pub fn detect_opportunity(
    symbol: &str,
    bars: &[OhlcvBar],
) -> Result<Option<Opportunity>, EngineError> {
    if bars.len() < MIN_OPPORTUNITY_BARS {
        return Err(EngineError::InsufficientData {
            symbol: symbol.to_string(),
            bars: bars.len(),
            minimum: MIN_OPPORTUNITY_BARS,
        });
    }

    let signals = hybrid_signals(bars);
    let last = bars.len() - 1;
    let start = last.saturating_sub(SIGNAL_WINDOW - 1);

    let Some((day, side)) = (start..=last).find_map(|j| {
        let bar = signals[j];
        if bar.buy {
            Some((j, Side::Buy))
        } else if bar.sell {
            Some((j, Side::Sell))
        } else {
            None
        }
    }) else {
        return Ok(None);
    };

    let closes = ohlcv::closes(bars);
    let ema20 = calculate_ema(&closes, 20);
    let ema50 = calculate_ema(&closes, 50);
    let ema200 = calculate_ema(&closes, 200);

    let latest = &bars[last];
    let previous = &bars[last - 1];
    let change = latest.close - previous.close;
    let change_percent = if previous.close != 0.0 {
        change / previous.close * 100.0
    } else {
        0.0
    };

    Ok(Some(Opportunity {
        symbol: symbol.to_string(),
        side,
        price: latest.close,
        change,
        change_percent,
        trend: signals[last].trend,
        strength: signal_strength(
            latest.close,
            value_at(&ema20, last),
            value_at(&ema50, last),
            value_at(&ema200, last),
            side,
        ),
        signal_day: last - day,
    }))
}

/// Strength descending, then most recent signal, then symbol.
pub fn rank_opportunities(opportunities: &mut [Opportunity]) {
    opportunities.sort_by(|a, b| {
        b.strength
            .cmp(&a.strength)
            .then_with(|| a.signal_day.cmp(&b.signal_day))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
