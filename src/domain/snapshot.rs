//! Point-in-time indicator snapshot for one symbol.
//!
//! A snapshot is built fresh from a full bar history: every series is
//! computed once and only its last defined value is kept, together with the
//! latest and previous raw bars.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::condition::Indicator;
use crate::domain::error::EngineError;
use crate::domain::indicator::{
    RSI_NEUTRAL, calculate_atr, calculate_ema, calculate_rsi, calculate_sma, last_defined,
    rolling_max,
};
use crate::domain::ohlcv::{self, OhlcvBar};

/// Bars needed before a snapshot can be built (covers SMA200).
pub const MIN_SNAPSHOT_BARS: usize = 200;

/// Number of daily ranges kept before the latest bar.
pub const PREV_RANGE_COUNT: usize = 7;

const WEEK_BARS: usize = 5;
const MONTH_BARS: usize = 22;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub prev_close: f64,
    pub prev_volume: i64,
    pub ema5: Option<f64>,
    pub ema8: Option<f64>,
    pub ema9: Option<f64>,
    pub ema20: Option<f64>,
    pub ema21: Option<f64>,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub rsi14: f64,
    pub rsi21: f64,
    pub atr14: f64,
    /// Highest close of the last 20 bars.
    pub high20d: Option<f64>,
    pub avg_volume20: Option<f64>,
    /// Ranges (high - low) of the 7 bars before the latest, oldest first.
    pub prev_ranges: Vec<f64>,
    /// Open of the 5th most recent bar.
    pub weekly_open: f64,
    /// Open of the 22nd most recent bar.
    pub monthly_open: f64,
}

pub fn build_snapshot(symbol: &str, bars: &[OhlcvBar]) -> Result<Snapshot, EngineError> {
    if bars.len() < MIN_SNAPSHOT_BARS {
        return Err(EngineError::InsufficientData {
            symbol: symbol.to_string(),
            bars: bars.len(),
            minimum: MIN_SNAPSHOT_BARS,
        });
    }

    let closes = ohlcv::closes(bars);
    let highs = ohlcv::highs(bars);
    let lows = ohlcv::lows(bars);
    let volumes = ohlcv::volumes(bars);

    let n = bars.len();
    let latest = &bars[n - 1];
    let previous = &bars[n - 2];

    let prev_ranges = bars[n - 1 - PREV_RANGE_COUNT..n - 1]
        .iter()
        .map(OhlcvBar::range)
        .collect();

    Ok(Snapshot {
        symbol: symbol.to_string(),
        date: latest.date,
        open: latest.open,
        high: latest.high,
        low: latest.low,
        close: latest.close,
        volume: latest.volume,
        prev_close: previous.close,
        prev_volume: previous.volume,
        ema5: last_defined(&calculate_ema(&closes, 5)),
        ema8: last_defined(&calculate_ema(&closes, 8)),
        ema9: last_defined(&calculate_ema(&closes, 9)),
        ema20: last_defined(&calculate_ema(&closes, 20)),
        ema21: last_defined(&calculate_ema(&closes, 21)),
        sma20: last_defined(&calculate_sma(&closes, 20)),
        sma50: last_defined(&calculate_sma(&closes, 50)),
        sma200: last_defined(&calculate_sma(&closes, 200)),
        rsi14: last_rsi(&closes, 14),
        rsi21: last_rsi(&closes, 21),
        atr14: calculate_atr(&highs, &lows, &closes, 14),
        high20d: last_defined(&rolling_max(&closes, 20)),
        avg_volume20: last_defined(&calculate_sma(&volumes, 20)),
        prev_ranges,
        weekly_open: bars[n - WEEK_BARS].open,
        monthly_open: bars[n - MONTH_BARS].open,
    })
}

fn last_rsi(closes: &[f64], period: usize) -> f64 {
    calculate_rsi(closes, period)
        .last()
        .copied()
        .unwrap_or(RSI_NEUTRAL)
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn pct_change(from: f64, to: f64) -> Option<f64> {
    finite((to - from) / from * 100.0)
}

fn ratio(num: f64, den: Option<f64>) -> Option<f64> {
    match den {
        Some(d) if d > 0.0 => finite(num / d),
        _ => None,
    }
}

impl Snapshot {
    /// Resolve an indicator against this snapshot. Derived values that would
    /// divide by zero resolve to `None`.
    ///
    /// `volume_ratio` is today's volume over the 20-bar average;
    /// `prev_volume_ratio` is today's volume over yesterday's.
    pub fn value(&self, indicator: Indicator) -> Option<f64> {
        match indicator {
            Indicator::Rsi => Some(self.rsi14),
            Indicator::Rsi21 => Some(self.rsi21),
            Indicator::Price => Some(self.close),
            Indicator::Open => Some(self.open),
            Indicator::High => Some(self.high),
            Indicator::Low => Some(self.low),
            Indicator::Volume => Some(self.volume as f64),
            Indicator::PrevClose => Some(self.prev_close),
            Indicator::PrevVolume => Some(self.prev_volume as f64),
            Indicator::ChangePercent => pct_change(self.prev_close, self.close),
            Indicator::GapPercent => pct_change(self.prev_close, self.open),
            Indicator::IntradayReturn => pct_change(self.open, self.close),
            Indicator::VolumeRatio => ratio(self.volume as f64, self.avg_volume20),
            Indicator::PrevVolumeRatio => {
                ratio(self.volume as f64, Some(self.prev_volume as f64))
            }
            Indicator::Ema5 => self.ema5,
            Indicator::Ema8 => self.ema8,
            Indicator::Ema9 => self.ema9,
            Indicator::Ema20 => self.ema20,
            Indicator::Ema21 => self.ema21,
            Indicator::Sma20 => self.sma20,
            Indicator::Sma50 => self.sma50,
            Indicator::Sma200 => self.sma200,
            Indicator::Atr => Some(self.atr14),
            Indicator::High20d => self.high20d,
            Indicator::High20dDistance => self
                .high20d
                .and_then(|h| finite((self.close / h - 1.0) * 100.0)),
            Indicator::CloseOffHigh => finite((self.high - self.close) / self.close * 100.0),
            Indicator::DailyRange => Some(self.daily_range()),
            Indicator::RangeExpansion => Some(self.range_expansion() as f64),
            Indicator::WeeklyOpen => Some(self.weekly_open),
            Indicator::MonthlyOpen => Some(self.monthly_open),
        }
    }

    pub fn daily_range(&self) -> f64 {
        self.high - self.low
    }

    /// How many of the preceding daily ranges are strictly narrower than today's.
    pub fn range_expansion(&self) -> usize {
        let today = self.daily_range();
        self.prev_ranges.iter().filter(|r| **r < today).count()
    }

    pub fn change(&self) -> f64 {
        self.close - self.prev_close
    }

    pub fn change_percent(&self) -> f64 {
        self.value(Indicator::ChangePercent).unwrap_or(0.0)
    }
}
