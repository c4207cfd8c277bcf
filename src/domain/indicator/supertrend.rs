//! Supertrend: an ATR band that trails price and flips side on a close
//! through the active band.
//!
//! basic_upper = hl2 + factor * ATR, basic_lower = hl2 - factor * ATR.
//! The final upper band only moves down unless the previous close broke above
//! it; the final lower band only moves up unless the previous close broke
//! below it. While tracking the upper band the trend is down; a close above
//! it switches to the lower band (trend up), and vice versa.

use super::calculate_atr_series;
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    /// Price above the band (bullish).
    Up,
    /// Price below the band (bearish).
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupertrendPoint {
    pub value: f64,
    pub direction: TrendDirection,
}

/// `None` wherever the ATR is still warming up.
pub fn calculate_supertrend(
    bars: &[OhlcvBar],
    factor: f64,
    atr_period: usize,
) -> Vec<Option<SupertrendPoint>> {
    let atr = calculate_atr_series(bars, atr_period);
    let mut points = Vec::with_capacity(bars.len());

    let mut prev_bands: Option<(f64, f64)> = None;
    let mut on_upper = true;

    for (i, bar) in bars.iter().enumerate() {
        let Some(atr) = atr[i] else {
            points.push(None);
            continue;
        };

        let hl2 = (bar.high + bar.low) / 2.0;
        let basic_upper = hl2 + factor * atr;
        let basic_lower = hl2 - factor * atr;

        let (upper, lower) = match (prev_bands, i.checked_sub(1).map(|p| bars[p].close)) {
            (Some((prev_upper, prev_lower)), Some(prev_close)) => {
                let upper = if basic_upper < prev_upper || prev_close > prev_upper {
                    basic_upper
                } else {
                    prev_upper
                };
                let lower = if basic_lower > prev_lower || prev_close < prev_lower {
                    basic_lower
                } else {
                    prev_lower
                };
                (upper, lower)
            }
            _ => (basic_upper, basic_lower),
        };

        on_upper = if on_upper {
            bar.close <= upper
        } else {
            bar.close < lower
        };

        points.push(Some(if on_upper {
            SupertrendPoint {
                value: upper,
                direction: TrendDirection::Down,
            }
        } else {
            SupertrendPoint {
                value: lower,
                direction: TrendDirection::Up,
            }
        }));

        prev_bands = Some((upper, lower));
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn undefined_during_atr_warmup() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0]);
        let st = calculate_supertrend(&bars, 3.0, 3);
        assert!(st[0].is_none());
        assert!(st[1].is_none());
        assert!(st[2].is_some());
        assert!(st[3].is_some());
    }

    #[test]
    fn starts_on_upper_band() {
        let bars = make_bars(&[100.0, 100.0, 100.0]);
        let st = calculate_supertrend(&bars, 2.0, 2);
        let first = st[1].unwrap();
        assert_eq!(first.direction, TrendDirection::Down);
        assert!(first.value > 100.0);
    }

    #[test]
    fn rising_series_turns_up() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + 5.0 * i as f64).collect();
        let bars = make_bars(&closes);
        let st = calculate_supertrend(&bars, 1.0, 1);
        let last = st.last().copied().flatten().unwrap();
        assert_eq!(last.direction, TrendDirection::Up);
        assert!(last.value < *closes.last().unwrap());
    }

    #[test]
    fn falling_series_stays_down() {
        let closes: Vec<f64> = (0..40).map(|i| 300.0 - 5.0 * i as f64).collect();
        let bars = make_bars(&closes);
        let st = calculate_supertrend(&bars, 2.0, 2);
        let last = st.last().copied().flatten().unwrap();
        assert_eq!(last.direction, TrendDirection::Down);
        assert!(last.value > *closes.last().unwrap());
    }

    #[test]
    fn reversal_flips_direction() {
        let mut closes: Vec<f64> = (0..30).map(|i| 300.0 - 5.0 * i as f64).collect();
        closes.extend((1..=30).map(|i| 155.0 + 10.0 * i as f64));
        let bars = make_bars(&closes);
        let st = calculate_supertrend(&bars, 1.0, 1);
        assert_eq!(st[29].unwrap().direction, TrendDirection::Down);
        assert_eq!(st.last().copied().flatten().unwrap().direction, TrendDirection::Up);
    }

    #[test]
    fn upper_band_ratchets_down_only() {
        let closes: Vec<f64> = (0..20).map(|i| 200.0 - i as f64).collect();
        let bars = make_bars(&closes);
        let st = calculate_supertrend(&bars, 3.0, 3);
        let values: Vec<f64> = st.iter().flatten().map(|p| p.value).collect();
        for pair in values.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }
}
