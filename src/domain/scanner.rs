//! Named scanners: AND-combinations of weighted conditions.
//!
//! A symbol matches a scanner when every condition holds. Matches are scored
//! from the condition weights and ranked by score, then change percent, then
//! symbol.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::condition::{Condition, Indicator, Operator};
use crate::domain::condition_eval::{self, evaluate};
use crate::domain::error::EngineError;
use crate::domain::snapshot::Snapshot;

/// Points a satisfied condition adds to the match score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weight {
    Fixed(u32),
    /// round(|actual| * factor)
    Scaled(f64),
}

impl Weight {
    pub fn points(self, actual: Option<f64>) -> u32 {
        match self {
            Weight::Fixed(p) => p,
            Weight::Scaled(factor) => actual
                .map(|v| (v.abs() * factor).round())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map_or(0, |v| v as u32),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedCondition {
    pub condition: Condition,
    pub weight: Weight,
    /// Reason text reported instead of the generated description.
    pub reason: Option<&'static str>,
}

impl WeightedCondition {
    pub fn new(condition: Condition, weight: Weight) -> Self {
        Self {
            condition,
            weight,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = Some(reason);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scanner {
    pub name: String,
    pub label: String,
    pub conditions: Vec<WeightedCondition>,
    /// RSI reported alongside each match.
    pub rsi_source: Indicator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanMatch {
    pub symbol: String,
    pub close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: i64,
    pub avg_volume: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub rsi: Option<f64>,
    pub reasons: Vec<String>,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerResults {
    pub scanner: String,
    pub label: String,
    pub matches: Vec<ScanMatch>,
    pub total_scanned: usize,
    pub match_count: usize,
}

impl Scanner {
    /// Ad-hoc scanner from parsed filter conditions; one point per condition.
    pub fn custom(conditions: Vec<Condition>) -> Self {
        Self {
            name: "custom".into(),
            label: "Custom Scan".into(),
            conditions: conditions
                .into_iter()
                .map(|c| WeightedCondition::new(c, Weight::Fixed(1)))
                .collect(),
            rsi_source: Indicator::Rsi,
        }
    }

    /// Short-circuit AND over all conditions.
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        self.conditions
            .iter()
            .all(|wc| condition_eval::matches(snapshot, &wc.condition))
    }

    /// Evaluate every condition, collecting reasons and score. `None` if any
    /// condition fails.
    pub fn explain(&self, snapshot: &Snapshot) -> Option<(Vec<String>, u32)> {
        let mut reasons = Vec::with_capacity(self.conditions.len());
        let mut score = 0;
        let mut all = true;

        for wc in &self.conditions {
            let outcome = evaluate(snapshot, &wc.condition);
            if outcome.matches {
                score += wc.weight.points(outcome.actual);
                reasons.push(
                    wc.reason
                        .map(str::to_string)
                        .unwrap_or(outcome.description),
                );
            } else {
                all = false;
            }
        }

        all.then_some((reasons, score))
    }

    pub fn scan(&self, snapshot: &Snapshot) -> Option<ScanMatch> {
        if !self.matches(snapshot) {
            return None;
        }
        let (reasons, score) = self.explain(snapshot)?;

        Some(ScanMatch {
            symbol: snapshot.symbol.clone(),
            close: snapshot.close,
            change: snapshot.change(),
            change_percent: snapshot.change_percent(),
            volume: snapshot.volume,
            avg_volume: snapshot.avg_volume20,
            volume_ratio: snapshot.value(Indicator::VolumeRatio),
            rsi: snapshot.value(self.rsi_source),
            reasons,
            score,
        })
    }

    pub fn run(&self, snapshots: &[Snapshot]) -> ScannerResults {
        let mut matches: Vec<ScanMatch> = snapshots.iter().filter_map(|s| self.scan(s)).collect();
        rank_matches(&mut matches);

        ScannerResults {
            scanner: self.name.clone(),
            label: self.label.clone(),
            match_count: matches.len(),
            total_scanned: snapshots.len(),
            matches,
        }
    }
}

/// Score descending, then change percent descending, then symbol ascending.
pub fn rank_matches(matches: &mut [ScanMatch]) {
    matches.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| {
                b.change_percent
                    .partial_cmp(&a.change_percent)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScannerKind {
    RangeExpansion,
    RangeExpansionV2,
    EmaCrossover,
    Breakout,
    Ema8_21,
    GapUp,
    GapDownReversal,
    IntradayMomentum,
}

impl ScannerKind {
    pub const ALL: [ScannerKind; 8] = [
        ScannerKind::RangeExpansion,
        ScannerKind::RangeExpansionV2,
        ScannerKind::EmaCrossover,
        ScannerKind::Breakout,
        ScannerKind::Ema8_21,
        ScannerKind::GapUp,
        ScannerKind::GapDownReversal,
        ScannerKind::IntradayMomentum,
    ];

    /// Scanners selected by `all`.
    pub const DAILY: [ScannerKind; 5] = [
        ScannerKind::RangeExpansion,
        ScannerKind::RangeExpansionV2,
        ScannerKind::EmaCrossover,
        ScannerKind::Breakout,
        ScannerKind::Ema8_21,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScannerKind::RangeExpansion => "range_expansion",
            ScannerKind::RangeExpansionV2 => "range_expansion_v2",
            ScannerKind::EmaCrossover => "ema_crossover",
            ScannerKind::Breakout => "breakout",
            ScannerKind::Ema8_21 => "ema_8_21",
            ScannerKind::GapUp => "gap_up",
            ScannerKind::GapDownReversal => "gap_down_reversal",
            ScannerKind::IntradayMomentum => "intraday_momentum",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScannerKind::RangeExpansion => "Range Expansion + Trend",
            ScannerKind::RangeExpansionV2 => "Range Expansion v2",
            ScannerKind::EmaCrossover => "5/20 EMA Crossover",
            ScannerKind::Breakout => "20-Day Breakout",
            ScannerKind::Ema8_21 => "EMA 8/21 + RSI",
            ScannerKind::GapUp => "Gap-Up Momentum",
            ScannerKind::GapDownReversal => "Gap-Down Reversal",
            ScannerKind::IntradayMomentum => "Intraday Momentum",
        }
    }

    pub fn scanner(self) -> Scanner {
        use Indicator::*;
        use Operator::*;

        let c = |ind, op, v: f64, w| WeightedCondition::new(Condition::new(ind, op, v), w);
        let cmp = |ind, op, other: Indicator, w| {
            WeightedCondition::new(Condition::new(ind, op, other), w)
        };
        let between = |ind, lo, hi, w| WeightedCondition::new(Condition::between(ind, lo, hi), w);
        let fixed = Weight::Fixed;

        let trend_tail = || {
            vec![
                cmp(Price, Gt, Open, fixed(1)).with_reason("Bullish candle (close > open)"),
                cmp(Price, Gt, PrevClose, fixed(1)).with_reason("Higher close vs yesterday"),
                cmp(Price, Gt, WeeklyOpen, fixed(1)).with_reason("Bullish weekly trend"),
                cmp(Price, Gt, MonthlyOpen, fixed(1)).with_reason("Bullish monthly trend"),
            ]
        };
        let sma_stack = || {
            vec![
                cmp(Sma20, Gt, Sma50, fixed(2)).with_reason("SMA20 > SMA50 (short-term trend up)"),
                cmp(Sma50, Gt, Sma200, fixed(2)).with_reason("SMA50 > SMA200 (long-term trend up)"),
            ]
        };

        let mut rsi_source = Rsi;
        let conditions = match self {
            ScannerKind::RangeExpansion => {
                let mut v = vec![c(RangeExpansion, Gte, 5.0, Weight::Scaled(1.0))];
                v.extend(trend_tail());
                v.push(c(Volume, Gte, 10_000.0, fixed(1)));
                v.extend(sma_stack());
                v
            }
            ScannerKind::RangeExpansionV2 => {
                let mut v = vec![
                    c(RangeExpansion, Gte, 7.0, fixed(7)).with_reason("Range > last 7 days ranges"),
                ];
                v.extend(trend_tail());
                v.push(c(PrevVolume, Gte, 10_000.0, fixed(1)));
                v.extend(sma_stack());
                v
            }
            ScannerKind::EmaCrossover => vec![
                cmp(Ema5, Gt, Ema20, fixed(2)).with_reason("EMA5 > EMA20"),
                c(Rsi, Gt, 50.0, fixed(1)),
                c(Rsi, Lt, 70.0, fixed(1)).with_reason("Not overbought"),
                cmp(Volume, Gt, PrevVolume, fixed(1)).with_reason("Volume increasing"),
                c(Price, Gte, 50.0, fixed(1)),
            ],
            ScannerKind::Breakout => vec![
                c(High20dDistance, Gte, -2.0, fixed(3)).with_reason("At 20-day high"),
                between(Rsi, 55.0, 75.0, fixed(1)),
                c(PrevVolumeRatio, Gte, 1.3, fixed(2)).with_reason("Volume spike"),
                cmp(Price, Gt, Sma200, fixed(1)).with_reason("Above 200 SMA"),
                c(Price, Gte, 100.0, fixed(1)),
            ],
            ScannerKind::Ema8_21 => {
                rsi_source = Rsi21;
                vec![
                    cmp(Ema8, Gt, Ema21, fixed(2)).with_reason("EMA8 > EMA21"),
                    c(Rsi21, Gt, 50.0, fixed(1)),
                    cmp(Volume, Gt, PrevVolume, fixed(1)).with_reason("Volume increasing"),
                    cmp(Price, Gt, PrevClose, fixed(1)).with_reason("Close > prev close"),
                ]
            }
            ScannerKind::GapUp => vec![
                between(GapPercent, 1.0, 5.0, Weight::Scaled(2.0)),
                cmp(Price, Gte, Open, fixed(2)).with_reason("Gap holding"),
                c(VolumeRatio, Gte, 1.2, Weight::Scaled(1.0)),
                c(Rsi, Lte, 75.0, fixed(1)),
                cmp(Price, Gte, Sma20, fixed(1)).with_reason("Above SMA20"),
                c(Price, Gte, 100.0, fixed(0)),
            ],
            ScannerKind::GapDownReversal => vec![
                between(GapPercent, -5.0, -1.0, Weight::Scaled(1.0)),
                c(IntradayReturn, Gt, 0.0, Weight::Scaled(2.0))
                    .with_reason("Recovering above open"),
                c(VolumeRatio, Gte, 1.5, Weight::Scaled(1.0)),
                c(Rsi, Gte, 25.0, fixed(1)),
                c(Price, Gte, 100.0, fixed(0)),
            ],
            ScannerKind::IntradayMomentum => vec![
                c(ChangePercent, Gte, 0.5, Weight::Scaled(2.0)),
                c(VolumeRatio, Gte, 1.5, Weight::Scaled(2.0)),
                cmp(Price, Gt, Open, fixed(1)).with_reason("Bullish"),
                c(CloseOffHigh, Lte, 1.0, fixed(2)).with_reason("Near high of day"),
                between(Rsi, 50.0, 70.0, fixed(1)),
                cmp(Ema8, Gt, Ema21, fixed(2)).with_reason("EMA8 > EMA21"),
                c(Price, Gte, 100.0, fixed(0)),
            ],
        };

        Scanner {
            name: self.name().to_string(),
            label: self.label().to_string(),
            conditions,
            rsi_source,
        }
    }
}

impl fmt::Display for ScannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScannerKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScannerKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| EngineError::invalid("scanner", format!("unknown scanner '{s}'")))
    }
}

/// A scanner name as accepted on input: one built-in or `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerSelection {
    One(ScannerKind),
    All,
}

impl ScannerSelection {
    pub fn kinds(self) -> Vec<ScannerKind> {
        match self {
            ScannerSelection::One(kind) => vec![kind],
            ScannerSelection::All => ScannerKind::DAILY.to_vec(),
        }
    }
}

impl FromStr for ScannerSelection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "all" {
            return Ok(ScannerSelection::All);
        }
        lower.parse().map(ScannerSelection::One)
    }
}

impl fmt::Display for ScannerSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerSelection::One(kind) => write!(f, "{kind}"),
            ScannerSelection::All => f.write_str("all"),
        }
    }
}

/// Run the named scanner (or `all`) over a set of snapshots.
pub fn evaluate_scanner(
    scanner_name: &str,
    snapshots: &[Snapshot],
) -> Result<Vec<ScannerResults>, EngineError> {
    let selection: ScannerSelection = scanner_name.parse()?;
    Ok(selection
        .kinds()
        .into_iter()
        .map(|kind| kind.scanner().run(snapshots))
        .collect())
}
