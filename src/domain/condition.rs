//! Scan condition data structures and the filter-string parser.
//!
//! A condition compares one snapshot indicator against a literal or another
//! indicator:
//! - `Indicator`: closed set of values a snapshot can resolve
//! - `Operator`: comparison kind
//! - `Operand`: right-hand side, literal number or indicator reference
//! - `Condition`: `{indicator, operator, value, value2?}`
//!
//! Filter strings use `indicator:operator:value[:value2]` entries separated by
//! commas, e.g. `rsi:between:55:75,price:gt:sma_200`.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    Rsi,
    Rsi21,
    Price,
    Open,
    High,
    Low,
    Volume,
    PrevClose,
    PrevVolume,
    ChangePercent,
    GapPercent,
    IntradayReturn,
    VolumeRatio,
    PrevVolumeRatio,
    Ema5,
    Ema8,
    Ema9,
    Ema20,
    Ema21,
    Sma20,
    Sma50,
    Sma200,
    Atr,
    High20d,
    High20dDistance,
    CloseOffHigh,
    DailyRange,
    RangeExpansion,
    WeeklyOpen,
    MonthlyOpen,
}

impl Indicator {
    pub const ALL: [Indicator; 30] = [
        Indicator::Rsi,
        Indicator::Rsi21,
        Indicator::Price,
        Indicator::Open,
        Indicator::High,
        Indicator::Low,
        Indicator::Volume,
        Indicator::PrevClose,
        Indicator::PrevVolume,
        Indicator::ChangePercent,
        Indicator::GapPercent,
        Indicator::IntradayReturn,
        Indicator::VolumeRatio,
        Indicator::PrevVolumeRatio,
        Indicator::Ema5,
        Indicator::Ema8,
        Indicator::Ema9,
        Indicator::Ema20,
        Indicator::Ema21,
        Indicator::Sma20,
        Indicator::Sma50,
        Indicator::Sma200,
        Indicator::Atr,
        Indicator::High20d,
        Indicator::High20dDistance,
        Indicator::CloseOffHigh,
        Indicator::DailyRange,
        Indicator::RangeExpansion,
        Indicator::WeeklyOpen,
        Indicator::MonthlyOpen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Indicator::Rsi => "rsi",
            Indicator::Rsi21 => "rsi_21",
            Indicator::Price => "price",
            Indicator::Open => "open",
            Indicator::High => "high",
            Indicator::Low => "low",
            Indicator::Volume => "volume",
            Indicator::PrevClose => "prev_close",
            Indicator::PrevVolume => "prev_volume",
            Indicator::ChangePercent => "change_percent",
            Indicator::GapPercent => "gap_percent",
            Indicator::IntradayReturn => "intraday_return",
            Indicator::VolumeRatio => "volume_ratio",
            Indicator::PrevVolumeRatio => "prev_volume_ratio",
            Indicator::Ema5 => "ema_5",
            Indicator::Ema8 => "ema_8",
            Indicator::Ema9 => "ema_9",
            Indicator::Ema20 => "ema_20",
            Indicator::Ema21 => "ema_21",
            Indicator::Sma20 => "sma_20",
            Indicator::Sma50 => "sma_50",
            Indicator::Sma200 => "sma_200",
            Indicator::Atr => "atr",
            Indicator::High20d => "high_20d",
            Indicator::High20dDistance => "high_20d_distance",
            Indicator::CloseOffHigh => "close_off_high",
            Indicator::DailyRange => "daily_range",
            Indicator::RangeExpansion => "range_expansion",
            Indicator::WeeklyOpen => "weekly_open",
            Indicator::MonthlyOpen => "monthly_open",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Indicator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "rsi_14" => return Ok(Indicator::Rsi),
            "close" => return Ok(Indicator::Price),
            _ => {}
        }
        Indicator::ALL
            .iter()
            .copied()
            .find(|ind| ind.name() == lower)
            .ok_or_else(|| format!("unknown indicator '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Between,
    CrossesAbove,
    CrossesBelow,
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Eq => "eq",
            Operator::Between => "between",
            Operator::CrossesAbove => "crosses_above",
            Operator::CrossesBelow => "crosses_below",
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gt" => Ok(Operator::Gt),
            "gte" => Ok(Operator::Gte),
            "lt" => Ok(Operator::Lt),
            "lte" => Ok(Operator::Lte),
            "eq" => Ok(Operator::Eq),
            "between" => Ok(Operator::Between),
            "crosses_above" => Ok(Operator::CrossesAbove),
            "crosses_below" => Ok(Operator::CrossesBelow),
            _ => Err(format!("unknown operator '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Indicator(Indicator),
    Literal(f64),
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Literal(v)
    }
}

impl From<Indicator> for Operand {
    fn from(ind: Indicator) -> Self {
        Operand::Indicator(ind)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Indicator(ind) => write!(f, "{ind}"),
            Operand::Literal(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub indicator: Indicator,
    pub operator: Operator,
    pub value: Operand,
    /// Upper bound for `between`.
    pub value2: Option<f64>,
}

impl Condition {
    pub fn new(indicator: Indicator, operator: Operator, value: impl Into<Operand>) -> Self {
        Self {
            indicator,
            operator,
            value: value.into(),
            value2: None,
        }
    }

    pub fn between(indicator: Indicator, low: f64, high: f64) -> Self {
        Self {
            indicator,
            operator: Operator::Between,
            value: Operand::Literal(low),
            value2: Some(high),
        }
    }
}

/// A `:`-separated token and the byte offset where it starts.
struct Token<'a> {
    text: &'a str,
    position: usize,
}

fn split_with_offsets(input: &str, sep: char, base: usize) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        if ch == sep {
            tokens.push(Token {
                text: &input[start..i],
                position: base + start,
            });
            start = i + ch.len_utf8();
        }
    }
    tokens.push(Token {
        text: &input[start..],
        position: base + start,
    });
    tokens
}

impl<'a> Token<'a> {
    fn trimmed(&self) -> Token<'a> {
        let leading = self.text.len() - self.text.trim_start().len();
        Token {
            text: self.text.trim(),
            position: self.position + leading,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.position,
        }
    }
}

fn parse_number(token: &Token<'_>) -> Result<f64, ParseError> {
    match token.text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(token.error(format!("expected number, found '{}'", token.text))),
    }
}

fn parse_operand(token: &Token<'_>) -> Result<Operand, ParseError> {
    if let Ok(ind) = token.text.parse::<Indicator>() {
        return Ok(Operand::Indicator(ind));
    }
    parse_number(token)
        .map(Operand::Literal)
        .map_err(|_| token.error(format!("expected number or indicator, found '{}'", token.text)))
}

fn parse_entry(entry: &Token<'_>) -> Result<Condition, ParseError> {
    let parts: Vec<Token<'_>> = split_with_offsets(entry.text, ':', entry.position)
        .iter()
        .map(Token::trimmed)
        .collect();

    if parts.len() < 3 {
        return Err(entry.error(format!(
            "expected indicator:operator:value, found '{}'",
            entry.text.trim()
        )));
    }
    if parts.len() > 4 {
        return Err(parts[4].error("too many fields in filter"));
    }
    if let Some(empty) = parts.iter().find(|p| p.text.is_empty()) {
        return Err(empty.error("empty field in filter"));
    }

    let indicator = parts[0]
        .text
        .parse::<Indicator>()
        .map_err(|e| parts[0].error(e))?;
    let operator = parts[1]
        .text
        .parse::<Operator>()
        .map_err(|e| parts[1].error(e))?;
    let value = parse_operand(&parts[2])?;

    let value2 = match parts.get(3) {
        Some(token) if operator == Operator::Between => Some(parse_number(token)?),
        Some(token) => {
            return Err(token.error(format!(
                "second value is only valid with 'between', not '{}'",
                operator.name()
            )));
        }
        None => None,
    };

    if operator == Operator::Between {
        if !matches!(value, Operand::Literal(_)) {
            return Err(parts[2].error("'between' bounds must be numbers"));
        }
        if value2.is_none() {
            return Err(entry.error("'between' requires a second value"));
        }
    }

    Ok(Condition {
        indicator,
        operator,
        value,
        value2,
    })
}

/// Parse a comma-separated filter string into conditions.
pub fn parse_filters(input: &str) -> Result<Vec<Condition>, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError {
            message: "no filters provided".into(),
            position: 0,
        });
    }

    split_with_offsets(input, ',', 0)
        .iter()
        .map(|entry| parse_entry(&entry.trimmed()))
        .collect()
}
