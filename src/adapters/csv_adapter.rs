//! CSV file bar source.
//!
//! One file per symbol at `{base}/{SYMBOL}.csv` with a header row and the
//! columns `date,open,high,low,close,volume` (dates as `YYYY-MM-DD`). The
//! lookback is measured back from the newest bar in the file, so static
//! histories stay usable.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::{BarSource, Lookback};

pub struct CsvBarSource {
    base_path: PathBuf,
}

impl CsvBarSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

fn field<T>(record: &csv::StringRecord, index: usize, name: &str, symbol: &str) -> Result<T, EngineError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = record
        .get(index)
        .ok_or_else(|| EngineError::fetch(symbol, format!("missing {name} column")))?;
    raw.trim()
        .parse()
        .map_err(|e| EngineError::fetch(symbol, format!("invalid {name} value '{raw}': {e}")))
}

pub fn parse_bars(symbol: &str, content: &str) -> Result<Vec<OhlcvBar>, EngineError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for result in rdr.records() {
        let record =
            result.map_err(|e| EngineError::fetch(symbol, format!("CSV parse error: {e}")))?;

        let date_str: String = field(&record, 0, "date", symbol)?;
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| EngineError::fetch(symbol, format!("invalid date '{date_str}': {e}")))?;

        bars.push(OhlcvBar {
            date,
            open: field(&record, 1, "open", symbol)?,
            high: field(&record, 2, "high", symbol)?,
            low: field(&record, 3, "low", symbol)?,
            close: field(&record, 4, "close", symbol)?,
            volume: field(&record, 5, "volume", symbol)?,
        });
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

fn trim_to_lookback(mut bars: Vec<OhlcvBar>, lookback: Lookback) -> Vec<OhlcvBar> {
    let Some(last) = bars.last().map(|b| b.date) else {
        return bars;
    };
    let Some(cutoff) = last.checked_sub_days(Days::new(u64::from(lookback.days))) else {
        return bars;
    };
    bars.retain(|b| b.date > cutoff);
    bars
}

#[async_trait]
impl BarSource for CsvBarSource {
    async fn fetch_bars(
        &self,
        symbol: &str,
        lookback: Lookback,
    ) -> Result<Vec<OhlcvBar>, EngineError> {
        let path = self.csv_path(symbol);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| EngineError::fetch(symbol, format!("failed to read {}: {e}", path.display())))?;

        let bars = parse_bars(symbol, &content)?;
        Ok(trim_to_lookback(bars, lookback))
    }
}
