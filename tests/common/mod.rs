#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
pub use swingscan::domain::ohlcv::OhlcvBar;
use swingscan::domain::config::{BatchConfig, EngineConfig};
use swingscan::domain::error::EngineError;
use swingscan::ports::data_port::{BarSource, Lookback};

/// In-memory bar source that records every fetch.
#[derive(Default)]
pub struct MockBarSource {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    /// Served for symbols without their own entry in `data`.
    pub fallback: Option<Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    pub delays: HashMap<String, Duration>,
    calls: Mutex<Vec<(String, Lookback)>>,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_fallback(mut self, bars: Vec<OhlcvBar>) -> Self {
        self.fallback = Some(bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn with_delay(mut self, symbol: &str, delay: Duration) -> Self {
        self.delays.insert(symbol.to_string(), delay);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, symbol: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == symbol)
            .count()
    }

    pub fn lookbacks(&self) -> Vec<Lookback> {
        self.calls.lock().unwrap().iter().map(|(_, l)| *l).collect()
    }
}

#[async_trait]
impl BarSource for MockBarSource {
    async fn fetch_bars(
        &self,
        symbol: &str,
        lookback: Lookback,
    ) -> Result<Vec<OhlcvBar>, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), lookback));

        if let Some(delay) = self.delays.get(symbol) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(reason) = self.errors.get(symbol) {
            return Err(EngineError::fetch(symbol, reason.clone()));
        }
        Ok(self
            .data
            .get(symbol)
            .or(self.fallback.as_ref())
            .cloned()
            .unwrap_or_default())
    }
}

/// Daily bars one calendar day apart with a two-point high/low spread.
pub fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            date: start + chrono::Days::new(i as u64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100_000,
        })
        .collect()
}

pub fn rising_closes(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + i as f64).collect()
}

/// Steady uptrend, a 10-bar pullback, then `rally` sharp up bars.
pub fn pullback_then_rally(rally: usize) -> Vec<f64> {
    let mut closes = rising_closes(230);
    let top = *closes.last().unwrap();
    closes.extend((1..=10).map(|i| top - 3.0 * i as f64));
    let bottom = *closes.last().unwrap();
    closes.extend((1..=rally).map(|i| bottom + 15.0 * i as f64));
    closes
}

pub fn symbols(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("SYM{i:02}")).collect()
}

pub fn test_config(batch_size: usize) -> EngineConfig {
    EngineConfig {
        batch: BatchConfig {
            size: batch_size,
            delay: Duration::ZERO,
            fetch_timeout: Duration::from_secs(10),
        },
        ..EngineConfig::default()
    }
}
