//! Engine settings with their defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::backtest::DEFAULT_CAPITAL;
use crate::domain::strategy::BtstBreakout;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Symbols processed concurrently per batch.
    pub size: usize,
    /// Pause between consecutive batches (not after the last).
    pub delay: Duration,
    /// Upper bound for a single symbol fetch.
    pub fetch_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 5,
            delay: Duration::from_millis(300),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub lookback_days: u32,
    pub cache_ttl: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            lookback_days: 400,
            cache_ttl: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub months: u32,
    pub capital: f64,
    pub cache_ttl: Duration,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            months: 6,
            capital: DEFAULT_CAPITAL,
            cache_ttl: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityConfig {
    pub lookback_days: u32,
    pub cache_ttl: Duration,
    /// Opportunities kept per side.
    pub limit: usize,
}

impl Default for OpportunityConfig {
    fn default() -> Self {
        Self {
            lookback_days: 400,
            cache_ttl: Duration::from_secs(60 * 60),
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub data_path: PathBuf,
    /// Empty when the config file names no universe.
    pub symbols: Vec<String>,
    pub batch: BatchConfig,
    pub scan: ScanConfig,
    pub backtest: BacktestConfig,
    pub opportunities: OpportunityConfig,
    pub strategy: BtstBreakout,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data"),
            symbols: Vec::new(),
            batch: BatchConfig::default(),
            scan: ScanConfig::default(),
            backtest: BacktestConfig::default(),
            opportunities: OpportunityConfig::default(),
            strategy: BtstBreakout::default(),
        }
    }
}
