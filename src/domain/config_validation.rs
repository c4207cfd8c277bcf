//! Configuration validation.
//!
//! Validates all config fields before any symbol is fetched, then builds an
//! [`EngineConfig`]. Missing keys fall back to the defaults in
//! [`crate::domain::config`]; present but out-of-range keys are rejected.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::backtest::MAX_MONTHS;
use crate::domain::config::{
    BacktestConfig, BatchConfig, EngineConfig, OpportunityConfig, ScanConfig,
};
use crate::domain::error::EngineError;
use crate::domain::strategy::BtstBreakout;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Read an integer key, reject values below `min`, and narrow it to `T`.
fn int_at_least<T: TryFrom<i64>>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
    min: i64,
) -> Result<T, EngineError> {
    let value = config.get_int(section, key, default);
    if value < min {
        return Err(invalid(section, key, format!("{key} must be at least {min}")));
    }
    T::try_from(value).map_err(|_| invalid(section, key, format!("{key} is too large: {value}")))
}

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_data(config)?;
    validate_universe(config)?;
    batch_config(config)?;
    scan_config(config)?;
    backtest_config(config)?;
    opportunity_config(config)?;
    strategy_config(config)?;
    Ok(())
}

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, EngineError> {
    validate_engine_config(config)?;

    Ok(EngineConfig {
        data_path: validate_data(config)?,
        symbols: validate_universe(config)?,
        batch: batch_config(config)?,
        scan: scan_config(config)?,
        backtest: backtest_config(config)?,
        opportunities: opportunity_config(config)?,
        strategy: strategy_config(config)?,
    })
}

fn validate_data(config: &dyn ConfigPort) -> Result<PathBuf, EngineError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => Ok(PathBuf::from(s.trim())),
        _ => Err(EngineError::ConfigMissing {
            section: "data".to_string(),
            key: "path".to_string(),
        }),
    }
}

fn validate_universe(config: &dyn ConfigPort) -> Result<Vec<String>, EngineError> {
    match config.get_string("universe", "symbols") {
        Some(s) if !s.trim().is_empty() => {
            parse_symbols(&s).map_err(|e| invalid("universe", "symbols", e.to_string()))
        }
        _ => Ok(Vec::new()),
    }
}

fn batch_config(config: &dyn ConfigPort) -> Result<BatchConfig, EngineError> {
    let defaults = BatchConfig::default();
    let size: usize = int_at_least(config, "batch", "size", defaults.size as i64, 1)?;
    let delay_ms: u64 = int_at_least(
        config,
        "batch",
        "delay_ms",
        defaults.delay.as_millis() as i64,
        0,
    )?;
    let timeout: u64 = int_at_least(
        config,
        "batch",
        "fetch_timeout_secs",
        defaults.fetch_timeout.as_secs() as i64,
        1,
    )?;

    Ok(BatchConfig {
        size,
        delay: Duration::from_millis(delay_ms),
        fetch_timeout: Duration::from_secs(timeout),
    })
}

fn scan_config(config: &dyn ConfigPort) -> Result<ScanConfig, EngineError> {
    let defaults = ScanConfig::default();
    let lookback: u32 = int_at_least(
        config,
        "scan",
        "lookback_days",
        defaults.lookback_days as i64,
        1,
    )?;
    let ttl: u64 = int_at_least(
        config,
        "scan",
        "cache_ttl_secs",
        defaults.cache_ttl.as_secs() as i64,
        0,
    )?;

    Ok(ScanConfig {
        lookback_days: lookback,
        cache_ttl: Duration::from_secs(ttl),
    })
}

fn backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, EngineError> {
    let defaults = BacktestConfig::default();

    let months = config.get_int("backtest", "months", defaults.months as i64);
    if !(1..=MAX_MONTHS as i64).contains(&months) {
        return Err(invalid(
            "backtest",
            "months",
            format!("months must be between 1 and {MAX_MONTHS}"),
        ));
    }

    let capital = config.get_double("backtest", "capital", defaults.capital);
    if !(capital.is_finite() && capital > 0.0) {
        return Err(invalid("backtest", "capital", "capital must be positive"));
    }

    let ttl: u64 = int_at_least(
        config,
        "backtest",
        "cache_ttl_secs",
        defaults.cache_ttl.as_secs() as i64,
        0,
    )?;

    Ok(BacktestConfig {
        months: months as u32,
        capital,
        cache_ttl: Duration::from_secs(ttl),
    })
}

fn opportunity_config(config: &dyn ConfigPort) -> Result<OpportunityConfig, EngineError> {
    let defaults = OpportunityConfig::default();
    let lookback: u32 = int_at_least(
        config,
        "opportunities",
        "lookback_days",
        defaults.lookback_days as i64,
        1,
    )?;
    let ttl: u64 = int_at_least(
        config,
        "opportunities",
        "cache_ttl_secs",
        defaults.cache_ttl.as_secs() as i64,
        0,
    )?;
    let limit: usize = int_at_least(config, "opportunities", "limit", defaults.limit as i64, 1)?;

    Ok(OpportunityConfig {
        lookback_days: lookback,
        cache_ttl: Duration::from_secs(ttl),
        limit,
    })
}

fn strategy_config(config: &dyn ConfigPort) -> Result<BtstBreakout, EngineError> {
    let d = BtstBreakout::default();
    let period = |key: &str, default: usize| -> Result<usize, EngineError> {
        int_at_least(config, "strategy", key, default as i64, 1)
    };

    let rsi_threshold = config.get_double("strategy", "rsi_threshold", d.rsi_threshold);
    if !(0.0..=100.0).contains(&rsi_threshold) {
        return Err(invalid(
            "strategy",
            "rsi_threshold",
            "rsi_threshold must be between 0 and 100",
        ));
    }

    let volume_multiple = config.get_double("strategy", "volume_multiple", d.volume_multiple);
    if !(volume_multiple.is_finite() && volume_multiple > 0.0) {
        return Err(invalid(
            "strategy",
            "volume_multiple",
            "volume_multiple must be positive",
        ));
    }

    let min_price = config.get_double("strategy", "min_price", d.min_price);
    if !(min_price.is_finite() && min_price >= 0.0) {
        return Err(invalid(
            "strategy",
            "min_price",
            "min_price must be non-negative",
        ));
    }

    Ok(BtstBreakout {
        ema_period: period("ema_period", d.ema_period)?,
        sma_period: period("sma_period", d.sma_period)?,
        rsi_period: period("rsi_period", d.rsi_period)?,
        rsi_threshold,
        volume_period: period("volume_period", d.volume_period)?,
        volume_multiple,
        min_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }

        fn raw(&self, section: &str, key: &str) -> Option<&String> {
            self.0.get(&(section.to_string(), key.to_string()))
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.raw(section, key).cloned()
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.raw(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.raw(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    fn minimal() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![("data", "path", "./bars")]
    }

    fn with(extra: &[(&'static str, &'static str, &'static str)]) -> MapConfig {
        let mut entries = minimal();
        entries.extend_from_slice(extra);
        MapConfig::new(&entries)
    }

    fn assert_invalid(result: Result<EngineConfig, EngineError>, expected_key: &str) {
        match result {
            Err(EngineError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = build_engine_config(&with(&[])).unwrap();
        assert_eq!(cfg.data_path, PathBuf::from("./bars"));
        assert!(cfg.symbols.is_empty());
        assert_eq!(cfg.batch, BatchConfig::default());
        assert_eq!(cfg.scan, ScanConfig::default());
        assert_eq!(cfg.backtest, BacktestConfig::default());
        assert_eq!(cfg.opportunities, OpportunityConfig::default());
        assert_eq!(cfg.strategy, BtstBreakout::default());
    }

    #[test]
    fn missing_data_path() {
        let result = build_engine_config(&MapConfig::new(&[]));
        assert!(matches!(
            result,
            Err(EngineError::ConfigMissing { ref section, ref key }) if section == "data" && key == "path"
        ));
    }

    #[test]
    fn full_config() {
        let cfg = build_engine_config(&with(&[
            ("universe", "symbols", "tcs, infy"),
            ("batch", "size", "10"),
            ("batch", "delay_ms", "100"),
            ("batch", "fetch_timeout_secs", "3"),
            ("scan", "lookback_days", "300"),
            ("scan", "cache_ttl_secs", "60"),
            ("backtest", "months", "12"),
            ("backtest", "capital", "50000"),
            ("opportunities", "limit", "5"),
            ("strategy", "ema_period", "50"),
            ("strategy", "rsi_threshold", "60"),
        ]))
        .unwrap();

        assert_eq!(cfg.symbols, vec!["TCS", "INFY"]);
        assert_eq!(cfg.batch.size, 10);
        assert_eq!(cfg.batch.delay, Duration::from_millis(100));
        assert_eq!(cfg.batch.fetch_timeout, Duration::from_secs(3));
        assert_eq!(cfg.scan.lookback_days, 300);
        assert_eq!(cfg.scan.cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.backtest.months, 12);
        assert!((cfg.backtest.capital - 50_000.0).abs() < f64::EPSILON);
        assert_eq!(cfg.opportunities.limit, 5);
        assert_eq!(cfg.strategy.ema_period, 50);
        assert!((cfg.strategy.rsi_threshold - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_batch_size_rejected() {
        assert_invalid(build_engine_config(&with(&[("batch", "size", "0")])), "size");
    }

    #[test]
    fn oversized_lookback_rejected() {
        assert_invalid(
            build_engine_config(&with(&[("scan", "lookback_days", "5000000000")])),
            "lookback_days",
        );
        assert_invalid(
            build_engine_config(&with(&[("opportunities", "lookback_days", "4294967296")])),
            "lookback_days",
        );
        let cfg = build_engine_config(&with(&[("scan", "lookback_days", "4294967295")])).unwrap();
        assert_eq!(cfg.scan.lookback_days, u32::MAX);
    }

    #[test]
    fn months_out_of_range_rejected() {
        assert_invalid(
            build_engine_config(&with(&[("backtest", "months", "13")])),
            "months",
        );
        assert_invalid(
            build_engine_config(&with(&[("backtest", "months", "0")])),
            "months",
        );
    }

    #[test]
    fn non_positive_capital_rejected() {
        assert_invalid(
            build_engine_config(&with(&[("backtest", "capital", "-1")])),
            "capital",
        );
    }

    #[test]
    fn duplicate_universe_symbol_rejected() {
        assert_invalid(
            build_engine_config(&with(&[("universe", "symbols", "TCS,tcs")])),
            "symbols",
        );
    }

    #[test]
    fn strategy_thresholds_checked() {
        assert_invalid(
            build_engine_config(&with(&[("strategy", "rsi_threshold", "101")])),
            "rsi_threshold",
        );
        assert_invalid(
            build_engine_config(&with(&[("strategy", "volume_multiple", "0")])),
            "volume_multiple",
        );
        assert_invalid(
            build_engine_config(&with(&[("strategy", "sma_period", "0")])),
            "sma_period",
        );
    }
}
