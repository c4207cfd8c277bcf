//! Universe-level operations: batching, caching and aggregation.
//!
//! Every operation validates its parameters before any symbol is fetched,
//! then fans out per batch through [`batch::run_batches`]. Per-symbol results
//! are cached by symbol and query parameters; `force_refresh` skips cache
//! reads but still stores fresh results.
//!
//! The caches live as long as the `Orchestrator`, so they pay off for
//! long-lived library callers; the CLI builds a fresh one per invocation.

pub mod batch;
pub mod cache;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::backtest::{
    StockBacktestResult, UniverseBacktestResult, WARMUP_MONTHS, aggregate_universe,
    backtest_with_strategy, check_backtest_bars, validate_backtest_params,
};
use crate::domain::condition::parse_filters;
use crate::domain::config::EngineConfig;
use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::opportunity::{Opportunity, Side, detect_opportunity, rank_opportunities};
use crate::domain::scanner::{Scanner, ScannerResults, ScannerSelection, evaluate_scanner};
use crate::domain::snapshot::{Snapshot, build_snapshot};
use crate::domain::strategy::SignalStrategy;
use crate::ports::clock_port::{Clock, SystemClock};
use crate::ports::data_port::{BarSource, Lookback};

use self::batch::{BatchSummary, run_batches};
use self::cache::TtlCache;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    #[serde(flatten)]
    pub summary: BatchSummary,
    pub results: Vec<ScannerResults>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    #[serde(flatten)]
    pub summary: BatchSummary,
    pub result: UniverseBacktestResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityReport {
    #[serde(flatten)]
    pub summary: BatchSummary,
    /// Strongest buy signals, at most `limit`.
    pub buy: Vec<Opportunity>,
    /// Strongest sell signals, at most `limit`.
    pub sell: Vec<Opportunity>,
}

type LookbackKey = (String, u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BacktestKey {
    symbol: String,
    months: u32,
    capital_bits: u64,
}

pub struct Orchestrator {
    source: Arc<dyn BarSource>,
    config: EngineConfig,
    snapshots: TtlCache<LookbackKey, Snapshot>,
    backtests: TtlCache<BacktestKey, StockBacktestResult>,
    opportunities: TtlCache<LookbackKey, Option<Opportunity>>,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn BarSource>, config: EngineConfig) -> Self {
        Self::with_clock(source, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn BarSource>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            config,
            snapshots: TtlCache::new(clock.clone()),
            backtests: TtlCache::new(clock.clone()),
            opportunities: TtlCache::new(clock),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one built-in scanner, or `all` daily scanners, over a universe.
    pub async fn scan_universe(
        &self,
        symbols: &[String],
        scanner_name: &str,
        force_refresh: bool,
    ) -> Result<ScanReport, EngineError> {
        scanner_name.parse::<ScannerSelection>()?;
        info!(scanner = scanner_name, symbols = symbols.len(), "scanning universe");

        let (snapshots, summary) = self.collect_snapshots(symbols, force_refresh).await;
        let results = evaluate_scanner(scanner_name, &snapshots)?;
        log_summary("scan", &summary);

        Ok(ScanReport { summary, results })
    }

    /// Scan a universe with ad-hoc `indicator:operator:value` filters.
    pub async fn custom_scan(
        &self,
        symbols: &[String],
        filters: &str,
        force_refresh: bool,
    ) -> Result<ScanReport, EngineError> {
        let scanner = Scanner::custom(parse_filters(filters)?);
        info!(
            conditions = scanner.conditions.len(),
            symbols = symbols.len(),
            "running custom scan"
        );

        let (snapshots, summary) = self.collect_snapshots(symbols, force_refresh).await;
        let results = vec![scanner.run(&snapshots)];
        log_summary("custom scan", &summary);

        Ok(ScanReport { summary, results })
    }

    pub async fn backtest_universe(
        &self,
        symbols: &[String],
        months: u32,
        capital: f64,
        force_refresh: bool,
    ) -> Result<BacktestReport, EngineError> {
        validate_backtest_params(months, capital)?;
        let strategy = &self.config.strategy;
        info!(
            strategy = strategy.name(),
            months,
            capital,
            symbols = symbols.len(),
            "backtesting universe"
        );

        let run = run_batches(symbols, &self.config.batch, |symbol| {
            self.backtest_one(symbol, months, capital, force_refresh)
        })
        .await;
        let stock_results = run.results.into_iter().map(|(_, r)| r).collect();
        let result = aggregate_universe(&strategy.description(), months, stock_results);
        log_summary("backtest", &run.summary);
        info!(
            trades = result.stats.total_trades,
            win_rate = result.stats.win_rate,
            "backtest aggregated"
        );

        Ok(BacktestReport {
            summary: run.summary,
            result,
        })
    }

    /// Recent supertrend-hybrid signals across a universe, `limit` per side.
    pub async fn scan_opportunities(
        &self,
        symbols: &[String],
        limit: usize,
        force_refresh: bool,
    ) -> Result<OpportunityReport, EngineError> {
        if limit == 0 {
            return Err(EngineError::invalid("limit", "must be at least 1"));
        }
        info!(limit, symbols = symbols.len(), "scanning opportunities");

        let run = run_batches(symbols, &self.config.batch, |symbol| {
            self.opportunity_one(symbol, force_refresh)
        })
        .await;

        let (mut buy, mut sell): (Vec<Opportunity>, Vec<Opportunity>) = run
            .results
            .into_iter()
            .filter_map(|(_, o)| o)
            .partition(|o| o.side == Side::Buy);
        rank_opportunities(&mut buy);
        rank_opportunities(&mut sell);
        buy.truncate(limit);
        sell.truncate(limit);
        log_summary("opportunities", &run.summary);

        Ok(OpportunityReport {
            summary: run.summary,
            buy,
            sell,
        })
    }

    async fn fetch(&self, symbol: &str, lookback: Lookback) -> Result<Vec<OhlcvBar>, EngineError> {
        let limit = self.config.batch.fetch_timeout;
        match tokio::time::timeout(limit, self.source.fetch_bars(symbol, lookback)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::fetch(
                symbol,
                format!("timed out after {}ms", limit.as_millis()),
            )),
        }
    }

    async fn collect_snapshots(
        &self,
        symbols: &[String],
        force_refresh: bool,
    ) -> (Vec<Snapshot>, BatchSummary) {
        let run = run_batches(symbols, &self.config.batch, |symbol| {
            self.snapshot_one(symbol, force_refresh)
        })
        .await;
        let snapshots = run.results.into_iter().map(|(_, s)| s).collect();
        (snapshots, run.summary)
    }

    async fn snapshot_one(&self, symbol: String, force_refresh: bool) -> Result<Snapshot, EngineError> {
        let scan = &self.config.scan;
        let key = (symbol.clone(), scan.lookback_days);
        if !force_refresh {
            if let Some(hit) = self.snapshots.get(&key, scan.cache_ttl).await {
                debug!(symbol = %symbol, "snapshot cache hit");
                return Ok(hit);
            }
        }

        let bars = self.fetch(&symbol, Lookback::days(scan.lookback_days)).await?;
        let snapshot = build_snapshot(&symbol, &bars)?;
        self.snapshots.insert(key, snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn backtest_one(
        &self,
        symbol: String,
        months: u32,
        capital: f64,
        force_refresh: bool,
    ) -> Result<StockBacktestResult, EngineError> {
        let key = BacktestKey {
            symbol: symbol.clone(),
            months,
            capital_bits: capital.to_bits(),
        };
        let ttl = self.config.backtest.cache_ttl;
        if !force_refresh {
            if let Some(hit) = self.backtests.get(&key, ttl).await {
                debug!(symbol = %symbol, "backtest cache hit");
                return Ok(hit);
            }
        }

        let bars = self
            .fetch(&symbol, Lookback::months(months + WARMUP_MONTHS))
            .await?;
        check_backtest_bars(&symbol, &bars)?;
        let result = backtest_with_strategy(&self.config.strategy, &bars, &symbol, capital);
        debug!(symbol = %symbol, trades = result.stats.total_trades, "symbol backtested");
        self.backtests.insert(key, result.clone()).await;
        Ok(result)
    }

    async fn opportunity_one(
        &self,
        symbol: String,
        force_refresh: bool,
    ) -> Result<Option<Opportunity>, EngineError> {
        let settings = &self.config.opportunities;
        let key = (symbol.clone(), settings.lookback_days);
        if !force_refresh {
            if let Some(hit) = self.opportunities.get(&key, settings.cache_ttl).await {
                debug!(symbol = %symbol, "opportunity cache hit");
                return Ok(hit);
            }
        }

        let bars = self
            .fetch(&symbol, Lookback::days(settings.lookback_days))
            .await?;
        let found = detect_opportunity(&symbol, &bars)?;
        self.opportunities.insert(key, found.clone()).await;
        Ok(found)
    }
}

fn log_summary(operation: &str, summary: &BatchSummary) {
    info!(
        operation,
        processed = summary.processed,
        insufficient = summary.insufficient,
        failed = summary.failed,
        batches = summary.batches,
        "run complete"
    );
}
