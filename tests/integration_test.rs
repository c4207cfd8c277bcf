//! Orchestrator tests against an in-memory bar source.
//!
//! Tests cover:
//! - Batch partitioning and per-symbol failure isolation
//! - TTL cache hits, expiry and forced refresh
//! - Fetch timeouts under paused time
//! - Parameter validation before any fetch
//! - Universe backtest and opportunity aggregation

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use swingscan::domain::backtest::WARMUP_MONTHS;
use swingscan::domain::error::EngineError;
use swingscan::domain::opportunity::Side;
use swingscan::domain::scanner::ScannerKind;
use swingscan::domain::snapshot::build_snapshot;
use swingscan::orchestrator::Orchestrator;
use swingscan::ports::clock_port::ManualClock;
use swingscan::ports::data_port::Lookback;

fn orchestrator(source: &Arc<MockBarSource>, batch_size: usize) -> Orchestrator {
    Orchestrator::new(source.clone(), test_config(batch_size))
}

fn with_clock(
    source: &Arc<MockBarSource>,
    batch_size: usize,
) -> (Orchestrator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let orch = Orchestrator::with_clock(source.clone(), test_config(batch_size), clock.clone());
    (orch, clock)
}

mod batching {
    use super::*;

    #[tokio::test]
    async fn twenty_three_symbols_in_batches_of_five() {
        let source = Arc::new(MockBarSource::new().with_fallback(make_bars(&rising_closes(250))));
        let report = orchestrator(&source, 5)
            .scan_universe(&symbols(23), "all", false)
            .await
            .unwrap();

        assert_eq!(report.summary.batches, 5);
        assert_eq!(report.summary.processed + report.summary.failed, 23);
        assert_eq!(report.summary.processed, 23);
        assert_eq!(source.total_calls(), 23);
        assert_eq!(report.results.len(), ScannerKind::DAILY.len());
        for results in &report.results {
            assert_eq!(results.total_scanned, 23);
            assert_eq!(results.match_count, results.matches.len());
        }
    }

    #[tokio::test]
    async fn one_failing_symbol_does_not_abort_the_run() {
        let source = Arc::new(
            MockBarSource::new()
                .with_fallback(make_bars(&rising_closes(250)))
                .with_error("SYM04", "connection reset"),
        );
        let report = orchestrator(&source, 3)
            .scan_universe(&symbols(10), "gap_up", false)
            .await
            .unwrap();

        assert_eq!(report.summary.processed, 9);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.insufficient, 0);
        assert_eq!(report.results[0].total_scanned, 9);
        assert_eq!(report.summary.errors.len(), 1);
        assert!(report.summary.errors[0].contains("SYM04"));
        assert!(report.summary.errors[0].contains("connection reset"));
    }

    #[tokio::test]
    async fn short_history_counts_as_insufficient() {
        let source = Arc::new(
            MockBarSource::new()
                .with_fallback(make_bars(&rising_closes(250)))
                .with_bars("NEWLIST", make_bars(&rising_closes(50)))
                .with_bars("EMPTY", Vec::new()),
        );
        let universe = vec!["AAA".to_string(), "NEWLIST".to_string(), "EMPTY".to_string()];
        let report = orchestrator(&source, 5)
            .scan_universe(&universe, "all", false)
            .await
            .unwrap();

        assert_eq!(report.summary.processed, 1);
        assert_eq!(report.summary.insufficient, 2);
        assert_eq!(report.summary.failed, 0);
    }

    #[tokio::test]
    async fn orchestrated_snapshot_matches_direct_build() {
        let bars = make_bars(&rising_closes(260));
        let source = Arc::new(MockBarSource::new().with_bars("TCS", bars.clone()));
        let orch = orchestrator(&source, 5);

        // a steady uptrend closes above its averages
        let report = orch
            .custom_scan(&["TCS".to_string()], "price:gt:ema_20,price:gt:sma_200", false)
            .await
            .unwrap();

        let expected = build_snapshot("TCS", &bars).unwrap();
        let matched = &report.results[0].matches;
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].symbol, "TCS");
        assert_eq!(matched[0].close, expected.close);
        assert_eq!(matched[0].score, 2);
    }

    fn delayed_source(universe: &[String], delay: Duration) -> Arc<MockBarSource> {
        let source = universe.iter().fold(
            MockBarSource::new().with_fallback(make_bars(&rising_closes(250))),
            |source, symbol| source.with_delay(symbol, delay),
        );
        Arc::new(source)
    }

    #[tokio::test(start_paused = true)]
    async fn symbols_in_a_batch_fetch_concurrently() {
        let universe = symbols(5);
        let source = delayed_source(&universe, Duration::from_secs(1));

        let start = tokio::time::Instant::now();
        let report = orchestrator(&source, 5)
            .scan_universe(&universe, "all", false)
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(report.summary.processed, 5);
        assert_eq!(report.summary.batches, 1);
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1500), "took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn batches_run_one_after_another() {
        let universe = symbols(10);
        let source = delayed_source(&universe, Duration::from_secs(1));
        let mut config = test_config(5);
        config.batch.delay = Duration::from_millis(300);

        let start = tokio::time::Instant::now();
        let report = Orchestrator::new(source.clone(), config)
            .scan_universe(&universe, "all", false)
            .await
            .unwrap();
        let elapsed = start.elapsed();

        // two concurrent batches plus one pause between them
        assert_eq!(report.summary.batches, 2);
        assert_eq!(report.summary.processed, 10);
        assert!(elapsed >= Duration::from_millis(2300));
        assert!(elapsed < Duration::from_millis(2800), "took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out_as_failure() {
        let source = Arc::new(
            MockBarSource::new()
                .with_fallback(make_bars(&rising_closes(250)))
                .with_delay("SLOW", Duration::from_secs(30)),
        );
        let universe = vec!["FAST".to_string(), "SLOW".to_string()];
        let report = orchestrator(&source, 5)
            .scan_universe(&universe, "all", false)
            .await
            .unwrap();

        assert_eq!(report.summary.processed, 1);
        assert_eq!(report.summary.failed, 1);
        assert!(report.summary.errors[0].contains("SLOW"));
        assert!(report.summary.errors[0].contains("timed out"));
    }
}

mod caching {
    use super::*;

    #[tokio::test]
    async fn hit_within_ttl_skips_fetch() {
        let source = Arc::new(MockBarSource::new().with_fallback(make_bars(&rising_closes(250))));
        let (orch, clock) = with_clock(&source, 5);
        let universe = symbols(4);

        let first = orch.scan_universe(&universe, "all", false).await.unwrap();
        clock.advance(Duration::from_secs(60));
        let second = orch.scan_universe(&universe, "all", false).await.unwrap();

        assert_eq!(source.total_calls(), 4);
        assert_eq!(first.results, second.results);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let source = Arc::new(MockBarSource::new().with_fallback(make_bars(&rising_closes(250))));
        let (orch, clock) = with_clock(&source, 5);
        let universe = symbols(2);
        let ttl = orch.config().scan.cache_ttl;

        orch.scan_universe(&universe, "all", false).await.unwrap();
        clock.advance(ttl + Duration::from_secs(1));
        orch.scan_universe(&universe, "all", false).await.unwrap();

        assert_eq!(source.calls_for("SYM00"), 2);
        assert_eq!(source.calls_for("SYM01"), 2);
    }

    #[tokio::test]
    async fn scanners_share_cached_snapshots() {
        let source = Arc::new(MockBarSource::new().with_fallback(make_bars(&rising_closes(250))));
        let (orch, _clock) = with_clock(&source, 5);
        let universe = symbols(3);

        orch.scan_universe(&universe, "gap_up", false).await.unwrap();
        orch.scan_universe(&universe, "breakout", false).await.unwrap();
        orch.custom_scan(&universe, "rsi:gt:50", false).await.unwrap();

        assert_eq!(source.total_calls(), 3);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_reads_but_writes_back() {
        let source = Arc::new(MockBarSource::new().with_fallback(make_bars(&rising_closes(250))));
        let (orch, clock) = with_clock(&source, 5);
        let universe = symbols(1);
        let ttl = orch.config().scan.cache_ttl;

        orch.scan_universe(&universe, "all", false).await.unwrap();
        clock.advance(ttl - Duration::from_secs(10));
        orch.scan_universe(&universe, "all", true).await.unwrap();
        assert_eq!(source.total_calls(), 2);

        // the forced result restarted the TTL
        clock.advance(Duration::from_secs(20));
        orch.scan_universe(&universe, "all", false).await.unwrap();
        assert_eq!(source.total_calls(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let source = Arc::new(MockBarSource::new().with_error("BAD", "down"));
        let (orch, _clock) = with_clock(&source, 5);
        let universe = vec!["BAD".to_string()];

        orch.scan_universe(&universe, "all", false).await.unwrap();
        orch.scan_universe(&universe, "all", false).await.unwrap();

        assert_eq!(source.calls_for("BAD"), 2);
    }

    #[tokio::test]
    async fn backtest_cache_is_keyed_by_parameters() {
        let source = Arc::new(MockBarSource::new().with_fallback(make_bars(&rising_closes(150))));
        let (orch, _clock) = with_clock(&source, 5);
        let universe = symbols(1);

        orch.backtest_universe(&universe, 6, 100_000.0, false).await.unwrap();
        orch.backtest_universe(&universe, 6, 100_000.0, false).await.unwrap();
        assert_eq!(source.total_calls(), 1);

        orch.backtest_universe(&universe, 3, 100_000.0, false).await.unwrap();
        orch.backtest_universe(&universe, 6, 50_000.0, false).await.unwrap();
        assert_eq!(source.total_calls(), 3);
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn invalid_months_rejected_before_fetch() {
        let source = Arc::new(MockBarSource::new().with_fallback(make_bars(&rising_closes(150))));
        let orch = orchestrator(&source, 5);

        for months in [0, 13] {
            let err = orch
                .backtest_universe(&symbols(3), months, 100_000.0, false)
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidParameter { ref name, .. } if name == "months"));
        }
        let err = orch
            .backtest_universe(&symbols(3), 6, -1.0, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { ref name, .. } if name == "capital"));
        assert_eq!(source.total_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_scanner_rejected_before_fetch() {
        let source = Arc::new(MockBarSource::new().with_fallback(make_bars(&rising_closes(250))));
        let err = orchestrator(&source, 5)
            .scan_universe(&symbols(3), "moonshot", false)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidParameter { ref name, .. } if name == "scanner"));
        assert_eq!(source.total_calls(), 0);
    }

    #[tokio::test]
    async fn malformed_filters_rejected_before_fetch() {
        let source = Arc::new(MockBarSource::new().with_fallback(make_bars(&rising_closes(250))));
        let err = orchestrator(&source, 5)
            .custom_scan(&symbols(3), "rsi:gt", false)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::FilterParse(_)));
        assert_eq!(source.total_calls(), 0);
    }

    #[tokio::test]
    async fn zero_limit_rejected_before_fetch() {
        let source = Arc::new(MockBarSource::new());
        let err = orchestrator(&source, 5)
            .scan_opportunities(&symbols(3), 0, false)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidParameter { ref name, .. } if name == "limit"));
        assert_eq!(source.total_calls(), 0);
    }
}

mod backtest {
    use super::*;

    /// Rising closes with one high-volume gap up at `spike`.
    fn breakout_bars(n: usize, spike: usize) -> Vec<OhlcvBar> {
        let mut bars = make_bars(&rising_closes(n));
        bars[spike].close += 5.0;
        bars[spike].high = bars[spike].close + 1.0;
        bars[spike].volume = 500_000;
        bars
    }

    #[tokio::test]
    async fn universe_backtest_aggregates_per_symbol_results() {
        let source = Arc::new(
            MockBarSource::new()
                .with_bars("BRK", breakout_bars(150, 140))
                .with_bars("FLAT", make_bars(&rising_closes(150)))
                .with_bars("SHORT", make_bars(&rising_closes(60)))
                .with_error("DOWN", "503"),
        );
        let universe: Vec<String> = ["BRK", "FLAT", "SHORT", "DOWN"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = orchestrator(&source, 2)
            .backtest_universe(&universe, 6, 100_000.0, false)
            .await
            .unwrap();

        assert_eq!(report.summary.processed, 2);
        assert_eq!(report.summary.insufficient, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.batches, 2);

        let result = &report.result;
        assert!(result.strategy.starts_with("BTST Breakout"));
        assert_eq!(result.period_months, 6);
        assert_eq!(result.stocks_analyzed, 2);
        assert_eq!(result.stocks_with_trades, 1);
        assert_eq!(result.stats.total_trades, 1);
        assert_eq!(result.all_trades[0].symbol, "BRK");
        // next bar falls back onto the trend line
        assert!(result.all_trades[0].pnl_percent < 0.0);
        assert_eq!(result.best_stock.as_ref().map(|s| s.symbol.as_str()), Some("BRK"));
        assert_eq!(result.stock_results[0].symbol, "FLAT");
    }

    #[tokio::test]
    async fn backtest_fetches_warmup_months() {
        let source = Arc::new(MockBarSource::new().with_fallback(make_bars(&rising_closes(150))));
        orchestrator(&source, 5)
            .backtest_universe(&symbols(1), 6, 100_000.0, false)
            .await
            .unwrap();

        assert_eq!(source.lookbacks(), vec![Lookback::months(6 + WARMUP_MONTHS)]);
    }
}

mod opportunities {
    use super::*;

    #[tokio::test]
    async fn buy_signals_are_ranked_and_limited() {
        let source = Arc::new(
            MockBarSource::new()
                .with_fallback(make_bars(&pullback_then_rally(2)))
                .with_bars("QUIET", make_bars(&vec![100.0; 250]))
                .with_bars("STALE", make_bars(&pullback_then_rally(6))),
        );
        let mut universe = symbols(4);
        universe.push("QUIET".to_string());
        universe.push("STALE".to_string());

        let report = orchestrator(&source, 3)
            .scan_opportunities(&universe, 2, false)
            .await
            .unwrap();

        assert_eq!(report.summary.processed, 6);
        assert_eq!(report.buy.len(), 2);
        assert!(report.sell.is_empty());
        assert!(report.buy.iter().all(|o| o.side == Side::Buy && o.signal_day == 1));
        // equal strength and age fall back to symbol order
        assert_eq!(report.buy[0].symbol, "SYM00");
        assert_eq!(report.buy[1].symbol, "SYM01");
    }
}
