//! CLI definition and dispatch.
//!
//! Each command loads and validates the INI config, resolves the symbol
//! universe, runs one orchestrator operation and prints the result to
//! stdout. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use crate::adapters::csv_adapter::CsvBarSource;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::condition::parse_filters;
use crate::domain::config::EngineConfig;
use crate::domain::config_validation::build_engine_config;
use crate::domain::error::EngineError;
use crate::domain::opportunity::Opportunity;
use crate::domain::scanner::ScannerKind;
use crate::domain::strategy::SignalStrategy;
use crate::domain::universe::parse_symbols;
use crate::orchestrator::batch::BatchSummary;
use crate::orchestrator::{BacktestReport, OpportunityReport, Orchestrator, ScanReport};

#[derive(Parser, Debug)]
#[command(name = "swingscan", about = "Indicator scanner and BTST backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct UniverseArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    /// Comma-separated symbols; overrides [universe] symbols
    #[arg(long)]
    pub symbols: Option<String>,
    /// Ignore cached results
    #[arg(long)]
    pub refresh: bool,
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a built-in scanner (or `all`) over the universe
    Scan {
        #[command(flatten)]
        universe: UniverseArgs,
        #[arg(short, long, default_value = "all")]
        scanner: String,
    },
    /// Scan with ad-hoc filters, e.g. "rsi:between:55:70,price:gt:sma_200"
    Filter {
        #[command(flatten)]
        universe: UniverseArgs,
        #[arg(short, long)]
        filters: String,
    },
    /// Backtest the BTST breakout strategy across the universe
    Backtest {
        #[command(flatten)]
        universe: UniverseArgs,
        #[arg(short, long)]
        months: Option<u32>,
        #[arg(long)]
        capital: Option<f64>,
    },
    /// List recent supertrend buy/sell signals
    Opportunities {
        #[command(flatten)]
        universe: UniverseArgs,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List the built-in scanners
    Scanners,
    /// Validate a config file without fetching data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();

    match execute(cli.command) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "swingscan=info".into());
    // a second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run a command and return what it prints on success.
pub fn execute(command: Command) -> Result<String, EngineError> {
    // reject bad filters before touching the config or the data
    if let Command::Filter { filters, .. } = &command {
        if let Err(e) = parse_filters(filters) {
            eprintln!("{}", e.display_with_context(filters));
            return Err(e.into());
        }
    }
    block_on(execute_async(command))
}

fn block_on<F>(future: F) -> Result<String, EngineError>
where
    F: std::future::Future<Output = Result<String, EngineError>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

async fn execute_async(command: Command) -> Result<String, EngineError> {
    match command {
        Command::Scan { universe, scanner } => {
            let (orchestrator, symbols) = prepare(&universe)?;
            let report = orchestrator
                .scan_universe(&symbols, &scanner, universe.refresh)
                .await?;
            output(&report, universe.json, render_scan)
        }
        Command::Filter { universe, filters } => {
            let (orchestrator, symbols) = prepare(&universe)?;
            let report = orchestrator
                .custom_scan(&symbols, &filters, universe.refresh)
                .await?;
            output(&report, universe.json, render_scan)
        }
        Command::Backtest {
            universe,
            months,
            capital,
        } => {
            let (orchestrator, symbols) = prepare(&universe)?;
            let defaults = &orchestrator.config().backtest;
            let months = months.unwrap_or(defaults.months);
            let capital = capital.unwrap_or(defaults.capital);
            let report = orchestrator
                .backtest_universe(&symbols, months, capital, universe.refresh)
                .await?;
            output(&report, universe.json, render_backtest)
        }
        Command::Opportunities { universe, limit } => {
            let (orchestrator, symbols) = prepare(&universe)?;
            let limit = limit.unwrap_or(orchestrator.config().opportunities.limit);
            let report = orchestrator
                .scan_opportunities(&symbols, limit, universe.refresh)
                .await?;
            output(&report, universe.json, render_opportunities)
        }
        Command::Scanners => Ok(render_scanner_list()),
        Command::Validate { config } => Ok(render_config(&load_engine_config(&config)?)),
    }
}

pub fn load_engine_config(path: &Path) -> Result<EngineConfig, EngineError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    build_engine_config(&adapter)
}

/// Command-line symbols win over the configured universe.
pub fn resolve_symbols(
    override_symbols: Option<&str>,
    config: &EngineConfig,
) -> Result<Vec<String>, EngineError> {
    let symbols = match override_symbols {
        Some(s) => parse_symbols(s)?,
        None => config.symbols.clone(),
    };
    if symbols.is_empty() {
        return Err(EngineError::invalid("symbols", "no symbols configured"));
    }
    Ok(symbols)
}

fn prepare(universe: &UniverseArgs) -> Result<(Orchestrator, Vec<String>), EngineError> {
    let config = load_engine_config(&universe.config)?;
    let symbols = resolve_symbols(universe.symbols.as_deref(), &config)?;
    let source = Arc::new(CsvBarSource::new(config.data_path.clone()));
    Ok((Orchestrator::new(source, config), symbols))
}

fn output<T: Serialize>(
    report: &T,
    json: bool,
    render: fn(&T) -> String,
) -> Result<String, EngineError> {
    if json {
        serde_json::to_string_pretty(report)
            .map_err(|e| EngineError::Io(std::io::Error::other(e)))
    } else {
        Ok(render(report))
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

fn render_summary(summary: &BatchSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "processed {}, insufficient data {}, failed {} ({} batches)",
        summary.processed, summary.insufficient, summary.failed, summary.batches
    )];
    lines.extend(summary.errors.iter().map(|e| format!("  ! {e}")));
    lines
}

pub fn render_scan(report: &ScanReport) -> String {
    let mut lines = Vec::new();
    for result in &report.results {
        lines.push(format!(
            "=== {} ({}) === {} of {} matched",
            result.label, result.scanner, result.match_count, result.total_scanned
        ));
        if result.matches.is_empty() {
            lines.push("  no matches".to_string());
        }
        for m in &result.matches {
            lines.push(format!(
                "  {:<12} {:>10.2} {:>+7.2}% rsi {:>5} vol x{:>5} score {:>3}  {}",
                m.symbol,
                m.close,
                m.change_percent,
                fmt_opt(m.rsi, 1),
                fmt_opt(m.volume_ratio, 2),
                m.score,
                m.reasons.join(", ")
            ));
        }
        lines.push(String::new());
    }
    lines.extend(render_summary(&report.summary));
    lines.join("\n")
}

pub fn render_backtest(report: &BacktestReport) -> String {
    let r = &report.result;
    let mut lines = vec![
        format!("=== {} ===", r.strategy),
        format!("Period:           {} months", r.period_months),
        format!("Stocks analyzed:  {}", r.stocks_analyzed),
        format!("With trades:      {}", r.stocks_with_trades),
        format!("Total trades:     {}", r.stats.total_trades),
        format!("Win rate:         {:.1}%", r.stats.win_rate),
        format!("Avg return/trade: {:.2}%", r.stats.avg_return),
        format!("Total return:     {:.2}%", r.stats.total_return),
    ];
    if let Some(best) = &r.best_stock {
        lines.push(format!("Best stock:       {} ({:+.2}%)", best.symbol, best.total_return));
    }
    if let Some(worst) = &r.worst_stock {
        lines.push(format!("Worst stock:      {} ({:+.2}%)", worst.symbol, worst.total_return));
    }

    let traded: Vec<_> = r.stock_results.iter().filter(|s| s.stats.total_trades > 0).collect();
    if !traded.is_empty() {
        lines.push(String::new());
        lines.push("=== Per-Stock Summary ===".to_string());
        for s in traded {
            lines.push(format!(
                "  {:<12} {:>3} trades, {:>5.1}% win rate, {:+.2}%",
                s.symbol, s.stats.total_trades, s.stats.win_rate, s.stats.total_return
            ));
        }
    }
    lines.push(String::new());
    lines.extend(render_summary(&report.summary));
    lines.join("\n")
}

fn render_opportunity(o: &Opportunity) -> String {
    let when = match o.signal_day {
        0 => "today".to_string(),
        1 => "1 day ago".to_string(),
        n => format!("{n} days ago"),
    };
    format!(
        "  {:<12} {:>10.2} {:>+7.2}% strength {}/5 trend {:?} ({when})",
        o.symbol, o.price, o.change_percent, o.strength, o.trend
    )
}

pub fn render_opportunities(report: &OpportunityReport) -> String {
    let mut lines = vec![format!("=== Buy signals ({}) ===", report.buy.len())];
    lines.extend(report.buy.iter().map(render_opportunity));
    lines.push(String::new());
    lines.push(format!("=== Sell signals ({}) ===", report.sell.len()));
    lines.extend(report.sell.iter().map(render_opportunity));
    lines.push(String::new());
    lines.extend(render_summary(&report.summary));
    lines.join("\n")
}

fn render_scanner_list() -> String {
    ScannerKind::ALL
        .iter()
        .map(|kind| {
            let scanner = kind.scanner();
            format!(
                "{:<20} {:<24} {} conditions",
                kind.name(),
                kind.label(),
                scanner.conditions.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_config(config: &EngineConfig) -> String {
    let symbols = if config.symbols.is_empty() {
        "(none, pass --symbols)".to_string()
    } else {
        config.symbols.join(", ")
    };
    [
        "Config validated successfully".to_string(),
        format!("  data path: {}", config.data_path.display()),
        format!("  universe:  {symbols}"),
        format!(
            "  batches:   {} symbols, {}ms apart, {}s fetch timeout",
            config.batch.size,
            config.batch.delay.as_millis(),
            config.batch.fetch_timeout.as_secs()
        ),
        format!("  strategy:  {}", config.strategy.description()),
    ]
    .join("\n")
}
