//! Sequential batches of concurrent per-symbol work.

use std::future::Future;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::domain::config::BatchConfig;
use crate::domain::error::EngineError;

/// Counts and messages from one batched run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Symbols that produced a result.
    pub processed: usize,
    /// Symbols skipped for having too few bars.
    pub insufficient: usize,
    /// Symbols whose fetch or computation failed.
    pub failed: usize,
    pub batches: usize,
    pub errors: Vec<String>,
}

#[derive(Debug)]
pub struct BatchRun<T> {
    /// Successful results, paired with their symbol, in input order.
    pub results: Vec<(String, T)>,
    pub summary: BatchSummary,
}

/// Run `task` for every symbol, `settings.size` at a time.
///
/// Batches run strictly one after another with `settings.delay` between
/// them. A failing symbol is recorded in the summary and never stops the run.
pub async fn run_batches<T, F, Fut>(
    symbols: &[String],
    settings: &BatchConfig,
    task: F,
) -> BatchRun<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut results = Vec::with_capacity(symbols.len());
    let mut summary = BatchSummary::default();
    let size = settings.size.max(1);
    let batch_count = symbols.len().div_ceil(size);

    for (index, chunk) in symbols.chunks(size).enumerate() {
        debug!(batch = index + 1, of = batch_count, size = chunk.len(), "running batch");

        let futures = chunk.iter().map(|symbol| {
            let symbol = symbol.clone();
            let fut = task(symbol.clone());
            async move { (symbol, fut.await) }
        });

        for (symbol, outcome) in join_all(futures).await {
            match outcome {
                Ok(value) => {
                    summary.processed += 1;
                    results.push((symbol, value));
                }
                Err(err @ EngineError::InsufficientData { .. }) => {
                    debug!(symbol = %symbol, error = %err, "skipping symbol");
                    summary.insufficient += 1;
                    summary.errors.push(err.to_string());
                }
                Err(err) => {
                    if err.is_per_symbol() {
                        warn!(symbol = %symbol, error = %err, "symbol failed");
                    } else {
                        error!(symbol = %symbol, error = %err, "unexpected error for symbol");
                    }
                    summary.failed += 1;
                    summary.errors.push(err.to_string());
                }
            }
        }

        summary.batches += 1;
        if index + 1 < batch_count && !settings.delay.is_zero() {
            tokio::time::sleep(settings.delay).await;
        }
    }

    BatchRun { results, summary }
}
