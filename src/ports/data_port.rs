//! Bar source port.

use async_trait::async_trait;

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;

/// How far back a fetch reaches, in calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lookback {
    pub days: u32,
}

impl Lookback {
    pub fn days(days: u32) -> Self {
        Self { days }
    }

    /// Thirty calendar days per month.
    pub fn months(months: u32) -> Self {
        Self { days: months * 30 }
    }
}

/// Daily bars for one symbol, ascending by date.
///
/// A source may return fewer bars than the lookback covers. An empty `Ok` is
/// a successful fetch with no data; failures are reported as
/// [`EngineError::Fetch`].
#[async_trait]
pub trait BarSource: Send + Sync {
    async fn fetch_bars(
        &self,
        symbol: &str,
        lookback: Lookback,
    ) -> Result<Vec<OhlcvBar>, EngineError>;
}
