//! Price source implementations (centralized venues, Uniswap V3, static stubs)

mod centralized;
mod onchain;
mod stub;

pub use centralized::{BinanceTicker, CentralizedSource, GateTicker, KucoinTicker, TickerClient};
pub use onchain::{OnChainSource, TrackerSettings};
pub use stub::StaticStubSource;

use crate::types::Symbol;
use async_trait::async_trait;
use thiserror::Error;

/// Internal failure taxonomy for a price source. Every variant collapses to
/// `None` at the `PriceSource` boundary; callers never see which one fired.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("no route for pair {0}")]
    UnsupportedPair(String),
    #[error("source reachable but has no current price")]
    StaleData,
    #[error("invalid numeric result: {0}")]
    InvalidNumeric(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        SourceError::Unavailable(e.to_string())
    }
}

/// Trait for price sources (one venue each).
///
/// Contract: `latest_price` never blocks indefinitely and never propagates a
/// failure — network errors, decode errors and unsupported pairs all come
/// back as `None`. Implementations must be safe to call concurrently and
/// repeatedly with different pairs.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Venue name used in quote tables.
    fn name(&self) -> &str;

    /// Latest rate for the pair, as quote-units per one base-unit.
    /// Symbols are matched case-insensitively.
    async fn latest_price(&self, base: &Symbol, quote: &Symbol) -> Option<f64>;
}

/// Invert a rate, mapping a zero underlying rate to `None` rather than
/// infinity.
pub(crate) fn invert(rate: f64) -> Option<f64> {
    if rate == 0.0 {
        None
    } else {
        Some(1.0 / rate)
    }
}
