//! On-chain (Uniswap V3) price source
//!
//! Tracks one liquidity pool at a time. A background task polls the pool's
//! `Swap` event logs on a fixed interval, decodes the latest event's
//! `sqrtPriceX96` into a float price and publishes it through a watch
//! channel. Requests for a different pair atomically replace the whole
//! binding, so a stale price can never be read against a new pool.

use async_trait::async_trait;
use ethers::abi::{decode, ParamType, Token};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Filter, Log, H256, U256};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::{PoolEntry, PoolRegistry};
use crate::sources::{invert, PriceSource, SourceError};
use crate::types::{Pair, Symbol};

const SWAP_EVENT_SIGNATURE: &str = "Swap(address,address,int256,int256,uint160,uint128,int24)";

fn swap_topic() -> H256 {
    H256::from(ethers::utils::keccak256(SWAP_EVENT_SIGNATURE))
}

/// Tuning for the pool tracker task.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Interval between swap-log polls.
    pub poll_interval: Duration,
    /// Consecutive empty polls before the staleness warning fires.
    pub stale_polls: u32,
    /// How long a request waits for the first decoded swap after a rebind
    /// before falling back to the historical scan.
    pub first_event_timeout: Duration,
    /// Block lookback for the historical fallback scan.
    pub history_blocks: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            stale_polls: 12,
            first_event_timeout: Duration::from_secs(3),
            history_blocks: 2_000,
        }
    }
}

/// The single live binding of a source to one pool. Replaced wholesale on a
/// pair change; dropping it aborts the tracker task.
struct PoolBinding {
    pair_key: String,
    price: Arc<watch::Sender<Option<f64>>>,
    task: JoinHandle<()>,
}

impl Drop for PoolBinding {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Uniswap V3 source. Without an RPC endpoint it stays disconnected and
/// answers `None` for everything.
pub struct OnChainSource {
    name: String,
    provider: Option<Arc<Provider<Http>>>,
    registry: PoolRegistry,
    settings: TrackerSettings,
    binding: Mutex<Option<PoolBinding>>,
}

impl OnChainSource {
    pub fn new(
        name: impl Into<String>,
        rpc_url: Option<String>,
        registry: PoolRegistry,
        settings: TrackerSettings,
    ) -> Self {
        let name = name.into();
        let provider = match rpc_url {
            Some(url) => match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => Some(Arc::new(provider)),
                Err(e) => {
                    tracing::error!(source = %name, error = %e, "Invalid RPC endpoint, source will stay disconnected");
                    None
                }
            },
            None => {
                tracing::warn!(source = %name, "No RPC endpoint configured, source will stay disconnected");
                None
            }
        };

        Self {
            name,
            provider,
            registry,
            settings,
            binding: Mutex::new(None),
        }
    }

    /// Point the source at the pool for `key`, replacing any previous
    /// binding. Returns the binding's price receiver and whether a rebind
    /// actually happened.
    async fn ensure_binding(
        &self,
        provider: &Arc<Provider<Http>>,
        key: &str,
        entry: &PoolEntry,
    ) -> Result<(watch::Receiver<Option<f64>>, bool), SourceError> {
        let mut guard = self.binding.lock().await;
        if let Some(binding) = guard.as_ref() {
            if binding.pair_key == key {
                return Ok((binding.price.subscribe(), false));
            }
            tracing::info!(source = %self.name, from = %binding.pair_key, to = %key, "Pair changed, rebinding pool tracker");
        }

        let pool = parse_address(&entry.pool_address)?;
        let (tx, rx) = watch::channel(None);
        let tx = Arc::new(tx);
        let task = tokio::spawn(run_tracker(
            self.name.clone(),
            provider.clone(),
            pool,
            entry.decimals_diff,
            self.settings.clone(),
            tx.clone(),
        ));

        // Swap is atomic under the lock: the old task is aborted and the new
        // channel starts empty, so the previous pool's price is gone before
        // anything for the new pool can be observed.
        *guard = Some(PoolBinding {
            pair_key: key.to_string(),
            price: tx,
            task,
        });

        Ok((rx, true))
    }

    async fn resolve_and_fetch(&self, base: &Symbol, quote: &Symbol) -> Result<f64, SourceError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| SourceError::Unavailable("no RPC endpoint configured".into()))?;

        let pair = Pair::new(base.as_str(), quote.as_str());
        let (key, entry) = self
            .registry
            .resolve(&pair)
            .ok_or_else(|| SourceError::UnsupportedPair(pair.key()))?;
        let entry = entry.clone();

        let (mut rx, fresh) = self.ensure_binding(provider, &key, &entry).await?;
        if fresh {
            // Wait for the first decoded swap instead of sleeping blind; an
            // immediately-queried fresh subscription may not have seen one
            // yet.
            let first = rx.wait_for(|price| price.is_some());
            if tokio::time::timeout(self.settings.first_event_timeout, first)
                .await
                .is_err()
            {
                tracing::debug!(source = %self.name, pair = %key, "No live swap within grace period");
            }
        }

        let cached = *rx.borrow();
        let pool_price = match cached {
            Some(price) => price,
            None => self.fetch_historical_price(provider, &entry).await?,
        };

        self.orient(&entry, base, quote, pool_price)
    }

    /// Map the pool's token1-per-token0 price onto the requested (base,
    /// quote) orientation by token address comparison.
    fn orient(
        &self,
        entry: &PoolEntry,
        base: &Symbol,
        quote: &Symbol,
        pool_price: f64,
    ) -> Result<f64, SourceError> {
        let base_addr = self
            .registry
            .token_address(base)
            .ok_or_else(|| SourceError::UnsupportedPair(base.to_string()))?;
        let quote_addr = self
            .registry
            .token_address(quote)
            .ok_or_else(|| SourceError::UnsupportedPair(quote.to_string()))?;

        if base_addr == entry.token0 && quote_addr == entry.token1 {
            Ok(pool_price)
        } else if base_addr == entry.token1 && quote_addr == entry.token0 {
            invert(pool_price).ok_or_else(|| {
                SourceError::InvalidNumeric("cannot invert a zero pool price".into())
            })
        } else {
            Err(SourceError::UnsupportedPair(format!(
                "{base}/{quote} does not match pool tokens {}/{}",
                entry.token0, entry.token1
            )))
        }
    }

    /// Fallback for a freshly bound pool: scan a bounded recent block range
    /// for the most recent swap and decode it with the same formula.
    async fn fetch_historical_price(
        &self,
        provider: &Arc<Provider<Http>>,
        entry: &PoolEntry,
    ) -> Result<f64, SourceError> {
        let pool = parse_address(&entry.pool_address)?;
        let latest = provider
            .get_block_number()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?
            .as_u64();
        let from = latest.saturating_sub(self.settings.history_blocks);

        let filter = Filter::new()
            .address(pool)
            .topic0(swap_topic())
            .from_block(from)
            .to_block(latest);
        let logs = provider
            .get_logs(&filter)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let sqrt_price = logs
            .iter()
            .rev()
            .find_map(sqrt_price_from_log)
            .ok_or(SourceError::StaleData)?;

        decode_pool_price(sqrt_price, entry.decimals_diff)
            .ok_or_else(|| SourceError::InvalidNumeric("non-finite decoded pool price".into()))
    }

    #[cfg(test)]
    pub(crate) async fn cached_price(&self) -> Option<f64> {
        let guard = self.binding.lock().await;
        guard.as_ref().and_then(|b| *b.price.borrow())
    }

    #[cfg(test)]
    pub(crate) async fn set_cached_price(&self, price: f64) {
        let guard = self.binding.lock().await;
        if let Some(binding) = guard.as_ref() {
            binding.price.send_replace(Some(price));
        }
    }
}

#[async_trait]
impl PriceSource for OnChainSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn latest_price(&self, base: &Symbol, quote: &Symbol) -> Option<f64> {
        match self.resolve_and_fetch(base, quote).await {
            Ok(price) => Some(price),
            Err(SourceError::UnsupportedPair(detail)) => {
                tracing::debug!(source = %self.name, %detail, "Unsupported pair");
                None
            }
            Err(e) => {
                tracing::warn!(source = %self.name, pair = %format!("{base}/{quote}"), error = %e, "No on-chain price");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tracker task
// ─────────────────────────────────────────────────────────────────

/// Long-lived poll loop for one bound pool. Recoverable errors are logged
/// and polling continues; only a rebind (task abort) stops the loop.
async fn run_tracker(
    source: String,
    provider: Arc<Provider<Http>>,
    pool: Address,
    decimals_diff: i32,
    settings: TrackerSettings,
    price: Arc<watch::Sender<Option<f64>>>,
) {
    let mut last_block: Option<u64> = None;
    let mut quiet_polls: u32 = 0;
    let mut ticker = tokio::time::interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match poll_swaps(&provider, pool, &mut last_block).await {
            Ok(Some(sqrt_price)) => {
                quiet_polls = 0;
                match decode_pool_price(sqrt_price, decimals_diff) {
                    Some(decoded) => {
                        tracing::debug!(source = %source, pool = %format!("{pool:#x}"), price = decoded, "Swap observed");
                        price.send_replace(Some(decoded));
                    }
                    None => {
                        tracing::warn!(source = %source, pool = %format!("{pool:#x}"), "Undecodable sqrtPriceX96, keeping last known price");
                    }
                }
            }
            Ok(None) => {
                quiet_polls += 1;
                if quiet_polls >= settings.stale_polls {
                    // Non-fatal staleness: keep last known good.
                    tracing::warn!(source = %source, pool = %format!("{pool:#x}"), polls = quiet_polls, "No swap events, keeping last known price");
                    quiet_polls = 0;
                }
            }
            Err(e) => {
                tracing::warn!(source = %source, pool = %format!("{pool:#x}"), error = %e, "Swap poll failed");
            }
        }
    }
}

/// Fetch swap logs since the last seen block and return the most recent
/// event's `sqrtPriceX96`, if any new event arrived.
async fn poll_swaps(
    provider: &Provider<Http>,
    pool: Address,
    last_block: &mut Option<u64>,
) -> Result<Option<U256>, SourceError> {
    let latest = provider
        .get_block_number()
        .await
        .map_err(|e| SourceError::Unavailable(e.to_string()))?
        .as_u64();

    let from = match *last_block {
        Some(seen) if seen < latest => seen + 1,
        Some(_) => return Ok(None),
        None => latest.saturating_sub(1),
    };

    let filter = Filter::new()
        .address(pool)
        .topic0(swap_topic())
        .from_block(from)
        .to_block(latest);
    let logs = provider
        .get_logs(&filter)
        .await
        .map_err(|e| SourceError::Unavailable(e.to_string()))?;

    *last_block = Some(latest);
    Ok(logs.iter().rev().find_map(sqrt_price_from_log))
}

/// Pull `sqrtPriceX96` out of a V3 `Swap` log's data words
/// (amount0, amount1, sqrtPriceX96, liquidity, tick).
fn sqrt_price_from_log(log: &Log) -> Option<U256> {
    let tokens = decode(
        &[
            ParamType::Int(256),
            ParamType::Int(256),
            ParamType::Uint(160),
            ParamType::Uint(128),
            ParamType::Int(24),
        ],
        log.data.as_ref(),
    )
    .ok()?;
    match tokens.get(2) {
        Some(Token::Uint(value)) => Some(*value),
        _ => None,
    }
}

/// Decode the fixed-point square-root encoding:
/// `price = (sqrtPriceX96 / 2^96)^2 * 10^decimals_diff`.
pub(crate) fn decode_pool_price(sqrt_price_x96: U256, decimals_diff: i32) -> Option<f64> {
    let sqrt_price = u256_to_f64(sqrt_price_x96) / 2f64.powi(96);
    let price = sqrt_price * sqrt_price * 10f64.powi(decimals_diff);
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        None
    }
}

fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .enumerate()
        .fold(0.0, |acc, (i, &limb)| {
            acc + (limb as f64) * 2f64.powi(64 * i as i32)
        })
}

fn parse_address(raw: &str) -> Result<Address, SourceError> {
    Address::from_str(raw).map_err(|e| SourceError::Unavailable(format!("bad address {raw:?}: {e}")))
}
