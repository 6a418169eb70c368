//! Centralized (order-book) venue sources
//!
//! Each venue exposes its last traded price over a public REST ticker
//! endpoint. `CentralizedSource` layers the orientation strategy on top of a
//! `TickerClient`: try the direct listing first, then the inverse listing
//! with the price flipped.

use async_trait::async_trait;
use serde::Deserialize;

use crate::sources::{invert, PriceSource, SourceError};
use crate::types::Symbol;

/// One best-effort fetch of the last traded price for a single orientation.
///
/// `Ok(None)` means the venue does not list that symbol (or has no tick for
/// it); `Err` means the venue could not be asked at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TickerClient: Send + Sync {
    async fn last_price(&self, base: &Symbol, quote: &Symbol) -> Result<Option<f64>, SourceError>;
}

/// A centralized exchange source: a named venue plus its ticker client.
///
/// No shared mutable state; a request borrows the client for two fetch
/// attempts at most.
pub struct CentralizedSource<C> {
    name: String,
    client: C,
}

impl<C> CentralizedSource<C> {
    pub fn new(name: impl Into<String>, client: C) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl<C: TickerClient> PriceSource for CentralizedSource<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn latest_price(&self, base: &Symbol, quote: &Symbol) -> Option<f64> {
        // Direct listing: BASE/QUOTE.
        match self.client.last_price(base, quote).await {
            Ok(Some(price)) if price > 0.0 => return Some(price),
            Ok(_) => {
                tracing::debug!(source = %self.name, pair = %format!("{base}/{quote}"), "No direct listing");
            }
            Err(e) => {
                tracing::warn!(source = %self.name, pair = %format!("{base}/{quote}"), error = %e, "Direct fetch failed");
            }
        }

        // Inverse listing: QUOTE/BASE, price flipped. A zero inverse price
        // stays absent rather than becoming infinity.
        match self.client.last_price(quote, base).await {
            Ok(Some(price)) => invert(price),
            Ok(None) => {
                tracing::debug!(source = %self.name, pair = %format!("{quote}/{base}"), "No inverse listing");
                None
            }
            Err(e) => {
                tracing::warn!(source = %self.name, pair = %format!("{quote}/{base}"), error = %e, "Inverse fetch failed");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Venue clients
// ─────────────────────────────────────────────────────────────────

const BINANCE_TICKER_URL: &str = "https://api.binance.us/api/v3/ticker/price";
const KUCOIN_TICKER_URL: &str = "https://api.kucoin.com/api/v1/market/orderbook/level1";
const GATE_TICKER_URL: &str = "https://api.gateio.ws/api/v4/spot/tickers";

fn parse_price(raw: &str) -> Result<f64, SourceError> {
    raw.parse::<f64>()
        .map_err(|e| SourceError::InvalidNumeric(format!("{raw:?}: {e}")))
}

/// Binance spot ticker. Symbols are concatenated: "BTCUSDT".
pub struct BinanceTicker {
    http: reqwest::Client,
}

impl BinanceTicker {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct BinancePriceResponse {
    price: String,
}

#[async_trait]
impl TickerClient for BinanceTicker {
    async fn last_price(&self, base: &Symbol, quote: &Symbol) -> Result<Option<f64>, SourceError> {
        let symbol = format!("{base}{quote}");
        let response = self
            .http
            .get(BINANCE_TICKER_URL)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;

        // Binance answers 400 for symbols it does not list.
        if !response.status().is_success() {
            return Ok(None);
        }

        let body: BinancePriceResponse = response.json().await?;
        Ok(Some(parse_price(&body.price)?))
    }
}

/// KuCoin level-1 order book ticker. Symbols are dash-joined: "BTC-USDT".
pub struct KucoinTicker {
    http: reqwest::Client,
}

impl KucoinTicker {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct KucoinLevel1Response {
    data: Option<KucoinLevel1Data>,
}

#[derive(Debug, Deserialize)]
struct KucoinLevel1Data {
    price: Option<String>,
}

#[async_trait]
impl TickerClient for KucoinTicker {
    async fn last_price(&self, base: &Symbol, quote: &Symbol) -> Result<Option<f64>, SourceError> {
        let symbol = format!("{base}-{quote}");
        let response = self
            .http
            .get(KUCOIN_TICKER_URL)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        // KuCoin returns {"data": null} for unknown symbols.
        let body: KucoinLevel1Response = response.json().await?;
        match body.data.and_then(|d| d.price) {
            Some(raw) => Ok(Some(parse_price(&raw)?)),
            None => Ok(None),
        }
    }
}

/// Gate.io spot ticker. Symbols are underscore-joined: "BTC_USDT".
pub struct GateTicker {
    http: reqwest::Client,
}

impl GateTicker {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct GateTickerEntry {
    last: String,
}

#[async_trait]
impl TickerClient for GateTicker {
    async fn last_price(&self, base: &Symbol, quote: &Symbol) -> Result<Option<f64>, SourceError> {
        let pair = format!("{base}_{quote}");
        let response = self
            .http
            .get(GATE_TICKER_URL)
            .query(&[("currency_pair", pair.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: Vec<GateTickerEntry> = response.json().await?;
        match body.first() {
            Some(entry) => Ok(Some(parse_price(&entry.last)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn btc() -> Symbol {
        Symbol::new("BTC")
    }

    fn usdt() -> Symbol {
        Symbol::new("USDT")
    }

    #[tokio::test]
    async fn direct_listing_wins() {
        let mut client = MockTickerClient::new();
        client
            .expect_last_price()
            .with(eq(btc()), eq(usdt()))
            .returning(|_, _| Ok(Some(10500.0)));

        let source = CentralizedSource::new("binance", client);
        let price = source.latest_price(&btc(), &usdt()).await;
        assert_eq!(price, Some(10500.0));
    }

    #[tokio::test]
    async fn inverse_listing_is_flipped() {
        let mut client = MockTickerClient::new();
        client
            .expect_last_price()
            .with(eq(btc()), eq(usdt()))
            .returning(|_, _| Ok(None));
        client
            .expect_last_price()
            .with(eq(usdt()), eq(btc()))
            .returning(|_, _| Ok(Some(0.0001)));

        let source = CentralizedSource::new("binance", client);
        let price = source.latest_price(&btc(), &usdt()).await.unwrap();
        assert!((price - 10000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn zero_inverse_price_is_absent() {
        let mut client = MockTickerClient::new();
        client
            .expect_last_price()
            .with(eq(btc()), eq(usdt()))
            .returning(|_, _| Ok(None));
        client
            .expect_last_price()
            .with(eq(usdt()), eq(btc()))
            .returning(|_, _| Ok(Some(0.0)));

        let source = CentralizedSource::new("binance", client);
        assert_eq!(source.latest_price(&btc(), &usdt()).await, None);
    }

    #[tokio::test]
    async fn provider_errors_fall_through_then_collapse() {
        let mut client = MockTickerClient::new();
        client
            .expect_last_price()
            .with(eq(btc()), eq(usdt()))
            .returning(|_, _| Err(SourceError::Unavailable("timeout".into())));
        client
            .expect_last_price()
            .with(eq(usdt()), eq(btc()))
            .returning(|_, _| Err(SourceError::Unavailable("timeout".into())));

        let source = CentralizedSource::new("gate", client);
        assert_eq!(source.latest_price(&btc(), &usdt()).await, None);
    }

    #[tokio::test]
    async fn direct_zero_falls_through_to_inverse() {
        let mut client = MockTickerClient::new();
        client
            .expect_last_price()
            .with(eq(btc()), eq(usdt()))
            .returning(|_, _| Ok(Some(0.0)));
        client
            .expect_last_price()
            .with(eq(usdt()), eq(btc()))
            .returning(|_, _| Ok(Some(0.0001)));

        let source = CentralizedSource::new("kucoin", client);
        let price = source.latest_price(&btc(), &usdt()).await.unwrap();
        assert!((price - 10000.0).abs() < 1e-6);
    }
}
