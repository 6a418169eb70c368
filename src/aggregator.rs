//! Rate aggregator - fans a quote request out to every registered source
//!
//! Queries all sources concurrently with per-source failure isolation and
//! reduces the answers into a per-source table or a best-rate decision.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::sources::PriceSource;
use crate::types::{BestEstimate, QuoteTable, SourceQuote, Symbol};

/// Holds the ordered collection of price sources, injected once at startup.
/// Output tables follow this registration order.
pub struct RateAggregator {
    sources: Vec<Arc<dyn PriceSource>>,
    per_source_timeout: Duration,
}

impl RateAggregator {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, per_source_timeout: Duration) -> Self {
        Self {
            sources,
            per_source_timeout,
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Query every source concurrently and zip the answers with source
    /// names. One slow or failing source degrades only its own entry: its
    /// timeout becomes `None` while the others complete normally.
    pub async fn collect_quotes(&self, base: &Symbol, quote: &Symbol) -> QuoteTable {
        let queries = self.sources.iter().map(|source| async move {
            let rate = match tokio::time::timeout(
                self.per_source_timeout,
                source.latest_price(base, quote),
            )
            .await
            {
                Ok(rate) => rate,
                Err(_) => {
                    tracing::warn!(source = %source.name(), pair = %format!("{base}/{quote}"), "Source timed out");
                    None
                }
            };
            SourceQuote {
                source: source.name().to_string(),
                rate,
            }
        });

        // join_all preserves the order of the input futures, so the table
        // matches registration order regardless of completion order.
        join_all(queries).await
    }

    /// Pick the source that maximizes `input_amount * rate`. Ties keep the
    /// earliest-registered source; `None` when every source was absent.
    pub async fn estimate_best(
        &self,
        input_amount: f64,
        input_currency: &Symbol,
        output_currency: &Symbol,
    ) -> Option<BestEstimate> {
        let quotes = self.collect_quotes(input_currency, output_currency).await;

        let mut best: Option<BestEstimate> = None;
        for quote in quotes {
            let Some(rate) = quote.rate else { continue };
            let output_amount = input_amount * rate;
            let improves = best
                .as_ref()
                .map(|b| output_amount > b.output_amount)
                .unwrap_or(true);
            if improves {
                best = Some(BestEstimate {
                    source: quote.source,
                    output_amount,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticStubSource;
    use crate::types::Pair;
    use async_trait::async_trait;

    struct FixedSource {
        name: &'static str,
        rate: Option<f64>,
    }

    #[async_trait]
    impl PriceSource for FixedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn latest_price(&self, _base: &Symbol, _quote: &Symbol) -> Option<f64> {
            self.rate
        }
    }

    struct SlowSource;

    #[async_trait]
    impl PriceSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        async fn latest_price(&self, _base: &Symbol, _quote: &Symbol) -> Option<f64> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Some(1.0)
        }
    }

    fn aggregator(sources: Vec<Arc<dyn PriceSource>>) -> RateAggregator {
        RateAggregator::new(sources, Duration::from_millis(100))
    }

    fn fixed(name: &'static str, rate: Option<f64>) -> Arc<dyn PriceSource> {
        Arc::new(FixedSource { name, rate })
    }

    #[tokio::test]
    async fn table_keeps_registration_order_and_length() {
        let agg = aggregator(vec![
            fixed("a", Some(30.0)),
            fixed("b", Some(32.0)),
            fixed("c", None),
        ]);
        let table = agg
            .collect_quotes(&Symbol::new("SOL"), &Symbol::new("USDT"))
            .await;

        assert_eq!(table.len(), 3);
        assert_eq!(
            table,
            vec![
                SourceQuote { source: "a".into(), rate: Some(30.0) },
                SourceQuote { source: "b".into(), rate: Some(32.0) },
                SourceQuote { source: "c".into(), rate: None },
            ]
        );
    }

    #[tokio::test]
    async fn best_estimate_picks_argmax() {
        let agg = aggregator(vec![
            fixed("a", Some(10_500.0)),
            fixed("b", Some(10_700.0)),
            fixed("c", None),
        ]);
        let best = agg
            .estimate_best(1.0, &Symbol::new("BTC"), &Symbol::new("USDT"))
            .await
            .unwrap();

        assert_eq!(best.source, "b");
        assert!((best.output_amount - 10_700.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn ties_keep_first_registered_source() {
        let agg = aggregator(vec![fixed("first", Some(10.0)), fixed("second", Some(10.0))]);
        let best = agg
            .estimate_best(2.0, &Symbol::new("ETH"), &Symbol::new("USDT"))
            .await
            .unwrap();

        assert_eq!(best.source, "first");
        assert!((best.output_amount - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn all_absent_is_absent_overall() {
        let agg = aggregator(vec![fixed("a", None), fixed("b", None)]);
        let best = agg
            .estimate_best(1.0, &Symbol::new("BTC"), &Symbol::new("USDT"))
            .await;
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn slow_source_degrades_only_itself() {
        let agg = RateAggregator::new(
            vec![Arc::new(SlowSource), fixed("fast", Some(42.0))],
            Duration::from_millis(50),
        );
        let table = agg
            .collect_quotes(&Symbol::new("BTC"), &Symbol::new("USDT"))
            .await;

        assert_eq!(table.len(), 2);
        assert_eq!(table[0].source, "slow");
        assert_eq!(table[0].rate, None);
        assert_eq!(table[1].rate, Some(42.0));
    }

    #[tokio::test]
    async fn stub_sources_feed_the_scenario_rates() {
        let agg = aggregator(vec![
            Arc::new(StaticStubSource::new(
                "uniswap",
                vec![(Pair::new("SOL", "USDT"), 30.0)],
            )),
            Arc::new(StaticStubSource::new(
                "raydium",
                vec![(Pair::new("SOL", "USDT"), 32.0)],
            )),
            fixed("offline", None),
        ]);

        let table = agg
            .collect_quotes(&Symbol::new("sol"), &Symbol::new("usdt"))
            .await;
        assert_eq!(table[0].rate, Some(30.0));
        assert_eq!(table[1].rate, Some(32.0));
        assert_eq!(table[2].rate, None);
    }
}
