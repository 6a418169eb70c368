//! RateScout entry point
//!
//! Wires configuration, price sources, the aggregator and the HTTP API.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ratescout::aggregator::RateAggregator;
use ratescout::api;
use ratescout::config::AppConfig;
use ratescout::registry::PoolRegistry;
use ratescout::sources::{
    BinanceTicker, CentralizedSource, GateTicker, KucoinTicker, OnChainSource, PriceSource,
    StaticStubSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("Failed to create HTTP client")?;

    let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();
    if config.sources.binance_enabled {
        sources.push(Arc::new(CentralizedSource::new(
            "binance",
            BinanceTicker::new(http.clone()),
        )));
    }
    if config.sources.kucoin_enabled {
        sources.push(Arc::new(CentralizedSource::new(
            "kucoin",
            KucoinTicker::new(http.clone()),
        )));
    }
    if config.sources.gate_enabled {
        sources.push(Arc::new(CentralizedSource::new(
            "gate",
            GateTicker::new(http.clone()),
        )));
    }
    if config.sources.uniswap_enabled {
        sources.push(Arc::new(OnChainSource::new(
            "uniswap",
            config.onchain.resolve_rpc_url(),
            PoolRegistry::mainnet(),
            config.onchain.tracker_settings(),
        )));
    }
    if config.sources.raydium_enabled {
        sources.push(Arc::new(StaticStubSource::raydium_fixture()));
    }

    let aggregator = Arc::new(RateAggregator::new(sources, config.per_source_timeout()));
    tracing::info!(
        sources = ?aggregator.source_names(),
        "Price sources registered"
    );

    let app = api::create_router(aggregator, &config.server.static_dir);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "RateScout listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install ctrl-c handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
