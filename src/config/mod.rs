//! Configuration management for RateScout
//!
//! Loads from YAML files + environment variables via .env

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::sources::TrackerSettings;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub aggregator: AggregatorConfig,
    pub sources: SourcesConfig,
    pub onchain: OnChainConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Directory served under /static
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Per-source budget for one quote request; a timeout becomes "no data"
    /// for that source only.
    pub per_source_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Enable the Binance ticker feed
    pub binance_enabled: bool,
    /// Enable the KuCoin ticker feed
    pub kucoin_enabled: bool,
    /// Enable the Gate.io ticker feed
    pub gate_enabled: bool,
    /// Enable the Uniswap V3 on-chain feed
    pub uniswap_enabled: bool,
    /// Enable the Raydium placeholder feed
    pub raydium_enabled: bool,
    /// HTTP timeout for venue REST calls in milliseconds
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnChainConfig {
    /// Full RPC endpoint; when empty, built from INFURA_PROJECT_ID
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Swap-log poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Consecutive empty polls before the staleness warning
    pub stale_polls: u32,
    /// Wait for the first decoded swap after a rebind, in milliseconds
    pub first_event_timeout_ms: u64,
    /// Block lookback for the historical fallback scan
    pub history_blocks: u64,
}

impl OnChainConfig {
    /// Resolve the RPC endpoint: explicit URL first, otherwise the Infura
    /// project id from the environment. `None` leaves the on-chain source
    /// disconnected without preventing startup.
    pub fn resolve_rpc_url(&self) -> Option<String> {
        if let Some(url) = self.rpc_url.as_deref() {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
        std::env::var("INFURA_PROJECT_ID")
            .ok()
            .filter(|id| !id.is_empty())
            .map(|id| format!("https://mainnet.infura.io/v3/{id}"))
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stale_polls: self.stale_polls,
            first_event_timeout: Duration::from_millis(self.first_event_timeout_ms),
            history_blocks: self.history_blocks,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.static_dir", "./static")?
            // Aggregator defaults
            .set_default("aggregator.per_source_timeout_ms", 5_000)?
            // Source defaults
            .set_default("sources.binance_enabled", true)?
            .set_default("sources.kucoin_enabled", true)?
            .set_default("sources.gate_enabled", true)?
            .set_default("sources.uniswap_enabled", true)?
            .set_default("sources.raydium_enabled", true)?
            .set_default("sources.request_timeout_ms", 4_000)?
            // On-chain defaults
            .set_default("onchain.poll_interval_ms", 5_000)?
            .set_default("onchain.stale_polls", 12)?
            .set_default("onchain.first_event_timeout_ms", 3_000)?
            .set_default("onchain.history_blocks", 2_000)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (RATESCOUT_*)
            .add_source(Environment::with_prefix("RATESCOUT").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<()> {
        if self.aggregator.per_source_timeout_ms == 0 {
            bail!("aggregator.per_source_timeout_ms must be positive");
        }
        if self.sources.request_timeout_ms == 0 {
            bail!("sources.request_timeout_ms must be positive");
        }
        if self.onchain.poll_interval_ms == 0 {
            bail!("onchain.poll_interval_ms must be positive");
        }
        Ok(())
    }

    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_millis(self.aggregator.per_source_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.sources.request_timeout_ms)
    }
}
