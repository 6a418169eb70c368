//! Static registry of tracked Uniswap V3 pools and token contract addresses
//!
//! Read-only at runtime. Maps each supported directional pair to its pool
//! address, the two token contracts, and the decimals adjustment exponent
//! applied on top of the raw pool price.

use crate::types::{Pair, Symbol};
use std::collections::HashMap;

/// Pool metadata for one supported directional pair.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    /// Uniswap V3 pool contract address (lowercase hex).
    pub pool_address: String,
    /// token0 contract address (lowercase hex).
    pub token0: String,
    /// token1 contract address (lowercase hex).
    pub token1: String,
    /// Exponent for the decimals mismatch between token0 and token1;
    /// decoded price is multiplied by 10^decimals_diff.
    pub decimals_diff: i32,
}

/// Registry keyed by directional pair ("BASE/QUOTE") plus a symbol → token
/// contract address table.
#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    pools: HashMap<String, PoolEntry>,
    tokens: HashMap<Symbol, String>,
}

impl PoolRegistry {
    /// Ethereum mainnet pools tracked out of the box.
    pub fn mainnet() -> Self {
        let mut registry = PoolRegistry::default();

        registry.add_pool(
            "ETH/USDT",
            "0x4e68ccd3e89f51c3074ca5072bbac773960dfa36",
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", // WETH
            "0xdac17f958d2ee523a2206206994597c13d831ec7", // USDT
            12,
        );
        registry.add_pool(
            "BTC/ETH",
            "0xcbcdf9626bc03e24f779434178a73a0b4bad62ed",
            "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", // WBTC
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", // WETH
            -10,
        );
        registry.add_pool(
            "ETH/SOL",
            "0x127452f3f9cdc0389b0bf59ce6131aa3bd763598",
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", // WETH
            "0xd31a59c85ae9d8edefec411d448f90841571b89c", // SOL (Wormhole)
            9,
        );
        registry.add_pool(
            "BTC/USDT",
            "0x9db9e0e53058c89e5b94e29621a205198648425b",
            "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", // WBTC
            "0xdac17f958d2ee523a2206206994597c13d831ec7", // USDT
            2,
        );
        registry.add_pool(
            "BTC/USDC",
            "0x9db9e0e53058c89e5b94e29621a205198648425b",
            "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", // WBTC
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", // USDC
            2,
        );

        registry.add_token("ETH", "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        registry.add_token("USDT", "0xdac17f958d2ee523a2206206994597c13d831ec7");
        registry.add_token("USDC", "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        registry.add_token("BTC", "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599");
        registry.add_token("SOL", "0xd31a59c85ae9d8edefec411d448f90841571b89c");

        registry
    }

    pub fn add_pool(
        &mut self,
        pair_key: &str,
        pool_address: &str,
        token0: &str,
        token1: &str,
        decimals_diff: i32,
    ) {
        self.pools.insert(
            pair_key.to_uppercase(),
            PoolEntry {
                pool_address: pool_address.to_lowercase(),
                token0: token0.to_lowercase(),
                token1: token1.to_lowercase(),
                decimals_diff,
            },
        );
    }

    pub fn add_token(&mut self, symbol: &str, address: &str) {
        self.tokens
            .insert(Symbol::new(symbol), address.to_lowercase());
    }

    /// Resolve a requested pair to a registered pool, trying the direct key
    /// first and then the inverse. Returns the matched registry key and the
    /// pool entry, or `None` if neither orientation is registered.
    pub fn resolve(&self, pair: &Pair) -> Option<(String, &PoolEntry)> {
        let direct = pair.key();
        if let Some(entry) = self.pools.get(&direct) {
            return Some((direct, entry));
        }
        let inverse = pair.inverse().key();
        self.pools.get(&inverse).map(|entry| (inverse, entry))
    }

    /// Token contract address for a symbol (lowercase hex), if known.
    pub fn token_address(&self, symbol: &Symbol) -> Option<&str> {
        self.tokens.get(symbol).map(String::as_str)
    }
}
