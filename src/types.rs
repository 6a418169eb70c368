//! Core types used throughout RateScout
//!
//! Defines symbols, pairs and the quote/estimate result shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An exchange-agnostic asset ticker, normalized to uppercase.
///
/// Symbols are request-scoped values with no identity beyond equality:
/// `Symbol::new("btc") == Symbol::new("BTC")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(s.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

/// A directional (base, quote) pair. `(BTC, USDT)` and `(USDT, BTC)` are
/// distinct pairs related by inversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair {
    pub base: Symbol,
    pub quote: Symbol,
}

impl Pair {
    pub fn new(base: impl Into<Symbol>, quote: impl Into<Symbol>) -> Self {
        Pair {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Registry key form, e.g. "BTC/USDT".
    pub fn key(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    pub fn inverse(&self) -> Pair {
        Pair {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// One source's answer for a requested pair. `rate` is quote-units per one
/// base-unit; `None` means the source had no data for this request.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuote {
    pub source: String,
    pub rate: Option<f64>,
}

/// One quote per registered source, in registration order, for a single
/// requested pair. Built fresh per call, never persisted.
pub type QuoteTable = Vec<SourceQuote>;

/// The winning source for a conversion and the amount it would yield.
#[derive(Debug, Clone, PartialEq)]
pub struct BestEstimate {
    pub source: String,
    pub output_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_normalizes_case_and_whitespace() {
        assert_eq!(Symbol::new("btc"), Symbol::new(" BTC "));
        assert_eq!(Symbol::new("usdt").as_str(), "USDT");
    }

    #[test]
    fn pair_key_and_inverse() {
        let pair = Pair::new("eth", "usdt");
        assert_eq!(pair.key(), "ETH/USDT");
        assert_eq!(pair.inverse().key(), "USDT/ETH");
        assert_ne!(pair, pair.inverse());
    }
}
