//! RateScout Library
//!
//! Best-rate aggregation across centralized exchanges and on-chain pools

pub mod aggregator;
pub mod api;
pub mod config;
pub mod registry;
pub mod sources;
pub mod types;
