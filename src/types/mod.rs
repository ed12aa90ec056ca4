//! Shared types for the Kraken API.

pub mod common;

pub use common::RateLimitTier;
