//! # Kraken Core
//!
//! An async Rust client for the Kraken exchange REST API, built around the authenticated
//! request pipeline every call goes through.
//!
//! ## Features
//!
//! - HMAC-SHA512 request signing with strictly ordered nonces
//! - Tier-based rate limiting that delays calls instead of dropping them
//! - Parsing and classification of Kraken's `{error, result}` envelopes
//! - Pluggable transport, clock, nonce source and request/response interceptors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kraken_core::rest::KrakenClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KrakenClient::new()?;
//!     let time = client.get_server_time().await?;
//!     println!("Server time: {:?}", time);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod clock;
pub mod error;
pub mod rate_limit;
pub mod response;
pub mod rest;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ApiErrors, ErrorString, KrakenError, Severity};
pub use response::{ErrorPolicy, ResponseEnvelope};
pub use rest::KrakenClient;
pub use types::RateLimitTier;

/// Result type alias using KrakenError
pub type Result<T> = std::result::Result<T, KrakenError>;
