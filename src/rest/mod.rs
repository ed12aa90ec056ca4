//! Kraken REST API client.
//!
//! [`KrakenClient::query_public`] and [`KrakenClient::query_private`] are the typed call
//! surface every endpoint goes through; the endpoint helpers in [`public`] and [`private`]
//! are thin wrappers over them.
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use kraken_core::rest::KrakenClient;
//! use kraken_core::response::ResponseEnvelope;
//!
//! # async fn run() -> kraken_core::Result<()> {
//! let client = KrakenClient::new()?;
//! let envelope: ResponseEnvelope<HashMap<String, serde_json::Value>> = client
//!     .query_public("/0/public/Ticker", &[("pair", "XBTUSD")], 1)
//!     .await?;
//! println!("{:?}", envelope.result);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod endpoints;
pub mod interceptor;
pub mod private;
pub mod public;
pub mod transport;

pub use client::{KrakenClient, KrakenClientBuilder, TwoFactorProvider};
pub use endpoints::{DEFAULT_COST, KRAKEN_BASE_URL};
pub use interceptor::{RequestInterceptor, ResponseInterceptor};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
