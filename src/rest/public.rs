//! Public REST API endpoints (no authentication required).

use serde::Deserialize;

use crate::error::KrakenError;
use crate::rest::KrakenClient;
use crate::rest::endpoints::{DEFAULT_COST, public};

/// Server time response.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerTime {
    /// Unix timestamp.
    pub unixtime: i64,
    /// RFC 1123 formatted time string.
    pub rfc1123: String,
}

/// System status response.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemStatus {
    /// Current system status (`online`, `maintenance`, `cancel_only`, `post_only`).
    pub status: String,
    /// Current timestamp.
    pub timestamp: String,
}

impl KrakenClient {
    /// Get the server time.
    ///
    /// This is useful for approximating the skew between local and server time.
    pub async fn get_server_time(&self) -> Result<ServerTime, KrakenError> {
        self.query_public(public::TIME, &(), DEFAULT_COST)
            .await?
            .into_result()
    }

    /// Get the system status.
    pub async fn get_system_status(&self) -> Result<SystemStatus, KrakenError> {
        self.query_public(public::SYSTEM_STATUS, &(), DEFAULT_COST)
            .await?
            .into_result()
    }
}
