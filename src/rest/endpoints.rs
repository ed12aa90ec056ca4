//! Kraken REST API endpoint constants.

/// Base URL for the Kraken REST API.
pub const KRAKEN_BASE_URL: &str = "https://api.kraken.com";

/// Rate limit cost of a regular call.
pub const DEFAULT_COST: u32 = 1;

/// Public endpoints (no authentication required).
pub mod public {
    /// Get server time.
    pub const TIME: &str = "/0/public/Time";
    /// Get system status.
    pub const SYSTEM_STATUS: &str = "/0/public/SystemStatus";
}

/// Private endpoints (authentication required).
pub mod private {
    /// Get account balance.
    pub const BALANCE: &str = "/0/private/Balance";
    /// Get trade balance.
    pub const TRADE_BALANCE: &str = "/0/private/TradeBalance";
}
