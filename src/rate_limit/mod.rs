//! Rate limiting for Kraken API.
//!
//! Kraken meters API usage with a counter per API key: every call adds its cost, and the
//! counter decays by one unit every decay interval. Exceeding the tier's maximum gets the key
//! temporarily banned, so calls are delayed client-side before they would overflow it.
//!
//! Public and private endpoints are metered separately and each gets its own [`RateLimiter`].
//!
//! ## Example
//!
//! ```rust
//! use kraken_core::rate_limit::{RateLimitPolicy, RateLimiter};
//! use std::time::Duration;
//!
//! # async fn run() -> kraken_core::Result<()> {
//! let limiter = RateLimiter::new(RateLimitPolicy::new(15, Duration::from_secs(3))?);
//! let waited = limiter.admit(2).await;
//! assert!(waited.is_zero());
//! # Ok(())
//! # }
//! ```

mod limiter;

pub use limiter::RateLimiter;

use std::time::Duration;

use crate::error::KrakenError;

/// Quota of one rate-limited endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    limit: u32,
    decay_interval: Duration,
}

impl RateLimitPolicy {
    /// Create a policy allowing `limit` outstanding cost units, each expiring after
    /// `decay_interval`.
    ///
    /// Fails if `limit` is below 2 or the interval is zero.
    pub fn new(limit: u32, decay_interval: Duration) -> Result<Self, KrakenError> {
        if limit < 2 {
            return Err(KrakenError::Config(format!(
                "rate limit must be at least 2, got {limit}"
            )));
        }
        if decay_interval.is_zero() {
            return Err(KrakenError::Config(
                "rate limit decay interval must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            limit,
            decay_interval,
        })
    }

    const fn from_parts(limit: u32, decay_secs: u64) -> Self {
        Self {
            limit,
            decay_interval: Duration::from_secs(decay_secs),
        }
    }

    /// Maximum number of outstanding cost units.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Time after which one unit of cost expires.
    pub fn decay_interval(&self) -> Duration {
        self.decay_interval
    }
}

/// Rate limit constants by account tier.
pub mod limits {
    use super::RateLimitPolicy;

    /// Tier 2 accounts: counter of 15, one unit every 3 seconds.
    pub const TIER_2: RateLimitPolicy = RateLimitPolicy::from_parts(15, 3);
    /// Tier 3 accounts: counter of 20, one unit every 2 seconds.
    pub const TIER_3: RateLimitPolicy = RateLimitPolicy::from_parts(20, 2);
    /// Tier 4 accounts: counter of 20, one unit every second.
    pub const TIER_4: RateLimitPolicy = RateLimitPolicy::from_parts(20, 1);
    /// Public endpoints are always metered at the most permissive tier.
    pub const PUBLIC: RateLimitPolicy = TIER_4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_small_limit() {
        assert!(RateLimitPolicy::new(1, Duration::from_secs(1)).is_err());
        assert!(RateLimitPolicy::new(2, Duration::ZERO).is_err());
        let policy = RateLimitPolicy::new(2, Duration::from_secs(1)).unwrap();
        assert_eq!(policy.limit(), 2);
    }

    #[test]
    fn test_tier_constants() {
        assert_eq!(limits::TIER_2.limit(), 15);
        assert_eq!(limits::TIER_2.decay_interval(), Duration::from_secs(3));
        assert_eq!(limits::TIER_3.decay_interval(), Duration::from_secs(2));
        assert_eq!(limits::PUBLIC, limits::TIER_4);
    }
}
