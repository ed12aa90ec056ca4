//! Common domain types for Kraken API.

use serde::{Deserialize, Serialize};

use crate::rate_limit::{RateLimitPolicy, limits};

/// Account tier selecting the private-endpoint rate limit.
///
/// Any tier other than `None` also enables the public-endpoint limiter, which always uses
/// the most permissive quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitTier {
    /// No client-side rate limiting
    #[default]
    None,
    /// Tier 2 (intermediate) accounts
    Tier2,
    /// Tier 3 accounts
    Tier3,
    /// Tier 4 (pro) accounts
    Tier4,
}

impl RateLimitTier {
    /// The private-endpoint policy for this tier, or `None` when limiting is disabled.
    pub fn policy(&self) -> Option<RateLimitPolicy> {
        match self {
            RateLimitTier::None => None,
            RateLimitTier::Tier2 => Some(limits::TIER_2),
            RateLimitTier::Tier3 => Some(limits::TIER_3),
            RateLimitTier::Tier4 => Some(limits::TIER_4),
        }
    }
}

impl std::fmt::Display for RateLimitTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RateLimitTier::None => "none",
            RateLimitTier::Tier2 => "tier2",
            RateLimitTier::Tier3 => "tier3",
            RateLimitTier::Tier4 => "tier4",
        };
        write!(f, "{}", s)
    }
}
