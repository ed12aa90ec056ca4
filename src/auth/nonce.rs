//! Nonce generation for Kraken API authentication.
//!
//! Kraken requires a strictly increasing nonce for each authenticated request
//! to prevent replay attacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Trait for providing nonces for authenticated requests.
///
/// The nonce must be greater than any nonce previously sent with the same API key.
/// Any `Fn() -> u64` closure is a provider.
pub trait NonceProvider: Send + Sync {
    /// Generate the next nonce value.
    fn next_nonce(&self) -> u64;
}

impl<F> NonceProvider for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn next_nonce(&self) -> u64 {
        self()
    }
}

/// The default provider: microseconds since the UNIX epoch.
///
/// Holds no state, so nonces are only increasing as long as the system clock does not
/// move backwards. The client sends private requests one at a time, which keeps two
/// nonces from the same microsecond from reaching Kraken.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockNonce;

impl NonceProvider for ClockNonce {
    fn next_nonce(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }
}

/// A deterministic sequence `start, start + 1, ...`.
#[derive(Debug)]
pub struct CounterNonce {
    next: AtomicU64,
}

impl CounterNonce {
    /// Create a sequence whose first nonce is `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl NonceProvider for CounterNonce {
    fn next_nonce(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}
