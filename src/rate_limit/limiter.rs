//! Decaying-counter admission control.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::clock::{Clock, TokioClock};
use crate::rate_limit::RateLimitPolicy;

/// Delays callers until their cost fits in the quota.
///
/// Each unit of admitted cost is tracked as an expiry instant. Units are chained one decay
/// interval apart, so a burst still drains at the policy's rate rather than expiring all at
/// once. Admission waits while more than `limit` units would be outstanding.
///
/// Admissions are serialized: the pending list stays locked while a caller waits, and its
/// cost is recorded only once the wait has finished. Dropping an `admit` future therefore
/// leaves the limiter as if the call never happened.
pub struct RateLimiter {
    policy: Option<RateLimitPolicy>,
    clock: Arc<dyn Clock>,
    pending: Mutex<PendingCost>,
}

impl RateLimiter {
    /// Create a limiter enforcing `policy` on the tokio clock.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(Some(policy), Arc::new(TokioClock))
    }

    /// Create a limiter that admits everything immediately.
    pub fn disabled() -> Self {
        Self::with_clock(None, Arc::new(TokioClock))
    }

    /// Create a limiter with an explicit clock. `None` disables limiting.
    pub fn with_clock(policy: Option<RateLimitPolicy>, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            pending: Mutex::new(PendingCost::default()),
        }
    }

    /// The enforced policy, if any.
    pub fn policy(&self) -> Option<RateLimitPolicy> {
        self.policy
    }

    /// Wait until `cost` units can be spent, then record them.
    ///
    /// Returns how long the caller was delayed. A cost larger than the limit is not
    /// rejected; it waits until enough earlier units have decayed.
    pub async fn admit(&self, cost: u32) -> Duration {
        let Some(policy) = self.policy else {
            return Duration::ZERO;
        };
        if cost == 0 {
            return Duration::ZERO;
        }

        let mut pending = self.pending.lock().await;
        let now = self.clock.now();
        pending.prune(now);

        let scheduled = pending.schedule(now, cost, policy.decay_interval());
        let waited = match pending.deadline(&scheduled, policy.limit()) {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(now);
                tracing::debug!(
                    cost,
                    outstanding = pending.len(),
                    wait = ?wait,
                    "rate limit reached, delaying request"
                );
                self.clock.sleep(wait).await;
                wait
            }
            None => Duration::ZERO,
        };

        pending.commit(scheduled);
        waited
    }

    /// Number of recorded units that have not yet expired.
    pub async fn outstanding(&self) -> usize {
        let mut pending = self.pending.lock().await;
        pending.prune(self.clock.now());
        pending.len()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .finish()
    }
}

/// Expiry instants of admitted cost, oldest first.
#[derive(Debug, Default)]
struct PendingCost {
    expiries: VecDeque<Instant>,
}

impl PendingCost {
    fn len(&self) -> usize {
        self.expiries.len()
    }

    /// Drop every unit that has expired at `now`.
    fn prune(&mut self, now: Instant) {
        while self.expiries.front().is_some_and(|expiry| *expiry <= now) {
            self.expiries.pop_front();
        }
    }

    /// Expiries for `cost` new units, chained after the newest outstanding one.
    fn schedule(&self, now: Instant, cost: u32, decay_interval: Duration) -> Vec<Instant> {
        let mut last = self.expiries.back().copied().map_or(now, |last| last.max(now));
        (0..cost)
            .map(|_| {
                last += decay_interval;
                last
            })
            .collect()
    }

    /// Instant at which the outstanding plus `scheduled` units fit into `limit`, if they do
    /// not already.
    fn deadline(&self, scheduled: &[Instant], limit: u32) -> Option<Instant> {
        let total = self.expiries.len() + scheduled.len();
        let excess = total.checked_sub(limit as usize).filter(|excess| *excess > 0)?;
        self.expiries
            .iter()
            .chain(scheduled)
            .nth(excess - 1)
            .copied()
    }

    fn commit(&mut self, scheduled: Vec<Instant>) {
        self.expiries.extend(scheduled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(limit: u32, decay: Duration) -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new());
        let policy = RateLimitPolicy::new(limit, decay).unwrap();
        let limiter = RateLimiter::with_clock(Some(policy), clock.clone());
        (clock, limiter)
    }

    #[tokio::test]
    async fn test_not_limited_up_to_limit() {
        let (_, limiter) = limiter(2, Duration::from_nanos(1));
        assert!(limiter.admit(2).await.is_zero());
    }

    #[tokio::test]
    async fn test_limited_when_over() {
        let (_, limiter) = limiter(2, Duration::from_nanos(1));
        limiter.admit(1).await;
        assert!(!limiter.admit(2).await.is_zero());
    }

    #[tokio::test]
    async fn test_enough_time_passed_not_limited() {
        let (clock, limiter) = limiter(2, Duration::from_secs(1));
        limiter.admit(2).await;
        clock.advance(Duration::from_secs(1));
        assert!(limiter.admit(1).await.is_zero());
    }

    #[tokio::test]
    async fn test_double_rate_half_time_passed_limited() {
        let (clock, limiter) = limiter(2, Duration::from_secs(1));
        limiter.admit(2).await;
        clock.advance(Duration::from_secs(1));
        assert!(!limiter.admit(2).await.is_zero());
    }

    #[tokio::test]
    async fn test_third_call_waits_one_decay() {
        let (clock, limiter) = limiter(2, Duration::from_secs(1));

        assert!(limiter.admit(1).await.is_zero());
        assert!(limiter.admit(1).await.is_zero());
        assert_eq!(limiter.admit(1).await, Duration::from_secs(1));
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_cost_never_waits() {
        let (clock, limiter) = limiter(2, Duration::from_secs(1));
        limiter.admit(5).await;
        let before = clock.elapsed();

        assert!(limiter.admit(0).await.is_zero());
        assert_eq!(clock.elapsed(), before);
    }

    #[tokio::test]
    async fn test_cost_above_limit_is_admitted_eventually() {
        let (clock, limiter) = limiter(2, Duration::from_secs(1));

        // Five units chained at 1s..5s; three must decay before two remain.
        assert_eq!(limiter.admit(5).await, Duration::from_secs(3));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
        assert_eq!(limiter.outstanding().await, 2);
    }

    #[tokio::test]
    async fn test_outstanding_never_exceeds_limit() {
        let (_, limiter) = limiter(3, Duration::from_millis(250));

        for cost in [1, 3, 2, 1, 1, 4, 2, 1, 3, 1] {
            limiter.admit(cost).await;
            assert!(limiter.outstanding().await <= 3);
        }
    }

    #[tokio::test]
    async fn test_long_idle_drains_pending() {
        let (clock, limiter) = limiter(2, Duration::from_secs(1));
        limiter.admit(2).await;
        clock.advance(Duration::from_secs(3600));

        assert_eq!(limiter.outstanding().await, 0);
        assert!(limiter.admit(2).await.is_zero());
    }

    #[tokio::test]
    async fn test_disabled_admits_immediately() {
        let limiter = RateLimiter::disabled();
        for _ in 0..100 {
            assert!(limiter.admit(10).await.is_zero());
        }
        assert_eq!(limiter.outstanding().await, 0);
    }

    #[test]
    fn test_deadline_picks_excess_entry() {
        let start = Instant::now();
        let pending = PendingCost {
            expiries: VecDeque::from([start + Duration::from_secs(1)]),
        };
        let scheduled = pending.schedule(start, 2, Duration::from_secs(1));

        assert_eq!(
            scheduled,
            vec![start + Duration::from_secs(2), start + Duration::from_secs(3)]
        );
        assert_eq!(
            pending.deadline(&scheduled, 2),
            Some(start + Duration::from_secs(1))
        );
        assert_eq!(pending.deadline(&scheduled, 3), None);
    }
}
