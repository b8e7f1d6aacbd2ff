//! Sliding-window rate limiter
//!
//! One limiter instance guards one concern:
//! - request throttling per client IP (every request counts)
//! - failed logins per email (only failures count, success clears the key)
//!
//! Hits older than the window are dropped lazily on access and in bulk by
//! `cleanup`, which the server runs periodically.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request admitted; `remaining` hits are left in the current window
    Allowed { limit: u32, remaining: u32 },
    /// Over the limit; retry after this many whole seconds
    Limited { limit: u32, retry_after: u64 },
}

impl RateDecision {
    #[cfg(test)]
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Sliding-window limiter keyed by an arbitrary string
#[derive(Clone)]
pub struct RateLimiter {
    hits: Arc<RwLock<HashMap<String, VecDeque<DateTime<Utc>>>>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter admitting `limit` hits per `window_seconds`
    pub fn new(limit: u32, window_seconds: u64) -> Self {
        Self {
            hits: Arc::new(RwLock::new(HashMap::new())),
            limit,
            window: Duration::seconds(window_seconds.min(i64::MAX as u64) as i64),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count a hit for `key` if it is under the limit
    pub async fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Utc::now()).await
    }

    pub async fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateDecision {
        let mut hits = self.hits.write().await;
        let queue = hits.entry(key.to_string()).or_default();
        self.evict(queue, now);

        if queue.len() as u64 >= self.limit as u64 {
            return RateDecision::Limited {
                limit: self.limit,
                retry_after: self.retry_after(queue, now),
            };
        }

        queue.push_back(now);
        RateDecision::Allowed {
            limit: self.limit,
            remaining: self.limit.saturating_sub(queue.len() as u32),
        }
    }

    /// Seconds until `key` may try again, or `None` when it is not blocked.
    /// Does not count a hit.
    pub async fn blocked_for(&self, key: &str) -> Option<u64> {
        self.blocked_for_at(key, Utc::now()).await
    }

    pub async fn blocked_for_at(&self, key: &str, now: DateTime<Utc>) -> Option<u64> {
        let mut hits = self.hits.write().await;
        let queue = hits.get_mut(key)?;
        self.evict(queue, now);
        if queue.len() as u64 >= self.limit as u64 {
            Some(self.retry_after(queue, now))
        } else {
            None
        }
    }

    /// Count a hit unconditionally
    pub async fn record(&self, key: &str) {
        self.record_at(key, Utc::now()).await
    }

    pub async fn record_at(&self, key: &str, now: DateTime<Utc>) {
        let mut hits = self.hits.write().await;
        let queue = hits.entry(key.to_string()).or_default();
        self.evict(queue, now);
        queue.push_back(now);
    }

    /// Forget every hit for `key`
    pub async fn clear(&self, key: &str) {
        self.hits.write().await.remove(key);
    }

    /// Drop expired hits and keys left empty
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let mut hits = self.hits.write().await;
        hits.retain(|_, queue| {
            self.evict(queue, now);
            !queue.is_empty()
        });
    }

    /// Number of keys currently tracked
    #[cfg(test)]
    pub async fn tracked_keys(&self) -> usize {
        self.hits.read().await.len()
    }

    fn evict(&self, queue: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while queue.front().is_some_and(|t| *t <= cutoff) {
            queue.pop_front();
        }
    }

    fn retry_after(&self, queue: &VecDeque<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
        let Some(oldest) = queue.front() else {
            return 0;
        };
        let wait = (*oldest + self.window) - now;
        let millis = wait.num_milliseconds().max(0) as u64;
        millis.div_ceil(1000).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    #[tokio::test]
    async fn test_requests_over_limit_are_rejected() {
        let limiter = RateLimiter::new(3, 60);

        for expected_remaining in [2, 1, 0] {
            assert_eq!(
                limiter.check_at("1.2.3.4", at(0)).await,
                RateDecision::Allowed { limit: 3, remaining: expected_remaining }
            );
        }

        assert_eq!(
            limiter.check_at("1.2.3.4", at(10)).await,
            RateDecision::Limited { limit: 3, retry_after: 50 }
        );
        // other keys are independent
        assert!(limiter.check_at("5.6.7.8", at(10)).await.is_allowed());
    }

    #[tokio::test]
    async fn test_window_slides() {
        let limiter = RateLimiter::new(2, 60);
        limiter.check_at("k", at(0)).await;
        limiter.check_at("k", at(30)).await;
        assert!(!limiter.check_at("k", at(59)).await.is_allowed());

        // first hit expires at t=60
        assert!(limiter.check_at("k", at(60)).await.is_allowed());
        assert!(!limiter.check_at("k", at(61)).await.is_allowed());
    }

    #[tokio::test]
    async fn test_failed_login_tracking() {
        let limiter = RateLimiter::new(5, 900);

        for _ in 0..4 {
            limiter.record_at("user@example.com", at(0)).await;
        }
        assert_eq!(limiter.blocked_for_at("user@example.com", at(1)).await, None);

        limiter.record_at("user@example.com", at(1)).await;
        assert_eq!(limiter.blocked_for_at("user@example.com", at(1)).await, Some(899));

        limiter.clear("user@example.com").await;
        assert_eq!(limiter.blocked_for_at("user@example.com", at(2)).await, None);
        assert_eq!(limiter.blocked_for_at("never-seen", at(2)).await, None);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_keys() {
        let limiter = RateLimiter::new(5, 1);
        limiter.record_at("old", at(0)).await;
        limiter.record("fresh").await;

        limiter.cleanup().await;

        assert_eq!(limiter.tracked_keys().await, 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Within one window exactly `limit` hits are admitted.
        #[test]
        fn admits_exactly_limit_hits(limit in 1u32..20, attempts in 1u32..40) {
            let limiter = RateLimiter::new(limit, 60);
            let admitted = tokio_test::block_on(async {
                let mut admitted = 0;
                for i in 0..attempts {
                    if limiter.check_at("key", at(i as i64 % 30)).await.is_allowed() {
                        admitted += 1;
                    }
                }
                admitted
            });
            prop_assert_eq!(admitted, attempts.min(limit));
        }

        /// Retry-after never exceeds the window and is at least one second.
        #[test]
        fn retry_after_bounded(window in 1u64..3600, offset in 0i64..3600) {
            let limiter = RateLimiter::new(1, window);
            let offset = offset % window as i64;
            let decision = tokio_test::block_on(async {
                limiter.check_at("key", at(0)).await;
                limiter.check_at("key", at(offset)).await
            });
            match decision {
                RateDecision::Limited { retry_after, .. } => {
                    prop_assert!(retry_after >= 1);
                    prop_assert!(retry_after <= window);
                }
                RateDecision::Allowed { .. } => prop_assert!(false, "second hit must be limited"),
            }
        }
    }
}
