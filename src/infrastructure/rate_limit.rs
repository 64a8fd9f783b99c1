//! Rate limiter implementation
//!
//! Sliding window admission control keyed by client. The decision and the
//! recording happen under one write guard, so concurrent requests can never
//! both observe "under limit" and both proceed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::rate_limit::{Admission, RateLimitConfig, RateLimiter};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(86400);

#[derive(Debug)]
struct LimiterState {
    records: HashMap<String, Vec<Instant>>,
    last_cleanup: Instant,
}

/// Sliding window rate limiter over per-minute, per-hour, and per-day
/// budgets.
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    state: RwLock<LimiterState>,
    cleanup_interval: Duration,
}

impl SlidingWindowRateLimiter {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LimiterState {
                records: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
            cleanup_interval: Duration::from_secs(300),
        }
    }

    /// Forget all recorded requests for a client.
    pub async fn reset(&self, client_key: &str) {
        self.state.write().await.records.remove(client_key);
    }

    fn check_windows(
        entries: &[Instant],
        config: &RateLimitConfig,
        now: Instant,
    ) -> Result<u32, Duration> {
        let minute_count = count_in_window(entries, now, MINUTE);
        if minute_count >= config.requests_per_minute {
            return Err(retry_after(entries, now, MINUTE));
        }

        let hour_count = count_in_window(entries, now, HOUR);
        if hour_count >= config.requests_per_hour {
            return Err(retry_after(entries, now, HOUR));
        }

        // Entries older than a day are pruned before the check.
        let day_count = entries.len() as u32;
        if day_count >= config.requests_per_day {
            return Err(retry_after(entries, now, DAY));
        }

        Ok(minute_count)
    }
}

impl Default for SlidingWindowRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowRateLimiter {
    async fn check_and_increment(&self, client_key: &str, config: &RateLimitConfig) -> Admission {
        let now = Instant::now();
        let mut state = self.state.write().await;

        if now.duration_since(state.last_cleanup) >= self.cleanup_interval {
            state
                .records
                .retain(|_, entries| entries.iter().any(|t| now.duration_since(*t) < DAY));
            state.last_cleanup = now;
        }

        let entries = state.records.entry(client_key.to_string()).or_default();
        entries.retain(|t| now.duration_since(*t) < DAY);

        match Self::check_windows(entries, config, now) {
            Ok(minute_count) => {
                entries.push(now);
                Admission::Allowed {
                    remaining: config.requests_per_minute.saturating_sub(minute_count + 1),
                }
            }
            Err(retry_after) => Admission::Denied { retry_after },
        }
    }
}

fn count_in_window(entries: &[Instant], now: Instant, window: Duration) -> u32 {
    entries
        .iter()
        .filter(|t| now.duration_since(**t) < window)
        .count() as u32
}

/// Time until the oldest entry in the window slides out; the full window
/// when nothing is recorded (a zero budget).
fn retry_after(entries: &[Instant], now: Instant, window: Duration) -> Duration {
    entries
        .iter()
        .filter(|t| now.duration_since(**t) < window)
        .min()
        .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
        .unwrap_or(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_allowed() {
        let limiter = SlidingWindowRateLimiter::new();
        let config = RateLimitConfig::new(10, 100, 1000);

        let admission = limiter.check_and_increment("key1", &config).await;

        assert_eq!(admission, Admission::Allowed { remaining: 9 });
    }

    #[tokio::test]
    async fn test_blocks_over_minute_limit() {
        let limiter = SlidingWindowRateLimiter::new();
        let config = RateLimitConfig::new(2, 100, 1000);

        assert!(limiter.check_and_increment("key1", &config).await.is_allowed());
        assert!(limiter.check_and_increment("key1", &config).await.is_allowed());

        let admission = limiter.check_and_increment("key1", &config).await;
        assert!(!admission.is_allowed());

        if let Admission::Denied { retry_after } = admission {
            assert!(retry_after <= MINUTE);
        }
    }

    #[tokio::test]
    async fn test_denied_request_is_not_recorded() {
        let limiter = SlidingWindowRateLimiter::new();
        let config = RateLimitConfig::new(1, 100, 1000);

        assert!(limiter.check_and_increment("key1", &config).await.is_allowed());

        // Repeated denials must not extend the window.
        for _ in 0..5 {
            assert!(!limiter.check_and_increment("key1", &config).await.is_allowed());
        }

        let state = limiter.state.read().await;
        assert_eq!(state.records.get("key1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = SlidingWindowRateLimiter::new();
        let config = RateLimitConfig::new(1, 100, 1000);

        assert!(limiter.check_and_increment("key1", &config).await.is_allowed());
        assert!(limiter.check_and_increment("key2", &config).await.is_allowed());
        assert!(!limiter.check_and_increment("key1", &config).await.is_allowed());
    }

    #[tokio::test]
    async fn test_zero_budget_denies_with_full_window_hint() {
        let limiter = SlidingWindowRateLimiter::new();
        let config = RateLimitConfig::new(0, 0, 0);

        let admission = limiter.check_and_increment("key1", &config).await;

        assert_eq!(
            admission,
            Admission::Denied {
                retry_after: MINUTE
            }
        );
    }

    #[tokio::test]
    async fn test_reset_clears_budget() {
        let limiter = SlidingWindowRateLimiter::new();
        let config = RateLimitConfig::new(1, 100, 1000);

        assert!(limiter.check_and_increment("key1", &config).await.is_allowed());
        assert!(!limiter.check_and_increment("key1", &config).await.is_allowed());

        limiter.reset("key1").await;
        assert!(limiter.check_and_increment("key1", &config).await.is_allowed());
    }

    #[tokio::test]
    async fn test_unlimited_never_denies() {
        let limiter = SlidingWindowRateLimiter::new();
        let config = RateLimitConfig::unlimited();

        for _ in 0..1000 {
            assert!(limiter.check_and_increment("key1", &config).await.is_allowed());
        }
    }
}
