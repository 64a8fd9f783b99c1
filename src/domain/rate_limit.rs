//! Admission control contract
//!
//! The limiter is the only shared resource the engine mutates under
//! concurrency; `check_and_increment` must decide and record in one atomic
//! operation so two concurrent requests cannot both observe "under limit".

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-tenant request budget across sliding windows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
}

impl RateLimitConfig {
    pub fn new(requests_per_minute: u32, requests_per_hour: u32, requests_per_day: u32) -> Self {
        Self {
            requests_per_minute,
            requests_per_hour,
            requests_per_day,
        }
    }

    pub fn unlimited() -> Self {
        Self {
            requests_per_minute: u32::MAX,
            requests_per_hour: u32::MAX,
            requests_per_day: u32::MAX,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(60, 1000, 10000)
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Atomic check-and-increment admission gate.
#[async_trait]
pub trait RateLimiter: Send + Sync + Debug {
    /// Check the budget for `client_key` and, when allowed, record the
    /// request, as a single atomic operation.
    async fn check_and_increment(&self, client_key: &str, config: &RateLimitConfig) -> Admission;
}
