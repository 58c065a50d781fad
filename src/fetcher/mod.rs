//! Upstream fetchers.
//!
//! A fetcher is a single capability: read one entity for a user id under a
//! [`RequestContext`]. HTTP-backed implementations retry transient failures;
//! tests swap in in-memory stubs at construction time.

pub mod http;
#[cfg(test)]
pub mod stub;

pub use http::{HttpPostsFetcher, HttpUserFetcher};

use crate::context::RequestContext;
use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;

/// Read one entity for a user from some source.
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Output: Send;

    async fn fetch(&self, user_id: i64, ctx: &RequestContext) -> Result<Self::Output, FetchError>;
}

/// Bounded retry with exponential backoff and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    attempts: u32,
    /// Wait after the first failed attempt; doubles after each further one.
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait before the attempt following failed attempt `attempt_index`
    /// (0-based): `base_delay * 2^attempt_index`.
    pub fn backoff(&self, attempt_index: u32) -> Duration {
        let factor = 1u32 << attempt_index.min(16);
        self.base_delay.saturating_mul(factor)
    }
}
