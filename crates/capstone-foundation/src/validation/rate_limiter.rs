//! Fixed-window rate limiting for abuse-sensitive entry points
//!
//! Buckets are keyed by `operation:actor`. A bucket whose window has ended
//! is dropped on its next use; there is no background sweep. Bursts up to
//! the limit are allowed anywhere inside a window.
//!
//! State is process-local. A horizontally scaled deployment needs an
//! external counter store keyed the same way.

use capstone_kernel::{PolicyError, PolicyResult, RateLimitError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A `(max_requests, window)` pair supplied by the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl RateLimitRule {
    pub const fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }

    fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

struct Bucket {
    /// Requests counted in the current window
    count: u32,
    /// When the current window ends
    reset_at: Instant,
    /// Limit the bucket was created under
    max_requests: u32,
}

/// In-memory fixed-window limiter.
///
/// Construct one per process (or per test); instances share nothing.
#[derive(Clone, Default)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, Bucket>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(operation: &str, actor_id: &str) -> String {
        format!("{operation}:{actor_id}")
    }

    /// `true` if the call is admitted (and counted), `false` if refused.
    pub async fn allow(
        &self,
        operation: &str,
        actor_id: &str,
        max_requests: u32,
        window_ms: u64,
    ) -> bool {
        self.check(
            operation,
            actor_id,
            RateLimitRule::new(max_requests, window_ms),
        )
        .await
        .is_allowed()
    }

    /// Count one call against `operation:actor_id` under `rule`.
    ///
    /// The write lock is held across the check and the increment, so
    /// concurrent callers cannot both slip under the limit.
    pub async fn check(
        &self,
        operation: &str,
        actor_id: &str,
        rule: RateLimitRule,
    ) -> RateLimitResult {
        let key = Self::key(operation, actor_id);
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();

        if buckets.get(&key).is_some_and(|b| now >= b.reset_at) {
            buckets.remove(&key);
        }

        let bucket = buckets.entry(key).or_insert_with(|| Bucket {
            count: 0,
            reset_at: now + rule.window(),
            max_requests: rule.max_requests,
        });

        let resets_in = bucket.reset_at.saturating_duration_since(now);

        if bucket.count >= rule.max_requests {
            warn!(
                operation,
                actor_id,
                max_requests = rule.max_requests,
                "rate limit exceeded"
            );
            return RateLimitResult::Exceeded(RateLimitError {
                operation: operation.to_string(),
                actor_id: actor_id.to_string(),
                max_requests: rule.max_requests,
                current_count: bucket.count,
                window_ms: rule.window_ms,
                resets_at: wall_clock_after(resets_in),
            });
        }

        bucket.count += 1;

        debug!(
            operation,
            actor_id,
            count = bucket.count,
            max_requests = rule.max_requests,
            "rate limit check passed"
        );

        RateLimitResult::Allowed {
            remaining: rule.max_requests - bucket.count,
            resets_in,
        }
    }

    /// [`check`](Self::check) as a policy decision.
    pub async fn enforce(
        &self,
        operation: &str,
        actor_id: &str,
        rule: RateLimitRule,
    ) -> PolicyResult<()> {
        match self.check(operation, actor_id, rule).await {
            RateLimitResult::Allowed { .. } => Ok(()),
            RateLimitResult::Exceeded(err) => Err(PolicyError::RateLimited(err)),
        }
    }

    /// Current window for a key, without counting a call.
    pub async fn status(&self, operation: &str, actor_id: &str) -> Option<RateLimitStatus> {
        let buckets = self.buckets.read().await;
        let bucket = buckets.get(&Self::key(operation, actor_id))?;
        let now = Instant::now();
        if now >= bucket.reset_at {
            return None;
        }

        Some(RateLimitStatus {
            operation: operation.to_string(),
            actor_id: actor_id.to_string(),
            limit: bucket.max_requests,
            used: bucket.count,
            remaining: bucket.max_requests.saturating_sub(bucket.count),
            resets_in: bucket.reset_at.saturating_duration_since(now),
        })
    }

    /// Forget a key (admin operation). Returns whether a bucket existed.
    pub async fn reset(&self, operation: &str, actor_id: &str) -> bool {
        let mut buckets = self.buckets.write().await;
        buckets.remove(&Self::key(operation, actor_id)).is_some()
    }

    /// Keys currently holding a bucket, expired or not.
    pub async fn tracked_keys(&self) -> Vec<String> {
        let buckets = self.buckets.read().await;
        buckets.keys().cloned().collect()
    }
}

fn wall_clock_after(delay: Duration) -> chrono::DateTime<chrono::Utc> {
    let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
    chrono::Utc::now() + delay
}

/// Rate limit check result
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining requests in current window
        remaining: u32,
        /// Time until the window resets
        resets_in: Duration,
    },
    /// Rate limit exceeded
    Exceeded(RateLimitError),
}

impl RateLimitResult {
    /// Check if request is allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Get remaining requests if allowed
    pub fn remaining(&self) -> Option<u32> {
        match self {
            RateLimitResult::Allowed { remaining, .. } => Some(*remaining),
            RateLimitResult::Exceeded(_) => None,
        }
    }

    /// Get refusal details if exceeded
    pub fn rate_limit_error(&self) -> Option<&RateLimitError> {
        match self {
            RateLimitResult::Allowed { .. } => None,
            RateLimitResult::Exceeded(e) => Some(e),
        }
    }
}

/// Snapshot of one live bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub operation: String,
    pub actor_id: String,
    /// Maximum requests allowed
    pub limit: u32,
    pub used: u32,
    /// Remaining requests
    pub remaining: u32,
    pub resets_in: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_allows_exactly_max_then_refuses() {
        let limiter = RateLimiter::new();

        for _ in 0..3 {
            assert!(limiter.allow("resend", "_u1", 3, 60_000).await);
        }
        assert!(!limiter.allow("resend", "_u1", 3, 60_000).await);
        assert!(!limiter.allow("resend", "_u1", 3, 60_000).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_boundary() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.allow("resend", "_u1", 3, 60_000).await);
        }
        assert!(!limiter.allow("resend", "_u1", 3, 60_000).await);

        tokio::time::advance(Duration::from_millis(59_999)).await;
        assert!(!limiter.allow("resend", "_u1", 3, 60_000).await);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.allow("resend", "_u1", 3, 60_000).await);
        assert_eq!(limiter.status("resend", "_u1").await.unwrap().used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        assert!(limiter.allow("resend_verification_code", "_u1", 1, 60_000).await);
        assert!(limiter.allow("resend_password_reset_code", "_u1", 1, 60_000).await);
        assert!(limiter.allow("resend_verification_code", "_u2", 1, 60_000).await);
        assert!(!limiter.allow("resend_verification_code", "_u1", 1, 60_000).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refusal_does_not_count() {
        let limiter = RateLimiter::new();
        let rule = RateLimitRule::new(2, 1_000);
        limiter.check("op", "_u1", rule).await;
        limiter.check("op", "_u1", rule).await;

        let refused = limiter.check("op", "_u1", rule).await;
        let err = refused.rate_limit_error().unwrap();
        assert_eq!(err.current_count, 2);
        assert_eq!(err.max_requests, 2);
        assert_eq!(limiter.status("op", "_u1").await.unwrap().used, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enforce_maps_to_policy_error() {
        let limiter = RateLimiter::new();
        let rule = RateLimitRule::new(1, 1_000);
        assert!(limiter.enforce("op", "_u1", rule).await.is_ok());

        let err = limiter.enforce("op", "_u1", rule).await.unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_and_status() {
        let limiter = RateLimiter::new();
        let rule = RateLimitRule::new(5, 60_000);
        let first = limiter.check("op", "_u1", rule).await;
        assert_eq!(first.remaining(), Some(4));

        let status = limiter.status("op", "_u1").await.unwrap();
        assert_eq!(status.limit, 5);
        assert_eq!(status.remaining, 4);
        assert_eq!(status.resets_in, Duration::from_millis(60_000));

        assert!(limiter.status("op", "_nobody").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_and_tracked_keys() {
        let limiter = RateLimiter::new();
        limiter.allow("op", "_u1", 1, 1_000).await;
        assert_eq!(limiter.tracked_keys().await, vec!["op:_u1".to_string()]);

        assert!(limiter.reset("op", "_u1").await);
        assert!(!limiter.reset("op", "_u1").await);
        assert!(limiter.allow("op", "_u1", 1, 1_000).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_share_nothing() {
        let a = RateLimiter::new();
        let b = RateLimiter::new();
        assert!(a.allow("op", "_u1", 1, 1_000).await);
        assert!(b.allow("op", "_u1", 1, 1_000).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_never_exceed_limit() {
        let limiter = RateLimiter::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.allow("op", "_u1", 5, 60_000).await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }
}
