//! Fixed-window admission gate.
//!
//! A [`RateLimiter`] counts requests per client key in a shared
//! [`CounterStore`]. The store performs "check, increment, expire-if-new" as
//! one atomic step, so concurrent first requests can neither over-admit nor
//! push the window end forward.

pub mod memory;
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

pub use self::memory::MemoryCounterStore;
pub use self::redis_store::RedisCounterStore;

const KEY_PREFIX: &str = "rate_limit:";

/// Result of one atomic acquire against the counter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// `false` when the window was already full; the count was not touched.
    pub admitted: bool,
    /// Count after this request (or the unchanged count when denied).
    pub count: u64,
    /// Time until the window resets.
    pub resets_in: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum CounterStoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),
}

/// Shared request counters with a native atomic acquire.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically: read the count for `key` (absent = 0); if it is at least
    /// `max_requests` deny without incrementing; otherwise increment, and if
    /// the window is new give it a TTL of `window`.
    async fn acquire(
        &self,
        key: &str,
        max_requests: u64,
        window: Duration,
    ) -> Result<WindowState, CounterStoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// The window is full.
    Exhausted { retry_after: Duration },
    /// The counter store failed; the caller picks fail-open or fail-closed.
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u64, reset_after: Duration },
    Denied(Denial),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// How requests are grouped into counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// One counter per client address.
    #[default]
    SourceAddress,
    /// One counter per authenticated subject, falling back to the address
    /// for anonymous requests.
    Identity,
}

impl std::str::FromStr for KeyStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source_address" | "ip" => Ok(KeyStrategy::SourceAddress),
            "identity" => Ok(KeyStrategy::Identity),
            other => Err(CoreError::Config(format!("unknown rate limit key strategy: {other}"))),
        }
    }
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, max_requests: u64, window: Duration) -> CoreResult<Self> {
        if max_requests == 0 {
            return Err(CoreError::Config("rate limit max_requests must be at least 1".to_string()));
        }
        if window.is_zero() {
            return Err(CoreError::Config("rate limit window must be positive".to_string()));
        }
        Ok(Self {
            store,
            max_requests,
            window,
        })
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn admit(&self, client_key: &str) -> Admission {
        let key = format!("{KEY_PREFIX}{client_key}");

        match self.store.acquire(&key, self.max_requests, self.window).await {
            Ok(state) if state.admitted => Admission::Allowed {
                remaining: self.max_requests.saturating_sub(state.count),
                reset_after: state.resets_in,
            },
            Ok(state) => {
                tracing::debug!(key = %key, count = state.count, "rate limit exhausted");
                Admission::Denied(Denial::Exhausted {
                    retry_after: state.resets_in,
                })
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "rate limiter unavailable");
                Admission::Denied(Denial::Unavailable(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn acquire(&self, _: &str, _: u64, _: Duration) -> Result<WindowState, CounterStoreError> {
            Err(CounterStoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn limiter(max: u64) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryCounterStore::new()), max, Duration::from_secs(60)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn fourth_request_is_denied_until_window_elapses() {
        let limiter = limiter(3);

        for expected_remaining in [2, 1, 0] {
            match limiter.admit("10.0.0.1").await {
                Admission::Allowed { remaining, .. } => assert_eq!(remaining, expected_remaining),
                other => panic!("expected allowed, got {other:?}"),
            }
        }

        match limiter.admit("10.0.0.1").await {
            Admission::Denied(Denial::Exhausted { retry_after }) => {
                assert!(retry_after <= Duration::from_secs(60));
                assert!(retry_after > Duration::ZERO);
            }
            other => panic!("expected exhausted, got {other:?}"),
        }

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.admit("10.0.0.1").await.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn denied_requests_do_not_extend_the_window() {
        let limiter = limiter(1);
        assert!(limiter.admit("k").await.is_allowed());

        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..5 {
            assert!(!limiter.admit("k").await.is_allowed());
        }

        // The window still ends 60s after the first request.
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(limiter.admit("k").await.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.admit("a").await.is_allowed());
        assert!(!limiter.admit("a").await.is_allowed());
        assert!(limiter.admit("b").await.is_allowed());
    }

    #[tokio::test]
    async fn store_failure_is_distinguishable() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore), 10, Duration::from_secs(60)).unwrap();
        match limiter.admit("a").await {
            Admission::Denied(Denial::Unavailable(reason)) => assert!(reason.contains("connection refused")),
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_never_over_admit() {
        let limiter = Arc::new(limiter(10));
        let mut handles = Vec::new();
        for _ in 0..64 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.admit("shared").await.is_allowed() }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
        assert!(RateLimiter::new(Arc::clone(&store), 0, Duration::from_secs(1)).is_err());
        assert!(RateLimiter::new(store, 1, Duration::ZERO).is_err());
    }

    #[test]
    fn key_strategy_parses() {
        assert_eq!("ip".parse::<KeyStrategy>().unwrap(), KeyStrategy::SourceAddress);
        assert_eq!("identity".parse::<KeyStrategy>().unwrap(), KeyStrategy::Identity);
        assert!("session".parse::<KeyStrategy>().is_err());
    }
}
