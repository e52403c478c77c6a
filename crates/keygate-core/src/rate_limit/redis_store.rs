use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use super::{CounterStore, CounterStoreError, WindowState};

/// Check, increment and expire-if-new in one server-side step.
///
/// A key left without a TTL (e.g. written by an older client) gets one on
/// its next touch, so it cannot lock a client out forever.
const ACQUIRE_SCRIPT: &str = r"
local limit = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local current = tonumber(redis.call('GET', KEYS[1]) or '0')

if current >= limit then
    local ttl = redis.call('PTTL', KEYS[1])
    if ttl < 0 then
        redis.call('PEXPIRE', KEYS[1], window_ms)
        ttl = window_ms
    end
    return {0, current, ttl}
end

local count = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], window_ms)
    ttl = window_ms
end
return {1, count, ttl}
";

/// Counter store shared by every server instance through Redis.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    script: Script,
    op_timeout: Duration,
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connects to `url` (e.g. `redis://:password@host:6379/0`).
    ///
    /// Both the initial connect and every later operation are bounded by
    /// `op_timeout`.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, CounterStoreError> {
        let client = Client::open(url)
            .map_err(|e| CounterStoreError::Unavailable(format!("invalid redis url: {e}")))?;

        let conn = tokio::time::timeout(op_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CounterStoreError::Timeout(op_timeout))?
            .map_err(|e| CounterStoreError::Unavailable(e.to_string()))?;

        tracing::info!("connected to redis counter store");
        Ok(Self {
            conn,
            script: Script::new(ACQUIRE_SCRIPT),
            op_timeout,
        })
    }
}

fn window_from_ttl(ttl_ms: i64) -> Duration {
    Duration::from_millis(ttl_ms.max(0) as u64)
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn acquire(
        &self,
        key: &str,
        max_requests: u64,
        window: Duration,
    ) -> Result<WindowState, CounterStoreError> {
        let mut conn = self.conn.clone();
        let window_ms = window.as_millis().max(1) as u64;

        let invocation = async {
            let result: (i64, i64, i64) = self
                .script
                .key(key)
                .arg(max_requests)
                .arg(window_ms)
                .invoke_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>(result)
        };

        let (admitted, count, ttl_ms) = tokio::time::timeout(self.op_timeout, invocation)
            .await
            .map_err(|_| CounterStoreError::Timeout(self.op_timeout))?
            .map_err(|e| CounterStoreError::Unavailable(e.to_string()))?;

        Ok(WindowState {
            admitted: admitted == 1,
            count: count.max(0) as u64,
            resets_in: window_from_ttl(ttl_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_ttl_maps_to_zero() {
        assert_eq!(window_from_ttl(-2), Duration::ZERO);
        assert_eq!(window_from_ttl(1500), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        // Port 1 is never a redis server; either refusal or timeout is fine.
        let err = RedisCounterStore::connect("redis://127.0.0.1:1/", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CounterStoreError::Unavailable(_) | CounterStoreError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let err = RedisCounterStore::connect("not a url", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CounterStoreError::Unavailable(_)));
    }

    /// Runs against `KEYGATE_TEST_REDIS_URL`.
    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn acquire_against_live_redis() {
        let url = std::env::var("KEYGATE_TEST_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string());
        let store = RedisCounterStore::connect(&url, Duration::from_secs(2)).await.unwrap();
        let key = format!("rate_limit:test:{}", std::process::id());
        let window = Duration::from_secs(2);

        for expected in 1..=3 {
            let state = store.acquire(&key, 3, window).await.unwrap();
            assert!(state.admitted);
            assert_eq!(state.count, expected);
        }
        let denied = store.acquire(&key, 3, window).await.unwrap();
        assert!(!denied.admitted);
        assert_eq!(denied.count, 3);
        assert!(denied.resets_in <= window);

        tokio::time::sleep(window + Duration::from_millis(200)).await;
        assert!(store.acquire(&key, 3, window).await.unwrap().admitted);
    }
}
