use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{CounterStore, CounterStoreError, WindowState};

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    expires_at: Instant,
}

/// Single-process counter store.
///
/// The `DashMap` entry guard holds the shard lock for the whole
/// check-increment-expire step. Call [`cleanup_expired`](Self::cleanup_expired)
/// periodically to drop finished windows.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, Window>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.windows.retain(|_, w| w.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn acquire(
        &self,
        key: &str,
        max_requests: u64,
        window: Duration,
    ) -> Result<WindowState, CounterStoreError> {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            expires_at: now + window,
        });

        if entry.expires_at <= now {
            *entry = Window {
                count: 0,
                expires_at: now + window,
            };
        }

        let resets_in = entry.expires_at - now;
        if entry.count >= max_requests {
            return Ok(WindowState {
                admitted: false,
                count: entry.count,
                resets_in,
            });
        }

        entry.count += 1;
        Ok(WindowState {
            admitted: true,
            count: entry.count,
            resets_in,
        })
    }
}
