use super::{ConnectionState, ConnectionStatus, CounterStore};
use crate::error::{GateError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

/// A counter and the instant it stops counting
#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u64,
    expires_at: Option<Instant>,
}

/// In-process counter store
///
/// Mirrors the Redis script: the per-key entry lock makes increment-and-expire
/// atomic, and the expiry is only set on a counter that has none. Time comes from
/// the tokio clock, so tests can pause and advance it.
pub struct MemoryCounterStore {
    counters: DashMap<String, WindowCounter>,
    status: ConnectionStatus,
    failing: AtomicBool,
}

impl MemoryCounterStore {
    /// Create a store that is immediately ready
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            status: ConnectionStatus::new(ConnectionState::Ready),
            failing: AtomicBool::new(false),
        }
    }

    /// Force the reported readiness
    pub fn set_state(&self, state: ConnectionState) {
        self.status.set(state);
    }

    /// Shorthand for toggling between `Ready` and `Error`
    pub fn set_ready(&self, ready: bool) {
        self.set_state(if ready {
            ConnectionState::Ready
        } else {
            ConnectionState::Error
        });
    }

    /// Make every transaction fail while still reporting ready
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Current count for `key`, if its window is still open
    pub fn count(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        self.counters
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.count)
    }

    /// Instant at which the window for `key` closes
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        let now = Instant::now();
        self.counters
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
    }

    /// Remaining time to live for `key`
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.expires_at(key)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Drop every counter whose window has closed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, entry| !entry.is_expired(now));
        let purged = before - self.counters.len();
        if purged > 0 {
            debug!(purged, "Purged expired counters");
        }
        purged
    }

    /// Periodically drop closed windows so idle clients do not accumulate
    pub fn spawn_purge_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                store.purge_expired();
            }
        })
    }

    /// Number of tracked keys, expired or not
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowCounter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn state(&self) -> ConnectionState {
        self.status.get()
    }

    async fn atomic_increment_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<u64> {
        if self.failing.load(Ordering::Acquire) {
            return Err(GateError::Store("injected transaction failure".to_string()));
        }

        let now = Instant::now();
        let mut entry = self.counters.entry(key.to_string()).or_insert(WindowCounter {
            count: 0,
            expires_at: None,
        });

        if entry.is_expired(now) {
            *entry = WindowCounter {
                count: 0,
                expires_at: None,
            };
        }

        entry.count += 1;
        if entry.expires_at.is_none() {
            entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
        }

        Ok(entry.count)
    }
}
