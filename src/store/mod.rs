//! Counter store clients
//!
//! The rate limiter never keeps counters itself. Every decision goes through a
//! [`CounterStore`], which offers one primitive: atomically increment a key and
//! set its expiry only if the key has none yet. Because the primitive is atomic on
//! the store side, any number of gate processes sharing a store agree on counts.
//!
//! - [`RedisCounterStore`]: shared Redis instance, the primitive runs as a Lua script
//! - [`MemoryCounterStore`]: in-process store with the same semantics and fault
//!   injection, for tests and single-instance development

pub mod lua_scripts;
pub mod memory;
pub mod redis;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

pub use memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

/// Connection lifecycle of a counter store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Error => "error",
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Ready => 1,
            ConnectionState::Error => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Ready,
            2 => ConnectionState::Error,
            _ => ConnectionState::Connecting,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free holder for a [`ConnectionState`], shared between request handlers and
/// the readiness health check
#[derive(Debug)]
pub struct ConnectionStatus(AtomicU8);

impl ConnectionStatus {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store a new state, returning the previous one
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(state.as_u8(), Ordering::AcqRel))
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new(ConnectionState::Connecting)
    }
}

/// Shared atomic counter store
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current connection state
    fn state(&self) -> ConnectionState;

    /// Whether transactions may be attempted
    fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Increment `key` by one, creating it at 1 when absent, and set its expiry to
    /// `ttl_secs` only when it has none. Returns the post-increment count.
    ///
    /// Fails with [`GateError::Store`](crate::error::GateError::Store) when the
    /// transaction does not complete.
    async fn atomic_increment_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<u64>;
}
