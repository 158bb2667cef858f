use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rate limit configuration, fixed when the gate is constructed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum number of admitted requests per window (inclusive)
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Fixed window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Admit requests when the counter store is unavailable
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,
    /// Namespace prepended to every counter key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_limit() -> u64 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_fail_open() -> bool {
    true
}

fn default_key_prefix() -> String {
    "windowgate:ratelimit:".to_string()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_secs: default_window_secs(),
            fail_open: default_fail_open(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl RateLimitConfig {
    pub fn new(limit: u64, window_secs: u64) -> Self {
        Self {
            limit,
            window_secs,
            ..Default::default()
        }
    }

    /// Switch between fail-open and fail-closed on store faults
    pub fn with_fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    /// Window rendered the way it appears in rejection bodies, e.g. `60s`
    pub fn window_label(&self) -> String {
        format!("{}s", self.window_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(GateError::Config(
                "Rate limit must be > 0".to_string(),
            ));
        }
        if self.window_secs == 0 {
            return Err(GateError::Config(
                "Rate limit window must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why the store could not be consulted for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFault {
    /// The connection was not ready, no transaction was attempted
    NotReady,
    /// The transaction failed or timed out
    TransactionFailed,
}

impl StoreFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreFault::NotReady => "not_ready",
            StoreFault::TransactionFailed => "transaction_failed",
        }
    }
}

impl fmt::Display for StoreFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Count is within the limit
    Admit { count: u64 },
    /// Count exceeded the limit
    Reject { count: u64 },
    /// Store unavailable, admitted under the fail-open policy
    FailOpen(StoreFault),
    /// Store unavailable, refused under the fail-closed policy
    FailClosed(StoreFault),
}

impl Decision {
    /// Whether the request should be forwarded downstream
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit { .. } | Decision::FailOpen(_))
    }
}
