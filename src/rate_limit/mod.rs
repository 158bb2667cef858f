//! Rate limiting module
//!
//! A fixed-window counter per client address, kept in a shared counter store so
//! every gate process sees the same counts.
//!
//! # Semantics
//!
//! - The first request from a client opens a window of `window_secs` and counts 1
//! - Requests `1..=limit` in the window are admitted, the `limit + 1`-th is rejected
//!   with 429
//! - Later requests never move the window; it closes exactly `window_secs` after the
//!   first one, and the next request opens a fresh window
//! - When the store is not ready or a transaction fails, the request is admitted
//!   (`fail_open = true`, the default) or refused with 503
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use windowgate::rate_limit::{ClientKey, RateLimitConfig, RateLimiter};
//! use windowgate::store::MemoryCounterStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = RateLimiter::new(
//!         Arc::new(MemoryCounterStore::new()),
//!         RateLimitConfig::new(10, 60),
//!     );
//!
//!     let decision = limiter.check(&ClientKey::new("203.0.113.9")).await;
//!     assert!(decision.is_admitted());
//! }
//! ```

pub mod key;
pub mod limiter;
pub mod middleware;
pub mod types;

// Re-export commonly used types
pub use key::ClientKey;
pub use limiter::RateLimiter;
pub use middleware::{rate_limit_middleware, RateLimitRejection};
pub use types::{Decision, RateLimitConfig, StoreFault};
