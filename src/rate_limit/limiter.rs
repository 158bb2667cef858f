use super::key::ClientKey;
use super::types::{Decision, RateLimitConfig, StoreFault};
use crate::metrics;
use crate::store::CounterStore;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Fixed-window rate limiter gate
///
/// Holds no counters of its own. Each check runs one atomic transaction against the
/// shared store and compares the returned count with the configured limit.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: Arc<RateLimitConfig>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Decide whether a request from `key` may proceed
    pub async fn check(&self, key: &ClientKey) -> Decision {
        let decision = self.evaluate(key).await;
        metrics::record_decision(&decision);
        decision
    }

    async fn evaluate(&self, key: &ClientKey) -> Decision {
        if !self.store.is_ready() {
            warn!(
                client = %key,
                state = %self.store.state(),
                "Counter store not ready, skipping rate limiter"
            );
            return self.unavailable(StoreFault::NotReady);
        }

        let store_key = key.to_store_key(&self.config.key_prefix);

        match self
            .store
            .atomic_increment_with_expiry(&store_key, self.config.window_secs)
            .await
        {
            Ok(count) if count > self.config.limit => {
                warn!(
                    client = %key,
                    count,
                    limit = self.config.limit,
                    "Rate limit exceeded"
                );
                Decision::Reject { count }
            }
            Ok(count) => {
                debug!(client = %key, count, limit = self.config.limit, "Request counted");
                Decision::Admit { count }
            }
            Err(e) => {
                error!(client = %key, error = %e, "Error in rate limiter");
                metrics::record_store_error();
                self.unavailable(StoreFault::TransactionFailed)
            }
        }
    }

    fn unavailable(&self, fault: StoreFault) -> Decision {
        if self.config.fail_open {
            Decision::FailOpen(fault)
        } else {
            Decision::FailClosed(fault)
        }
    }
}
