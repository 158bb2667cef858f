use super::lua_scripts::INCREMENT_WITH_EXPIRY_SCRIPT;
use super::{ConnectionState, ConnectionStatus, CounterStore};
use crate::config::StoreConfig;
use crate::error::{GateError, Result};
use crate::metrics;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, RedisError, Script};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Redis-backed counter store shared by every gate instance
pub struct RedisCounterStore {
    /// Multiplexed connection, cloned per transaction
    connection: ConnectionManager,
    /// Readiness observed by the gate
    status: Arc<ConnectionStatus>,
    /// Pre-hashed increment script
    script: Script,
    /// Upper bound on a single round trip
    operation_timeout: Duration,
}

impl RedisCounterStore {
    /// Connect to Redis and confirm the handshake with a `PING`
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let url = config.url.as_ref().ok_or_else(|| {
            GateError::Config("Counter store URL is not configured".to_string())
        })?;

        let status = Arc::new(ConnectionStatus::new(ConnectionState::Connecting));
        info!(url = %config.redacted_url(), "Connecting to counter store");

        let client = redis::Client::open(url.expose_secret().as_str())
            .map_err(|e| GateError::Connection(format!("Invalid store URL: {}", e)))?;

        let connect_timeout = config.connect_timeout();
        let connection = timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                GateError::Connection(format!(
                    "Handshake did not complete within {:?}",
                    connect_timeout
                ))
            })?
            .map_err(|e| GateError::Connection(e.to_string()))?;

        let store = Self {
            connection,
            status,
            script: Script::new(INCREMENT_WITH_EXPIRY_SCRIPT),
            operation_timeout: config.operation_timeout(),
        };

        store.ping().await.map_err(|e| match e {
            GateError::Store(msg) => GateError::Connection(msg),
            other => other,
        })?;

        store.status.set(ConnectionState::Ready);
        metrics::record_store_ready(true);
        info!("Successfully connected to counter store");

        Ok(store)
    }

    /// Test the Redis connection
    pub async fn ping(&self) -> Result<()> {
        let mut connection = self.connection.clone();

        let reply = timeout(
            self.operation_timeout,
            redis::cmd("PING").query_async::<_, String>(&mut connection),
        )
        .await
        .map_err(|_| {
            GateError::Store(format!("PING timed out after {:?}", self.operation_timeout))
        })?
        .map_err(|e| GateError::Store(e.to_string()))?;

        debug!(reply = %reply, "Counter store answered PING");
        Ok(())
    }

    /// Ping once and update readiness from the outcome
    pub async fn check_health(&self) -> ConnectionState {
        match self.ping().await {
            Ok(()) => {
                if self.status.set(ConnectionState::Ready) != ConnectionState::Ready {
                    info!("Counter store connection restored");
                }
                metrics::record_store_ready(true);
                ConnectionState::Ready
            }
            Err(e) => {
                if self.status.set(ConnectionState::Error) == ConnectionState::Ready {
                    warn!(error = %e, "Counter store unreachable");
                }
                metrics::record_store_ready(false);
                ConnectionState::Error
            }
        }
    }

    /// Periodically ping the store so readiness recovers after connection errors
    pub fn spawn_health_check(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                store.check_health().await;
            }
        })
    }

    fn record_failure(&self, err: &RedisError) {
        if is_connection_level(err) && self.status.set(ConnectionState::Error) == ConnectionState::Ready
        {
            warn!(error = %err, "Counter store connection lost");
            metrics::record_store_ready(false);
        }
    }
}

/// Errors after which the connection itself must be considered unusable
fn is_connection_level(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal()
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn state(&self) -> ConnectionState {
        self.status.get()
    }

    async fn atomic_increment_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<u64> {
        let mut connection = self.connection.clone();
        let started = Instant::now();

        let outcome = timeout(
            self.operation_timeout,
            self.script
                .key(key)
                .arg(ttl_secs)
                .invoke_async::<_, u64>(&mut connection),
        )
        .await;

        metrics::record_store_latency(started.elapsed());

        match outcome {
            Ok(Ok(count)) => Ok(count),
            Ok(Err(e)) => {
                error!(key = %key, error = %e, "Counter store transaction failed");
                self.record_failure(&e);
                Err(GateError::Store(e.to_string()))
            }
            Err(_) => {
                error!(key = %key, timeout = ?self.operation_timeout, "Counter store transaction timed out");
                Err(GateError::Store(format!(
                    "transaction timed out after {:?}",
                    self.operation_timeout
                )))
            }
        }
    }
}
