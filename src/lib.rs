pub mod config;
pub mod cors;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod rate_limit;
pub mod routes;
pub mod store;

use crate::config::{AppConfig, StoreBackend, StoreConfig};
use crate::cors::CorsConfig;
use crate::error::{GateError, Result};
use crate::metrics::{metrics_handler, MetricsService};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::routes::{health_handler, resource_handler, HEALTH_PATH, RESOURCE_PATH};
use crate::store::{CounterStore, MemoryCounterStore, RedisCounterStore};
use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub use observability::init_tracing;

/// Build the HTTP application around a rate limiter
///
/// Only the resource route is gated. `/health` and `/metrics` bypass the limiter.
pub fn build_app(
    limiter: RateLimiter,
    cors: &CorsConfig,
    metrics: Option<MetricsService>,
) -> Result<Router> {
    let store: Arc<dyn CounterStore> = Arc::clone(limiter.store());

    let gated = Router::new()
        .route(RESOURCE_PATH, get(resource_handler))
        .route_layer(from_fn_with_state(limiter, rate_limit_middleware))
        .layer(cors.build_layer()?);

    let mut app = Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .with_state(store)
        .merge(gated);

    if let Some(metrics) = metrics {
        app = app.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics),
        );
    }

    Ok(app.layer(TraceLayer::new_for_http()))
}

/// Serve `app` on `addr` until a shutdown signal arrives
pub async fn serve(app: Router, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server is running on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| GateError::Internal(format!("Server error: {}", e)))
}

/// Open the configured counter store and start its background maintenance task
///
/// Redis gets a periodic health check that restores readiness after connection
/// errors; the memory store gets a sweep of closed windows. The returned handle
/// should be aborted on shutdown.
pub async fn connect_store(
    config: &StoreConfig,
) -> Result<(Arc<dyn CounterStore>, JoinHandle<()>)> {
    match config.backend {
        StoreBackend::Redis => {
            let store = Arc::new(RedisCounterStore::connect(config).await?);
            let task = store.spawn_health_check(config.health_check_interval());
            Ok((store as Arc<dyn CounterStore>, task))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory counter store, counts are not shared between processes");
            let store = Arc::new(MemoryCounterStore::new());
            let task = store.spawn_purge_task(config.purge_interval());
            Ok((store as Arc<dyn CounterStore>, task))
        }
    }
}

/// Connect to the counter store and run the gate
///
/// The listener is only bound after the first store handshake succeeds; a failed
/// first connection aborts startup with [`GateError::Connection`].
pub async fn run(config: AppConfig) -> Result<()> {
    config.validate()?;

    let metrics = if config.metrics.enabled {
        Some(MetricsService::new()?)
    } else {
        None
    };

    let (store, maintenance) = connect_store(&config.store).await?;

    info!(
        limit = config.rate_limit.limit,
        window = %config.rate_limit.window_label(),
        fail_open = config.rate_limit.fail_open,
        "Rate limiter configured"
    );

    let limiter = RateLimiter::new(store, config.rate_limit.clone());
    let app = build_app(limiter, &config.cors, metrics)?;

    let served = serve(app, &config.listen_addr()).await;
    maintenance.abort();
    info!("Server stopped");

    served
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
