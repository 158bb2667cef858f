use crate::error::{GateError, Result};
use crate::rate_limit::types::Decision;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Install the global recorder. Call once per process.
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            GateError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        describe_counter!(
            "windowgate_requests_admitted_total",
            "Requests admitted within their window limit"
        );
        describe_counter!(
            "windowgate_requests_rejected_total",
            "Requests rejected with 429 for exceeding the window limit"
        );
        describe_counter!(
            "windowgate_fail_open_total",
            "Requests admitted without a count because the store was unavailable"
        );
        describe_counter!(
            "windowgate_fail_closed_total",
            "Requests refused with 503 because the store was unavailable"
        );
        describe_counter!(
            "windowgate_store_errors_total",
            "Counter store transactions that failed or timed out"
        );
        describe_histogram!(
            "windowgate_store_latency_seconds",
            "Round trip time of counter store transactions"
        );
        describe_gauge!(
            "windowgate_store_ready",
            "Counter store readiness (1 = ready, 0 = not ready)"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.render(),
    )
}

/// Record the outcome of a rate limit check
pub fn record_decision(decision: &Decision) {
    match decision {
        Decision::Admit { .. } => {
            counter!("windowgate_requests_admitted_total").increment(1);
        }
        Decision::Reject { .. } => {
            counter!("windowgate_requests_rejected_total").increment(1);
        }
        Decision::FailOpen(fault) => {
            let labels = [("reason", fault.as_str())];
            counter!("windowgate_fail_open_total", &labels).increment(1);
        }
        Decision::FailClosed(fault) => {
            let labels = [("reason", fault.as_str())];
            counter!("windowgate_fail_closed_total", &labels).increment(1);
        }
    }
}

/// Record a failed or timed out counter store transaction
pub fn record_store_error() {
    counter!("windowgate_store_errors_total").increment(1);
}

/// Record a counter store round trip
pub fn record_store_latency(elapsed: Duration) {
    histogram!("windowgate_store_latency_seconds").record(elapsed.as_secs_f64());
}

/// Record counter store readiness
pub fn record_store_ready(ready: bool) {
    gauge!("windowgate_store_ready").set(if ready { 1.0 } else { 0.0 });
}
