use super::key::ClientKey;
use super::limiter::RateLimiter;
use super::types::{Decision, RateLimitConfig};
use crate::error::GateError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::warn;

/// Body of a 429 response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitRejection {
    pub message: String,
    pub limit: u64,
    /// Window length, e.g. `60s`
    pub window: String,
    #[serde(skip)]
    retry_after_secs: u64,
}

impl RateLimitRejection {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            message: "Too Many Requests".to_string(),
            limit: config.limit,
            window: config.window_label(),
            retry_after_secs: config.window_secs,
        }
    }
}

impl IntoResponse for RateLimitRejection {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Limit", HeaderValue::from(self.limit));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from(0u64));
        // Upper bound: the window may already be partly elapsed
        headers.insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs));

        (StatusCode::TOO_MANY_REQUESTS, headers, Json(self)).into_response()
    }
}

/// Axum middleware gating a route with the rate limiter
///
/// Wire it with `axum::middleware::from_fn_with_state(limiter, rate_limit_middleware)`.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let key = match ClientKey::from_connect_info(connect_info.as_ref()) {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "Falling back to shared rate limit bucket");
            ClientKey::fallback()
        }
    };

    match limiter.check(&key).await {
        Decision::Admit { .. } | Decision::FailOpen(_) => next.run(request).await,
        Decision::Reject { .. } => RateLimitRejection::new(limiter.config()).into_response(),
        Decision::FailClosed(fault) => {
            GateError::Store(format!("rate limiter unavailable ({})", fault)).into_response()
        }
    }
}
