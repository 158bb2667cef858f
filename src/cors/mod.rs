use crate::error::{GateError, Result};
use axum::http::{HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tracing::debug;

/// CORS configuration for the gated route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins (use ["*"] for all origins)
    #[serde(default = "wildcard")]
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods
    #[serde(default = "default_methods")]
    pub allowed_methods: Vec<String>,
    /// Allowed request headers (use ["*"] for any)
    #[serde(default = "wildcard")]
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache in seconds
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

fn wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_methods() -> Vec<String> {
    vec!["GET".to_string(), "HEAD".to_string(), "OPTIONS".to_string()]
}

fn default_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: wildcard(),
            allowed_methods: default_methods(),
            allowed_headers: wildcard(),
            max_age_secs: default_max_age(),
        }
    }
}

fn is_wildcard(values: &[String]) -> bool {
    values.len() == 1 && values[0] == "*"
}

fn parse_all<T: FromStr>(values: &[String], what: &str) -> Result<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    values
        .iter()
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| GateError::Config(format!("Invalid CORS {} '{}': {}", what, v, e)))
        })
        .collect()
}

impl CorsConfig {
    /// Build a CorsLayer from this configuration
    pub fn build_layer(&self) -> Result<CorsLayer> {
        let origins = if is_wildcard(&self.allowed_origins) {
            debug!("CORS: Allowing all origins");
            AllowOrigin::any()
        } else {
            debug!(origins = ?self.allowed_origins, "CORS: Configured allowed origins");
            AllowOrigin::list(parse_all::<HeaderValue>(&self.allowed_origins, "origin")?)
        };

        let headers = if is_wildcard(&self.allowed_headers) {
            AllowHeaders::from(Any)
        } else {
            AllowHeaders::list(parse_all::<HeaderName>(&self.allowed_headers, "header")?)
        };

        let methods = parse_all::<Method>(&self.allowed_methods, "method")?;

        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .max_age(Duration::from_secs(self.max_age_secs)))
    }
}
