use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Gate error types
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The counter store could not be reached while establishing the connection
    #[error("Store connection error: {0}")]
    Connection(String),

    /// A counter transaction failed after the store was ready
    #[error("Store error: {0}")]
    Store(String),

    #[error("Client identity could not be resolved from the request")]
    UnresolvableClientIdentity,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GateError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            GateError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            GateError::UnresolvableClientIdentity => StatusCode::BAD_REQUEST,
            GateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error means the store connection itself is gone
    pub fn is_connection_error(&self) -> bool {
        matches!(self, GateError::Connection(_))
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
