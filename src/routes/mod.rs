use crate::store::CounterStore;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// Path of the rate limited resource
pub const RESOURCE_PATH: &str = "/api/resource";

/// Path of the liveness endpoint
pub const HEALTH_PATH: &str = "/health";

/// The protected resource behind the gate
pub async fn resource_handler() -> impl IntoResponse {
    Json(json!({
        "message": "Success! You have accessed the protected resource.",
    }))
}

/// Liveness plus counter store readiness
///
/// Always 200: with fail-open the gated route keeps serving while the store is down.
pub async fn health_handler(State(store): State<Arc<dyn CounterStore>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "store": store.state().as_str(),
    }))
}
