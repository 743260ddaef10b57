//! Readiness of this instance.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::lifecycle::LifecycleState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub state: LifecycleState,
    pub in_flight: u64,
}

/// 200 while registered, 503 while starting or draining.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let lifecycle = &state.lifecycle;
    let status = if lifecycle.is_registered() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            state: lifecycle.state(),
            in_flight: lifecycle.in_flight().active_count(),
        }),
    )
}
