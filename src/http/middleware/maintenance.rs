//! Maintenance-mode gate.
//!
//! Reads the watched `rest-config.maintenance` flag on every request. The
//! value comes from the config cache, so toggling it in any source takes
//! effect without a restart and without a remote read per request.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::response::{ApiError, MAINTENANCE_MESSAGE};
use crate::store::Setting;

pub async fn maintenance_gate(
    State(maintenance): State<Setting<bool>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if maintenance.get() {
        tracing::debug!(path = %request.uri().path(), "Rejected during maintenance");
        return ApiError::unavailable(MAINTENANCE_MESSAGE).into_response();
    }
    next.run(request).await
}
