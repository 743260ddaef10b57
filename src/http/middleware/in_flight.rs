//! In-flight accounting and request metrics.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::lifecycle::InFlightTracker;
use crate::observability::metrics;

pub async fn track_in_flight(
    State(tracker): State<InFlightTracker>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let _guard = tracker.track();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
