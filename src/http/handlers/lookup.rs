//! Discovery test endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::upstream::base_url;

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub service: String,
}

/// Resolves the configured lookup target and returns its URL.
pub async fn lookup(State(state): State<AppState>) -> Result<Json<LookupResponse>, ApiError> {
    let address = state.lifecycle.discovery().discover(&state.lookup).await?;
    Ok(Json(LookupResponse {
        service: base_url(&address),
    }))
}
