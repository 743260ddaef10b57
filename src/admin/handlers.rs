use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::discovery::CacheSnapshot;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::lifecycle::LifecycleState;
use crate::store::ConfigValue;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub service: String,
    pub service_version: String,
    pub environment: String,
    pub state: LifecycleState,
    pub instance_id: Option<String>,
    pub registry_backend: &'static str,
    pub config_sources: Vec<&'static str>,
    pub in_flight: u64,
}

#[derive(Deserialize)]
pub struct SetValue {
    pub value: serde_json::Value,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let lifecycle = &state.lifecycle;
    let service = &state.config.service;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        service: service.name.clone(),
        service_version: service.version.clone(),
        environment: service.environment.clone(),
        state: lifecycle.state(),
        instance_id: lifecycle.instance_id().await,
        registry_backend: lifecycle.discovery().backend_name(),
        config_sources: state.config_client.source_names(),
        in_flight: lifecycle.in_flight().active_count(),
    })
}

pub async fn get_discovery(State(state): State<AppState>) -> Json<Vec<CacheSnapshot>> {
    Json(state.lifecycle.discovery().cache().snapshot())
}

pub async fn get_config(State(state): State<AppState>) -> Json<BTreeMap<String, ConfigValue>> {
    Json(state.config_client.cache().snapshot())
}

/// Set a key in the in-process overlay source.
pub async fn put_config(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SetValue>,
) -> Result<StatusCode, ApiError> {
    let overlay = state
        .overlay
        .as_ref()
        .ok_or_else(|| ApiError::new(StatusCode::CONFLICT, "Config overlay is not writable"))?;
    let value = ConfigValue::from_json(&body.value)
        .ok_or_else(|| ApiError::bad_request("Value must be a string, number or boolean"))?;
    tracing::info!(key = %key, value = %value, "Config key set through admin API");
    overlay.set(&key, value);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_config(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    let overlay = state
        .overlay
        .as_ref()
        .ok_or_else(|| ApiError::new(StatusCode::CONFLICT, "Config overlay is not writable"))?;
    if overlay.remove(&key) {
        tracing::info!(key = %key, "Config key removed through admin API");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Key {} is not set in the overlay.", key)))
    }
}
