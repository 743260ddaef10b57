//! Sample settings bound through the config bundle.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub value: String,
    pub subvalue: String,
}

pub async fn show_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = &state.rest_config;
    Json(ConfigResponse {
        value: config.string_property.get(),
        subvalue: config.object_property.sub_property.get(),
    })
}
