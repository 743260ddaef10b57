//! Admin API, served on its own listener.
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use std::sync::Arc;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    let api_key: Arc<str> = Arc::from(state.config.admin.api_key.as_str());
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/discovery", get(get_discovery))
        .route("/admin/config", get(get_config))
        .route("/admin/config/{key}", put(put_config).delete(delete_config))
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .with_state(state)
}
