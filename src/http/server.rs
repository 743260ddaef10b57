//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, request ID, timeout, in-flight, maintenance)
//! - Serve until the shared shutdown token fires, then give open
//!   connections at most the drain timeout

use axum::{
    middleware,
    routing::get,
    Router,
};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{GatewayConfig, TimeoutConfig};
use crate::discovery::DiscoveryQuery;
use crate::domain::CustomerStore;
use crate::http::handlers::{config, customers, health, lookup};
use crate::http::middleware::{maintenance_gate, track_in_flight};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::{LifecycleManager, Shutdown};
use crate::store::{ConfigClient, MemorySource, RestConfig};
use crate::upstream::CollaboratorClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub customers: Arc<CustomerStore>,
    pub collaborators: Arc<CollaboratorClient>,
    pub lifecycle: Arc<LifecycleManager>,
    pub config_client: Arc<ConfigClient>,
    pub rest_config: Arc<RestConfig>,
    /// Orders service, resolved on every call.
    pub orders: DiscoveryQuery,
    /// Target of `/lookup`.
    pub lookup: DiscoveryQuery,
    /// Writable config source exposed through the admin API, when in-process.
    pub overlay: Option<Arc<MemorySource>>,
}

/// HTTP server for the service API.
pub struct HttpServer {
    router: Router,
    drain_timeout: Duration,
}

impl HttpServer {
    pub fn new(state: AppState, timeouts: &TimeoutConfig) -> Self {
        let drain_timeout = state.lifecycle.drain_timeout();
        let router = Self::build_router(state, Duration::from_secs(timeouts.request_secs));
        Self {
            router,
            drain_timeout,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        let maintenance = state.rest_config.maintenance.clone();
        let in_flight = state.lifecycle.in_flight().clone();

        let api = Router::new()
            .route("/lookup", get(lookup::lookup))
            .route(
                "/v1/customers",
                get(customers::list_customers).post(customers::create_customer),
            )
            .route("/v1/customers/{id}", get(customers::get_customer))
            .route("/v1/customers/{id}/orders", get(customers::customer_orders))
            .route("/v1/customers/{id}/neworder", get(customers::new_order))
            .route("/v1/config", get(config::show_config))
            .route_layer(middleware::from_fn_with_state(maintenance, maintenance_gate));

        Router::new()
            .merge(api)
            .route("/health", get(health::health))
            .with_state(state)
            .layer(middleware::from_fn_with_state(in_flight, track_in_flight))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires, then let open connections
    /// finish. Connections still open after the drain timeout are abandoned.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let Self {
            router,
            drain_timeout,
        } = self;
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let graceful = shutdown.clone();
        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(async move { graceful.wait().await })
            .into_future();
        let deadline = async move {
            shutdown.wait().await;
            tokio::time::sleep(drain_timeout).await;
        };

        tokio::select! {
            served = serve => served?,
            _ = deadline => {
                tracing::warn!(timeout = ?drain_timeout, "Connections still open after drain timeout, closing");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}
