//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry backend and config sources named by the bootstrap config
//! - Initialize subsystems in dependency order
//! - Resolve the listen port and the address advertised to the registry
//! - Bind every listener, then register the bound address
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Nothing is published to the registry until all listeners are bound;
//!   serving is left to the caller, so traffic starts only after registration

use notify::RecommendedWatcher;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{BackendKind, GatewayConfig};
use crate::discovery::{
    ConsulRegistry, DiscoveryClient, MemoryRegistry, RegistryBackend, RegistryError,
    VersionParseError,
};
use crate::domain::CustomerStore;
use crate::http::server::AppState;
use crate::lifecycle::manager::{LifecycleError, LifecycleManager};
use crate::lifecycle::shutdown::Shutdown;
use crate::load_balancer::policy_for;
use crate::store::{
    ConfigClient, ConfigSource, ConfigStoreError, ConsulKvSource, FileSource, FromConfigValue,
    MemorySource, RestConfig,
};
use crate::upstream::CollaboratorClient;

/// Config key holding the HTTP port.
pub const PORT_KEY: &str = "server.http.port";

pub const DEFAULT_PORT: u16 = 9000;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("registry backend: {0}")]
    Registry(#[from] RegistryError),

    #[error("config store: {0}")]
    ConfigStore(#[from] ConfigStoreError),

    #[error("config file watcher: {0}")]
    Watcher(#[from] notify::Error),

    #[error("collaborator version: {0}")]
    Collaborator(#[from] VersionParseError),

    #[error("HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("bind: {0}")]
    Bind(#[from] std::io::Error),

    #[error(transparent)]
    Register(#[from] LifecycleError),
}

/// Registry backend selected by `registry.backend`.
pub fn registry_backend(config: &GatewayConfig) -> Result<Arc<dyn RegistryBackend>, RegistryError> {
    let backend: Arc<dyn RegistryBackend> = match config.registry.backend {
        BackendKind::Memory => Arc::new(MemoryRegistry::new()),
        BackendKind::Consul => Arc::new(ConsulRegistry::new(
            &config.consul,
            Duration::from_secs(config.registry.timeout_secs),
        )?),
    };
    Ok(backend)
}

/// Everything the service needs before it registers.
pub struct Components {
    pub state: AppState,
    pub port: u16,
    /// Keeps the config file watcher alive.
    pub file_watcher: Option<RecommendedWatcher>,
}

/// Listeners bound ahead of registration.
#[derive(Debug)]
pub struct Listeners {
    pub http: TcpListener,
    /// Present when the admin API is enabled.
    pub admin: Option<TcpListener>,
}

impl Components {
    /// Address published to the registry for the listener bound at `bound`.
    pub fn advertise_address(&self, bound: SocketAddr) -> String {
        advertise_address(&self.state.config, bound.port())
    }

    /// Address the HTTP listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.state.config.service.bind_host, self.port)
    }

    /// Bind the service listener and, when enabled, the admin listener.
    pub async fn bind(&self) -> std::io::Result<Listeners> {
        let http = TcpListener::bind(self.bind_address()).await?;
        tracing::info!(address = %http.local_addr()?, "Listening for connections");

        let admin = &self.state.config.admin;
        let admin = if admin.enabled {
            let listener = TcpListener::bind(&admin.bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Admin API listening");
            Some(listener)
        } else {
            None
        };
        Ok(Listeners { http, admin })
    }

    /// Bind every listener, then register the bound address. A failed bind
    /// leaves the registry untouched.
    pub async fn start(&self) -> Result<Listeners, StartupError> {
        let listeners = self.bind().await?;
        let advertise = self.advertise_address(listeners.http.local_addr()?);

        let config = &self.state.config;
        self.state
            .lifecycle
            .register(
                config.service.identity(),
                &advertise,
                config.service.metadata.clone(),
                Duration::from_secs(config.registry.ttl_secs),
            )
            .await?;
        tracing::info!(address = %advertise, "Registered with service registry");
        Ok(listeners)
    }
}

/// `service.advertise_address`, or the bind host and port. An unspecified
/// bind host advertises loopback.
pub fn advertise_address(config: &GatewayConfig, port: u16) -> String {
    if let Some(address) = &config.service.advertise_address {
        return address.clone();
    }
    let host = match config.service.bind_host.as_str() {
        "0.0.0.0" | "::" | "" => "127.0.0.1",
        host => host,
    };
    format!("{}:{}", host, port)
}

/// Build the config client and every shared component.
///
/// `config_path` backs the file source; `watch_file` starts the notify
/// watcher on it.
pub async fn assemble(
    config: GatewayConfig,
    config_path: &Path,
    watch_file: bool,
    registry: Arc<dyn RegistryBackend>,
    shutdown: Shutdown,
) -> Result<Components, StartupError> {
    let config = Arc::new(config);

    // Config store: overlay first, then the local file.
    let file = Arc::new(FileSource::load(config_path)?);
    let file_watcher = if watch_file {
        Some(file.spawn_watcher()?)
    } else {
        None
    };

    let mut sources: Vec<Arc<dyn ConfigSource>> = Vec::new();
    let overlay = match config.config_store.backend {
        BackendKind::Memory => {
            let memory = Arc::new(MemorySource::new());
            sources.push(memory.clone());
            Some(memory)
        }
        BackendKind::Consul => {
            let identity = config.service.identity();
            let consul = ConsulKvSource::new(&config.consul, &config.config_store, &identity)?;
            sources.push(Arc::new(consul));
            None
        }
    };
    sources.push(file);

    let config_client = Arc::new(ConfigClient::new(
        sources,
        Duration::from_secs(config.config_store.timeout_secs),
        shutdown.clone(),
    ));
    tracing::info!(sources = ?config_client.source_names(), "Config store ready");

    for key in &config.config_store.watch_keys {
        config_client.watch(key).await;
    }
    let rest_config = Arc::new(RestConfig::bind(Arc::clone(&config_client)).await);

    let port = config_client
        .get(PORT_KEY)
        .await
        .and_then(|v| u16::from_value(&v))
        .unwrap_or(DEFAULT_PORT);

    // Registry client
    let discovery = Arc::new(DiscoveryClient::new(
        registry,
        policy_for(config.registry.selection),
        Duration::from_secs(config.registry.timeout_secs),
        Duration::from_secs(config.registry.cache_ttl_secs),
    ));
    tracing::info!(backend = discovery.backend_name(), "Registry client ready");

    let collaborators = Arc::new(CollaboratorClient::new(
        Arc::clone(&discovery),
        &config.upstream,
        config.registry.stale_fallback,
    )?);

    let lifecycle = Arc::new(LifecycleManager::new(
        discovery,
        shutdown,
        Duration::from_secs(config.shutdown.drain_timeout_secs),
    ));

    let state = AppState {
        orders: config.collaborators.orders.query()?,
        lookup: config.collaborators.lookup.query()?,
        config,
        customers: Arc::new(CustomerStore::seeded()),
        collaborators,
        lifecycle,
        config_client,
        rest_config,
        overlay,
    };

    Ok(Components {
        state,
        port,
        file_watcher,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertise_address() {
        let mut config = GatewayConfig::default();
        assert_eq!(advertise_address(&config, 9000), "127.0.0.1:9000");

        config.service.bind_host = "10.0.0.5".to_string();
        assert_eq!(advertise_address(&config, 9000), "10.0.0.5:9000");

        config.service.advertise_address = Some("svc.internal:80".to_string());
        assert_eq!(advertise_address(&config, 9000), "svc.internal:80");
    }

    #[tokio::test]
    async fn test_missing_file_gives_default_port() {
        let dir = tempfile::tempdir().unwrap();
        let components = assemble(
            GatewayConfig::default(),
            &dir.path().join("absent.toml"),
            false,
            Arc::new(MemoryRegistry::new()),
            Shutdown::new(),
        )
        .await
        .unwrap();
        assert_eq!(components.port, DEFAULT_PORT);
        assert!(components.state.overlay.is_some());
        assert!(!components.state.rest_config.maintenance.get());
    }

    #[tokio::test]
    async fn test_port_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[server.http]\nport = 9123\n").unwrap();
        let components = assemble(
            GatewayConfig::default(),
            &path,
            false,
            Arc::new(MemoryRegistry::new()),
            Shutdown::new(),
        )
        .await
        .unwrap();
        assert_eq!(components.port, 9123);
        assert_eq!(components.bind_address(), "0.0.0.0:9123");
    }

    #[tokio::test]
    async fn test_ephemeral_port_is_advertised_as_bound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[server.http]\nport = 0\n").unwrap();
        let registry = Arc::new(MemoryRegistry::new());
        let mut config = GatewayConfig::default();
        config.service.bind_host = "127.0.0.1".to_string();
        let components = assemble(config, &path, false, registry.clone(), Shutdown::new())
            .await
            .unwrap();
        assert_eq!(components.port, 0);

        let listeners = components.start().await.unwrap();
        let bound = listeners.http.local_addr().unwrap();
        assert_ne!(bound.port(), 0);
        assert_eq!(components.advertise_address(bound), bound.to_string());
        assert!(components.state.lifecycle.is_registered());
        assert_eq!(registry.len(), 1);
    }
}
