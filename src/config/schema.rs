//! Configuration schema definitions.
//!
//! This module defines the bootstrap configuration of the gateway: who the
//! service is, which registry and configuration backends it talks to, and the
//! collaborators it resolves at call time. Runtime-tunable keys (port,
//! maintenance flag, sample properties) are *not* modelled here; they are read
//! through the config store client from the same file and any overlay backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::discovery::{AccessType, DiscoveryQuery, ServiceIdentity, VersionParseError};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Identity and advertised location of this instance.
    pub service: ServiceConfig,

    /// Shared Consul agent settings (used when a backend is `consul`).
    pub consul: ConsulConfig,

    /// Service registry client settings.
    pub registry: RegistryConfig,

    /// Configuration store client settings.
    pub config_store: ConfigStoreConfig,

    /// Collaborating services resolved through discovery.
    pub collaborators: CollaboratorsConfig,

    /// Outbound call policy for collaborators.
    pub upstream: UpstreamConfig,

    /// Inbound request timeouts.
    pub timeouts: TimeoutConfig,

    /// Shutdown handshake settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Identity of this service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Logical service name.
    pub name: String,

    /// Service version (semantic version string).
    pub version: String,

    /// Deployment environment (e.g. "dev", "prod").
    pub environment: String,

    /// Host the HTTP listener binds to.
    pub bind_host: String,

    /// Address advertised to the registry. Derived from `bind_host` and the
    /// resolved port when absent.
    pub advertise_address: Option<String>,

    /// Free-form metadata published with the registration.
    pub metadata: HashMap<String, String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "customers-service".to_string(),
            version: "1.0.0".to_string(),
            environment: "dev".to_string(),
            bind_host: "0.0.0.0".to_string(),
            advertise_address: None,
            metadata: HashMap::new(),
        }
    }
}

impl ServiceConfig {
    /// Identity used for self-registration.
    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(&self.name, &self.version, &self.environment)
    }
}

/// Consul agent connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Agent HTTP API base URL.
    pub url: String,

    /// Optional ACL token sent as `X-Consul-Token`.
    pub token: Option<String>,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8500".to_string(),
            token: None,
        }
    }
}

/// Which backend implementation to use.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process backend; registrations and values live in this process only.
    #[default]
    Memory,
    /// Consul agent HTTP API.
    Consul,
}

/// Instance selection policy for direct discovery.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    #[default]
    RoundRobin,
    Random,
}

/// Service registry client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry backend.
    pub backend: BackendKind,

    /// Timeout for every registry call in seconds.
    pub timeout_secs: u64,

    /// Registration TTL in seconds (the registry expires the entry when no
    /// heartbeat arrives within this window).
    pub ttl_secs: u64,

    /// Heartbeat interval in seconds. Must be shorter than `ttl_secs`.
    pub ping_interval_secs: u64,

    /// Freshness window for cached discovery results in seconds.
    pub cache_ttl_secs: u64,

    /// Selection policy among healthy instances.
    pub selection: SelectionKind,

    /// Serve a stale cached address when the registry is unreachable.
    pub stale_fallback: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            timeout_secs: 5,
            ttl_secs: 30,
            ping_interval_secs: 20,
            cache_ttl_secs: 10,
            selection: SelectionKind::RoundRobin,
            stale_fallback: true,
        }
    }
}

/// Configuration store client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigStoreConfig {
    /// Overlay backend consulted before the local file.
    pub backend: BackendKind,

    /// Timeout for one-shot reads in seconds.
    pub timeout_secs: u64,

    /// Long-poll wait for watch queries in seconds.
    pub watch_wait_secs: u64,

    /// Base delay between failed watch polls in milliseconds.
    pub retry_base_ms: u64,

    /// Maximum delay between failed watch polls in milliseconds.
    pub retry_max_ms: u64,

    /// Keys watched by the gateway in addition to the bundle settings.
    pub watch_keys: Vec<String>,
}

impl Default for ConfigStoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            timeout_secs: 3,
            watch_wait_secs: 10,
            retry_base_ms: 500,
            retry_max_ms: 10_000,
            watch_keys: Vec::new(),
        }
    }
}

/// A collaborating service to resolve at call time.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollaboratorConfig {
    /// Logical name in the registry.
    pub name: String,

    /// Version constraint (e.g. "1.0.0", "^1.0.0", "1.x", "*").
    pub version: String,

    /// Environment to discover in.
    pub environment: String,

    /// Direct instance or gateway front.
    #[serde(default)]
    pub access_type: AccessType,
}

impl CollaboratorConfig {
    /// Discovery query for this collaborator.
    pub fn query(&self) -> Result<DiscoveryQuery, VersionParseError> {
        DiscoveryQuery::parse(&self.name, &self.version, &self.environment, self.access_type)
    }
}

/// Collaborators used by the handlers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollaboratorsConfig {
    /// Orders service backing the order endpoints.
    pub orders: CollaboratorConfig,

    /// Target of the `/lookup` discovery test endpoint.
    pub lookup: CollaboratorConfig,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            orders: CollaboratorConfig {
                name: "orders-service".to_string(),
                version: "1.0.0".to_string(),
                environment: "dev".to_string(),
                access_type: AccessType::Direct,
            },
            lookup: CollaboratorConfig {
                name: "test-service".to_string(),
                version: "1.0.0".to_string(),
                environment: "dev".to_string(),
                access_type: AccessType::Direct,
            },
        }
    }
}

/// Outbound collaborator call policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Total timeout for one outbound call in seconds.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Extra attempts after a transport error. Non-2xx is never retried.
    pub transport_retries: u32,

    /// Base delay for backoff in milliseconds.
    pub retry_base_ms: u64,

    /// Maximum delay for backoff in milliseconds.
    pub retry_max_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 3,
            transport_retries: 1,
            retry_base_ms: 100,
            retry_max_ms: 1000,
        }
    }
}

/// Inbound request timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Shutdown handshake configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound for in-flight requests to finish after deregistration.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
