//! Consul registry backend.
//!
//! # Mapping
//! ```text
//! register    → PUT  /v1/agent/service/register      (TTL check embedded)
//! deregister  → PUT  /v1/agent/service/deregister/{id}
//! heartbeat   → PUT  /v1/agent/check/pass/service:{id}
//! lookup      → GET  /v1/health/service/{env}-{name}
//!               GET  /v1/kv/environments/{env}/services/{name}/?keys
//!               GET  /v1/kv/.../{version}/gatewayUrl?raw
//! ```
//!
//! Services are registered under `{environment}-{name}` with a
//! `version={version}` tag. The full location is kept in service metadata
//! (`address` key) so callers get back exactly what was registered.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::ConsulConfig;
use crate::discovery::backend::RegistryBackend;
use crate::discovery::types::{
    GatewayEntry, Registration, RegistrationHandle, RegistryError, ServiceEntries,
    ServiceInstance,
};

const VERSION_TAG: &str = "version=";
const ADDRESS_META: &str = "address";

/// Registry backend speaking the Consul agent HTTP API.
#[derive(Debug, Clone)]
pub struct ConsulRegistry {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceRegistration<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    name: String,
    tags: Vec<String>,
    address: String,
    port: u16,
    meta: HashMap<String, String>,
    check: AgentCheck,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentCheck {
    #[serde(rename = "TTL")]
    ttl: String,
    deregister_critical_service_after: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    node: HealthNode,
    service: HealthService,
    #[serde(default)]
    checks: Vec<HealthCheck>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthNode {
    #[serde(default)]
    address: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthService {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    address: String,
    #[serde(default)]
    port: u16,
    #[serde(default)]
    meta: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthCheck {
    status: String,
}

impl ConsulRegistry {
    /// Create a new Consul registry client.
    pub fn new(config: &ConsulConfig, timeout: Duration) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| RegistryError::Unreachable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout,
        })
    }

    fn service_name(name: &str, environment: &str) -> String {
        format!("{}-{}", environment, name)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.header("X-Consul-Token", token),
            None => builder,
        }
    }

    fn map_transport(&self, err: reqwest::Error) -> RegistryError {
        if err.is_timeout() {
            RegistryError::Timeout(self.timeout)
        } else {
            RegistryError::Unreachable(err.to_string())
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, RegistryError> {
        builder.send().await.map_err(|e| self.map_transport(e))
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RegistryError::Rejected(format!("consul returned {}: {}", status, body.trim())))
    }

    async fn gateways(&self, name: &str, environment: &str) -> Result<Vec<GatewayEntry>, RegistryError> {
        let prefix = format!("environments/{}/services/{}/", environment, name);
        let response = self
            .send(self.request(reqwest::Method::GET, &format!("/v1/kv/{}?keys", prefix)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| RegistryError::Rejected(format!("invalid KV key listing: {}", e)))?;

        let mut gateways = Vec::new();
        for key in keys.iter().filter(|k| k.ends_with("/gatewayUrl")) {
            let version = key
                .trim_start_matches(&prefix)
                .trim_end_matches("/gatewayUrl")
                .to_string();
            let response = self
                .send(self.request(reqwest::Method::GET, &format!("/v1/kv/{}?raw", key)))
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                continue;
            }
            let address = Self::expect_success(response)
                .await?
                .text()
                .await
                .map_err(|e| self.map_transport(e))?;
            let address = address.trim();
            if !address.is_empty() {
                gateways.push(GatewayEntry {
                    version,
                    address: address.to_string(),
                });
            }
        }
        Ok(gateways)
    }
}

/// Split a registered location into the host/port Consul wants.
fn host_and_port(address: &str) -> (String, u16) {
    let without_scheme = address.split("://").last().unwrap_or(address);
    let authority = without_scheme.split('/').next().unwrap_or(without_scheme);
    match authority.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(0)),
        None => (authority.to_string(), 0),
    }
}

#[async_trait]
impl RegistryBackend for ConsulRegistry {
    fn name(&self) -> &'static str {
        "consul"
    }

    async fn register(
        &self,
        registration: &Registration,
    ) -> Result<RegistrationHandle, RegistryError> {
        let id = registration.instance_id();
        let (host, port) = host_and_port(&registration.address);

        let mut meta = registration.metadata.clone();
        meta.insert(ADDRESS_META.to_string(), registration.address.clone());

        let ttl_secs = registration.ttl.as_secs().max(1);
        let body = AgentServiceRegistration {
            id: &id,
            name: Self::service_name(&registration.identity.name, &registration.identity.environment),
            tags: vec![format!("{}{}", VERSION_TAG, registration.identity.version)],
            address: host,
            port,
            meta,
            check: AgentCheck {
                ttl: format!("{}s", ttl_secs),
                deregister_critical_service_after: format!("{}s", ttl_secs * 10),
            },
        };

        let response = self
            .send(self.request(reqwest::Method::PUT, "/v1/agent/service/register").json(&body))
            .await?;
        Self::expect_success(response).await?;

        // Mark the TTL check passing right away so the instance is discoverable
        // before the first heartbeat tick.
        let handle = RegistrationHandle::new(
            id,
            registration.identity.clone(),
            registration.address.clone(),
        );
        self.heartbeat(&handle).await?;
        Ok(handle)
    }

    async fn deregister(&self, handle: &RegistrationHandle) -> Result<(), RegistryError> {
        let path = format!("/v1/agent/service/deregister/{}", handle.id());
        let response = self.send(self.request(reqwest::Method::PUT, &path)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::UnknownRegistration(handle.id().to_string()));
        }
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn heartbeat(&self, handle: &RegistrationHandle) -> Result<(), RegistryError> {
        let path = format!("/v1/agent/check/pass/service:{}", handle.id());
        let response = self.send(self.request(reqwest::Method::PUT, &path)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::UnknownRegistration(handle.id().to_string()));
        }
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn lookup(&self, name: &str, environment: &str) -> Result<ServiceEntries, RegistryError> {
        let path = format!("/v1/health/service/{}", Self::service_name(name, environment));
        let response = self.send(self.request(reqwest::Method::GET, &path)).await?;
        let entries: Vec<HealthEntry> = Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| RegistryError::Rejected(format!("invalid health response: {}", e)))?;

        let instances = entries
            .into_iter()
            .map(|entry| {
                let healthy = entry.checks.iter().all(|c| c.status == "passing");
                let version = entry
                    .service
                    .tags
                    .unwrap_or_default()
                    .into_iter()
                    .find_map(|t| t.strip_prefix(VERSION_TAG).map(str::to_string))
                    .unwrap_or_default();
                let metadata = entry.service.meta.unwrap_or_default();
                let address = match metadata.get(ADDRESS_META) {
                    Some(a) => a.clone(),
                    None => {
                        let host = if entry.service.address.is_empty() {
                            entry.node.address
                        } else {
                            entry.service.address
                        };
                        format!("{}:{}", host, entry.service.port)
                    }
                };
                ServiceInstance {
                    id: entry.service.id,
                    version,
                    address,
                    healthy,
                    metadata,
                }
            })
            .collect();

        let gateways = self.gateways(name, environment).await?;

        Ok(ServiceEntries {
            instances,
            gateways,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_and_port() {
        assert_eq!(host_and_port("10.0.0.5:9000"), ("10.0.0.5".to_string(), 9000));
        assert_eq!(
            host_and_port("http://orders.local:8080/api"),
            ("orders.local".to_string(), 8080)
        );
        assert_eq!(host_and_port("orders.local"), ("orders.local".to_string(), 0));
    }

    #[test]
    fn test_service_name() {
        assert_eq!(ConsulRegistry::service_name("orders", "dev"), "dev-orders");
    }
}
