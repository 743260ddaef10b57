//! Registry client used by the lifecycle manager and request handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::discovery::backend::RegistryBackend;
use crate::discovery::cache::{DiscoveryCache, DiscoveryQuery};
use crate::discovery::types::{
    AccessType, DeregistrationError, DiscoveryError, GatewayEntry, Registration,
    RegistrationError, RegistrationHandle, RegistryError, ServiceIdentity, ServiceInstance,
};
use crate::discovery::version::Version;
use crate::load_balancer::SelectionPolicy;
use crate::observability::metrics;
use crate::resilience::timeouts;

/// Registers this service and resolves collaborators through a registry backend.
#[derive(Debug)]
pub struct DiscoveryClient {
    backend: Arc<dyn RegistryBackend>,
    cache: DiscoveryCache,
    policy: Box<dyn SelectionPolicy>,
    timeout: Duration,
}

impl DiscoveryClient {
    pub fn new(
        backend: Arc<dyn RegistryBackend>,
        policy: Box<dyn SelectionPolicy>,
        timeout: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            cache: DiscoveryCache::new(cache_ttl),
            policy,
            timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, RegistryError>
    where
        F: Future<Output = Result<T, RegistryError>>,
    {
        timeouts::bounded(self.timeout, fut, RegistryError::Timeout).await
    }

    /// Register `identity` at `address`. Re-registering the same identity and
    /// address replaces the existing entry.
    pub async fn register(
        &self,
        identity: ServiceIdentity,
        address: &str,
        metadata: HashMap<String, String>,
        ttl: Duration,
    ) -> Result<RegistrationHandle, RegistrationError> {
        let registration = Registration {
            identity,
            address: address.to_string(),
            metadata,
            ttl,
        };
        let result = self.bounded(self.backend.register(&registration)).await;
        metrics::record_registry_call("register", result.is_ok());

        let handle = result?;
        tracing::info!(
            instance_id = %handle.id(),
            service = %handle.identity(),
            address = %handle.address(),
            backend = self.backend.name(),
            "Service registered"
        );
        Ok(handle)
    }

    /// Remove a registration. Consumes the handle.
    pub async fn deregister(&self, handle: RegistrationHandle) -> Result<(), DeregistrationError> {
        let result = self.bounded(self.backend.deregister(&handle)).await;
        metrics::record_registry_call("deregister", result.is_ok());
        result?;
        tracing::info!(instance_id = %handle.id(), service = %handle.identity(), "Service deregistered");
        Ok(())
    }

    /// Refresh the registration's liveness.
    pub async fn heartbeat(&self, handle: &RegistrationHandle) -> Result<(), RegistryError> {
        let result = self.bounded(self.backend.heartbeat(handle)).await;
        metrics::record_registry_call("heartbeat", result.is_ok());
        result
    }

    /// Resolve a collaborator to a network location.
    ///
    /// Serves fresh cache entries without contacting the registry. Otherwise
    /// queries the backend, prefers a published gateway when asked for one,
    /// and falls back to selecting a healthy instance of the highest matching
    /// version. Errors are returned as-is, never retried here.
    pub async fn discover(&self, query: &DiscoveryQuery) -> Result<String, DiscoveryError> {
        if let Some(address) = self.cache.fresh(query) {
            metrics::record_discovery(&query.name, "hit");
            return Ok(address);
        }
        metrics::record_discovery(&query.name, "miss");

        let entries = match self
            .bounded(self.backend.lookup(&query.name, &query.environment))
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                metrics::record_discovery(&query.name, "unavailable");
                tracing::warn!(service = %query.name, environment = %query.environment, error = %e, "Registry lookup failed");
                return Err(DiscoveryError::Unavailable(e.to_string()));
            }
        };

        let gateway = match query.access_type {
            AccessType::Gateway => select_gateway(query, &entries.gateways),
            AccessType::Direct => None,
        };

        let address = match gateway {
            Some(address) => Some(address),
            None => {
                if query.access_type == AccessType::Gateway {
                    tracing::debug!(service = %query.name, "No gateway published, resolving directly");
                }
                let candidates = highest_matching(query, &entries.instances);
                self.policy.select(&candidates).map(|i| i.address.clone())
            }
        };

        match address {
            Some(address) => {
                tracing::debug!(service = %query.name, version = %query.constraint, address = %address, "Discovered service");
                self.cache.insert(query.clone(), address.clone());
                Ok(address)
            }
            None => {
                metrics::record_discovery(&query.name, "not_found");
                Err(DiscoveryError::NotFound {
                    service: query.name.clone(),
                    version: query.constraint.to_string(),
                    environment: query.environment.clone(),
                })
            }
        }
    }

    /// Forget a cached resolution, e.g. after a transport failure to it.
    pub fn invalidate(&self, query: &DiscoveryQuery) {
        if self.cache.invalidate(query) {
            tracing::debug!(service = %query.name, "Discovery cache entry invalidated");
        }
    }

    /// Last known address regardless of freshness.
    pub fn stale(&self, query: &DiscoveryQuery) -> Option<String> {
        self.cache.stale(query)
    }
}

fn parsed_version(raw: &str) -> Version {
    raw.parse().unwrap_or(Version::new(0, 0, 0))
}

fn select_gateway(query: &DiscoveryQuery, gateways: &[GatewayEntry]) -> Option<String> {
    gateways
        .iter()
        .filter(|g| query.constraint.matches_str(&g.version))
        .max_by_key(|g| parsed_version(&g.version))
        .map(|g| g.address.clone())
}

/// Healthy instances whose version satisfies the constraint, narrowed to the
/// highest such version.
fn highest_matching(query: &DiscoveryQuery, instances: &[ServiceInstance]) -> Vec<ServiceInstance> {
    let matching: Vec<&ServiceInstance> = instances
        .iter()
        .filter(|i| i.healthy && query.constraint.matches_str(&i.version))
        .collect();

    let best = match matching.iter().map(|i| parsed_version(&i.version)).max() {
        Some(v) => v,
        None => return Vec::new(),
    };

    matching
        .into_iter()
        .filter(|i| parsed_version(&i.version) == best)
        .cloned()
        .collect()
}
