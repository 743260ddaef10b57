//! In-process registry backend.
//!
//! Used for local development (`registry.backend = "memory"`) and tests. It
//! keeps TTL semantics: an instance whose heartbeat is older than its TTL is
//! reported unhealthy, the way a TTL-checked registry would report it.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::discovery::backend::RegistryBackend;
use crate::discovery::types::{
    GatewayEntry, Registration, RegistrationHandle, RegistryError, ServiceEntries,
    ServiceIdentity, ServiceInstance,
};

#[derive(Debug, Clone)]
struct StoredInstance {
    identity: ServiceIdentity,
    address: String,
    metadata: HashMap<String, String>,
    ttl: Duration,
    last_seen: Instant,
    /// Operator override (e.g. a failing external health check).
    passing: bool,
}

impl StoredInstance {
    fn is_healthy(&self) -> bool {
        self.passing && (self.ttl.is_zero() || self.last_seen.elapsed() <= self.ttl)
    }
}

/// A registry that lives inside this process.
#[derive(Debug)]
pub struct MemoryRegistry {
    instances: DashMap<String, StoredInstance>,
    gateways: DashMap<ServiceIdentity, String>,
    available: AtomicBool,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
            gateways: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Publish a gateway front for one version of a service.
    pub fn publish_gateway(&self, identity: ServiceIdentity, address: &str) {
        self.gateways.insert(identity, address.to_string());
    }

    /// Force the health of an instance, as an external health check would.
    /// Returns false if the instance is unknown.
    pub fn set_passing(&self, instance_id: &str, passing: bool) -> bool {
        match self.instances.get_mut(instance_id) {
            Some(mut entry) => {
                entry.passing = passing;
                true
            }
            None => false,
        }
    }

    /// Simulate the registry becoming unreachable (or reachable again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn check_available(&self) -> Result<(), RegistryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RegistryError::Unreachable("memory registry marked unavailable".to_string()))
        }
    }
}

#[async_trait]
impl RegistryBackend for MemoryRegistry {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn register(
        &self,
        registration: &Registration,
    ) -> Result<RegistrationHandle, RegistryError> {
        self.check_available()?;
        if registration.address.trim().is_empty() {
            return Err(RegistryError::Rejected("address must not be empty".to_string()));
        }

        let id = registration.instance_id();
        self.instances.insert(
            id.clone(),
            StoredInstance {
                identity: registration.identity.clone(),
                address: registration.address.clone(),
                metadata: registration.metadata.clone(),
                ttl: registration.ttl,
                last_seen: Instant::now(),
                passing: true,
            },
        );

        Ok(RegistrationHandle::new(
            id,
            registration.identity.clone(),
            registration.address.clone(),
        ))
    }

    async fn deregister(&self, handle: &RegistrationHandle) -> Result<(), RegistryError> {
        self.check_available()?;
        match self.instances.remove(handle.id()) {
            Some(_) => Ok(()),
            None => Err(RegistryError::UnknownRegistration(handle.id().to_string())),
        }
    }

    async fn heartbeat(&self, handle: &RegistrationHandle) -> Result<(), RegistryError> {
        self.check_available()?;
        match self.instances.get_mut(handle.id()) {
            Some(mut entry) => {
                entry.last_seen = Instant::now();
                Ok(())
            }
            None => Err(RegistryError::UnknownRegistration(handle.id().to_string())),
        }
    }

    async fn lookup(&self, name: &str, environment: &str) -> Result<ServiceEntries, RegistryError> {
        self.check_available()?;

        let instances = self
            .instances
            .iter()
            .filter(|e| e.identity.name == name && e.identity.environment == environment)
            .map(|e| ServiceInstance {
                id: e.key().clone(),
                version: e.identity.version.clone(),
                address: e.address.clone(),
                healthy: e.is_healthy(),
                metadata: e.metadata.clone(),
            })
            .collect();

        let gateways = self
            .gateways
            .iter()
            .filter(|e| e.key().name == name && e.key().environment == environment)
            .map(|e| GatewayEntry {
                version: e.key().version.clone(),
                address: e.value().clone(),
            })
            .collect();

        Ok(ServiceEntries {
            instances,
            gateways,
        })
    }
}
