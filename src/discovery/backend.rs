//! Registry backend abstraction.
//!
//! The gateway never implements a registry; it talks to one through this
//! trait. Backends translate the four registry operations to their own wire
//! protocol and report health as the registry sees it.

use async_trait::async_trait;

use crate::discovery::types::{Registration, RegistrationHandle, RegistryError, ServiceEntries};

/// Trait for registry implementations.
#[async_trait]
pub trait RegistryBackend: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Create (or overwrite) the entry for this registration.
    async fn register(&self, registration: &Registration)
        -> Result<RegistrationHandle, RegistryError>;

    /// Remove the entry created by `register`.
    async fn deregister(&self, handle: &RegistrationHandle) -> Result<(), RegistryError>;

    /// Refresh the liveness of a registration. Backends without TTL leases
    /// accept this as a no-op.
    async fn heartbeat(&self, _handle: &RegistrationHandle) -> Result<(), RegistryError> {
        Ok(())
    }

    /// All instances (healthy or not) and gateway fronts for a service name in
    /// one environment, across versions.
    async fn lookup(&self, name: &str, environment: &str) -> Result<ServiceEntries, RegistryError>;
}
