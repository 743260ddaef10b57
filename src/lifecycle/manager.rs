//! Registration lifecycle of this service instance.
//!
//! Owns the registration handle for the whole process lifetime. Registration
//! must succeed before traffic is accepted; deregistration happens at most
//! once, from the first termination signal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::discovery::{DiscoveryClient, RegistrationError, RegistrationHandle, RegistryError, ServiceIdentity};
use crate::lifecycle::drain::InFlightTracker;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::state::{LifecycleState, StateCell};
use crate::observability::metrics;

/// Process exit status after a signal-initiated shutdown.
pub const EXIT_ON_SIGNAL: i32 = 1;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("self-registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("cannot register while {0}")]
    InvalidState(LifecycleState),
}

/// What was registered, kept for re-registration after a lost lease.
#[derive(Debug, Clone)]
struct RegistrationSpec {
    identity: ServiceIdentity,
    address: String,
    metadata: HashMap<String, String>,
    ttl: Duration,
}

#[derive(Debug)]
pub struct LifecycleManager {
    discovery: Arc<DiscoveryClient>,
    state: StateCell,
    handle: Mutex<Option<RegistrationHandle>>,
    spec: Mutex<Option<RegistrationSpec>>,
    shutdown: Shutdown,
    in_flight: InFlightTracker,
    drain_timeout: Duration,
}

impl LifecycleManager {
    pub fn new(discovery: Arc<DiscoveryClient>, shutdown: Shutdown, drain_timeout: Duration) -> Self {
        metrics::record_lifecycle_state(LifecycleState::Starting as u8);
        Self {
            discovery,
            state: StateCell::new(),
            handle: Mutex::new(None),
            spec: Mutex::new(None),
            shutdown,
            in_flight: InFlightTracker::new(),
            drain_timeout,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    pub fn is_registered(&self) -> bool {
        self.state() == LifecycleState::Registered
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn in_flight(&self) -> &InFlightTracker {
        &self.in_flight
    }

    pub fn discovery(&self) -> &Arc<DiscoveryClient> {
        &self.discovery
    }

    /// Upper bound on every wait after the drain begins.
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Instance id of the current registration, if any.
    pub async fn instance_id(&self) -> Option<String> {
        self.handle.lock().await.as_ref().map(|h| h.id().to_string())
    }

    fn set_state(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let changed = self.state.transition(from, to);
        if changed {
            metrics::record_lifecycle_state(to as u8);
            tracing::info!(from = %from, to = %to, "Lifecycle state changed");
        }
        changed
    }

    /// Register this instance. Must succeed before traffic is served.
    pub async fn register(
        &self,
        identity: ServiceIdentity,
        address: &str,
        metadata: HashMap<String, String>,
        ttl: Duration,
    ) -> Result<(), LifecycleError> {
        let state = self.state();
        if state != LifecycleState::Starting {
            return Err(LifecycleError::InvalidState(state));
        }

        let handle = self
            .discovery
            .register(identity.clone(), address, metadata.clone(), ttl)
            .await?;

        *self.handle.lock().await = Some(handle);
        *self.spec.lock().await = Some(RegistrationSpec {
            identity,
            address: address.to_string(),
            metadata,
            ttl,
        });

        if !self.set_state(LifecycleState::Starting, LifecycleState::Registered) {
            // A signal arrived mid-registration; begin_drain found no handle.
            if let Some(handle) = self.handle.lock().await.take() {
                self.deregister(handle).await;
            }
            return Err(LifecycleError::InvalidState(self.state()));
        }
        Ok(())
    }

    /// Refresh the registration lease every `interval` until shutdown.
    pub fn spawn_heartbeat(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = manager.shutdown.wait() => break,
                    _ = ticker.tick() => {}
                }
                if !manager.is_registered() {
                    break;
                }
                manager.heartbeat_once().await;
            }
            tracing::debug!("Heartbeat task stopped");
        })
    }

    async fn heartbeat_once(&self) {
        let mut guard = self.handle.lock().await;
        let handle = match guard.as_ref() {
            Some(h) => h,
            None => return,
        };

        match self.discovery.heartbeat(handle).await {
            Ok(()) => tracing::trace!(instance_id = %handle.id(), "Heartbeat sent"),
            Err(RegistryError::UnknownRegistration(id)) => {
                tracing::warn!(instance_id = %id, "Registration lost, registering again");
                let spec = self.spec.lock().await.clone();
                if let Some(spec) = spec {
                    match self
                        .discovery
                        .register(spec.identity, &spec.address, spec.metadata, spec.ttl)
                        .await
                    {
                        Ok(new_handle) => *guard = Some(new_handle),
                        Err(e) => tracing::error!(error = %e, "Re-registration failed"),
                    }
                }
            }
            Err(e) => tracing::warn!(instance_id = %handle.id(), error = %e, "Heartbeat failed"),
        }
    }

    async fn deregister(&self, handle: RegistrationHandle) {
        let id = handle.id().to_string();
        if let Err(e) = self.discovery.deregister(handle).await {
            tracing::error!(instance_id = %id, error = %e, "Deregistration failed, continuing shutdown");
        }
    }

    /// Leave the registry and stop accepting traffic.
    ///
    /// Single-shot: only the first call moves the state to Draining and
    /// deregisters. Later or concurrent calls return false and do nothing.
    pub async fn begin_drain(&self) -> bool {
        let won = self.set_state(LifecycleState::Registered, LifecycleState::Draining)
            || self.set_state(LifecycleState::Starting, LifecycleState::Draining);
        if !won {
            return false;
        }

        let handle = self.handle.lock().await.take();
        match handle {
            Some(handle) => self.deregister(handle).await,
            None => tracing::debug!("No registration to remove"),
        }

        self.shutdown.trigger();
        true
    }

    /// Wait for in-flight requests to finish, bounded by the drain timeout.
    pub async fn drain(&self) {
        let active = self.in_flight.active_count();
        if active > 0 {
            tracing::info!(active, timeout = ?self.drain_timeout, "Draining in-flight requests");
        }
        if !self.in_flight.wait_idle(self.drain_timeout).await {
            tracing::warn!(
                remaining = self.in_flight.active_count(),
                "Drain timeout elapsed with requests still in flight"
            );
        }
    }

    /// Mark the process stopped. Returns the exit status to use.
    pub fn finish(&self) -> i32 {
        let from = self.state();
        if from != LifecycleState::Stopped {
            self.set_state(from, LifecycleState::Stopped);
        }
        self.shutdown.trigger();
        EXIT_ON_SIGNAL
    }
}
