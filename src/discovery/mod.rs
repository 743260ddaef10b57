//! Service registry client.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     LifecycleManager → client.rs register → backend (memory | consul)
//!     heartbeat task  → client.rs heartbeat (TTL lease refresh)
//!
//! Request time:
//!     handler → DiscoveryQuery (name, version constraint, env, access type)
//!         → cache.rs fresh entry? return
//!         → backend lookup → filter healthy + version.rs constraint
//!         → gateway front, or load_balancer policy over instances
//!         → cache.rs insert → address
//!
//! Shutdown:
//!     LifecycleManager → client.rs deregister (consumes the handle)
//! ```
//!
//! # Design Decisions
//! - Every backend call is bounded by the registry timeout
//! - Discovery never retries; callers decide what to do with errors
//! - Stale entries stay readable so callers can fall back to them

pub mod backend;
pub mod cache;
pub mod client;
pub mod consul;
pub mod memory;
pub mod types;
pub mod version;

pub use backend::RegistryBackend;
pub use cache::{CacheSnapshot, DiscoveryCache, DiscoveryQuery};
pub use client::DiscoveryClient;
pub use consul::ConsulRegistry;
pub use memory::MemoryRegistry;
pub use types::{
    AccessType, DeregistrationError, DiscoveryError, GatewayEntry, Registration,
    RegistrationError, RegistrationHandle, RegistryError, ServiceEntries, ServiceIdentity,
    ServiceInstance,
};
pub use version::{Version, VersionConstraint, VersionParseError};
