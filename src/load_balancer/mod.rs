//! Instance selection for direct discovery.
//!
//! # Data Flow
//! ```text
//! Registry lookup → instances for (name, environment)
//!     → filter healthy + version constraint (discovery::client)
//!     → keep the highest matching version
//!     → Apply selection policy:
//!         - round_robin.rs (rotate through instances)
//!         - random.rs (uniform pick)
//!     → one address, cached by the discovery client
//! ```
//!
//! # Design Decisions
//! - Policies are stateless apart from their own counters
//! - Unhealthy instances are never returned, even if passed in

pub mod random;
pub mod round_robin;

use crate::config::SelectionKind;
use crate::discovery::ServiceInstance;

pub use random::RandomSelection;
pub use round_robin::RoundRobin;

/// Strategy for picking one healthy instance out of several.
pub trait SelectionPolicy: Send + Sync + std::fmt::Debug {
    fn select<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance>;
}

/// Build the policy named in configuration.
pub fn policy_for(kind: SelectionKind) -> Box<dyn SelectionPolicy> {
    match kind {
        SelectionKind::RoundRobin => Box::new(RoundRobin::new()),
        SelectionKind::Random => Box::new(RandomSelection),
    }
}

#[cfg(test)]
pub(crate) fn instance(address: &str, healthy: bool) -> ServiceInstance {
    ServiceInstance {
        id: address.to_string(),
        version: "1.0.0".to_string(),
        address: address.to_string(),
        healthy,
        metadata: Default::default(),
    }
}
