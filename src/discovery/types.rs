//! Registry data model and error definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Who a service is: the registration key and the discovery lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub version: String,
    pub environment: String,
}

impl ServiceIdentity {
    pub fn new(name: &str, version: &str, environment: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            environment: environment.to_string(),
        }
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.name, self.version, self.environment)
    }
}

/// How a discovered service should be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// A concrete healthy instance.
    #[default]
    Direct,
    /// The stable load-balancer/reverse-proxy front published for the service.
    Gateway,
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessType::Direct => f.write_str("direct"),
            AccessType::Gateway => f.write_str("gateway"),
        }
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(AccessType::Direct),
            "gateway" => Ok(AccessType::Gateway),
            other => Err(format!("unknown access type '{}'", other)),
        }
    }
}

/// A self-registration request.
#[derive(Debug, Clone)]
pub struct Registration {
    pub identity: ServiceIdentity,
    /// Network location collaborators should call (e.g. "10.0.0.5:9000").
    pub address: String,
    pub metadata: HashMap<String, String>,
    /// Entry expires when no heartbeat arrives within this window.
    pub ttl: Duration,
}

impl Registration {
    /// Deterministic instance id, so that retried registrations of the same
    /// identity and location overwrite instead of duplicating.
    pub fn instance_id(&self) -> String {
        let raw = format!(
            "{}-{}-{}-{}",
            self.identity.environment, self.identity.name, self.identity.version, self.address
        );
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
            .collect()
    }
}

/// Proof of a successful registration; required to deregister.
///
/// Deliberately not `Clone`: deregistration consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct RegistrationHandle {
    id: String,
    identity: ServiceIdentity,
    address: String,
}

impl RegistrationHandle {
    pub fn new(id: String, identity: ServiceIdentity, address: String) -> Self {
        Self {
            id,
            identity,
            address,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// One instance as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInstance {
    pub id: String,
    pub version: String,
    pub address: String,
    pub healthy: bool,
    pub metadata: HashMap<String, String>,
}

/// A gateway front published for one version of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayEntry {
    pub version: String,
    pub address: String,
}

/// Everything the registry knows about a service in one environment.
#[derive(Debug, Clone, Default)]
pub struct ServiceEntries {
    pub instances: Vec<ServiceInstance>,
    pub gateways: Vec<GatewayEntry>,
}

/// Errors raised by registry backends.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry could not be reached.
    #[error("registry unreachable: {0}")]
    Unreachable(String),

    /// The registry did not answer in time.
    #[error("registry call timed out after {0:?}")]
    Timeout(Duration),

    /// The registry answered but refused the request.
    #[error("registry rejected request: {0}")]
    Rejected(String),

    /// The referenced registration does not exist.
    #[error("unknown registration '{0}'")]
    UnknownRegistration(String),
}

/// Self-registration failed. Fatal at startup.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("registration rejected: {0}")]
    Rejected(String),

    #[error("registry unavailable during registration: {0}")]
    Unavailable(String),
}

impl From<RegistryError> for RegistrationError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Rejected(msg) => RegistrationError::Rejected(msg),
            RegistryError::UnknownRegistration(id) => {
                RegistrationError::Rejected(format!("unknown registration '{}'", id))
            }
            other => RegistrationError::Unavailable(other.to_string()),
        }
    }
}

/// A collaborator could not be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Zero healthy instances match the query.
    #[error("no healthy instance of service '{service}' (version {version}, environment {environment})")]
    NotFound {
        service: String,
        version: String,
        environment: String,
    },

    /// The registry itself is unreachable or timed out.
    #[error("service registry unavailable: {0}")]
    Unavailable(String),
}

impl DiscoveryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiscoveryError::NotFound { .. })
    }
}

/// Deregistration failed. Logged at shutdown, never blocks exit.
#[derive(Debug, Error)]
pub enum DeregistrationError {
    #[error("registration '{0}' is not known to the registry")]
    UnknownHandle(String),

    #[error("registry unavailable during deregistration: {0}")]
    Unavailable(String),
}

impl From<RegistryError> for DeregistrationError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownRegistration(id) => DeregistrationError::UnknownHandle(id),
            other => DeregistrationError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_type_parsing() {
        assert_eq!("direct".parse::<AccessType>().unwrap(), AccessType::Direct);
        assert_eq!(" Gateway ".parse::<AccessType>().unwrap(), AccessType::Gateway);
        assert!("mesh".parse::<AccessType>().is_err());
        assert_eq!(AccessType::default(), AccessType::Direct);
    }

    #[test]
    fn test_instance_id_is_stable() {
        let reg = Registration {
            identity: ServiceIdentity::new("svc", "1.0.0", "dev"),
            address: "10.0.0.5:9000".to_string(),
            metadata: HashMap::new(),
            ttl: Duration::from_secs(30),
        };
        assert_eq!(reg.instance_id(), "dev-svc-1.0.0-10.0.0.5-9000");
        assert_eq!(reg.instance_id(), reg.clone().instance_id());
    }

    #[test]
    fn test_error_mapping() {
        let err: DeregistrationError = RegistryError::UnknownRegistration("x".into()).into();
        assert!(matches!(err, DeregistrationError::UnknownHandle(id) if id == "x"));

        let err: RegistrationError = RegistryError::Timeout(Duration::from_secs(2)).into();
        assert!(matches!(err, RegistrationError::Unavailable(_)));
    }
}
