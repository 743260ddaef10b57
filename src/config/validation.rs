//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, TTL vs heartbeat interval)
//! - Check identity fields and collaborator version constraints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BackendKind, CollaboratorConfig, GatewayConfig};
use crate::discovery::VersionConstraint;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("registry.ping_interval_secs ({ping}) must be shorter than registry.ttl_secs ({ttl})")]
    HeartbeatTooSlow { ping: u64, ttl: u64 },

    #[error("collaborators.{field}.version '{value}' is not a valid version constraint")]
    BadConstraint { field: &'static str, value: String },

    #[error("{field} '{value}' is not a valid address")]
    BadAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let service = &config.service;
    for (field, value) in [
        ("service.name", &service.name),
        ("service.version", &service.version),
        ("service.environment", &service.environment),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::Empty(field));
        }
    }

    for (field, value) in [
        ("registry.timeout_secs", config.registry.timeout_secs),
        ("registry.ttl_secs", config.registry.ttl_secs),
        ("registry.ping_interval_secs", config.registry.ping_interval_secs),
        ("config_store.timeout_secs", config.config_store.timeout_secs),
        ("upstream.timeout_secs", config.upstream.timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    let registry = &config.registry;
    if registry.ping_interval_secs >= registry.ttl_secs {
        errors.push(ValidationError::HeartbeatTooSlow {
            ping: registry.ping_interval_secs,
            ttl: registry.ttl_secs,
        });
    }

    check_collaborator("orders", &config.collaborators.orders, &mut errors);
    check_collaborator("lookup", &config.collaborators.lookup, &mut errors);

    let uses_consul = config.registry.backend == BackendKind::Consul
        || config.config_store.backend == BackendKind::Consul;
    if uses_consul && !is_http_url(&config.consul.url) {
        errors.push(ValidationError::BadAddress {
            field: "consul.url",
            value: config.consul.url.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_collaborator(
    field: &'static str,
    collaborator: &CollaboratorConfig,
    errors: &mut Vec<ValidationError>,
) {
    if collaborator.name.trim().is_empty() {
        errors.push(ValidationError::Empty("collaborators.*.name"));
    }
    if collaborator.version.parse::<VersionConstraint>().is_err() {
        errors.push(ValidationError::BadConstraint {
            field,
            value: collaborator.version.clone(),
        });
    }
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}
