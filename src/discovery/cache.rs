//! Look-aside cache of resolved collaborator addresses.

use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::discovery::types::AccessType;
use crate::discovery::version::{VersionConstraint, VersionParseError};

/// One discovery lookup: which service, which versions, where, and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveryQuery {
    pub name: String,
    pub constraint: VersionConstraint,
    pub environment: String,
    pub access_type: AccessType,
}

impl DiscoveryQuery {
    pub fn new(
        name: &str,
        constraint: VersionConstraint,
        environment: &str,
        access_type: AccessType,
    ) -> Self {
        Self {
            name: name.to_string(),
            constraint,
            environment: environment.to_string(),
            access_type,
        }
    }

    /// Build a query from a raw version constraint string.
    pub fn parse(
        name: &str,
        version: &str,
        environment: &str,
        access_type: AccessType,
    ) -> Result<Self, VersionParseError> {
        Ok(Self::new(name, version.parse()?, environment, access_type))
    }
}

/// A cached resolution.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub address: String,
    pub fetched_at: Instant,
}

/// Cache contents as reported by the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub service: String,
    pub version: String,
    pub environment: String,
    pub access_type: AccessType,
    pub address: String,
    pub age_ms: u128,
    pub fresh: bool,
}

/// Concurrent discovery cache keyed by query.
///
/// Entries past their TTL are not served by `fresh` but remain readable through
/// `stale` until overwritten or invalidated.
#[derive(Debug)]
pub struct DiscoveryCache {
    entries: DashMap<DiscoveryQuery, CacheEntry>,
    ttl: Duration,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Address for `query` if it was fetched within the TTL.
    pub fn fresh(&self, query: &DiscoveryQuery) -> Option<String> {
        self.entries
            .get(query)
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.address.clone())
    }

    /// Last known address for `query`, regardless of age.
    pub fn stale(&self, query: &DiscoveryQuery) -> Option<String> {
        self.entries.get(query).map(|e| e.address.clone())
    }

    pub fn insert(&self, query: DiscoveryQuery, address: String) {
        self.entries.insert(
            query,
            CacheEntry {
                address,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop the entry so the next lookup goes to the registry.
    pub fn invalidate(&self, query: &DiscoveryQuery) -> bool {
        self.entries.remove(query).is_some()
    }

    pub fn snapshot(&self) -> Vec<CacheSnapshot> {
        let mut out: Vec<CacheSnapshot> = self
            .entries
            .iter()
            .map(|e| {
                let age = e.fetched_at.elapsed();
                CacheSnapshot {
                    service: e.key().name.clone(),
                    version: e.key().constraint.to_string(),
                    environment: e.key().environment.clone(),
                    access_type: e.key().access_type,
                    address: e.address.clone(),
                    age_ms: age.as_millis(),
                    fresh: age < self.ttl,
                }
            })
            .collect();
        out.sort_by(|a, b| a.service.cmp(&b.service).then(a.version.cmp(&b.version)));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
