//! Process-local cache of watched configuration keys.

use dashmap::DashMap;
use std::collections::BTreeMap;

use crate::store::value::ConfigValue;

/// Concurrent key/value cache written by watch tasks and read by handlers.
///
/// Last write wins; reads never observe a partially written value.
#[derive(Debug, Default)]
pub struct ConfigCache {
    values: DashMap<String, ConfigValue>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).map(|v| v.clone())
    }

    /// Store `value`, or drop the key when `None`.
    pub fn apply(&self, key: &str, value: Option<ConfigValue>) {
        match value {
            Some(v) => {
                self.values.insert(key.to_string(), v);
            }
            None => {
                self.values.remove(key);
            }
        }
    }

    /// Sorted copy of the cache for the admin API.
    pub fn snapshot(&self) -> BTreeMap<String, ConfigValue> {
        self.values
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
