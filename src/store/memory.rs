//! In-process configuration source.
//!
//! Values are set programmatically (admin API, tests) and pushed to watchers
//! immediately.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::store::source::{ConfigSource, ConfigStoreError, WatchReceiver};
use crate::store::value::ConfigValue;

#[derive(Debug, Default)]
pub struct MemorySource {
    values: DashMap<String, ConfigValue>,
    watchers: DashMap<String, Vec<mpsc::UnboundedSender<Option<ConfigValue>>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: impl Into<ConfigValue>) {
        let value = value.into();
        self.values.insert(key.to_string(), value.clone());
        self.notify(key, Some(value));
    }

    /// Delete `key`. Returns false if it was not set.
    pub fn remove(&self, key: &str) -> bool {
        let existed = self.values.remove(key).is_some();
        if existed {
            self.notify(key, None);
        }
        existed
    }

    fn notify(&self, key: &str, value: Option<ConfigValue>) {
        if let Some(mut senders) = self.watchers.get_mut(key) {
            senders.retain(|tx| tx.send(value.clone()).is_ok());
        }
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<ConfigValue>, ConfigStoreError> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    async fn watch(&self, key: &str) -> Result<WatchReceiver, ConfigStoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.entry(key.to_string()).or_default().push(tx);
        Ok(rx)
    }
}
