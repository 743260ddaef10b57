//! Configuration store client.
//!
//! Reads go through the sources in priority order and never fail: an absent
//! or unreachable key is `None` and callers apply their defaults. Watches run
//! one task per key that merges every source's updates into the cache.

use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::store::cache::ConfigCache;
use crate::store::source::ConfigSource;
use crate::store::value::ConfigValue;

#[derive(Debug)]
pub struct ConfigClient {
    /// Highest priority first.
    sources: Vec<Arc<dyn ConfigSource>>,
    cache: Arc<ConfigCache>,
    timeout: Duration,
    shutdown: Shutdown,
    watched: DashSet<String>,
}

impl ConfigClient {
    pub fn new(sources: Vec<Arc<dyn ConfigSource>>, timeout: Duration, shutdown: Shutdown) -> Self {
        Self {
            sources,
            cache: Arc::new(ConfigCache::new()),
            timeout,
            shutdown,
            watched: DashSet::new(),
        }
    }

    pub fn cache(&self) -> &Arc<ConfigCache> {
        &self.cache
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    async fn read_source(&self, source: &dyn ConfigSource, key: &str) -> Option<ConfigValue> {
        match tokio::time::timeout(self.timeout, source.get(key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                tracing::warn!(key = %key, source = source.name(), error = %e, "Config read failed");
                None
            }
            Err(_) => {
                tracing::warn!(key = %key, source = source.name(), timeout = ?self.timeout, "Config read timed out");
                None
            }
        }
    }

    /// First value found for `key` across sources.
    pub async fn get(&self, key: &str) -> Option<ConfigValue> {
        for source in &self.sources {
            if let Some(value) = self.read_source(source.as_ref(), key).await {
                return Some(value);
            }
        }
        tracing::debug!(key = %key, "Config key not found");
        None
    }

    pub async fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).await.map(|v| v.as_string())
    }

    pub async fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).await.and_then(|v| v.as_int())
    }

    pub async fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).await.and_then(|v| v.as_bool())
    }

    /// Keep `key` current in the cache until shutdown.
    ///
    /// The cache is populated before this returns; later changes are applied
    /// in the order each source publishes them. Watching an already watched
    /// key is a no-op.
    pub async fn watch(&self, key: &str) {
        if !self.watched.insert(key.to_string()) {
            return;
        }

        let mut latest = Vec::with_capacity(self.sources.len());
        let (merged_tx, mut merged_rx) = mpsc::unbounded_channel::<(usize, Option<ConfigValue>)>();

        for (idx, source) in self.sources.iter().enumerate() {
            let mut rx = match source.watch(key).await {
                Ok(rx) => rx,
                Err(e) => {
                    tracing::warn!(key = %key, source = source.name(), error = %e, "Config watch failed to start");
                    latest.push(None);
                    continue;
                }
            };
            latest.push(self.read_source(source.as_ref(), key).await);

            let merged_tx = merged_tx.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = merged_tx.closed() => break,
                        update = rx.recv() => match update {
                            Some(value) => {
                                if merged_tx.send((idx, value)).is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                    }
                }
            });
        }
        drop(merged_tx);

        let initial = latest.iter().find_map(|v| v.clone());
        self.cache.apply(key, initial);

        let cache = Arc::clone(&self.cache);
        let shutdown = self.shutdown.clone();
        let key = key.to_string();
        tracing::debug!(key = %key, "Config watch started");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    update = merged_rx.recv() => match update {
                        Some((idx, value)) => {
                            latest[idx] = value;
                            let effective = latest.iter().find_map(|v| v.clone());
                            tracing::info!(key = %key, value = ?effective, "Config value updated");
                            metrics::record_config_update(&key);
                            cache.apply(&key, effective);
                        }
                        None => break,
                    },
                }
            }
            tracing::debug!(key = %key, "Config watch stopped");
        });
    }
}
