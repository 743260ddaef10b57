//! Local TOML file configuration source.
//!
//! Dotted keys walk nested tables: `rest-config.maintenance` reads
//! `[rest-config] maintenance = ...`. The file is re-read by the notify-based
//! watcher in `config::watcher`, and watchers of keys whose value changed are
//! notified.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::DashMap;
use notify::RecommendedWatcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::watcher::{read_table, FileWatcher};
use crate::store::source::{ConfigSource, ConfigStoreError, WatchReceiver};
use crate::store::value::ConfigValue;

#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    table: ArcSwap<toml::Table>,
    watchers: DashMap<String, Vec<mpsc::UnboundedSender<Option<ConfigValue>>>>,
}

impl FileSource {
    /// Load `path`. A missing file is an empty source.
    pub fn load(path: &Path) -> Result<Self, ConfigStoreError> {
        let table = if path.exists() {
            read_table(path).map_err(ConfigStoreError::Invalid)?
        } else {
            tracing::warn!(path = ?path, "Config source file not found, starting empty");
            toml::Table::new()
        };
        Ok(Self::from_table(path, table))
    }

    pub fn from_table(path: &Path, table: toml::Table) -> Self {
        Self {
            path: path.to_path_buf(),
            table: ArcSwap::from_pointee(table),
            watchers: DashMap::new(),
        }
    }

    /// Replace the file contents and notify watchers of changed keys.
    pub fn apply(&self, table: toml::Table) {
        let old = self.table.swap(Arc::new(table));
        let new = self.table.load();

        for mut entry in self.watchers.iter_mut() {
            let before = lookup(&old, entry.key());
            let after = lookup(&new, entry.key());
            if before != after {
                tracing::info!(key = %entry.key(), source = "file", "Config key changed");
                entry.value_mut().retain(|tx| tx.send(after.clone()).is_ok());
            }
        }
    }

    /// Start the file watcher. The returned handle must be kept alive.
    pub fn spawn_watcher(self: &Arc<Self>) -> Result<RecommendedWatcher, notify::Error> {
        let (watcher, mut updates) = FileWatcher::new(&self.path);
        let handle = watcher.run()?;

        let source = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(table) = updates.recv().await {
                source.apply(table);
            }
        });
        Ok(handle)
    }
}

/// Resolve a dotted key against a table. A literal key containing dots wins
/// over the nested path.
fn lookup(table: &toml::Table, key: &str) -> Option<ConfigValue> {
    if let Some(value) = table.get(key) {
        return ConfigValue::from_toml(value);
    }

    let mut parts = key.split('.');
    let first = parts.next()?;
    let mut current = table.get(first)?;
    for part in parts {
        current = current.as_table()?.get(part)?;
    }
    ConfigValue::from_toml(current)
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<ConfigValue>, ConfigStoreError> {
        Ok(lookup(&self.table.load(), key))
    }

    async fn watch(&self, key: &str) -> Result<WatchReceiver, ConfigStoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.entry(key.to_string()).or_default().push(tx);
        Ok(rx)
    }
}
