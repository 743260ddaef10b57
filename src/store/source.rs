//! Configuration source abstraction.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::store::value::ConfigValue;

/// Errors raised by configuration sources. Past startup they never escape
/// `ConfigClient`.
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("config store unreachable: {0}")]
    Unreachable(String),

    #[error("config store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("config store returned an invalid response: {0}")]
    Invalid(String),
}

/// Stream of changes for one key. `None` means the key was deleted.
pub type WatchReceiver = mpsc::UnboundedReceiver<Option<ConfigValue>>;

/// A backend holding configuration keys.
///
/// Keys are dot-delimited (`rest-config.maintenance`); each source maps them
/// to its own layout.
#[async_trait]
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Short source name for logs.
    fn name(&self) -> &'static str;

    /// Current value of `key`, `Ok(None)` when absent.
    async fn get(&self, key: &str) -> Result<Option<ConfigValue>, ConfigStoreError>;

    /// Subscribe to changes of `key`. The source stops publishing once the
    /// receiver is dropped.
    async fn watch(&self, key: &str) -> Result<WatchReceiver, ConfigStoreError>;
}
