//! Consul KV configuration source.
//!
//! Keys live under `environments/{env}/services/{name}/{version}/config/`,
//! with the dots of a config key turned into path separators. Watches use
//! Consul blocking queries (`index` + `wait`) and back off on errors.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::{ConfigStoreConfig, ConsulConfig};
use crate::discovery::ServiceIdentity;
use crate::resilience::backoff::calculate_backoff;
use crate::store::source::{ConfigSource, ConfigStoreError, WatchReceiver};
use crate::store::value::ConfigValue;

const INDEX_HEADER: &str = "X-Consul-Index";

#[derive(Debug, Clone)]
pub struct ConsulKvSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    prefix: String,
    timeout: Duration,
    wait: Duration,
    retry_base_ms: u64,
    retry_max_ms: u64,
}

impl ConsulKvSource {
    pub fn new(
        consul: &ConsulConfig,
        store: &ConfigStoreConfig,
        identity: &ServiceIdentity,
    ) -> Result<Self, ConfigStoreError> {
        // Per-request timeouts: watches need longer than one-shot reads.
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| ConfigStoreError::Unreachable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: consul.url.trim_end_matches('/').to_string(),
            token: consul.token.clone(),
            prefix: key_prefix(identity),
            timeout: Duration::from_secs(store.timeout_secs),
            wait: Duration::from_secs(store.watch_wait_secs),
            retry_base_ms: store.retry_base_ms,
            retry_max_ms: store.retry_max_ms,
        })
    }

    fn kv_path(&self, key: &str) -> String {
        format!("/v1/kv/{}/{}", self.prefix, key.replace('.', "/"))
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.get(format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.header("X-Consul-Token", token),
            None => builder,
        }
    }

    fn map_transport(&self, err: reqwest::Error) -> ConfigStoreError {
        if err.is_timeout() {
            ConfigStoreError::Timeout(self.timeout)
        } else {
            ConfigStoreError::Unreachable(err.to_string())
        }
    }

    async fn read(response: reqwest::Response) -> Result<Option<ConfigValue>, ConfigStoreError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ConfigStoreError::Invalid(format!("consul returned {}", status)));
        }
        let text = response
            .text()
            .await
            .map_err(|e| ConfigStoreError::Unreachable(e.to_string()))?;
        Ok(Some(ConfigValue::String(text)))
    }

    /// One blocking query. Returns the value and the index to block on next.
    async fn poll(&self, key: &str, index: u64) -> Result<(Option<ConfigValue>, u64), ConfigStoreError> {
        let path = format!(
            "{}?raw&index={}&wait={}s",
            self.kv_path(key),
            index,
            self.wait.as_secs()
        );
        let response = self
            .request(&path)
            .timeout(self.wait + self.timeout)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let next_index = response
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let value = Self::read(response).await?;
        Ok((value, next_index))
    }

    async fn watch_loop(self, key: String, tx: mpsc::UnboundedSender<Option<ConfigValue>>) {
        let mut index = 0u64;
        let mut last: Option<Option<ConfigValue>> = None;
        let mut failures = 0u32;

        loop {
            let result = tokio::select! {
                _ = tx.closed() => break,
                result = self.poll(&key, index) => result,
            };

            match result {
                Ok((value, next_index)) => {
                    failures = 0;
                    // An index that goes backwards means the store was reset.
                    index = if next_index < index { 0 } else { next_index };
                    if last.as_ref() != Some(&value) {
                        if last.is_some() {
                            tracing::info!(key = %key, source = "consul", "Config key changed");
                        }
                        if tx.send(value.clone()).is_err() {
                            break;
                        }
                        last = Some(value);
                    }
                }
                Err(e) => {
                    failures += 1;
                    let delay = calculate_backoff(failures, self.retry_base_ms, self.retry_max_ms);
                    tracing::warn!(key = %key, error = %e, attempt = failures, delay = ?delay, "Config watch poll failed");
                    tokio::select! {
                        _ = tx.closed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
        tracing::debug!(key = %key, "Consul config watch stopped");
    }
}

/// KV prefix for a service's configuration.
pub fn key_prefix(identity: &ServiceIdentity) -> String {
    format!(
        "environments/{}/services/{}/{}/config",
        identity.environment, identity.name, identity.version
    )
}

#[async_trait]
impl ConfigSource for ConsulKvSource {
    fn name(&self) -> &'static str {
        "consul"
    }

    async fn get(&self, key: &str) -> Result<Option<ConfigValue>, ConfigStoreError> {
        let path = format!("{}?raw", self.kv_path(key));
        let response = self
            .request(&path)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        Self::read(response).await
    }

    async fn watch(&self, key: &str) -> Result<WatchReceiver, ConfigStoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.clone().watch_loop(key.to_string(), tx));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let identity = ServiceIdentity::new("customers-service", "1.0.0", "dev");
        let source = ConsulKvSource::new(
            &ConsulConfig::default(),
            &ConfigStoreConfig::default(),
            &identity,
        )
        .unwrap();
        assert_eq!(
            source.kv_path("rest-config.maintenance"),
            "/v1/kv/environments/dev/services/customers-service/1.0.0/config/rest-config/maintenance"
        );
    }
}
