//! Discovery-backed HTTP calls to collaborating services.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::discovery::{DiscoveryClient, DiscoveryError, DiscoveryQuery};
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::resilience::{FailureKind, RetryPolicy};

/// A collaborator call failed.
#[derive(Debug, Error)]
pub enum CollaboratorCallError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("request to {service} failed: {message}")]
    Transport { service: String, message: String },

    #[error("request to {service} timed out after {after:?}")]
    Timeout { service: String, after: Duration },

    #[error("{service} responded with {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("invalid response from {service}: {message}")]
    Decode { service: String, message: String },
}

impl CollaboratorCallError {
    fn outcome(&self) -> &'static str {
        match self {
            CollaboratorCallError::Discovery(_) => "discovery_error",
            CollaboratorCallError::Transport { .. } => "transport_error",
            CollaboratorCallError::Timeout { .. } => "timeout",
            CollaboratorCallError::Status { .. } => "status_error",
            CollaboratorCallError::Decode { .. } => "decode_error",
        }
    }
}

/// Base URL for a registered location; locations without a scheme are HTTP.
pub fn base_url(address: &str) -> String {
    let address = address.trim_end_matches('/');
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

/// Resolves a collaborator on every call and talks JSON to it.
#[derive(Debug, Clone)]
pub struct CollaboratorClient {
    http: reqwest::Client,
    discovery: Arc<DiscoveryClient>,
    retry: RetryPolicy,
    timeout: Duration,
    stale_fallback: bool,
}

impl CollaboratorClient {
    pub fn new(
        discovery: Arc<DiscoveryClient>,
        config: &UpstreamConfig,
        stale_fallback: bool,
    ) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .no_proxy()
            .build()?;

        Ok(Self {
            http,
            discovery,
            retry: RetryPolicy::from_config(config),
            timeout,
            stale_fallback,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        query: &DiscoveryQuery,
        path: &str,
        request_id: Option<&str>,
    ) -> Result<T, CollaboratorCallError> {
        let response = self.call(query, Method::GET, path, None::<&()>, request_id).await?;
        Self::decode(query, response).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        query: &DiscoveryQuery,
        path: &str,
        body: &B,
        request_id: Option<&str>,
    ) -> Result<T, CollaboratorCallError> {
        let response = self.call(query, Method::POST, path, Some(body), request_id).await?;
        Self::decode(query, response).await
    }

    async fn decode<T: DeserializeOwned>(
        query: &DiscoveryQuery,
        response: reqwest::Response,
    ) -> Result<T, CollaboratorCallError> {
        let result = response.json::<T>().await.map_err(|e| CollaboratorCallError::Decode {
            service: query.name.clone(),
            message: e.to_string(),
        });
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        metrics::record_collaborator_call(&query.name, outcome);
        result
    }

    /// Resolve the collaborator, falling back to the last known address
    /// when the registry is unavailable and fallback is enabled.
    async fn resolve(&self, query: &DiscoveryQuery) -> Result<String, CollaboratorCallError> {
        match self.discovery.discover(query).await {
            Ok(address) => Ok(address),
            Err(DiscoveryError::Unavailable(reason)) if self.stale_fallback => {
                match self.discovery.stale(query) {
                    Some(address) => {
                        tracing::warn!(service = %query.name, address = %address, reason = %reason, "Registry unavailable, using last known address");
                        Ok(address)
                    }
                    None => Err(DiscoveryError::Unavailable(reason).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One logical call: discover, send, retry transport failures per policy.
    /// Returns the response only when it is 2xx.
    async fn call<B: Serialize + ?Sized>(
        &self,
        query: &DiscoveryQuery,
        method: Method,
        path: &str,
        body: Option<&B>,
        request_id: Option<&str>,
    ) -> Result<reqwest::Response, CollaboratorCallError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let address = match self.resolve(query).await {
                Ok(address) => address,
                Err(e) => {
                    metrics::record_collaborator_call(&query.name, e.outcome());
                    return Err(e);
                }
            };
            let url = format!("{}{}", base_url(&address), path);

            let mut request = self.http.request(method.clone(), &url);
            if let Some(id) = request_id {
                request = request.header(X_REQUEST_ID, id);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            tracing::debug!(service = %query.name, method = %method, url = %url, attempt, "Calling collaborator");

            let failure = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    let err = CollaboratorCallError::Status {
                        service: query.name.clone(),
                        status,
                        body: body.trim().to_string(),
                    };
                    tracing::warn!(service = %query.name, url = %url, status, "Collaborator returned non-success status");
                    metrics::record_collaborator_call(&query.name, err.outcome());
                    return Err(err);
                }
                Err(e) => e,
            };

            // The cached address may point at a dead instance.
            self.discovery.invalidate(query);

            let (kind, err) = if failure.is_timeout() {
                (
                    FailureKind::Timeout,
                    CollaboratorCallError::Timeout {
                        service: query.name.clone(),
                        after: self.timeout,
                    },
                )
            } else {
                (
                    FailureKind::Connect,
                    CollaboratorCallError::Transport {
                        service: query.name.clone(),
                        message: failure.to_string(),
                    },
                )
            };

            if self.retry.should_retry(&method, kind, attempt) {
                let delay = self.retry.delay(attempt);
                tracing::info!(service = %query.name, attempt, delay = ?delay, error = %failure, "Retrying collaborator call");
                tokio::time::sleep(delay).await;
                continue;
            }

            tracing::error!(service = %query.name, url = %url, attempt, error = %failure, "Collaborator call failed");
            metrics::record_collaborator_call(&query.name, err.outcome());
            return Err(err);
        }
    }
}
