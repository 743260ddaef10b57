//! Retry policy for collaborator calls.
//!
//! # Design Decisions
//! - Only transport failures are retried; a non-2xx answer is final
//! - Connection failures are retryable for every method (nothing was sent)
//! - Timeouts are retried for idempotent methods only
//! - Jittered backoff between attempts

use reqwest::Method;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::resilience::backoff::calculate_backoff;

/// How a failed attempt went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Could not connect or the connection broke.
    Connect,
    /// The attempt exceeded its deadline.
    Timeout,
    /// The collaborator answered with a non-success status.
    Status,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            max_retries: config.transport_retries,
            base_delay_ms: config.retry_base_ms,
            max_delay_ms: config.retry_max_ms,
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Whether attempt number `attempt` (1-based) may be followed by another.
    pub fn should_retry(&self, method: &Method, failure: FailureKind, attempt: u32) -> bool {
        if attempt > self.max_retries {
            return false;
        }
        match failure {
            FailureKind::Connect => true,
            FailureKind::Timeout => method.is_idempotent(),
            FailureKind::Status => false,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms)
    }
}
