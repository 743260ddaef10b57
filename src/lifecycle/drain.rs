//! In-flight request tracking for graceful drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::observability::metrics;

/// Counts requests currently being served.
///
/// Cloning shares the same counter.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    active_count: Arc<AtomicU64>,
    idle: Arc<Notify>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request. Returns a guard that decrements on drop.
    pub fn track(&self) -> InFlightGuard {
        let count = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_in_flight(count);
        InFlightGuard {
            active_count: Arc::clone(&self.active_count),
            idle: Arc::clone(&self.idle),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until no request is in flight. Returns false if `timeout` elapsed
    /// first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.idle.notified();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

/// Guard that tracks one request's lifetime.
#[derive(Debug)]
pub struct InFlightGuard {
    active_count: Arc<AtomicU64>,
    idle: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let remaining = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_in_flight(remaining);
        if remaining == 0 {
            self.idle.notify_waiters();
        }
    }
}
