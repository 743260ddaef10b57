//! OS signal handling.
//!
//! Only SIGINT and SIGTERM are observed; both start the drain. Further
//! signals while draining are logged and ignored.

use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::lifecycle::manager::LifecycleManager;

/// Which termination signal arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Interrupt => f.write_str("SIGINT"),
            TerminationSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Installed termination signal handlers.
#[cfg(unix)]
pub struct TerminationSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    pub async fn recv(&mut self) -> TerminationSignal {
        tokio::select! {
            _ = self.interrupt.recv() => TerminationSignal::Interrupt,
            _ = self.terminate.recv() => TerminationSignal::Terminate,
        }
    }
}

#[cfg(not(unix))]
pub struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> TerminationSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        TerminationSignal::Interrupt
    }
}

/// Start draining `manager` on every termination signal. Only the first one
/// has an effect.
pub fn spawn_signal_listener(
    mut signals: TerminationSignals,
    manager: Arc<LifecycleManager>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let signal = signals.recv().await;
            tracing::info!(signal = %signal, "Termination signal received");
            if !manager.begin_drain().await {
                tracing::warn!(signal = %signal, state = %manager.state(), "Already shutting down, ignoring signal");
            }
        }
    })
}
