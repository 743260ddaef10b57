//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs + manager.rs):
//!     assemble config store, registry client, collaborators
//!     bind listeners → Starting → register (fatal on error) → Registered
//!     → heartbeat task
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → manager.begin_drain() (first signal only)
//!
//! Shutdown (manager.rs + shutdown.rs + drain.rs):
//!     Draining → deregister once → Shutdown triggered
//!     → HTTP server stops accepting → open connections and in-flight
//!       requests drain (bounded)
//!     → finish(): Stopped → exit status 1
//! ```
//!
//! # Design Decisions
//! - State changes only by compare-and-swap, so termination is single-shot
//! - The registration handle is taken exactly once
//! - Background tasks observe the same shutdown token

pub mod drain;
pub mod manager;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use drain::{InFlightGuard, InFlightTracker};
pub use manager::{LifecycleError, LifecycleManager, EXIT_ON_SIGNAL};
pub use shutdown::Shutdown;
pub use signals::{spawn_signal_listener, TerminationSignal, TerminationSignals};
pub use startup::{assemble, registry_backend, Components, Listeners, StartupError};
pub use state::{LifecycleState, StateCell};
