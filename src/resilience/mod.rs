//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Collaborator call (upstream):
//!     → timeouts.rs (deadline per attempt)
//!     → On transport failure: retries.rs (retryable for this method? attempts left?)
//!     → backoff.rs (jittered delay) → next attempt
//!
//! Config watch polling (store::consul):
//!     → backoff.rs between failed polls
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Non-2xx answers are never retried
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use retries::{FailureKind, RetryPolicy};
pub use timeouts::bounded;
