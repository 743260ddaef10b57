//! Downstream collaborator calls.
//!
//! # Data Flow
//! ```text
//! handler → CollaboratorClient::get_json / post_json
//!     → discovery.discover(query) (stale address if registry down + fallback on)
//!     → reqwest call with timeout, x-request-id propagated
//!     → 2xx: decode JSON
//!     → non-2xx: CollaboratorCallError::Status (never retried)
//!     → transport error: invalidate cache entry, retry per policy
//! ```

pub mod client;

pub use client::{base_url, CollaboratorCallError, CollaboratorClient};
