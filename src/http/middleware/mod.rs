//! Request middleware.
//!
//! # Ordering
//! ```text
//! TraceLayer → request id → timeout → in_flight → [maintenance] → handler
//! ```
//! The maintenance gate wraps only the API routes; `/health` bypasses it.

pub mod in_flight;
pub mod maintenance;

pub use in_flight::track_in_flight;
pub use maintenance::maintenance_gate;
