//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign / propagate x-request-id)
//!     → middleware/ (in-flight accounting, maintenance gate)
//!     → handlers/ (customers, lookup, config, health)
//!     → response.rs ({status, message} on error)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ApiError, ErrorResponse, MAINTENANCE_MESSAGE};
pub use server::{AppState, HttpServer};
