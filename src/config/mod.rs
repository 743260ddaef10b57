//! Bootstrap configuration subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! The same file also backs the config store's file source:
//!     watcher.rs detects change
//!     → re-parse as a TOML table
//!     → store::FileSource publishes changed keys to watchers
//! ```
//!
//! # Design Decisions
//! - Bootstrap config is immutable once loaded; only store keys are live
//! - All fields have defaults to allow minimal configs
//! - A missing file is not fatal, a broken one is

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AdminConfig, BackendKind, CollaboratorConfig, CollaboratorsConfig, ConfigStoreConfig,
    ConsulConfig, GatewayConfig, LogFormat, ObservabilityConfig, RegistryConfig, SelectionKind,
    ServiceConfig, ShutdownConfig, TimeoutConfig, UpstreamConfig,
};
