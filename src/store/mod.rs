//! Configuration store client.
//!
//! # Data Flow
//! ```text
//! Sources (priority order):
//!     consul.rs (KV overlay, blocking queries) | memory.rs (admin overlay)
//!     file.rs (gateway.toml, notify watcher)
//!
//! One-shot read:
//!     client.rs get(key) → first source holding the key → ConfigValue
//!
//! Watch:
//!     client.rs watch(key) → per-source streams merged in one task
//!         → cache.rs (DashMap, last write wins)
//!         → bundle.rs Setting::get() reads the cache, no remote fetch
//! ```
//!
//! # Design Decisions
//! - Store errors never reach callers; absence means "use the default"
//! - One task per watched key keeps delivery for that key in order
//! - Watches live until process shutdown; there is no unwatch

pub mod bundle;
pub mod cache;
pub mod client;
pub mod consul;
pub mod file;
pub mod memory;
pub mod source;
pub mod value;

pub use bundle::{ConfigBundle, ObjectProperty, RestConfig, Setting};
pub use cache::ConfigCache;
pub use client::ConfigClient;
pub use consul::ConsulKvSource;
pub use file::FileSource;
pub use memory::MemorySource;
pub use source::{ConfigSource, ConfigStoreError, WatchReceiver};
pub use value::{ConfigValue, FromConfigValue};
