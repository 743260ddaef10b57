//! Discovery Gateway Library

pub mod admin;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;
pub mod store;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use discovery::DiscoveryClient;
pub use http::HttpServer;
pub use lifecycle::{LifecycleManager, Shutdown};
pub use store::ConfigClient;
