//! Cross-service exchange hub library.

pub mod client;
pub mod config;
pub mod exchange;
pub mod fallback;
pub mod http;
pub mod internal;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod security;

pub use config::schema::HubConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
