//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (TOML file, then EXCHANGE_HUB_* environment)
//!     → validation.rs (semantic checks)
//!     → HubConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is resolved once at startup; there is no reload path
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, ConfigLoader};
pub use schema::{
    AccessConfig, CircuitBreakerConfig, FallbackConfig, FallbackSource, HubConfig,
    InternalConfig, ListenerConfig, ObservabilityConfig, PeerConfig, RateLimitConfig,
    ServiceConfig, TimeoutConfig, DEFAULT_EXCHANGE_PATH,
};
