//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the hub.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Canonical exchange endpoint path used when a peer does not override it.
pub const DEFAULT_EXCHANGE_PATH: &str = "/exchange";

/// Root configuration for the exchange hub.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HubConfig {
    /// Identity of this service.
    pub service: ServiceConfig,

    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Peer service definitions.
    pub peers: Vec<PeerConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-peer circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Caller allow-list.
    pub access: AccessConfig,

    /// Inbound rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Bearer-guarded internal endpoints.
    pub internal: InternalConfig,

    /// Fallback snapshot sources.
    pub fallback: FallbackConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Identity of this hub.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name peers use to address this service.
    pub name: String,

    /// Name sent as `requesterName` on outbound calls (defaults to `name`).
    pub requester_name: Option<String>,
}

impl ServiceConfig {
    pub fn requester(&self) -> &str {
        self.requester_name.as_deref().unwrap_or(&self.name)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "DirectoryHub".to_string(),
            requester_name: None,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// One peer microservice.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PeerConfig {
    /// Logical peer name (matched case-insensitively).
    pub name: String,

    /// Base URL, e.g. "http://skills:4000". Absent means not configured.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Exchange endpoint path on the peer.
    #[serde(default)]
    pub exchange_path: Option<String>,
}

impl PeerConfig {
    pub fn new(name: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.map(str::to_string),
            exchange_path: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a single outbound peer call in seconds.
    pub request_secs: u64,

    /// Deadline for handling one inbound request in seconds.
    pub inbound_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            inbound_secs: 60,
        }
    }
}

/// Circuit breaker thresholds, shared by every peer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Seconds an open circuit waits before admitting a probe.
    pub reset_timeout_secs: u64,

    /// Failed probes tolerated while half-open before re-opening.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 60,
            half_open_max_calls: 3,
        }
    }
}

/// Caller allow-list.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccessConfig {
    /// Requester names accepted on `/exchange`. Empty allows every configured peer.
    pub allowed_callers: Vec<String>,
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per caller address per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 60,
        }
    }
}

/// Internal (peer-to-hub push) endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InternalConfig {
    /// Shared bearer secret. Unset disables the endpoints (503).
    pub shared_secret: Option<String>,
}

/// Where the fallback snapshot is read from.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FallbackSource {
    File { path: PathBuf },
    Http { url: String },
}

/// Fallback snapshot configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FallbackConfig {
    /// Candidate sources, tried in order; the first that loads wins.
    pub sources: Vec<FallbackSource>,

    /// Extra request fields echoed into substitute documents.
    pub echo_fields: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "json" or "pretty".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Append exchange audit entries to this file (JSON lines).
    pub audit_log: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            audit_log: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: HubConfig = toml::from_str(
            r#"
            [[peers]]
            name = "SkillsEngine"
            "#,
        )
        .unwrap();

        assert_eq!(config.service.name, "DirectoryHub");
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.peers.len(), 1);
        assert!(config.peers[0].base_url.is_none());
    }

    #[test]
    fn test_fallback_sources_parse() {
        let config: HubConfig = toml::from_str(
            r#"
            [fallback]
            sources = [
                { kind = "file", path = "data/fallback.json" },
                { kind = "http", url = "http://config:9000/fallback" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.fallback.sources,
            vec![
                FallbackSource::File { path: "data/fallback.json".into() },
                FallbackSource::Http { url: "http://config:9000/fallback".into() },
            ]
        );
    }

    #[test]
    fn test_requester_defaults_to_service_name() {
        let mut service = ServiceConfig::default();
        assert_eq!(service.requester(), "DirectoryHub");
        service.requester_name = Some("directory".into());
        assert_eq!(service.requester(), "directory");
    }
}
