//! Configuration validation.
//!
//! Semantic checks that serde cannot express. Returns every error found,
//! not just the first, and runs before the config is accepted.

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::HubConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully-resolved configuration.
pub fn validate_config(config: &HubConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.inbound_secs == 0 {
        errors.push(ValidationError::new("timeouts.inbound_secs", "must be greater than 0"));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be greater than 0",
        ));
    }
    if config.circuit_breaker.half_open_max_calls == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.half_open_max_calls",
            "must be greater than 0",
        ));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
        }
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
        }
    }

    let mut seen = HashSet::new();
    for (i, peer) in config.peers.iter().enumerate() {
        let field = format!("peers[{}]", i);
        if peer.name.trim().is_empty() {
            errors.push(ValidationError::new(&field, "peer name must not be empty"));
            continue;
        }
        if !seen.insert(peer.name.to_lowercase()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate peer name '{}'", peer.name),
            ));
        }
        if let Some(base_url) = &peer.base_url {
            match url::Url::parse(base_url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => errors.push(ValidationError::new(
                    format!("{}.base_url", field),
                    format!("unsupported scheme '{}'", parsed.scheme()),
                )),
                Err(e) => errors.push(ValidationError::new(
                    format!("{}.base_url", field),
                    format!("invalid URL '{}': {}", base_url, e),
                )),
            }
        }
        if let Some(path) = &peer.exchange_path {
            if !path.starts_with('/') {
                errors.push(ValidationError::new(
                    format!("{}.exchange_path", field),
                    "must start with '/'",
                ));
            }
        }
    }

    for caller in &config.access.allowed_callers {
        if !seen.contains(&caller.to_lowercase()) {
            tracing::warn!(caller = %caller, "Allow-list entry does not name a configured peer");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
