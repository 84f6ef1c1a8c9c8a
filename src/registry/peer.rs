//! Peer descriptors.

use url::Url;

use crate::config::{PeerConfig, DEFAULT_EXCHANGE_PATH};

/// Immutable description of one peer microservice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescriptor {
    /// Name as written in configuration.
    pub name: String,
    /// Base URL; `None` means the peer is known but not configured.
    pub base_url: Option<Url>,
    /// Exchange endpoint path on the peer.
    pub exchange_path: String,
}

impl PeerDescriptor {
    /// Build a descriptor from config. An unparsable URL is logged and
    /// treated as not configured (validation rejects it before this point).
    pub fn from_config(config: &PeerConfig) -> Self {
        let base_url = config.base_url.as_deref().and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(peer = %config.name, url = %raw, error = %e, "Invalid peer base URL");
                None
            }
        });

        Self {
            name: config.name.clone(),
            base_url,
            exchange_path: config
                .exchange_path
                .clone()
                .unwrap_or_else(|| DEFAULT_EXCHANGE_PATH.to_string()),
        }
    }

    /// Full URL of the exchange endpoint, if a base URL is configured.
    pub fn exchange_url(&self) -> Option<String> {
        self.base_url.as_ref().map(|base| {
            format!("{}{}", base.as_str().trim_end_matches('/'), self.exchange_path)
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}
