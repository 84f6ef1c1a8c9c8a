//! Peer lookup.
//!
//! # Responsibilities
//! - Resolve a logical peer name (case-insensitive) to its descriptor
//! - Enforce the caller allow-list
//! - Report "not configured" as a first-class outcome

use std::collections::{HashMap, HashSet};

use crate::config::HubConfig;
use crate::registry::peer::PeerDescriptor;

/// Outcome of a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Peer has a base URL and can be called.
    Ready(&'a PeerDescriptor),
    /// Peer is known but has no base URL.
    NotConfigured(&'a PeerDescriptor),
}

impl<'a> Resolution<'a> {
    pub fn peer(&self) -> &'a PeerDescriptor {
        match self {
            Resolution::Ready(p) | Resolution::NotConfigured(p) => p,
        }
    }
}

/// Static mapping from peer name to descriptor.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    /// Lowercased name → descriptor.
    peers: HashMap<String, PeerDescriptor>,
    /// Lowercased allow-list; `None` allows every configured peer.
    allowed: Option<HashSet<String>>,
}

impl ServiceRegistry {
    /// Build the registry from a validated config.
    pub fn from_config(config: &HubConfig) -> Self {
        let peers = config
            .peers
            .iter()
            .map(|p| (p.name.to_lowercase(), PeerDescriptor::from_config(p)))
            .collect();

        let allowed = if config.access.allowed_callers.is_empty() {
            None
        } else {
            Some(
                config
                    .access
                    .allowed_callers
                    .iter()
                    .map(|name| name.trim().to_lowercase())
                    .collect(),
            )
        };

        Self { peers, allowed }
    }

    /// Check a name against the allow-list (defaulting to configured peers).
    pub fn is_allowed(&self, name: &str) -> bool {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return false;
        }
        match &self.allowed {
            Some(allowed) => allowed.contains(&key),
            None => self.peers.contains_key(&key),
        }
    }

    /// Resolve a peer by name. `None` when unknown or not allowed.
    pub fn resolve(&self, name: &str) -> Option<Resolution<'_>> {
        if !self.is_allowed(name) {
            return None;
        }
        let peer = self.peers.get(&name.trim().to_lowercase())?;
        Some(if peer.is_configured() {
            Resolution::Ready(peer)
        } else {
            Resolution::NotConfigured(peer)
        })
    }

    /// All descriptors, sorted by name.
    pub fn peers(&self) -> Vec<&PeerDescriptor> {
        let mut peers: Vec<_> = self.peers.values().collect();
        peers.sort_by(|a, b| a.name.cmp(&b.name));
        peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerConfig;

    fn config(allowed: &[&str]) -> HubConfig {
        let mut config = HubConfig::default();
        config.peers.push(PeerConfig::new("SkillsEngine", None));
        config.peers.push(PeerConfig::new("CourseBuilder", Some("http://courses:4000")));
        config.peers.push(PeerConfig::new("Analytics", Some("http://analytics:4000")));
        config.access.allowed_callers = allowed.iter().map(|s| s.to_string()).collect();
        config
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = ServiceRegistry::from_config(&config(&[]));
        let resolved = registry.resolve("coursebuilder").unwrap();
        assert!(matches!(resolved, Resolution::Ready(p) if p.name == "CourseBuilder"));
    }

    #[test]
    fn test_unconfigured_peer_resolves() {
        let registry = ServiceRegistry::from_config(&config(&[]));
        assert!(matches!(registry.resolve("SkillsEngine"), Some(Resolution::NotConfigured(_))));
    }

    #[test]
    fn test_empty_allow_list_allows_configured_peers_only() {
        let registry = ServiceRegistry::from_config(&config(&[]));
        assert!(registry.is_allowed("ANALYTICS"));
        assert!(!registry.is_allowed("UnknownBot"));
        assert!(!registry.is_allowed(""));
        assert!(registry.resolve("UnknownBot").is_none());
    }

    #[test]
    fn test_allow_list_gates_resolution() {
        let registry = ServiceRegistry::from_config(&config(&["CourseBuilder"]));
        assert!(registry.resolve("CourseBuilder").is_some());
        assert!(registry.resolve("Analytics").is_none());
        assert!(!registry.is_allowed("skillsengine"));
    }
}
